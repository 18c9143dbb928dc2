//! Registry Viewer Library
//!
//! Client for browsing Docker/OCI registries: catalog and tag listing,
//! manifest and config resolution into image details, and tag deletion.
//! Digest-addressed responses are cached for the session and 401 bearer
//! challenges are answered through a pluggable credential resolver.

pub mod cache;
pub mod cli;
pub mod config;
pub mod digest;
pub mod error;
pub mod image;
pub mod logging;
pub mod registry;

pub use cache::{DigestCache, MemorySessionStore, SessionStore};
pub use config::ViewerConfig;
pub use error::{RegistryError, Result};
pub use image::{ImageInfo, ImageManager};
pub use logging::Logger;
pub use registry::{RegistryClient, Transport};
