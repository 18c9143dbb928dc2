//! Image documents and image-level operations
//!
//! Manifests and config blobs as the registry serves them, the [`ImageInfo`]
//! record derived from the pair, and the [`ImageManager`] that composes
//! registry calls into per-tag and per-repository results.

pub mod config;
pub mod image_manager;
pub mod info;
pub mod manifest;

pub use config::{ConfigBlob, ContainerConfig, History};
pub use image_manager::{ImageManager, RepositorySummary};
pub use info::{HistoryEntry, ImageInfo, SortDirection, SortField, sort_image_infos};
pub use manifest::{Descriptor, Manifest, ManifestType};
