//! Registry module for Docker Registry HTTP API v2 interactions
//!
//! [`transport`] issues single requests (digest cache, bearer-token replay),
//! [`client`] maps registry endpoints onto them and [`auth`] parses challenges
//! and resolves credentials.

pub mod auth;
pub mod client;
pub mod transport;

pub use auth::{AuthChallenge, BearerCredential, CredentialResolver, StaticTokenResolver, TokenServiceResolver};
pub use client::{CatalogResponse, Pagination, RegistryClient, RegistryResponse, TagsResponse};
pub use transport::{CredentialsMode, Transport, TransportBuilder, TransportRequest, TransportResponse};
