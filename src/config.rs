//! Configuration for connecting to a registry
//!
//! Settings come from the environment (`REGISTRY_URL`, `REGISTRY_USERNAME`,
//! `REGISTRY_PASSWORD`, `REGISTRY_TOKEN`, `CATALOG_ELEMENTS_LIMIT`,
//! `SKIP_TLS`, `PAGE_ORIGIN`) and can be overridden from the command line.

use crate::cache::DigestCache;
use crate::error::{RegistryError, Result};
use crate::image::ImageManager;
use crate::logging::Logger;
use crate::registry::auth::{CredentialResolver, StaticTokenResolver, TokenServiceResolver};
use crate::registry::client::RegistryClient;
use crate::registry::transport::Transport;
use reqwest::Client;
use std::env;
use std::sync::Arc;
use url::Url;

pub const DEFAULT_CATALOG_ELEMENTS_LIMIT: u32 = 100;

#[derive(Debug, Clone, Default)]
pub struct ViewerConfig {
    pub registry_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    pub catalog_elements_limit: u32,
    pub skip_tls: bool,
    pub page_origin: Option<String>,
}

impl ViewerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; missing or invalid values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Self {
            registry_url: non_empty("REGISTRY_URL")
                .map(|url| normalize_registry_url(&url))
                .unwrap_or_default(),
            username: non_empty("REGISTRY_USERNAME"),
            password: non_empty("REGISTRY_PASSWORD"),
            token: non_empty("REGISTRY_TOKEN"),
            catalog_elements_limit: non_empty("CATALOG_ELEMENTS_LIMIT")
                .and_then(|value| value.trim().parse::<u32>().ok())
                .filter(|limit| *limit > 0)
                .unwrap_or(DEFAULT_CATALOG_ELEMENTS_LIMIT),
            skip_tls: lookup("SKIP_TLS").is_some_and(|value| value == "true"),
            page_origin: non_empty("PAGE_ORIGIN"),
        }
    }

    pub fn with_registry_url(mut self, url: &str) -> Self {
        self.registry_url = normalize_registry_url(url);
        self
    }

    pub fn has_auth(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    pub fn validate(&self) -> Result<()> {
        if self.registry_url.is_empty() {
            return Err(RegistryError::Configuration(
                "Registry URL not set (use --registry or REGISTRY_URL)".to_string(),
            ));
        }
        let parsed = Url::parse(&self.registry_url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RegistryError::Configuration(format!(
                "Registry URL must use http or https: {}",
                self.registry_url
            )));
        }
        if let Some(origin) = &self.page_origin {
            Url::parse(origin)?;
        }
        Ok(())
    }

    /// Wire cache, credential resolver, transport, protocol client and
    /// image manager for this configuration.
    pub fn build_image_manager(&self, output: Logger) -> Result<ImageManager> {
        self.validate()?;

        let page_origin = self.page_origin.as_deref().map(Url::parse).transpose()?;

        let mut builder = Transport::builder()
            .with_cache(DigestCache::default())
            .with_credential_resolver(self.credential_resolver(&output)?)
            .with_page_origin(page_origin)
            .with_skip_tls(self.skip_tls)
            .with_logger(output.clone());
        if let Some(username) = &self.username {
            builder = builder.with_basic_auth(username.clone(), self.password.clone());
        }

        let client = RegistryClient::new(self.registry_url.clone(), Arc::new(builder.build()?));
        Ok(ImageManager::new(client, output))
    }

    fn credential_resolver(&self, output: &Logger) -> Result<Arc<dyn CredentialResolver>> {
        if let Some(token) = &self.token {
            return Ok(Arc::new(StaticTokenResolver::new(token.clone())));
        }

        let http = if self.skip_tls {
            Client::builder().danger_accept_invalid_certs(true).build()?
        } else {
            Client::new()
        };
        let mut resolver = TokenServiceResolver::new(http, output.clone());
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            resolver = resolver.with_basic_auth(username.clone(), password.clone());
        }
        Ok(Arc::new(resolver))
    }
}

/// Trim whitespace and trailing slashes: `https://reg.example.com/` -> `https://reg.example.com`
pub fn normalize_registry_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
