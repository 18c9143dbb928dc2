//! Digest cache for immutable registry responses
//!
//! Responses addressed by a content digest (`blobs/sha256:...`,
//! `manifests/sha256:...`) can never change, so they are kept for the whole
//! session without expiry or invalidation. The backing key/value store is
//! injected through [`SessionStore`]; caching is best-effort and storage
//! failures are swallowed.

use crate::digest::DigestUtils;
use reqwest::Method;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("storage quota exceeded ({used} of {limit} bytes)")]
    QuotaExceeded { used: usize, limit: usize },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Session-scoped key/value storage
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// In-process store living as long as the client session
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: RwLock<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that refuses writes once `quota` bytes of values are held
    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            quota: Some(quota),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| StoreError::Unavailable("session store lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StoreError::Unavailable("session store lock poisoned".to_string()))?;

        if let Some(limit) = self.quota {
            let used: usize = entries
                .iter()
                .filter(|(existing, _)| existing.as_str() != key)
                .map(|(_, stored)| stored.len())
                .sum();
            if used + value.len() > limit {
                return Err(StoreError::QuotaExceeded { used, limit });
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// A cached response: body text and the registry-asserted digest header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheEntry {
    pub body: Option<String>,
    pub content_digest: Option<String>,
}

#[derive(Clone)]
pub struct DigestCache {
    store: Arc<dyn SessionStore>,
}

impl Default for DigestCache {
    fn default() -> Self {
        Self::new(Arc::new(MemorySessionStore::new()))
    }
}

impl std::fmt::Debug for DigestCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestCache").finish_non_exhaustive()
    }
}

impl DigestCache {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Look up the cached response for a request; `None` for anything not
    /// addressed by digest or not stored yet.
    pub fn get(&self, method: &Method, url: &str) -> Option<CacheEntry> {
        let key = DigestUtils::digest_key(method, url)?;
        let body = self.store.get(&body_key(&key)).ok().flatten();
        let content_digest = self.store.get(&digest_header_key(&key)).ok().flatten();

        if body.is_none() && content_digest.is_none() {
            return None;
        }
        Some(CacheEntry {
            body,
            content_digest,
        })
    }

    /// Remember a successful response. No-op for non-cacheable requests.
    pub fn put(&self, method: &Method, url: &str, entry: &CacheEntry) {
        let Some(key) = DigestUtils::digest_key(method, url) else {
            return;
        };
        // Same digest means same content, so overwriting is harmless.
        if let Some(body) = &entry.body {
            if self.store.set(&body_key(&key), body).is_err() {
                return;
            }
        }
        if let Some(digest) = &entry.content_digest {
            let _ = self.store.set(&digest_header_key(&key), digest);
        }
    }
}

fn body_key(key: &str) -> String {
    format!("{}/body", key)
}

fn digest_header_key(key: &str) -> String {
    format!("{}/contentDigest", key)
}
