//! HTTP transport for Docker Registry API v2 / OCI Distribution requests
//!
//! Every registry call goes through [`Transport::send`], which:
//! - answers GETs addressed by content digest from the [`DigestCache`]
//! - replays a request once with a bearer token after a 401 challenge
//! - stores successful digest-addressed responses back into the cache
//!
//! Responses are fully buffered, so status, headers and body can be
//! inspected any number of times.

use crate::cache::{CacheEntry, DigestCache};
use crate::digest::DigestUtils;
use crate::error::{RegistryError, RequestDiagnostic, Result};
use crate::logging::Logger;
use crate::registry::auth::{AuthChallenge, CredentialResolver};
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, HeaderMap, HeaderName, HeaderValue, WWW_AUTHENTICATE};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use url::Url;

pub const DOCKER_CONTENT_DIGEST: &str = "docker-content-digest";

/// Whether ambient credentials accompany a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialsMode {
    Include,
    #[default]
    Omit,
}

impl CredentialsMode {
    pub fn is_include(self) -> bool {
        self == CredentialsMode::Include
    }
}

/// A single registry request
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub credentials: CredentialsMode,
}

impl TransportRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            credentials: CredentialsMode::Omit,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn head(url: impl Into<String>) -> Self {
        Self::new(Method::HEAD, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn credentials(mut self, mode: CredentialsMode) -> Self {
        self.credentials = mode;
        self
    }
}

/// Buffered registry response
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    /// Synthesized from the digest cache, no request was made
    pub from_cache: bool,
}

impl TransportResponse {
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    pub fn status_text(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("")
    }

    /// Header value as text; empty values count as absent
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
    }

    pub fn content_length(&self) -> Option<u64> {
        self.header(CONTENT_LENGTH.as_str())
            .and_then(|value| value.trim().parse().ok())
    }

    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.clone())
            .map_err(|e| RegistryError::Parse(format!("UTF-8 conversion error: {}", e)))
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Options that apply to every request
#[derive(Debug, Clone, Default)]
pub struct TransportOptions {
    /// Origin the client runs on behalf of, used for diagnostics only
    pub page_origin: Option<Url>,
    /// Basic credentials attached when [`CredentialsMode::Include`] is used
    pub ambient_credentials: Option<(String, Option<String>)>,
    pub skip_tls: bool,
}

pub struct TransportBuilder {
    cache: Option<DigestCache>,
    resolver: Option<Arc<dyn CredentialResolver>>,
    options: TransportOptions,
    output: Logger,
}

impl Default for TransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportBuilder {
    pub fn new() -> Self {
        Self {
            cache: None,
            resolver: None,
            options: TransportOptions::default(),
            output: Logger::default(),
        }
    }

    pub fn with_cache(mut self, cache: DigestCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_credential_resolver(mut self, resolver: Arc<dyn CredentialResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_page_origin(mut self, origin: Option<Url>) -> Self {
        self.options.page_origin = origin;
        self
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.options.ambient_credentials = Some((username.into(), password));
        self
    }

    pub fn with_skip_tls(mut self, skip_tls: bool) -> Self {
        self.options.skip_tls = skip_tls;
        self
    }

    pub fn with_logger(mut self, output: Logger) -> Self {
        self.output = output;
        self
    }

    pub fn build(self) -> Result<Transport> {
        let client = if self.options.skip_tls {
            Client::builder()
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
                .build()?
        } else {
            Client::new()
        };

        Ok(Transport {
            client,
            cache: self.cache.unwrap_or_default(),
            resolver: self.resolver,
            options: self.options,
            output: self.output,
        })
    }
}

pub struct Transport {
    client: Client,
    cache: DigestCache,
    resolver: Option<Arc<dyn CredentialResolver>>,
    options: TransportOptions,
    output: Logger,
}

impl Transport {
    pub fn builder() -> TransportBuilder {
        TransportBuilder::new()
    }

    pub fn cache(&self) -> &DigestCache {
        &self.cache
    }

    pub fn logger(&self) -> &Logger {
        &self.output
    }

    /// Issue one request: cache lookup, network, single auth replay, cache fill.
    pub async fn send(&self, request: &TransportRequest) -> Result<TransportResponse> {
        if let Some(cached) = self.cached_response(request) {
            self.output.detail(&format!("Cache hit: {} {}", request.method, request.url));
            return Ok(cached);
        }

        let mut response = self
            .execute(&request.method, &request.url, &request.headers, request.credentials)
            .await?;

        if response.status == StatusCode::UNAUTHORIZED {
            if let Some(resolver) = &self.resolver {
                let challenge = response.header(WWW_AUTHENTICATE.as_str()).and_then(AuthChallenge::parse);
                if !request.credentials.is_include() || challenge.is_some() {
                    response = self.replay_with_credential(request, resolver.as_ref(), challenge).await?;
                }
            }
        }

        if response.status == StatusCode::OK {
            self.store(request, &response);
        }

        Ok(response)
    }

    /// Content digest of a response: registry header, then cached header,
    /// then SHA256 over the body. `None` when none of these is available.
    pub fn content_digest(&self, request: &TransportRequest, response: &TransportResponse) -> Option<String> {
        if let Some(digest) = response.header(DOCKER_CONTENT_DIGEST) {
            return Some(digest.to_string());
        }

        if let Some(digest) = self
            .cache
            .get(&request.method, &request.url)
            .and_then(|entry| entry.content_digest)
        {
            return Some(digest);
        }

        // HEAD responses carry no body to hash
        if request.method == Method::HEAD {
            return None;
        }
        Some(DigestUtils::compute_docker_digest(&response.body))
    }

    /// Advisory explanation for a request that failed or was rejected
    pub fn diagnose(&self, request: &TransportRequest, headers: &HeaderMap) -> RequestDiagnostic {
        RequestDiagnostic::classify(
            &request.url,
            request.credentials.is_include(),
            headers,
            self.options.page_origin.as_ref(),
        )
    }

    fn cached_response(&self, request: &TransportRequest) -> Option<TransportResponse> {
        let entry = self.cache.get(&request.method, &request.url)?;
        let body = entry.body.filter(|body| !body.is_empty())?;

        let mut headers = HeaderMap::new();
        if let Some(value) = entry
            .content_digest
            .as_deref()
            .and_then(|digest| HeaderValue::from_str(digest).ok())
        {
            headers.insert(DOCKER_CONTENT_DIGEST, value);
        }

        Some(TransportResponse {
            status: StatusCode::OK,
            headers,
            body: body.into_bytes(),
            from_cache: true,
        })
    }

    async fn replay_with_credential(
        &self,
        request: &TransportRequest,
        resolver: &dyn CredentialResolver,
        challenge: Option<AuthChallenge>,
    ) -> Result<TransportResponse> {
        self.output.verbose(&format!(
            "Received 401 for {}, resolving credential{}",
            request.url,
            challenge
                .as_ref()
                .map(|c| format!(" (realm={}, scope={})", c.realm, c.scope))
                .unwrap_or_default()
        ));

        let credential = match resolver.resolve(challenge.as_ref()).await {
            Ok(credential) => credential,
            Err(e) => {
                self.output.warning(&format!("Credential resolution failed: {}", e));
                None
            }
        };

        let mut headers = request.headers.clone();
        if let Some(value) = credential.as_ref().and_then(|c| c.authorization()) {
            let value = HeaderValue::from_str(&value)
                .map_err(|e| RegistryError::Auth(format!("Invalid bearer token: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        // Without a credential the replay falls back to ambient credentials.
        let mode = if credential.is_some() {
            CredentialsMode::Omit
        } else {
            CredentialsMode::Include
        };

        let response = self.execute(&request.method, &request.url, &headers, mode).await?;
        self.output.detail(&format!("Authenticated replay status: {}", response.status));
        Ok(response)
    }

    async fn execute(
        &self,
        method: &Method,
        url: &str,
        headers: &HeaderMap,
        mode: CredentialsMode,
    ) -> Result<TransportResponse> {
        self.output.trace(&format!("{} {}", method, url));

        let mut builder = self.client.request(method.clone(), url).headers(headers.clone());
        if mode.is_include() {
            if let Some((username, password)) = &self.options.ambient_credentials {
                builder = builder.basic_auth(username, password.as_deref());
            }
        }

        let response = builder.send().await.map_err(|e| self.network_error(url, mode, e))?;
        let status = response.status();
        let response_headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.network_error(url, mode, e))?
            .to_vec();

        Ok(TransportResponse {
            status,
            headers: response_headers,
            body,
            from_cache: false,
        })
    }

    fn network_error(&self, url: &str, mode: CredentialsMode, err: reqwest::Error) -> RegistryError {
        let diagnostic = RequestDiagnostic::classify(
            url,
            mode.is_include(),
            &HeaderMap::new(),
            self.options.page_origin.as_ref(),
        );
        self.output.debug(&format!("Request to {} failed: {}", url, err));
        RegistryError::Network {
            message: err.to_string(),
            diagnostic: diagnostic.to_string(),
        }
    }

    fn store(&self, request: &TransportRequest, response: &TransportResponse) {
        if response.from_cache {
            return;
        }
        // The session store holds text; binary blobs are simply not cached.
        let Ok(body) = String::from_utf8(response.body.clone()) else {
            return;
        };
        let entry = CacheEntry {
            body: Some(body),
            content_digest: response.header(DOCKER_CONTENT_DIGEST).map(str::to_string),
        };
        self.cache.put(&request.method, &request.url, &entry);
    }
}
