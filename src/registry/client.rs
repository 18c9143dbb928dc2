//! Docker Registry HTTP API v2 client
//!
//! One method per registry endpoint. Every path is prefixed with the base
//! URL the client was built with, and every request goes through the shared
//! [`Transport`] (digest cache, bearer-token replay).

use crate::error::{RegistryError, Result};
use crate::image::config::ConfigBlob;
use crate::image::manifest::{Manifest, image_manifest_accept_header, manifest_accept_header};
use crate::logging::Logger;
use crate::registry::transport::{DOCKER_CONTENT_DIGEST, Transport, TransportRequest, TransportResponse};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Decoded registry response
#[derive(Debug, Clone)]
pub struct RegistryResponse<T> {
    pub data: T,
    pub headers: HeaderMap,
    pub status: StatusCode,
    /// Resolved content digest, filled in for manifest fetches
    pub content_digest: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CatalogResponse {
    #[serde(default)]
    pub repositories: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// `n` / `last` query parameters of the catalog and tag-list endpoints
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pagination {
    pub n: Option<u32>,
    pub last: Option<String>,
}

impl Pagination {
    pub fn new(n: u32, last: impl Into<String>) -> Self {
        Self {
            n: Some(n),
            last: Some(last.into()),
        }
    }

    /// `?n=..&last=..`, omitting zero / empty values; empty string if nothing is set
    pub fn query_string(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        if let Some(n) = self.n.filter(|n| *n > 0) {
            serializer.append_pair("n", &n.to_string());
        }
        if let Some(last) = self.last.as_deref().filter(|last| !last.is_empty()) {
            serializer.append_pair("last", last);
        }
        let query = serializer.finish();
        if query.is_empty() { query } else { format!("?{}", query) }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[derive(Clone)]
pub struct RegistryClient {
    base_url: String,
    transport: Arc<Transport>,
    output: Logger,
}

impl RegistryClient {
    pub fn new(base_url: impl Into<String>, transport: Arc<Transport>) -> Self {
        let output = transport.logger().clone();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            transport,
            output,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a response into data, or into a registry error using the
    /// `{errors: [{code, message}]}` envelope when the body has one.
    fn handle_response<T: DeserializeOwned>(&self, response: &TransportResponse) -> Result<RegistryResponse<T>> {
        if !response.ok() {
            return Err(Self::error_from_response(response));
        }

        let data = response.json()?;
        Ok(RegistryResponse {
            data,
            headers: response.headers.clone(),
            status: response.status,
            content_digest: None,
        })
    }

    fn error_from_response(response: &TransportResponse) -> RegistryError {
        let mut message = format!("HTTP {}: {}", response.status.as_u16(), response.status_text());
        let mut code = None;
        let mut details = None;

        // Non-JSON error bodies keep the generic message.
        if let Ok(envelope) = serde_json::from_slice::<ErrorEnvelope>(&response.body) {
            if let Some(first) = envelope.errors.first() {
                code = first.get("code").and_then(|c| c.as_str()).map(str::to_string);
                if let Some(text) = first
                    .get("message")
                    .and_then(|m| m.as_str())
                    .filter(|m| !m.is_empty())
                {
                    message = text.to_string();
                }
                details = Some(serde_json::Value::Array(envelope.errors));
            }
        }

        RegistryError::Registry {
            message,
            code,
            status: Some(response.status.as_u16()),
            details,
        }
    }

    /// `GET /v2/` - whether the endpoint speaks the registry API
    pub async fn check_version(&self) -> bool {
        let request = TransportRequest::get(self.build_url("/v2/"));
        match self.transport.send(&request).await {
            Ok(response) => response.ok(),
            Err(e) => {
                self.output.debug(&format!("Version check failed: {}", e));
                false
            }
        }
    }

    /// `GET /v2/_catalog`
    pub async fn list_repositories(&self, params: &Pagination) -> Result<RegistryResponse<CatalogResponse>> {
        let url = self.build_url(&format!("/v2/_catalog{}", params.query_string()));
        let response = self.transport.send(&TransportRequest::get(url)).await?;
        self.handle_response(&response)
    }

    /// `GET /v2/{repository}/tags/list`
    pub async fn list_tags(&self, repository: &str, params: &Pagination) -> Result<RegistryResponse<TagsResponse>> {
        let url = self.build_url(&format!("/v2/{}/tags/list{}", repository, params.query_string()));
        let response = self.transport.send(&TransportRequest::get(url)).await?;
        self.handle_response(&response)
    }

    /// `GET /v2/{repository}/manifests/{reference}`, accepting manifests and indexes
    pub async fn get_manifest(&self, repository: &str, reference: &str) -> Result<RegistryResponse<Manifest>> {
        let url = self.build_url(&format!("/v2/{}/manifests/{}", repository, reference));
        let request = TransportRequest::get(url).header(ACCEPT, accept_value(manifest_accept_header())?);
        let response = self.transport.send(&request).await?;

        let mut result: RegistryResponse<Manifest> = self.handle_response(&response)?;
        result.content_digest = self.transport.content_digest(&request, &response);
        Ok(result)
    }

    /// `HEAD /v2/{repository}/manifests/{reference}` - the manifest digest header
    pub async fn get_manifest_digest(&self, repository: &str, reference: &str) -> Result<Option<String>> {
        let url = self.build_url(&format!("/v2/{}/manifests/{}", repository, reference));
        let request = TransportRequest::head(url).header(ACCEPT, accept_value(image_manifest_accept_header())?);
        let response = self.transport.send(&request).await?;

        if !response.ok() {
            return Err(RegistryError::registry(
                format!("Failed to get manifest digest: {}", response.status_text()),
                Some(response.status.as_u16()),
            ));
        }

        Ok(response.header(DOCKER_CONTENT_DIGEST).map(str::to_string))
    }

    /// `DELETE /v2/{repository}/manifests/{digest}`
    pub async fn delete_manifest(&self, repository: &str, digest: &str) -> Result<()> {
        let url = self.build_url(&format!("/v2/{}/manifests/{}", repository, digest));
        let response = self.transport.send(&TransportRequest::delete(url)).await?;

        if !response.ok() {
            return Err(RegistryError::registry(
                format!("Failed to delete manifest: {}", response.status_text()),
                Some(response.status.as_u16()),
            ));
        }

        self.output.success(&format!("Deleted manifest {}@{}", repository, digest));
        Ok(())
    }

    /// Delete by tag: resolve the manifest digest first, then delete the manifest.
    pub async fn delete_tag(&self, repository: &str, tag: &str) -> Result<()> {
        let digest = self
            .get_manifest_digest(repository, tag)
            .await?
            .ok_or_else(|| RegistryError::registry("Failed to get manifest digest for deletion", None))?;

        self.output.verbose(&format!("Resolved {}:{} to {}", repository, tag, digest));
        self.delete_manifest(repository, &digest).await
    }

    /// `GET /v2/{repository}/blobs/{digest}` decoded as JSON
    pub async fn get_blob<T: DeserializeOwned>(&self, repository: &str, digest: &str) -> Result<RegistryResponse<T>> {
        let url = self.build_url(&format!("/v2/{}/blobs/{}", repository, digest));
        let response = self.transport.send(&TransportRequest::get(url)).await?;
        self.handle_response(&response)
    }

    /// Image configuration blob
    pub async fn get_config_blob(&self, repository: &str, digest: &str) -> Result<RegistryResponse<ConfigBlob>> {
        self.get_blob(repository, digest).await
    }

    /// `HEAD /v2/{repository}/blobs/{digest}`
    pub async fn check_blob_exists(&self, repository: &str, digest: &str) -> Result<bool> {
        let url = self.build_url(&format!("/v2/{}/blobs/{}", repository, digest));
        let response = self.transport.send(&TransportRequest::head(url)).await?;
        Ok(response.ok())
    }

    /// Blob size from `Content-Length`; `None` when absent or not found
    pub async fn get_blob_size(&self, repository: &str, digest: &str) -> Result<Option<u64>> {
        let url = self.build_url(&format!("/v2/{}/blobs/{}", repository, digest));
        let response = self.transport.send(&TransportRequest::head(url)).await?;

        if !response.ok() {
            return Ok(None);
        }
        Ok(response.content_length())
    }
}

fn accept_value(value: String) -> Result<HeaderValue> {
    HeaderValue::from_str(&value).map_err(|e| RegistryError::Configuration(format!("Invalid Accept header: {}", e)))
}
