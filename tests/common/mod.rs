//! Shared fixtures for integration tests against a mock registry.

#![allow(dead_code)]

use async_trait::async_trait;
use registry_viewer::registry::auth::{AuthChallenge, BearerCredential, CredentialResolver};
use registry_viewer::{ImageManager, Logger, RegistryClient, Result, Transport};
use std::sync::{Arc, Mutex};
use wiremock::MockServer;

pub const CONFIG_DIGEST: &str = "sha256:aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
pub const LAYER_ONE: &str = "sha256:bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
pub const LAYER_TWO: &str = "sha256:cccccccccccccccccccccccccccccccccccccccccccccccccccccccccccccccc";
pub const MANIFEST_DIGEST: &str = "sha256:dddddddddddddddddddddddddddddddddddddddddddddddddddddddddddddddd";

/// Resolver that records every challenge it is asked about
pub struct RecordingResolver {
    token: Option<String>,
    pub calls: Mutex<Vec<Option<AuthChallenge>>>,
}

impl RecordingResolver {
    pub fn with_token(token: &str) -> Arc<Self> {
        Arc::new(Self {
            token: Some(token.to_string()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn without_token() -> Arc<Self> {
        Arc::new(Self {
            token: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl CredentialResolver for RecordingResolver {
    async fn resolve(&self, challenge: Option<&AuthChallenge>) -> Result<Option<BearerCredential>> {
        self.calls.lock().unwrap().push(challenge.cloned());
        Ok(self.token.clone().map(BearerCredential::from_token))
    }
}

pub fn transport_with(resolver: Option<Arc<RecordingResolver>>) -> Arc<Transport> {
    let mut builder = Transport::builder().with_logger(Logger::new_quiet());
    if let Some(resolver) = resolver {
        builder = builder.with_credential_resolver(resolver);
    }
    Arc::new(builder.build().expect("failed to build transport"))
}

pub fn client_for(server: &MockServer) -> RegistryClient {
    RegistryClient::new(server.uri(), transport_with(None))
}

pub fn manager_for(server: &MockServer) -> ImageManager {
    ImageManager::new(client_for(server), Logger::new_quiet())
}

pub fn manifest_json() -> serde_json::Value {
    serde_json::json!({
        "schemaVersion": 2,
        "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
        "config": {
            "mediaType": "application/vnd.docker.container.image.v1+json",
            "size": 50,
            "digest": CONFIG_DIGEST
        },
        "layers": [
            { "mediaType": "application/vnd.docker.image.rootfs.diff.tar.gzip", "size": 300, "digest": LAYER_ONE },
            { "mediaType": "application/vnd.docker.image.rootfs.diff.tar.gzip", "size": 500, "digest": LAYER_TWO }
        ]
    })
}

pub fn config_json() -> serde_json::Value {
    serde_json::json!({
        "architecture": "amd64",
        "os": "linux",
        "created": "2024-03-01T10:00:00Z",
        "config": {
            "Cmd": ["/app", "--serve"],
            "WorkingDir": "/srv",
            "ExposedPorts": { "8080/tcp": {} }
        },
        "rootfs": { "type": "layers", "diff_ids": [] },
        "history": [
            { "created": "2024-03-01T09:00:00Z", "created_by": "ADD rootfs.tar /" },
            { "created": "2024-03-01T09:30:00Z", "created_by": "ENV MODE=prod", "empty_layer": true },
            { "created": "2024-03-01T10:00:00Z", "created_by": "COPY app /app" }
        ]
    })
}
