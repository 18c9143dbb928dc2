//! Image manifest documents
//!
//! Docker v2 schema 2 and OCI image manifests reference a config blob and an
//! ordered list of layer blobs by digest. Manifest lists / OCI indexes
//! reference per-platform manifests instead.

use serde::{Deserialize, Serialize};

pub const OCI_IMAGE_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
pub const DOCKER_MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";
pub const DOCKER_MANIFEST_LIST: &str = "application/vnd.docker.distribution.manifest.list.v2+json";
pub const OCI_IMAGE_INDEX: &str = "application/vnd.oci.image.index.v1+json";

/// Accept header for manifest fetches, most specific first
pub fn manifest_accept_header() -> String {
    [OCI_IMAGE_MANIFEST, DOCKER_MANIFEST_V2, DOCKER_MANIFEST_LIST, OCI_IMAGE_INDEX].join(", ")
}

/// Accept header for digest lookups, single-image manifests only
pub fn image_manifest_accept_header() -> String {
    [OCI_IMAGE_MANIFEST, DOCKER_MANIFEST_V2].join(", ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestType {
    OciManifest,
    DockerV2,
    DockerManifestList,
    OciIndex,
    Unknown,
}

impl ManifestType {
    pub fn from_media_type(media_type: &str) -> Self {
        match media_type {
            OCI_IMAGE_MANIFEST => ManifestType::OciManifest,
            DOCKER_MANIFEST_V2 => ManifestType::DockerV2,
            DOCKER_MANIFEST_LIST => ManifestType::DockerManifestList,
            OCI_IMAGE_INDEX => ManifestType::OciIndex,
            _ => ManifestType::Unknown,
        }
    }

    pub fn is_index(self) -> bool {
        matches!(self, ManifestType::DockerManifestList | ManifestType::OciIndex)
    }
}

/// Content descriptor: a blob addressed by digest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    #[serde(default)]
    pub media_type: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub digest: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub architecture: String,
    pub os: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

/// Entry of a manifest list / image index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformManifest {
    #[serde(default)]
    pub media_type: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub digest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Descriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layers: Option<Vec<Descriptor>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifests: Option<Vec<PlatformManifest>>,
}

impl Manifest {
    pub fn manifest_type(&self) -> ManifestType {
        self.media_type
            .as_deref()
            .map(ManifestType::from_media_type)
            .unwrap_or(ManifestType::Unknown)
    }

    /// Config blob digest, if the manifest names one
    pub fn config_digest(&self) -> Option<&str> {
        self.config
            .as_ref()
            .map(|config| config.digest.as_str())
            .filter(|digest| !digest.is_empty())
    }

    pub fn layer_count(&self) -> usize {
        self.layers.as_ref().map_or(0, Vec::len)
    }

    /// Config size plus every layer size, saturating at `u64::MAX`
    pub fn total_size(&self) -> u64 {
        let config_size = self.config.as_ref().map_or(0, |config| config.size);
        self.layers
            .iter()
            .flatten()
            .fold(config_size, |total, layer| total.saturating_add(layer.size))
    }
}
