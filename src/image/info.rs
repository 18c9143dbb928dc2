//! Denormalized image information built from a manifest and its config blob

use crate::image::config::{ConfigBlob, History};
use crate::image::manifest::{Descriptor, Manifest};
use chrono::DateTime;
use serde::Serialize;
use std::collections::BTreeMap;

/// Build step with the layer it produced, if any
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_layer: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Digest of the associated layer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInfo {
    pub image_name: String,
    pub tag: String,
    pub digest: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    pub layers: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmd: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposed_ports: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<HistoryEntry>>,
}

impl ImageInfo {
    /// Minimal record for a tag whose details could not be fetched
    pub fn placeholder(image_name: &str, tag: &str) -> Self {
        Self {
            image_name: image_name.to_string(),
            tag: tag.to_string(),
            ..Default::default()
        }
    }

    /// Combine a manifest with its (optional) config blob.
    pub fn from_manifest(
        image_name: &str,
        tag: &str,
        digest: String,
        manifest: &Manifest,
        config: Option<&ConfigBlob>,
    ) -> Self {
        let mut info = Self {
            image_name: image_name.to_string(),
            tag: tag.to_string(),
            digest,
            size: manifest.total_size(),
            layers: manifest.layer_count(),
            ..Default::default()
        };

        let Some(blob) = config else {
            return info;
        };

        info.created = blob.created.clone();
        info.architecture = blob.architecture.clone();
        info.os = blob.os.clone();
        info.id = blob.id.clone();

        if let Some(container) = &blob.config {
            info.cmd = container.cmd.clone();
            info.env = container.env.clone();
            info.working_dir = container.working_dir.clone();
            info.labels = container.labels.clone();
            info.exposed_ports = container
                .exposed_ports
                .as_ref()
                .map(|ports| ports.keys().cloned().collect());
        }

        if let (Some(history), Some(layers)) = (&blob.history, &manifest.layers) {
            info.history = Some(reconcile_history(history, layers));
        }

        info
    }
}

/// Pair build steps with manifest layers.
///
/// Layers are consumed strictly in order by every step not marked
/// `empty_layer`. Once layers run out the remaining steps keep no size/id.
pub fn reconcile_history(history: &[History], layers: &[Descriptor]) -> Vec<HistoryEntry> {
    let mut remaining = layers.iter();

    history
        .iter()
        .map(|step| {
            let mut entry = HistoryEntry {
                created: step.created.clone(),
                created_by: step.created_by.clone(),
                comment: step.comment.clone(),
                empty_layer: step.empty_layer,
                size: None,
                id: None,
            };
            if !step.is_empty_layer() {
                if let Some(layer) = remaining.next() {
                    entry.size = Some(layer.size);
                    entry.id = Some(layer.digest.clone());
                }
            }
            entry
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Tag,
    Size,
    Created,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Sort a tag listing in place. Unparseable creation times sort as epoch 0.
pub fn sort_image_infos(infos: &mut [ImageInfo], field: SortField, direction: SortDirection) {
    infos.sort_by(|a, b| {
        let ordering = match field {
            SortField::Tag => a.tag.cmp(&b.tag),
            SortField::Size => a.size.cmp(&b.size),
            SortField::Created => created_millis(a).cmp(&created_millis(b)),
        };
        match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}

fn created_millis(info: &ImageInfo) -> i64 {
    info.created
        .as_deref()
        .and_then(|created| DateTime::parse_from_rfc3339(created).ok())
        .map_or(0, |created| created.timestamp_millis())
}
