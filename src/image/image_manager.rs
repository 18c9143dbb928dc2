//! Image-level operations composed from registry calls
//!
//! [`ImageManager`] resolves tags into [`ImageInfo`] records and fans out over
//! many tags or repositories at once. Batch operations differ on purpose:
//! - `get_tags_info` is all-or-nothing
//! - `list_image_tags` replaces a failed tag with a placeholder
//! - `list_repositories` fails if any repository's tag listing fails

use crate::error::{RegistryError, Result};
use crate::image::config::ConfigBlob;
use crate::image::info::ImageInfo;
use crate::logging::Logger;
use crate::registry::client::{Pagination, RegistryClient};
use futures::future::{join_all, try_join_all};
use serde::Serialize;

/// A catalog entry with its tags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepositorySummary {
    pub repo: String,
    pub tags: Vec<String>,
}

#[derive(Clone)]
pub struct ImageManager {
    client: RegistryClient,
    output: Logger,
}

impl ImageManager {
    pub fn new(client: RegistryClient, output: Logger) -> Self {
        Self { client, output }
    }

    pub fn client(&self) -> &RegistryClient {
        &self.client
    }

    /// Manifest plus config blob for one tag.
    ///
    /// A failing config blob fetch is logged and leaves only the
    /// manifest-derived fields; a failing manifest fetch is an error.
    pub async fn get_image_info(&self, repository: &str, tag: &str) -> Result<ImageInfo> {
        let manifest_response = self.client.get_manifest(repository, tag).await?;
        let manifest = manifest_response.data;
        let digest = manifest_response.content_digest.unwrap_or_default();

        let config = match manifest.config_digest() {
            Some(config_digest) => self.fetch_config(repository, tag, config_digest).await,
            None => None,
        };

        self.output.detail(&format!(
            "Resolved {}:{} ({} layers)",
            repository,
            tag,
            manifest.layer_count()
        ));
        Ok(ImageInfo::from_manifest(repository, tag, digest, &manifest, config.as_ref()))
    }

    async fn fetch_config(&self, repository: &str, tag: &str, digest: &str) -> Option<ConfigBlob> {
        match self.client.get_config_blob(repository, digest).await {
            Ok(response) => Some(response.data),
            Err(e) => {
                self.output.warning(&format!(
                    "Failed to fetch config blob for {}:{}: {}",
                    repository, tag, e
                ));
                None
            }
        }
    }

    /// Info for every tag, concurrently. The first failure fails the batch.
    pub async fn get_tags_info(&self, repository: &str, tags: &[String]) -> Result<Vec<ImageInfo>> {
        try_join_all(tags.iter().map(|tag| self.get_image_info(repository, tag))).await
    }

    /// One catalog page, each repository listed with its tags.
    ///
    /// Tag listings run concurrently; a failure for any repository fails the
    /// whole page.
    pub async fn list_repositories(&self, size: u32, last: &str) -> Result<Vec<RepositorySummary>> {
        let catalog = self.client.list_repositories(&Pagination::new(size, last)).await?;
        let repositories = catalog.data.repositories.unwrap_or_default();

        self.output
            .verbose(&format!("Catalog page returned {} repositories", repositories.len()));

        try_join_all(repositories.into_iter().map(|repo| async move {
            let tags = self.client.list_tags(&repo, &Pagination::default()).await?;
            Ok::<_, RegistryError>(RepositorySummary {
                repo,
                tags: tags.data.tags.unwrap_or_default(),
            })
        }))
        .await
    }

    /// Every tag of a repository resolved to [`ImageInfo`].
    ///
    /// Tags that cannot be resolved become placeholders so one broken tag
    /// does not hide the others.
    pub async fn list_image_tags(&self, repository: &str) -> Result<Vec<ImageInfo>> {
        let tags_response = self.client.list_tags(repository, &Pagination::default()).await?;
        let tags = tags_response.data.tags.unwrap_or_default();

        self.output.verbose(&format!("Received tags: {}", tags.len()));

        let infos = join_all(tags.iter().map(|tag| async move {
            match self.get_image_info(repository, tag).await {
                Ok(info) => info,
                Err(e) => {
                    self.output
                        .warning(&format!("Failed to fetch info for tag {}: {}", tag, e));
                    ImageInfo::placeholder(repository, tag)
                }
            }
        }))
        .await;

        Ok(infos)
    }

    /// Delete a tag by deleting the manifest it points at
    pub async fn delete_image_tag(&self, repository: &str, tag: &str) -> Result<()> {
        self.client.delete_tag(repository, tag).await
    }

    /// Case-insensitive substring filter over repository names
    pub fn filter_repositories(repositories: &[RepositorySummary], query: &str) -> Vec<RepositorySummary> {
        if query.is_empty() {
            return repositories.to_vec();
        }
        let needle = query.to_lowercase();
        repositories
            .iter()
            .filter(|summary| summary.repo.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(repo: &str) -> RepositorySummary {
        RepositorySummary {
            repo: repo.to_string(),
            tags: vec!["latest".to_string()],
        }
    }

    #[test]
    fn test_filter_repositories() {
        let repos = vec![summary("library/Alpine"), summary("team/api"), summary("team/alpine-tools")];

        let filtered = ImageManager::filter_repositories(&repos, "ALPINE");
        let names: Vec<_> = filtered.iter().map(|s| s.repo.as_str()).collect();
        assert_eq!(names, ["library/Alpine", "team/alpine-tools"]);

        assert_eq!(ImageManager::filter_repositories(&repos, ""), repos);
        assert!(ImageManager::filter_repositories(&repos, "nginx").is_empty());
    }
}
