//! Command runner: executes one CLI command against the image manager

use crate::cli::args::{Args, Command};
use crate::config::ViewerConfig;
use crate::digest::DigestUtils;
use crate::error::{RegistryError, Result};
use crate::image::{ImageInfo, ImageManager, RepositorySummary, sort_image_infos};
use crate::logging::Logger;
use crate::registry::transport::TransportRequest;
use reqwest::header::HeaderMap;
use serde::Serialize;

pub struct Runner {
    args: Args,
    config: ViewerConfig,
    output: Logger,
}

impl Runner {
    pub fn new(args: Args, config: ViewerConfig) -> Self {
        let output = if args.quiet || args.json {
            Logger::new_quiet()
        } else {
            Logger::new(args.verbose)
        };

        Self { args, config, output }
    }

    pub fn logger(&self) -> &Logger {
        &self.output
    }

    pub async fn run(&self) -> Result<()> {
        let manager = self.config.build_image_manager(self.output.clone())?;
        self.output.section(&format!("Registry {}", self.config.registry_url));

        let result = self.execute(&manager).await;
        if result.is_ok() {
            self.output.verbose(&format!(
                "Completed in {}",
                self.output.format_duration(self.output.elapsed())
            ));
        }
        result
    }

    async fn execute(&self, manager: &ImageManager) -> Result<()> {
        match self.args.command.clone() {
            Command::Ping => self.ping(manager).await,
            Command::Catalog { limit, last, filter } => {
                let limit = limit.unwrap_or(self.config.catalog_elements_limit);
                self.catalog(manager, limit, &last, &filter).await
            }
            Command::Tags { repository, sort, asc } => {
                let mut infos = manager.list_image_tags(&repository).await?;
                if let Some(key) = sort {
                    sort_image_infos(&mut infos, key.into(), Args::sort_direction(asc));
                }
                self.print_tags(&repository, &infos)
            }
            Command::Inspect { repository, tag } => {
                let info = manager.get_image_info(&repository, &tag).await?;
                self.print_image(&info)
            }
            Command::Delete { repository, tag } => {
                manager.delete_image_tag(&repository, &tag).await?;
                self.output.success(&format!("Deleted {}:{}", repository, tag));
                Ok(())
            }
            Command::Digest { repository, reference } => {
                let digest = manager
                    .client()
                    .get_manifest_digest(&repository, &reference)
                    .await?
                    .ok_or_else(|| {
                        RegistryError::registry(
                            "Registry did not expose Docker-Content-Digest (check Access-Control-Expose-Headers)",
                            None,
                        )
                    })?;
                self.emit(&digest, || println!("{}", digest))
            }
            Command::BlobSize { repository, digest } => {
                let size = manager.client().get_blob_size(&repository, &digest).await?;
                self.emit(&size, || match size {
                    Some(bytes) => println!("{} ({})", bytes, self.output.format_size(bytes)),
                    None => println!("unknown"),
                })
            }
        }
    }

    async fn ping(&self, manager: &ImageManager) -> Result<()> {
        if manager.client().check_version().await {
            self.output.success("Registry API v2 is available");
            self.emit(&true, || println!("ok"))
        } else {
            let version_url = format!("{}/v2/", manager.client().base_url());
            let hint = manager
                .client()
                .transport()
                .diagnose(&TransportRequest::get(version_url), &HeaderMap::new());
            self.output.info(&hint.to_string());
            Err(RegistryError::registry(
                format!("Registry API v2 not available at {}", self.config.registry_url),
                None,
            ))
        }
    }

    async fn catalog(&self, manager: &ImageManager, limit: u32, last: &str, filter: &str) -> Result<()> {
        let page = manager.list_repositories(limit, last).await?;
        let repositories = ImageManager::filter_repositories(&page, filter);
        if !filter.is_empty() {
            self.output.info(&format!(
                "{} of {} repositories match '{}'",
                repositories.len(),
                page.len(),
                filter
            ));
        }

        self.emit(&repositories, || {
            let lines: Vec<String> = repositories.iter().map(format_repository).collect();
            self.output.list("Repositories", &lines);
            if self.output.quiet {
                lines.iter().for_each(|line| println!("{}", line));
            }
        })
    }

    fn print_tags(&self, repository: &str, infos: &[ImageInfo]) -> Result<()> {
        self.emit(&infos, || {
            let lines: Vec<String> = infos
                .iter()
                .map(|info| {
                    format!(
                        "{:<24} {:<20} {:>10} {}",
                        info.tag,
                        DigestUtils::short(&info.digest),
                        self.output.format_size(info.size),
                        info.created.as_deref().unwrap_or("-")
                    )
                })
                .collect();
            self.output.list(&format!("Tags of {}", repository), &lines);
            if self.output.quiet {
                lines.iter().for_each(|line| println!("{}", line));
            }
        })
    }

    fn print_image(&self, info: &ImageInfo) -> Result<()> {
        self.emit(info, || {
            let items = image_summary(&self.output, info);
            self.output
                .summary_kv(&format!("{}:{}", info.image_name, info.tag), &items);
            let history = history_lines(&self.output, info);
            if !history.is_empty() {
                self.output.list("History", &history);
            }

            if self.output.quiet {
                quiet_image_lines(&items, &history)
                    .iter()
                    .for_each(|line| println!("{}", line));
            }
        })
    }

    /// JSON when `--json` was given, otherwise the text renderer
    fn emit<T: Serialize + ?Sized>(&self, value: &T, text: impl FnOnce()) -> Result<()> {
        if self.args.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            text();
        }
        Ok(())
    }
}

fn format_repository(summary: &RepositorySummary) -> String {
    format!("{} ({} tags)", summary.repo, summary.tags.len())
}

fn image_summary(output: &Logger, info: &ImageInfo) -> Vec<(&'static str, String)> {
    let mut items = vec![
        ("Digest", info.digest.clone()),
        ("Size", output.format_size(info.size)),
        ("Layers", info.layers.to_string()),
        ("Created", info.created.clone().unwrap_or_else(|| "-".to_string())),
        (
            "Platform",
            format!(
                "{}/{}",
                info.os.as_deref().unwrap_or("?"),
                info.architecture.as_deref().unwrap_or("?")
            ),
        ),
    ];
    if let Some(cmd) = &info.cmd {
        items.push(("Cmd", cmd.join(" ")));
    }
    if let Some(dir) = &info.working_dir {
        items.push(("WorkingDir", dir.clone()));
    }
    if let Some(ports) = &info.exposed_ports {
        items.push(("ExposedPorts", ports.join(", ")));
    }
    items
}

fn history_lines(output: &Logger, info: &ImageInfo) -> Vec<String> {
    info.history
        .iter()
        .flatten()
        .map(|step| {
            let size = step
                .size
                .map(|bytes| output.format_size(bytes))
                .unwrap_or_else(|| "-".to_string());
            format!("{:>10}  {}", size, step.created_by.as_deref().unwrap_or(""))
        })
        .collect()
}

/// Plain `key: value` lines followed by history, for `--quiet` runs
fn quiet_image_lines(items: &[(&str, String)], history: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|(key, value)| format!("{}: {}", key, value))
        .chain(history.iter().cloned())
        .collect()
}
