//! Command-line argument parsing

use crate::config::ViewerConfig;
use crate::image::{SortDirection, SortField};
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "registry-viewer")]
#[command(about = "Browse Docker/OCI registries: catalog, tags, image details")]
#[command(version)]
pub struct Args {
    /// Registry base URL
    #[arg(
        long = "registry",
        short = 'r',
        global = true,
        help = "Registry base URL, e.g. https://registry.example.com (defaults to REGISTRY_URL)"
    )]
    pub registry: Option<String>,

    /// Registry username
    #[arg(
        long = "username",
        short = 'u',
        global = true,
        help = "Username for registry authentication"
    )]
    pub username: Option<String>,

    /// Registry password
    #[arg(
        long = "password",
        short = 'p',
        global = true,
        help = "Password for registry authentication"
    )]
    pub password: Option<String>,

    /// Pre-issued bearer token
    #[arg(long = "token", global = true, help = "Bearer token sent after a 401 challenge")]
    pub token: Option<String>,

    /// Skip TLS verification
    #[arg(
        long = "skip-tls",
        short = 'k',
        global = true,
        help = "Skip TLS certificate verification"
    )]
    pub skip_tls: bool,

    /// Verbose output
    #[arg(long = "verbose", short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Quiet output
    #[arg(long = "quiet", short = 'q', global = true, help = "Only print results and errors")]
    pub quiet: bool,

    /// Print results as JSON
    #[arg(long = "json", global = true, help = "Print results as JSON")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Check that the registry speaks the v2 API
    Ping,
    /// List repositories with their tags
    Catalog {
        /// Page size (defaults to CATALOG_ELEMENTS_LIMIT)
        #[arg(long = "limit", short = 'n')]
        limit: Option<u32>,
        /// Last repository of the previous page
        #[arg(long = "last", default_value = "")]
        last: String,
        /// Case-insensitive repository name filter
        #[arg(long = "filter", short = 'f', default_value = "")]
        filter: String,
    },
    /// List the tags of a repository with image details
    Tags {
        repository: String,
        #[arg(long = "sort", value_enum)]
        sort: Option<SortKey>,
        /// Sort ascending instead of descending
        #[arg(long = "asc")]
        asc: bool,
    },
    /// Show details of one image
    Inspect { repository: String, tag: String },
    /// Delete a tag (deletes the manifest it points at)
    Delete { repository: String, tag: String },
    /// Print the manifest digest of a tag or digest reference
    Digest { repository: String, reference: String },
    /// Print the size of a blob
    BlobSize { repository: String, digest: String },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Tag,
    Size,
    Created,
}

impl From<SortKey> for SortField {
    fn from(key: SortKey) -> Self {
        match key {
            SortKey::Tag => SortField::Tag,
            SortKey::Size => SortField::Size,
            SortKey::Created => SortField::Created,
        }
    }
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    pub fn sort_direction(asc: bool) -> SortDirection {
        if asc { SortDirection::Asc } else { SortDirection::Desc }
    }

    /// Environment configuration overridden by the flags given here
    pub fn to_config(&self, mut config: ViewerConfig) -> ViewerConfig {
        if let Some(registry) = &self.registry {
            config = config.with_registry_url(registry);
        }
        if self.username.is_some() {
            config.username = self.username.clone();
        }
        if self.password.is_some() {
            config.password = self.password.clone();
        }
        if self.token.is_some() {
            config.token = self.token.clone();
        }
        config.skip_tls |= self.skip_tls;
        config
    }
}
