use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

use crate::domain::types::{ExportFormat, PostType};

/// Command-line arguments for the content-archive binary.
#[derive(Debug, Parser)]
#[command(
    name = "content-archive",
    version,
    about = "Filterable content archive with CSV and Markdown export"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "ARCHIVE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the archive HTTP service.
    Serve(Box<ServeArgs>),
    /// Write an export of published content to a file.
    Export(ExportArgs),
}

/// Where records come from when no database is configured.
#[derive(Debug, Args, Default, Clone)]
pub struct SourceOverrides {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Serve records from a JSON seed file instead of the database.
    #[arg(long = "seed-file", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub seed_file: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub source: SourceOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the lifetime of cached listings; 0 disables caching.
    #[arg(long = "cache-duration-seconds", value_name = "SECONDS")]
    pub cache_duration_seconds: Option<u64>,

    /// Override the number of cached listings kept in memory.
    #[arg(long = "cache-capacity", value_name = "COUNT")]
    pub cache_capacity: Option<usize>,

    /// Override the secret used to sign anti-forgery tokens.
    #[arg(long = "nonce-secret", env = "ARCHIVE_NONCE_SECRET", value_name = "SECRET")]
    pub nonce_secret: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct ExportArgs {
    #[command(flatten)]
    pub source: SourceOverrides,

    /// Output encoding.
    #[arg(long, value_name = "FORMAT", default_value = "csv", value_parser = parse_export_format)]
    pub format: ExportFormat,

    /// Earliest publish date to include (YYYY-MM-DD).
    #[arg(long = "date-from", value_name = "DATE")]
    pub date_from: Option<String>,

    /// Latest publish date to include (YYYY-MM-DD).
    #[arg(long = "date-to", value_name = "DATE")]
    pub date_to: Option<String>,

    /// Only include posts in this category id.
    #[arg(long, value_name = "ID")]
    pub category: Option<String>,

    /// Content type to export: post, page or any.
    #[arg(long = "post-type", value_name = "TYPE", default_value = "post", value_parser = parse_post_type)]
    pub post_type: PostType,

    /// Path to the export file to write.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,
}

fn parse_export_format(value: &str) -> Result<ExportFormat, String> {
    value.parse().map_err(|err: crate::domain::error::DomainError| err.to_string())
}

fn parse_post_type(value: &str) -> Result<PostType, String> {
    value.parse().map_err(|err: crate::domain::error::DomainError| err.to_string())
}
