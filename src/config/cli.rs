use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the proxy-purge binary.
#[derive(Debug, Parser)]
#[command(
    name = "proxy-purge",
    version,
    about = "Invalidate entries in an nginx-style proxy cache"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PROXY_PURGE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the admin HTTP listener.
    Serve(Box<ServeArgs>),
    /// Purge the cached entries for the given URLs; `/` clears the whole cache.
    Purge(PurgeArgs),
    /// Remove everything below the cache root.
    #[command(name = "purge-all")]
    PurgeAll(PurgeAllArgs),
    /// Print the cache key and entry path for the given URLs without touching the cache.
    Locate(LocateArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct CacheOverrides {
    /// Override the cache root directory.
    #[arg(long = "cache-root", value_name = "PATH")]
    pub cache_root: Option<String>,

    /// Override the cache levels, e.g. `1:2`.
    #[arg(long = "cache-levels", value_name = "LEVELS")]
    pub cache_levels: Option<String>,

    /// Override the cache key template (tokens `HOST` and `PATH`).
    #[arg(long = "cache-key-format", value_name = "TEMPLATE")]
    pub cache_key_format: Option<String>,

    /// Toggle whether the proxy cache is in use.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Toggle info-level logging of individual purges.
    #[arg(
        long = "cache-log-cleaning",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_log_cleaning: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct LoggingOverrides {
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
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub cache: CacheOverrides,

    #[command(flatten)]
    pub logging: LoggingOverrides,

    /// Override the admin listener host.
    #[arg(long = "admin-host", value_name = "HOST")]
    pub admin_host: Option<String>,

    /// Override the admin listener port.
    #[arg(long = "admin-port", value_name = "PORT")]
    pub admin_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "admin-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub admin_graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct PurgeArgs {
    #[command(flatten)]
    pub cache: CacheOverrides,

    #[command(flatten)]
    pub logging: LoggingOverrides,

    /// URLs whose cached entries should be removed.
    #[arg(value_name = "URL", required = true)]
    pub urls: Vec<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct PurgeAllArgs {
    #[command(flatten)]
    pub cache: CacheOverrides,

    #[command(flatten)]
    pub logging: LoggingOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct LocateArgs {
    #[command(flatten)]
    pub cache: CacheOverrides,

    #[command(flatten)]
    pub logging: LoggingOverrides,

    /// URLs to resolve.
    #[arg(value_name = "URL", required = true)]
    pub urls: Vec<String>,
}
