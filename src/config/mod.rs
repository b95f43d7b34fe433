//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{net::SocketAddr, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::CacheOptions;

pub use cli::{
    CacheOverrides, CliArgs, Command, LocateArgs, LoggingOverrides, PurgeAllArgs, PurgeArgs,
    ServeArgs,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "proxy-purge";
const ENV_PREFIX: &str = "PROXY_PURGE";
const DEFAULT_ADMIN_HOST: &str = "127.0.0.1";
const DEFAULT_ADMIN_PORT: u16 = 3080;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 10;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub admin: AdminSettings,
    /// Option mapping handed to [`crate::cache::CacheConfig::initialize`].
    pub cache: CacheOptions,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct AdminSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(args),
        Some(Command::Purge(args)) => {
            raw.apply_cache_overrides(&args.cache);
            raw.apply_logging_overrides(&args.logging);
        }
        Some(Command::PurgeAll(args)) => {
            raw.apply_cache_overrides(&args.cache);
            raw.apply_logging_overrides(&args.logging);
        }
        Some(Command::Locate(args)) => {
            raw.apply_cache_overrides(&args.cache);
            raw.apply_logging_overrides(&args.logging);
        }
        None => raw.apply_serve_overrides(&ServeArgs::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    admin: RawAdminSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, args: &ServeArgs) {
        self.apply_cache_overrides(&args.cache);
        self.apply_logging_overrides(&args.logging);

        if let Some(host) = args.admin_host.as_ref() {
            self.admin.host = Some(host.clone());
        }
        if let Some(port) = args.admin_port {
            self.admin.port = Some(port);
        }
        if let Some(seconds) = args.admin_graceful_shutdown_seconds {
            self.admin.graceful_shutdown_seconds = Some(seconds);
        }
    }

    fn apply_cache_overrides(&mut self, overrides: &CacheOverrides) {
        if let Some(root) = overrides.cache_root.as_ref() {
            self.cache.root = Some(root.clone());
        }
        if let Some(levels) = overrides.cache_levels.as_ref() {
            self.cache.levels = Some(levels.clone());
        }
        if let Some(format) = overrides.cache_key_format.as_ref() {
            self.cache.key_format = Some(format.clone());
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(log_cleaning) = overrides.cache_log_cleaning {
            self.cache.log_cleaning = Some(log_cleaning);
        }
    }

    fn apply_logging_overrides(&mut self, overrides: &LoggingOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            admin,
            cache,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            admin: build_admin_settings(admin)?,
            cache: build_cache_options(cache),
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_admin_settings(admin: RawAdminSettings) -> Result<AdminSettings, LoadError> {
    let host = admin
        .host
        .unwrap_or_else(|| DEFAULT_ADMIN_HOST.to_string());

    let port = admin.port.unwrap_or(DEFAULT_ADMIN_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "admin.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("admin.addr", reason))?;

    let graceful_secs = admin
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "admin.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(AdminSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

/// Blank values are dropped; the required-root check belongs to `CacheConfig::initialize`.
fn build_cache_options(cache: RawCacheSettings) -> CacheOptions {
    let root = cache.root.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    CacheOptions {
        is_logging: cache.log_cleaning,
        is_use_cache: cache.enabled,
        cache_root: root,
        cache_levels: cache.levels,
        cache_key_format: cache.key_format,
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAdminSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    root: Option<String>,
    levels: Option<String>,
    key_format: Option<String>,
    enabled: Option<bool>,
    log_cleaning: Option<bool>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}
