//! Cache layout configuration.
//!
//! Mirrors the `proxy_cache_path` settings of the proxy whose cache is being purged:
//! the cache root, the `levels=` layout and the `proxy_cache_key` template.

use std::path::{MAIN_SEPARATOR, Path, PathBuf};

use serde::Deserialize;

use super::error::CacheError;
use super::keys::LevelLayout;

// Default values for cache configuration
pub const DEFAULT_CACHE_LEVELS: &str = "1:2";
pub const DEFAULT_CACHE_KEY_FORMAT: &str = "GET|||HOST|PATH";

/// Option mapping accepted by [`CacheConfig::initialize`].
///
/// Field names follow the option keys used by existing deployments, so the same
/// mapping can be deserialized straight from JSON or TOML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    /// Emit per-entry purge events at `info` instead of `debug`.
    #[serde(rename = "isLogging")]
    pub is_logging: Option<bool>,
    /// Whether the proxy cache is in use at all.
    #[serde(rename = "isUseCache")]
    pub is_use_cache: Option<bool>,
    /// Cache root directory. Required.
    pub cache_root: Option<String>,
    /// Colon-delimited level lengths, e.g. `1:2`.
    pub cache_levels: Option<String>,
    /// Key template containing the `HOST` and `PATH` tokens.
    pub cache_key_format: Option<String>,
}

/// Immutable description of the on-disk cache layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    root: PathBuf,
    levels: Vec<String>,
    key_template: String,
    caching_enabled: bool,
    logging_enabled: bool,
}

impl CacheConfig {
    /// Build a configuration from an option mapping.
    ///
    /// Fails only when `cache_root` is missing or blank. Level lengths are kept as given
    /// and checked when a path is resolved (or eagerly via [`CacheConfig::validate`]).
    pub fn initialize(options: CacheOptions) -> Result<Self, CacheError> {
        let CacheOptions {
            is_logging,
            is_use_cache,
            cache_root,
            cache_levels,
            cache_key_format,
        } = options;

        let root = cache_root
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(strip_trailing_separators)
            .ok_or_else(|| CacheError::configuration("required option `cache_root` not defined"))?;

        let levels = cache_levels
            .as_deref()
            .unwrap_or(DEFAULT_CACHE_LEVELS)
            .split(':')
            .map(str::to_string)
            .collect();

        Ok(Self {
            root,
            levels,
            key_template: cache_key_format.unwrap_or_else(|| DEFAULT_CACHE_KEY_FORMAT.to_string()),
            caching_enabled: is_use_cache.unwrap_or(false),
            logging_enabled: is_logging.unwrap_or(false),
        })
    }

    /// Cache root with trailing separators removed.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Raw level segments as split from the configured string.
    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    pub fn key_template(&self) -> &str {
        &self.key_template
    }

    /// Returns false when the proxy cache is not in use; URL purges are then no-ops.
    pub fn caching_enabled(&self) -> bool {
        self.caching_enabled
    }

    pub fn logging_enabled(&self) -> bool {
        self.logging_enabled
    }

    /// Check the level layout up front instead of on the first purge.
    pub fn validate(&self) -> Result<(), CacheError> {
        LevelLayout::parse(&self.levels).map(|_| ())
    }
}

fn strip_trailing_separators(raw: &str) -> PathBuf {
    let trimmed = raw.trim_end_matches(['/', MAIN_SEPARATOR]);
    if trimmed.is_empty() {
        // The filesystem root itself.
        PathBuf::from(MAIN_SEPARATOR.to_string())
    } else {
        PathBuf::from(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(root: &str) -> CacheOptions {
        CacheOptions {
            cache_root: Some(root.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn default_values() {
        let config = CacheConfig::initialize(options("/var/cache/nginx")).expect("valid config");
        assert_eq!(config.root(), Path::new("/var/cache/nginx"));
        assert_eq!(config.levels(), ["1", "2"]);
        assert_eq!(config.key_template(), "GET|||HOST|PATH");
        assert!(!config.caching_enabled());
        assert!(!config.logging_enabled());
    }

    #[test]
    fn missing_root_is_a_configuration_error() {
        let err = CacheConfig::initialize(CacheOptions::default()).unwrap_err();
        assert!(matches!(err, CacheError::Configuration(_)));
        assert!(err.to_string().contains("cache_root"));
    }

    #[test]
    fn blank_root_is_a_configuration_error() {
        let err = CacheConfig::initialize(options("   ")).unwrap_err();
        assert!(matches!(err, CacheError::Configuration(_)));
    }

    #[test]
    fn trailing_separators_are_stripped() {
        let config = CacheConfig::initialize(options("/var/cache/nginx///")).expect("valid config");
        assert_eq!(config.root(), Path::new("/var/cache/nginx"));
    }

    #[cfg(unix)]
    #[test]
    fn filesystem_root_survives_stripping() {
        let config = CacheConfig::initialize(options("/")).expect("valid config");
        assert_eq!(config.root(), Path::new("/"));
    }

    #[test]
    fn levels_are_split_without_validation() {
        let config = CacheConfig::initialize(CacheOptions {
            cache_levels: Some("2:x".to_string()),
            ..options("/cache")
        })
        .expect("initialize defers level checks");
        assert_eq!(config.levels(), ["2", "x"]);
        assert!(matches!(
            config.validate(),
            Err(CacheError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn options_deserialize_from_legacy_keys() {
        let options: CacheOptions = serde_json::from_str(
            r#"{"isLogging": true, "isUseCache": true, "cache_root": "/cache", "cache_levels": "2"}"#,
        )
        .expect("valid options");
        let config = CacheConfig::initialize(options).expect("valid config");
        assert!(config.logging_enabled());
        assert!(config.caching_enabled());
        assert_eq!(config.levels(), ["2"]);
        assert!(config.validate().is_ok());
    }
}
