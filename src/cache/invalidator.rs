//! Single-entry and whole-cache invalidation.

use std::fs;
use std::io;
use std::sync::Arc;

use metrics::counter;
use tracing::warn;

use super::config::CacheConfig;
use super::error::CacheError;
use super::keys::{CacheEntryLocation, CacheKeyResolver};
use super::tree::{CacheTreeInvalidator, remove_ignoring_missing};

/// Purging this URL clears the whole cache instead of one entry.
pub const ROOT_URL: &str = "/";

/// Per-entry events go out at `info` when purge logging is on, `debug` otherwise.
macro_rules! purge_event {
    ($verbose:expr, $($field:tt)+) => {
        if $verbose {
            tracing::info!($($field)+)
        } else {
            tracing::debug!($($field)+)
        }
    };
}

/// What a purge request ended up doing.
#[derive(Debug)]
pub enum PurgeOutcome {
    /// Caching is not in use; the filesystem was not touched.
    Disabled,
    /// The entry existed and was deleted.
    Removed(CacheEntryLocation),
    /// There was nothing to delete.
    NotFound(CacheEntryLocation),
    /// The entry exists but could not be deleted.
    Failed(CacheEntryLocation),
    /// The URL or level layout could not be turned into a path.
    Unresolved(CacheError),
    /// The root URL was purged, which clears the whole cache.
    EntireCache { purged: bool },
}

impl PurgeOutcome {
    pub fn succeeded(&self) -> bool {
        match self {
            Self::Removed(_) | Self::NotFound(_) => true,
            Self::EntireCache { purged } => *purged,
            Self::Disabled | Self::Failed(_) | Self::Unresolved(_) => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Removed(_) => "removed",
            Self::NotFound(_) => "not_found",
            Self::Failed(_) => "failed",
            Self::Unresolved(_) => "invalid",
            Self::EntireCache { .. } => "entire_cache",
        }
    }

    pub fn location(&self) -> Option<&CacheEntryLocation> {
        match self {
            Self::Removed(location) | Self::NotFound(location) | Self::Failed(location) => {
                Some(location)
            }
            _ => None,
        }
    }
}

/// Removes cache entries by URL.
#[derive(Debug, Clone)]
pub struct CacheInvalidator {
    config: Arc<CacheConfig>,
    tree: CacheTreeInvalidator,
}

impl CacheInvalidator {
    pub fn new(config: Arc<CacheConfig>) -> Self {
        let tree = CacheTreeInvalidator::new(config.clone());
        Self { config, tree }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Where the entry for `url` lives; the filesystem is not consulted.
    pub fn locate(&self, url: &str) -> Result<CacheEntryLocation, CacheError> {
        CacheKeyResolver::new(&self.config).resolve(url)
    }

    /// Purge the entry cached for `url`, reporting only success or failure.
    pub fn purge_by_url(&self, url: &str) -> bool {
        self.purge(url).succeeded()
    }

    /// Clear everything under the cache root.
    pub fn purge_entire_cache(&self) -> bool {
        self.tree.purge_entire_cache()
    }

    /// Purge the entry cached for `url`.
    ///
    /// A missing entry counts as purged. The root URL clears the whole cache.
    pub fn purge(&self, url: &str) -> PurgeOutcome {
        if !self.config.caching_enabled() {
            counter!("proxy_purge_entry_total", "outcome" => "disabled").increment(1);
            return PurgeOutcome::Disabled;
        }

        if url == ROOT_URL {
            return PurgeOutcome::EntireCache {
                purged: self.tree.purge_entire_cache(),
            };
        }

        let location = match self.locate(url) {
            Ok(location) => location,
            Err(err) => {
                warn!(
                    target = "proxy_purge::cache",
                    url,
                    error = %err,
                    "failed to resolve cache entry"
                );
                counter!("proxy_purge_entry_total", "outcome" => "invalid").increment(1);
                return PurgeOutcome::Unresolved(err);
            }
        };

        let verbose = self.config.logging_enabled();
        let path = location.path();
        let outcome = match fs::symlink_metadata(path) {
            Ok(_) => {
                purge_event!(
                    verbose,
                    target = "proxy_purge::cache",
                    path = %path.display(),
                    "cached data present"
                );
                if remove_ignoring_missing(path, fs::remove_file(path)) {
                    PurgeOutcome::Removed(location)
                } else {
                    PurgeOutcome::Failed(location)
                }
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                purge_event!(
                    verbose,
                    target = "proxy_purge::cache",
                    path = %path.display(),
                    "cached data not found"
                );
                PurgeOutcome::NotFound(location)
            }
            Err(err) => {
                warn!(
                    target = "proxy_purge::cache",
                    path = %path.display(),
                    error = %err,
                    "failed to inspect cache entry"
                );
                PurgeOutcome::Failed(location)
            }
        };

        if let Some(location) = outcome.location() {
            purge_event!(
                verbose,
                target = "proxy_purge::cache",
                key = %location.key(),
                path = %location.path().display(),
                outcome = outcome.as_str(),
                purged = outcome.succeeded(),
                "cache purge finished"
            );
        }
        counter!("proxy_purge_entry_total", "outcome" => outcome.as_str()).increment(1);

        outcome
    }
}
