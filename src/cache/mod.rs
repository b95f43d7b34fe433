//! Proxy cache invalidation.
//!
//! Entries live at `root/<levels>/<md5(key)>`, where the key is a template such as
//! `GET|||HOST|PATH` filled in from the request URL and the level directories are slices
//! taken from the end of the digest:
//!
//! ```text
//! levels = 1:2, key = GET|||example.com|/a
//! md5    = 6c4c690592cf359e0297c2d006ef8c3d
//! path   = /cache/d/c3/6c4c690592cf359e0297c2d006ef8c3d
//! ```
//!
//! - [`CacheKeyResolver`] computes the path for a URL.
//! - [`CacheInvalidator`] deletes one entry, or everything when asked for `/`.
//! - [`CacheTreeInvalidator`] walks and removes directory trees.

mod config;
mod error;
mod invalidator;
mod keys;
mod tree;

pub use config::{CacheConfig, CacheOptions, DEFAULT_CACHE_KEY_FORMAT, DEFAULT_CACHE_LEVELS};
pub use error::CacheError;
pub use invalidator::{CacheInvalidator, PurgeOutcome, ROOT_URL};
pub use keys::{CacheEntryLocation, CacheKeyResolver, DIGEST_HEX_LEN, LevelLayout, ResolvedCacheKey};
pub use tree::CacheTreeInvalidator;
