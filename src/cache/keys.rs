//! Cache key resolution.
//!
//! Maps a URL to the file the proxy wrote for it: the key template is filled in,
//! hashed with MD5, and the hex digest is sliced from its tail into directory names
//! according to the configured levels.

use std::fmt;
use std::path::{Path, PathBuf};

use md5::{Digest, Md5};
use percent_encoding::percent_decode_str;
use url::Url;

use super::config::CacheConfig;
use super::error::CacheError;

/// Hex length of a 128-bit digest.
pub const DIGEST_HEX_LEN: usize = 32;

const HOST_TOKEN: &str = "HOST";
const PATH_TOKEN: &str = "PATH";
const RELATIVE_BASE: &str = "http://localhost/";

/// Validated level lengths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelLayout(Vec<usize>);

impl LevelLayout {
    /// Parse raw level segments, rejecting anything that cannot be sliced from a digest.
    pub fn parse(levels: &[String]) -> Result<Self, CacheError> {
        if levels.is_empty() {
            return Err(CacheError::invalid_levels(
                levels,
                "at least one level is required",
            ));
        }

        let mut consumed = 0usize;
        let mut lengths = Vec::with_capacity(levels.len());
        for raw in levels {
            let length: usize = raw.trim().parse().map_err(|_| {
                CacheError::invalid_levels(levels, format!("`{raw}` is not a positive integer"))
            })?;
            if length == 0 {
                return Err(CacheError::invalid_levels(
                    levels,
                    "level length must be greater than zero",
                ));
            }
            consumed += length;
            if consumed > DIGEST_HEX_LEN {
                return Err(CacheError::invalid_levels(
                    levels,
                    format!("levels consume {consumed} characters of a {DIGEST_HEX_LEN}-character digest"),
                ));
            }
            lengths.push(length);
        }

        Ok(Self(lengths))
    }

    pub fn lengths(&self) -> &[usize] {
        &self.0
    }

    /// Directory names for `digest`, first level first, each taken just before the previous.
    fn segments<'a>(&self, digest: &'a str) -> Vec<&'a str> {
        let mut end = digest.len();
        self.0
            .iter()
            .map(|&length| {
                let start = end - length;
                let segment = &digest[start..end];
                end = start;
                segment
            })
            .collect()
    }
}

/// Key template with `HOST` and `PATH` filled in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedCacheKey(String);

impl ResolvedCacheKey {
    /// Substitute both tokens in one left-to-right pass; substituted text is never rescanned.
    pub fn render(template: &str, host: &str, path: &str) -> Self {
        let mut rendered = String::with_capacity(template.len() + host.len() + path.len());
        let mut rest = template;
        loop {
            let next = [(HOST_TOKEN, host), (PATH_TOKEN, path)]
                .into_iter()
                .filter_map(|(token, value)| rest.find(token).map(|at| (at, token, value)))
                .min_by_key(|(at, _, _)| *at);

            match next {
                Some((at, token, value)) => {
                    rendered.push_str(&rest[..at]);
                    rendered.push_str(value);
                    rest = &rest[at + token.len()..];
                }
                None => {
                    rendered.push_str(rest);
                    break;
                }
            }
        }
        Self(rendered)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercase hex MD5 of the key.
    pub fn digest(&self) -> String {
        let mut hasher = Md5::new();
        hasher.update(self.0.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for ResolvedCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the proxy stores the entry for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntryLocation {
    key: ResolvedCacheKey,
    digest: String,
    path: PathBuf,
}

impl CacheEntryLocation {
    pub fn key(&self) -> &ResolvedCacheKey {
        &self.key
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Resolves URLs to cache entry locations under one configuration.
#[derive(Debug, Clone, Copy)]
pub struct CacheKeyResolver<'a> {
    config: &'a CacheConfig,
}

impl<'a> CacheKeyResolver<'a> {
    pub fn new(config: &'a CacheConfig) -> Self {
        Self { config }
    }

    /// Compute the entry location for `url`. Nothing is cached between calls.
    pub fn resolve(&self, url: &str) -> Result<CacheEntryLocation, CacheError> {
        let layout = LevelLayout::parse(self.config.levels())?;
        let (host, path) = url_components(url)?;

        let key = ResolvedCacheKey::render(self.config.key_template(), &host, &path);
        let digest = key.digest();

        let mut location = self.config.root().to_path_buf();
        for segment in layout.segments(&digest) {
            location.push(segment);
        }
        location.push(&digest);

        Ok(CacheEntryLocation {
            key,
            digest,
            path: location,
        })
    }
}

/// Host and path of `raw`, each empty when the input does not carry it.
///
/// The path is percent-decoded: the proxy keys entries on the decoded request URI, while
/// `url` hands back an escaped path.
fn url_components(raw: &str) -> Result<(String, String), CacheError> {
    let invalid = |source: url::ParseError| CacheError::InvalidUrl {
        url: raw.to_string(),
        source,
    };

    let (host, path) = match Url::parse(raw) {
        Ok(url) => {
            let host = url.host_str().unwrap_or_default().to_string();
            let path = if has_explicit_path(raw) { url.path() } else { "" };
            (host, decode_path(path))
        }
        Err(url::ParseError::RelativeUrlWithoutBase) if raw.starts_with("//") => {
            let joined = Url::parse(RELATIVE_BASE)
                .and_then(|base| base.join(raw))
                .map_err(invalid)?;
            let host = joined.host_str().unwrap_or_default().to_string();
            let path = if has_explicit_path(raw) { joined.path() } else { "" };
            (host, decode_path(path))
        }
        // No authority: the path is whatever precedes the query or fragment, as written.
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let end = raw.find(['?', '#']).unwrap_or(raw.len());
            (String::new(), decode_path(&raw[..end]))
        }
        Err(err) => return Err(invalid(err)),
    };
    Ok((host, path))
}

fn decode_path(path: &str) -> String {
    percent_decode_str(path).decode_utf8_lossy().into_owned()
}

/// `url` normalizes an empty path to `/`; the proxy key for `http://host` has none.
fn has_explicit_path(raw: &str) -> bool {
    match authority_tail(raw) {
        Some(tail) => tail
            .find(['/', '?', '#'])
            .is_some_and(|at| tail[at..].starts_with('/')),
        None => true,
    }
}

fn authority_tail(raw: &str) -> Option<&str> {
    if let Some(tail) = raw.strip_prefix("//") {
        return Some(tail);
    }
    let (scheme, tail) = raw.split_once("://")?;
    let is_scheme = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    is_scheme.then_some(tail)
}
