//! Recursive removal of cache subtrees.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, warn};

use super::config::CacheConfig;

/// Deletes directory trees below the cache root.
#[derive(Debug, Clone)]
pub struct CacheTreeInvalidator {
    config: Arc<CacheConfig>,
}

impl CacheTreeInvalidator {
    pub fn new(config: Arc<CacheConfig>) -> Self {
        Self { config }
    }

    /// Remove every entry below the cache root, keeping the root itself.
    ///
    /// Runs regardless of `caching_enabled`. Every child is attempted even after a
    /// failure; the result is true only if all of them were removed.
    pub fn purge_entire_cache(&self) -> bool {
        let root = self.config.root();
        let started_at = Instant::now();
        debug!(
            target = "proxy_purge::cache",
            root = %root.display(),
            "whole cache purge requested"
        );

        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(
                    target = "proxy_purge::cache",
                    root = %root.display(),
                    error = %err,
                    "failed to list cache root"
                );
                counter!("proxy_purge_entire_total", "result" => "failed").increment(1);
                return false;
            }
        };

        let purged = remove_all(
            entries.map(|entry| entry.map(|entry| entry.path())),
            |child| self.remove_child(child),
            root,
        );

        let elapsed_ms = started_at.elapsed().as_millis() as u64;
        let result = if purged { "ok" } else { "failed" };
        histogram!("proxy_purge_entire_ms").record(elapsed_ms as f64);
        counter!("proxy_purge_entire_total", "result" => result).increment(1);
        debug!(
            target = "proxy_purge::cache",
            root = %root.display(),
            purged,
            elapsed_ms,
            "whole cache purge finished"
        );

        purged
    }

    /// Remove `path` and everything below it.
    ///
    /// Returns false with a warning when `path` is not a directory. Symlinks are
    /// unlinked, never followed. The walk keeps its own stack, so nesting depth is not
    /// limited by the call stack.
    pub fn remove_tree(&self, path: &Path) -> bool {
        match fs::symlink_metadata(path) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                warn!(
                    target = "proxy_purge::cache",
                    path = %path.display(),
                    "not a directory, refusing to remove tree"
                );
                return false;
            }
            Err(err) => {
                warn!(
                    target = "proxy_purge::cache",
                    path = %path.display(),
                    error = %err,
                    "no such file or directory"
                );
                return false;
            }
        }

        let mut removed = true;
        // (directory, children already queued)
        let mut stack: Vec<(PathBuf, bool)> = vec![(path.to_path_buf(), false)];

        while let Some((dir, expanded)) = stack.pop() {
            if expanded {
                removed &= remove_ignoring_missing(&dir, fs::remove_dir(&dir));
                continue;
            }

            stack.push((dir.clone(), true));

            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => {
                    warn!(
                        target = "proxy_purge::cache",
                        path = %dir.display(),
                        error = %err,
                        "failed to list cache directory"
                    );
                    removed = false;
                    continue;
                }
            };

            for entry in entries {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        warn!(
                            target = "proxy_purge::cache",
                            path = %dir.display(),
                            error = %err,
                            "failed to read cache directory entry"
                        );
                        removed = false;
                        continue;
                    }
                };

                let child = entry.path();
                // `DirEntry::file_type` does not follow symlinks.
                match entry.file_type() {
                    Ok(file_type) if file_type.is_dir() => stack.push((child, false)),
                    Ok(_) => removed &= remove_ignoring_missing(&child, fs::remove_file(&child)),
                    Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                    Err(err) => {
                        warn!(
                            target = "proxy_purge::cache",
                            path = %child.display(),
                            error = %err,
                            "failed to read cache entry file type"
                        );
                        removed = false;
                    }
                }
            }
        }

        removed
    }

    /// Top-level children: directories are walked, anything else is a single unlink.
    fn remove_child(&self, path: &Path) -> bool {
        match fs::symlink_metadata(path) {
            Ok(meta) if meta.is_dir() => self.remove_tree(path),
            Ok(_) => remove_ignoring_missing(path, fs::remove_file(path)),
            // Vanished since the listing; let `remove_tree` report it.
            Err(_) => self.remove_tree(path),
        }
    }
}

/// Run `remove` on every child, failures included; true only if all of them succeeded.
fn remove_all<I, F>(children: I, mut remove: F, root: &Path) -> bool
where
    I: IntoIterator<Item = io::Result<PathBuf>>,
    F: FnMut(&Path) -> bool,
{
    children.into_iter().fold(true, |purged, child| {
        let removed = match child {
            Ok(child) => remove(&child),
            Err(err) => {
                warn!(
                    target = "proxy_purge::cache",
                    root = %root.display(),
                    error = %err,
                    "failed to read cache root entry"
                );
                false
            }
        };
        purged & removed
    })
}

/// A concurrent eviction may delete the entry first; that still counts as removed.
pub(crate) fn remove_ignoring_missing(path: &Path, result: io::Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(err) if err.kind() == io::ErrorKind::NotFound => true,
        Err(err) => {
            warn!(
                target = "proxy_purge::cache",
                path = %path.display(),
                error = %err,
                "failed to remove cache path"
            );
            false
        }
    }
}
