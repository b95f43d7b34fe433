//! Invalidation of nginx-style on-disk proxy caches.
//!
//! The [`cache`] module holds the core: key resolution, single-entry purge and whole-cache
//! purge. [`config`], [`infra`] and [`application`] wire it into the `proxy-purge` binary and
//! its admin HTTP listener.

pub mod application;
pub mod cache;
pub mod config;
pub mod infra;
