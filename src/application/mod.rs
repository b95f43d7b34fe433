//! Application-level error types shared by the binary and the HTTP surface.

pub mod error;
