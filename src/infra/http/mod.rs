//! HTTP surface for triggering purges out of band.

mod admin;
mod middleware;

pub use admin::{AdminState, build_admin_router};

use axum::http::StatusCode;
use tokio::task::JoinError;

use crate::application::error::HttpError;

/// Map a failed blocking task to a 500 so the response logger records the panic or cancellation.
pub fn join_error_to_http(source: &'static str, err: JoinError) -> HttpError {
    HttpError::from_error(
        source,
        StatusCode::INTERNAL_SERVER_ERROR,
        "Purge task failed",
        &err,
    )
}
