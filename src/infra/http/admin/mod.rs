mod cache;
mod health;
mod state;

pub use state::AdminState;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use super::middleware::log_responses;

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/health", get(health::admin_health))
        .route("/purge", post(cache::purge_url))
        .route("/purge/all", post(cache::purge_all))
        .route("/locate", get(cache::locate))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
}
