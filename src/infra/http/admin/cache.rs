use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tokio::task;

use crate::application::error::{ErrorReport, HttpError};
use crate::cache::{CacheEntryLocation, PurgeOutcome};

use super::super::join_error_to_http;
use super::AdminState;

#[derive(Debug, Deserialize)]
pub(super) struct PurgeRequest {
    url: String,
}

#[derive(Debug, Serialize)]
struct PurgeResponse {
    url: String,
    outcome: &'static str,
    purged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct LocateQuery {
    url: String,
}

#[derive(Debug, Serialize)]
pub(super) struct LocateResponse {
    key: String,
    digest: String,
    path: String,
}

impl From<CacheEntryLocation> for LocateResponse {
    fn from(location: CacheEntryLocation) -> Self {
        Self {
            key: location.key().as_str().to_string(),
            digest: location.digest().to_string(),
            path: location.path().display().to_string(),
        }
    }
}

pub(super) async fn purge_url(
    State(state): State<AdminState>,
    Json(request): Json<PurgeRequest>,
) -> Result<Response, HttpError> {
    let invalidator = state.invalidator.clone();
    let url = request.url.clone();
    let outcome = task::spawn_blocking(move || invalidator.purge(&url))
        .await
        .map_err(|err| join_error_to_http("infra::http::admin::purge_url", err))?;

    let status = purge_status(&outcome);
    let body = PurgeResponse {
        url: request.url.clone(),
        outcome: outcome.as_str(),
        purged: outcome.succeeded(),
        path: outcome
            .location()
            .map(|location| location.path().display().to_string()),
    };

    let mut response = (status, Json(body)).into_response();
    if let Some(report) = purge_report(status, &outcome) {
        report
            .with_url(request.url)
            .with_outcome(outcome.as_str())
            .attach(&mut response);
    }
    Ok(response)
}

pub(super) async fn purge_all(State(state): State<AdminState>) -> Result<Response, HttpError> {
    let invalidator = state.invalidator.clone();
    let purged = task::spawn_blocking(move || invalidator.purge_entire_cache())
        .await
        .map_err(|err| join_error_to_http("infra::http::admin::purge_all", err))?;

    if purged {
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Err(HttpError::new(
            "infra::http::admin::purge_all",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Cache purge incomplete",
            "one or more cache entries could not be removed",
        ))
    }
}

pub(super) async fn locate(
    State(state): State<AdminState>,
    Query(query): Query<LocateQuery>,
) -> Result<Json<LocateResponse>, HttpError> {
    let location = state.invalidator.locate(&query.url)?;
    Ok(Json(location.into()))
}

fn purge_status(outcome: &PurgeOutcome) -> StatusCode {
    match outcome {
        PurgeOutcome::Removed(_) | PurgeOutcome::NotFound(_) => StatusCode::OK,
        PurgeOutcome::EntireCache { purged: true } => StatusCode::OK,
        PurgeOutcome::EntireCache { purged: false } | PurgeOutcome::Failed(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        PurgeOutcome::Unresolved(_) => StatusCode::BAD_REQUEST,
        PurgeOutcome::Disabled => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn purge_report(status: StatusCode, outcome: &PurgeOutcome) -> Option<ErrorReport> {
    const SOURCE: &str = "infra::http::admin::purge_url";
    match outcome {
        PurgeOutcome::Unresolved(err) => Some(ErrorReport::from_error(SOURCE, status, err)),
        PurgeOutcome::Disabled => Some(ErrorReport::from_message(
            SOURCE,
            status,
            "proxy cache is disabled",
        )),
        PurgeOutcome::Failed(location) => Some(ErrorReport::from_message(
            SOURCE,
            status,
            format!("failed to remove {}", location.path().display()),
        )),
        PurgeOutcome::EntireCache { purged: false } => Some(ErrorReport::from_message(
            SOURCE,
            status,
            "one or more cache entries could not be removed",
        )),
        _ => None,
    }
}
