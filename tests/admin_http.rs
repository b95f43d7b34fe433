use std::fs;
use std::path::Path;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header::CONTENT_TYPE},
};
use http_body_util::BodyExt;
use proxy_purge::cache::{CacheConfig, CacheInvalidator, CacheOptions};
use proxy_purge::infra::http::{AdminState, build_admin_router};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

fn invalidator(root: &Path, enabled: bool) -> CacheInvalidator {
    let config = CacheConfig::initialize(CacheOptions {
        is_use_cache: Some(enabled),
        cache_root: Some(root.display().to_string()),
        ..Default::default()
    })
    .expect("valid cache options");
    CacheInvalidator::new(Arc::new(config))
}

fn router(invalidator: CacheInvalidator) -> Router {
    build_admin_router(AdminState::new(invalidator))
}

fn purge_request(url: &str) -> Request<Body> {
    let body = serde_json::json!({ "url": url }).to_string();
    Request::builder()
        .method(Method::POST)
        .uri("/purge")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .expect("request should build")
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn health_reports_ok() {
    let dir = TempDir::new().expect("temp dir");
    let app = router(invalidator(dir.path(), true));

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("request should build");
    let response = app.oneshot(request).await.expect("router should respond");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn purge_removes_entry_and_reports_path() {
    let dir = TempDir::new().expect("temp dir");
    let invalidator = invalidator(dir.path(), true);
    let location = invalidator
        .locate("http://example.com/a")
        .expect("resolvable url");
    fs::create_dir_all(location.path().parent().expect("parent")).expect("create levels");
    fs::write(location.path(), b"cached").expect("write entry");

    let response = router(invalidator)
        .oneshot(purge_request("http://example.com/a"))
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["outcome"], "removed");
    assert_eq!(body["purged"], true);
    assert_eq!(
        body["path"],
        location.path().display().to_string().as_str()
    );
    assert!(!location.path().exists());
}

#[tokio::test]
async fn purge_of_uncached_url_is_ok() {
    let dir = TempDir::new().expect("temp dir");
    let response = router(invalidator(dir.path(), true))
        .oneshot(purge_request("http://example.com/never"))
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["outcome"], "not_found");
    assert_eq!(body["purged"], true);
}

#[tokio::test]
async fn purge_with_cache_disabled_is_unavailable() {
    let dir = TempDir::new().expect("temp dir");
    let response = router(invalidator(dir.path(), false))
        .oneshot(purge_request("http://example.com/a"))
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = json_body(response).await;
    assert_eq!(body["outcome"], "disabled");
    assert_eq!(body["purged"], false);
    assert!(body.get("path").is_none());
}

#[tokio::test]
async fn purge_of_malformed_url_is_bad_request() {
    let dir = TempDir::new().expect("temp dir");
    let response = router(invalidator(dir.path(), true))
        .oneshot(purge_request("http://[broken"))
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["outcome"], "invalid");
}

#[tokio::test]
async fn purge_all_empties_the_root() {
    let dir = TempDir::new().expect("temp dir");
    fs::create_dir_all(dir.path().join("d/c3")).expect("create levels");
    fs::write(dir.path().join("d/c3/entry"), b"cached").expect("write entry");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/purge/all")
        .body(Body::empty())
        .expect("request should build");
    let response = router(invalidator(dir.path(), true))
        .oneshot(request)
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(fs::read_dir(dir.path()).expect("list root").count(), 0);
}

#[tokio::test]
async fn purge_all_of_missing_root_is_server_error() {
    let dir = TempDir::new().expect("temp dir");
    let request = Request::builder()
        .method(Method::POST)
        .uri("/purge/all")
        .body(Body::empty())
        .expect("request should build");
    let response = router(invalidator(&dir.path().join("missing"), true))
        .oneshot(request)
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn locate_returns_key_digest_and_path() {
    let dir = TempDir::new().expect("temp dir");
    let request = Request::builder()
        .uri("/locate?url=http%3A%2F%2Fexample.com%2Fa")
        .body(Body::empty())
        .expect("request should build");
    let response = router(invalidator(dir.path(), true))
        .oneshot(request)
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["key"], "GET|||example.com|/a");
    assert_eq!(body["digest"], "6c4c690592cf359e0297c2d006ef8c3d");
    assert_eq!(
        body["path"],
        dir.path()
            .join("d/c3/6c4c690592cf359e0297c2d006ef8c3d")
            .display()
            .to_string()
            .as_str()
    );
}

#[tokio::test]
async fn locate_of_malformed_url_is_bad_request() {
    let dir = TempDir::new().expect("temp dir");
    let request = Request::builder()
        .uri("/locate?url=http%3A%2F%2F%5Bbroken")
        .body(Body::empty())
        .expect("request should build");
    let response = router(invalidator(dir.path(), true))
        .oneshot(request)
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
