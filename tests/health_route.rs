//! Router tests for the liveness route.
//!
//! These drive the full router (middleware included) with `oneshot`, so no
//! listener is bound.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use healthstack::config::REQUEST_ID_HEADER;
use healthstack::routes::create_router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt; // For oneshot()

async fn json_body(body: Body) -> Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_returns_ok_payload() {
    let response = create_router().oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );
    assert_eq!(json_body(response.into_body()).await, json!({"health": "OK"}));
}

#[tokio::test]
async fn test_health_is_deterministic() {
    let app = create_router();
    for _ in 0..5 {
        let response = app.clone().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], br#"{"health":"OK"}"#);
    }
}

#[tokio::test]
async fn test_health_is_never_cached() {
    let response = create_router().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
}

#[tokio::test]
async fn test_health_ignores_query_parameters() {
    let response = create_router()
        .oneshot(get("/health?verbose=true"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response.into_body()).await, json!({"health": "OK"}));
}

#[tokio::test]
async fn test_unknown_path_is_json_404() {
    let response = create_router().oneshot(get("/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(response.into_body()).await,
        json!({"error": "No route for /nope"})
    );
}

#[tokio::test]
async fn test_other_methods_are_not_allowed() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = create_router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let id = "8f14e45f-ceea-467f-a0b2-6b9d3f1c2a10";
    let request = Request::builder()
        .uri("/health")
        .header(REQUEST_ID_HEADER, id)
        .body(Body::empty())
        .unwrap();
    let response = create_router().oneshot(request).await.unwrap();
    assert_eq!(response.headers()[REQUEST_ID_HEADER], id);
}

#[tokio::test]
async fn test_request_id_is_generated_when_missing_or_invalid() {
    let request = Request::builder()
        .uri("/health")
        .header(REQUEST_ID_HEADER, "not-a-uuid")
        .body(Body::empty())
        .unwrap();
    let response = create_router().oneshot(request).await.unwrap();
    let echoed = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
    assert_ne!(echoed, "not-a-uuid");
    assert!(uuid_like(echoed));
}

fn uuid_like(value: &str) -> bool {
    value.len() == 36 && value.chars().filter(|&c| c == '-').count() == 4
}
