// Copyright (c) 2025 ImageCraft
// SPDX-License-Identifier: BUSL-1.1
//! End-to-end tests through the router with a stub provider.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

use imagecraft_server::api::{build_router, AppState};
use imagecraft_server::handoff::HandoffStore;
use imagecraft_server::provider::{
    DeleteOutcome, MediaProvider, ProviderError, Transformation, UploadOptions, UploadedAsset,
};

/// Provider that answers every call without a network. URLs containing
/// "missing" fail their fetch with a 404.
struct StubProvider {
    deletes: AtomicUsize,
}

impl StubProvider {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            deletes: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl MediaProvider for StubProvider {
    async fn upload(
        &self,
        bytes: Bytes,
        options: &UploadOptions,
    ) -> Result<UploadedAsset, ProviderError> {
        Ok(UploadedAsset {
            public_id: format!("{}/stub", options.folder),
            url: format!("https://cdn.test/{}/stub", options.folder),
            bytes: bytes.len() as u64,
            width: 100,
            height: 100,
            format: "jpg".to_string(),
            tags: vec![],
        })
    }

    fn transform_url(&self, public_id: &str, t: &Transformation) -> String {
        format!("https://cdn.test/{}/{}", t.to_url_segment(), public_id)
    }

    async fn delete(&self, _public_id: &str) -> Result<DeleteOutcome, ProviderError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(DeleteOutcome::Deleted)
    }

    async fn fetch(&self, url: &str) -> Result<Bytes, ProviderError> {
        if url.contains("missing") {
            Err(ProviderError::Status {
                status: 404,
                message: "not found".to_string(),
            })
        } else {
            Ok(Bytes::from_static(b"image-bytes"))
        }
    }
}

fn test_app(provider: Arc<StubProvider>) -> Router {
    let state = AppState::new(
        Some(provider as Arc<dyn MediaProvider>),
        HandoffStore::new(),
        false,
        None,
    );
    build_router(state)
}

const BOUNDARY: &str = "XBOUNDARYX";

fn multipart_request(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn file_part(name: &str, filename: &str, content_type: &str, data: &str) -> String {
    format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n{data}\r\n"
    )
}

fn text_part(name: &str, value: &str) -> String {
    format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
}

fn close_body(parts: String) -> String {
    format!("{parts}--{BOUNDARY}--\r\n")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_reports_provider_status() {
    let app = test_app(StubProvider::new());

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["providerConfigured"], true);
}

#[tokio::test]
async fn test_compress_rejects_missing_file() {
    let app = test_app(StubProvider::new());
    let body = close_body(text_part("targetSize", "500"));

    let response = app
        .oneshot(multipart_request("/v1/compress", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "No file provided");
}

#[tokio::test]
async fn test_compress_rejects_multiple_files() {
    let app = test_app(StubProvider::new());
    let body = close_body(format!(
        "{}{}",
        file_part("file", "a.png", "image/png", "AAAA"),
        file_part("file2", "b.png", "image/png", "BBBB"),
    ));

    let response = app
        .oneshot(multipart_request("/v1/compress", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("Multiple files are not supported"));
}

#[tokio::test]
async fn test_compress_rejects_disallowed_type() {
    let app = test_app(StubProvider::new());
    let body = close_body(format!(
        "{}{}",
        file_part("file", "doc.pdf", "application/pdf", "%PDF-"),
        text_part("targetSize", "500"),
    ));

    let response = app
        .oneshot(multipart_request("/v1/compress", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("Invalid file type"));
}

#[tokio::test]
async fn test_compress_rejects_target_not_smaller_than_original() {
    let app = test_app(StubProvider::new());
    // 4-byte upload, 500 KB target
    let body = close_body(format!(
        "{}{}",
        file_part("file", "a.png", "image/png", "AAAA"),
        text_part("targetSize", "500"),
    ));

    let response = app
        .oneshot(multipart_request("/v1/compress", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["errorType"], "validation_error");
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("smaller than the original"));
}

#[tokio::test]
async fn test_compress_rejects_out_of_range_target() {
    let app = test_app(StubProvider::new());
    // 2^54 KB overflows the bytes conversion; must answer 400, not panic
    let body = close_body(format!(
        "{}{}",
        file_part("file", "a.png", "image/png", "AAAA"),
        text_part("targetSize", "18014398509481984"),
    ));

    let response = app
        .oneshot(multipart_request("/v1/compress", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["errorType"], "validation_error");
}

#[tokio::test]
async fn test_rate_limit_answers_429_after_burst() {
    let app = test_app(StubProvider::new());

    // requests beyond the 10-per-window budget flip from 400 to 429
    for _ in 0..10 {
        let response = app
            .clone()
            .oneshot(multipart_request(
                "/v1/compress",
                close_body(text_part("targetSize", "500")),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let response = app
        .oneshot(multipart_request(
            "/v1/compress",
            close_body(text_part("targetSize", "500")),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = body_json(response).await;
    assert_eq!(body["errorType"], "rate_limit_exceeded");
}

#[tokio::test]
async fn test_rate_limit_keys_on_forwarded_address() {
    let app = test_app(StubProvider::new());

    for _ in 0..10 {
        let request = Request::builder()
            .method("POST")
            .uri("/v1/compress")
            .header("x-forwarded-for", "203.0.113.7")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(close_body(text_part("targetSize", "500"))))
            .unwrap();
        app.clone().oneshot(request).await.unwrap();
    }

    // a different client address still has budget
    let request = Request::builder()
        .method("POST")
        .uri("/v1/compress")
        .header("x-forwarded-for", "198.51.100.9")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(close_body(text_part("targetSize", "500"))))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

fn session_request(method: &str, uri: &str, session: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-session-key", session);
    match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn sample_state() -> Value {
    json!({
        "processedResultRef": "https://cdn.test/compressed-images/stub",
        "originalSizeBytes": 2_000_000u64,
        "resultSizeBytes": 512_000u64,
        "sourceFileName": "photo.jpg",
        "targetSizeKb": 500,
        "processingKind": "compress"
    })
}

#[tokio::test]
async fn test_session_state_save_peek_and_consume() {
    let app = test_app(StubProvider::new());

    let response = app
        .clone()
        .oneshot(session_request(
            "POST",
            "/v1/session/state",
            "sess-1",
            Some(sample_state()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // peek leaves the slot in place
    let response = app
        .clone()
        .oneshot(session_request("GET", "/v1/session/state", "sess-1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["processingKind"], "compress");
    assert_eq!(body["resultSizeBytes"], 512_000);

    // consume empties it
    let response = app
        .clone()
        .oneshot(session_request(
            "GET",
            "/v1/session/state?consume=true",
            "sess-1",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(session_request(
            "GET",
            "/v1/session/state?consume=true",
            "sess-1",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_session_state_is_per_session() {
    let app = test_app(StubProvider::new());

    app.clone()
        .oneshot(session_request(
            "POST",
            "/v1/session/state",
            "sess-a",
            Some(sample_state()),
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(session_request("GET", "/v1/session/state", "sess-b", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_session_state_requires_session_header() {
    let app = test_app(StubProvider::new());

    let request = Request::builder()
        .method("POST")
        .uri("/v1/session/state")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(sample_state().to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_session_clear_is_idempotent() {
    let app = test_app(StubProvider::new());

    let response = app
        .clone()
        .oneshot(session_request("DELETE", "/v1/session/state", "sess-1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(session_request("DELETE", "/v1/session/state", "sess-1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_download_reclaims_asset_after_success() {
    let provider = StubProvider::new();
    let app = test_app(provider.clone());

    let response = app
        .oneshot(
            Request::get(
                "/v1/download?url=https://cdn.test/compressed-images/stub&filename=photo.webp&publicId=compressed-images/stub",
            )
            .body(Body::empty())
            .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .unwrap(),
        "attachment; filename=\"photo.webp\""
    );
    assert_eq!(provider.deletes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_download_failure_leaves_asset_alive() {
    let provider = StubProvider::new();
    let app = test_app(provider.clone());

    let response = app
        .oneshot(
            Request::get(
                "/v1/download?url=https://cdn.test/missing&publicId=compressed-images/stub",
            )
            .body(Body::empty())
            .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(provider.deletes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_download_without_public_id_does_not_delete() {
    let provider = StubProvider::new();
    let app = test_app(provider.clone());

    let response = app
        .oneshot(
            Request::get("/v1/download?url=https://cdn.test/compressed-images/stub")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(provider.deletes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_download_rejects_non_https_url() {
    let app = test_app(StubProvider::new());

    let response = app
        .oneshot(
            Request::get("/v1/download?url=http://cdn.test/a.webp")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_asset_endpoint() {
    let provider = StubProvider::new();
    let app = test_app(provider.clone());

    let request = Request::builder()
        .method("DELETE")
        .uri("/v1/assets")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "publicId": "compressed-images/stub" }).to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["deleted"], true);
    assert_eq!(provider.deletes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unconfigured_provider_answers_500_not_panic() {
    let state = AppState::new(None, HandoffStore::new(), false, None);
    let app = build_router(state);

    let body = close_body(format!(
        "{}{}",
        file_part("file", "a.png", "image/png", "AAAA"),
        text_part("targetSize", "1"),
    ));

    let response = app
        .oneshot(multipart_request("/v1/compress", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["errorType"], "provider_not_configured");
}
