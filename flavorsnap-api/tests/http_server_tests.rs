//! HTTP Server & Routing Integration Tests
//!
//! Requests go through the full router, observability layer included.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use flavorsnap_api::{build_router, AppState};
use flavorsnap_client::{ResilientClient, RetryPolicy};
use flavorsnap_common::config::ServerConfig;
use flavorsnap_common::logging::MemorySink;
use flavorsnap_common::{EventType, LogLevel, Logger, UploadFile, UploadValidator};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

const BOUNDARY: &str = "flavorsnap-test-boundary";

struct TestApp {
    state: AppState,
    sink: Arc<MemorySink>,
    upload_dir: TempDir,
}

impl TestApp {
    fn new() -> Self {
        Self::with_limits(UploadValidator::default(), Vec::new())
    }

    fn with_limits(validator: UploadValidator, allowed_origins: Vec<String>) -> Self {
        let upload_dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(MemorySink::new());
        let logger = Logger::new("flavorsnap-api", sink.clone());
        let server = ServerConfig {
            upload_dir: upload_dir.path().to_path_buf(),
            allowed_origins,
            ..ServerConfig::default()
        };
        Self {
            state: AppState::new(logger, validator, server),
            sink,
            upload_dir,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = build_router(self.state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn stored_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.upload_dir.path())
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}

/// One-part multipart body
fn multipart_body(field: &str, file_name: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(uri: &str, body: Vec<u8>) -> Request<Body> {
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

#[tokio::test]
async fn health_reports_service() {
    let app = TestApp::new();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "flavorsnap-api");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn upload_is_stored_and_predicted() {
    let app = TestApp::new();
    let image = vec![7u8; 2048];
    let request = upload_request("/api/predict", multipart_body("image", "my lunch.png", "image/png", &image));

    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["prediction"], "moi moi");
    assert_eq!(body["confidence"], 0.982);
    assert_eq!(body["metadata"]["size"], 2048);
    assert_eq!(body["metadata"]["type"], "image/png");

    let filename = body["metadata"]["filename"].as_str().unwrap();
    assert!(filename.ends_with("-my-lunch.png"));
    assert_eq!(app.stored_files(), vec![filename.to_string()]);
    assert_eq!(std::fs::read(app.upload_dir.path().join(filename)).unwrap(), image);

    assert_eq!(app.sink.with_event(EventType::ApiRequest).len(), 1);
    let responses = app.sink.with_event(EventType::ApiResponse);
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].field("response_status_code"), Some(&json!(200)));
    assert_eq!(responses[0].field("response_body").unwrap()["prediction"], "moi moi");
    assert_eq!(app.sink.matching("File uploaded successfully").len(), 1);
    assert_eq!(app.sink.matching("Prediction completed").len(), 1);
}

#[tokio::test]
async fn text_upload_rejected() {
    let app = TestApp::new();
    let request = upload_request("/api/predict", multipart_body("image", "notes.txt", "text/plain", b"hi"));

    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Only JPG, PNG, and WebP are allowed"));
    assert!(app.stored_files().is_empty());

    let warnings = app.sink.matching("Invalid file type uploaded");
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].level(), LogLevel::Warning);
    assert_eq!(warnings[0].field("file_type"), Some(&json!("text/plain")));
}

#[tokio::test]
async fn missing_image_field_rejected() {
    let app = TestApp::new();
    let request = upload_request("/api/predict", multipart_body("photo", "a.png", "image/png", b"x"));

    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "No image provided"}));
    assert_eq!(app.sink.matching("No image provided in request").len(), 1);
}

#[tokio::test]
async fn oversized_upload_rejected() {
    let app = TestApp::with_limits(UploadValidator::new(["image/png"], 1024), Vec::new());
    let request = upload_request("/api/predict", multipart_body("image", "big.png", "image/png", &[0u8; 1025]));

    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("too large"));
    assert!(app.stored_files().is_empty());
}

#[tokio::test]
async fn non_multipart_body_rejected() {
    let app = TestApp::new();
    let request = Request::builder()
        .method("POST")
        .uri("/api/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"image":"nope"}"#))
        .unwrap();

    let (status, body) = app.send(request).await;

    assert!(status.is_client_error());
    assert!(body["error"].is_string());
    assert_eq!(app.sink.with_event(EventType::ApiResponse).len(), 1);
}

#[tokio::test]
async fn storage_failure_is_internal_error() {
    let app = TestApp::new();
    // A regular file where the upload directory should be
    let blocker = app.upload_dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"").unwrap();
    let mut state = app.state.clone();
    state.server = Arc::new(ServerConfig {
        upload_dir: blocker,
        ..(*state.server).clone()
    });

    let response = build_router(state)
        .oneshot(upload_request("/api/predict", multipart_body("image", "a.png", "image/png", b"png")))
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Internal Server Error"}));

    let failures = app.sink.with_event(EventType::ErrorWithTraceback);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].message(), "Upload Error");
    assert!(failures[0].field("exception_type").is_some());
}

#[tokio::test]
async fn label_endpoint_answers_label() {
    let app = TestApp::new();
    let request = upload_request("/predict", multipart_body("image", "suya.jpg", "image/jpeg", b"jpeg"));

    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"label": "moi moi"}));
    assert_eq!(app.sink.matching("Prediction completed successfully").len(), 1);
    assert!(app.stored_files().is_empty());
}

#[tokio::test]
async fn label_endpoint_requires_image() {
    let app = TestApp::new();
    let request = upload_request("/predict", multipart_body("other", "x.png", "image/png", b"x"));

    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "No image uploaded"}));
}

#[tokio::test]
async fn cors_preflight_for_allowed_origin() {
    let app = TestApp::with_limits(
        UploadValidator::default(),
        vec!["http://localhost:3000".to_string()],
    );
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/predict")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();

    let response = build_router(app.state.clone()).oneshot(request).await.unwrap();

    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:3000"
    );
}

#[tokio::test]
async fn client_classifies_against_live_server() {
    let app = TestApp::new();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = build_router(app.state.clone());
    let server = tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let dead = {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = probe.local_addr().unwrap();
        format!("http://{}/predict", addr)
    };

    let client_sink = Arc::new(MemorySink::new());
    let client = ResilientClient::new(
        Logger::new("flavorsnap-client", client_sink.clone()),
        UploadValidator::default(),
        RetryPolicy::new(0, Duration::from_millis(10)),
        Duration::from_secs(5),
    )
    .unwrap();
    let file = UploadFile::new("photo.png", "image/png", vec![0u8; 500 * 1024]);

    let result = client
        .classify(
            Some(&file),
            &[dead, format!("http://{}/api/predict", addr)],
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    server.abort();

    let top = result.top().unwrap();
    assert_eq!(top.label, "moi moi");
    assert!((top.confidence - 0.982).abs() < 1e-9);
    assert_eq!(app.stored_files().len(), 1);
    assert_eq!(app.sink.with_event(EventType::ApiResponse).len(), 1);
}
