//! Functional tests for the HTTP API
//!
//! The router runs against an in-memory store and a fake inference backend,
//! so every pipeline step except the provider itself is exercised.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use image::{GenericImageView, ImageFormat, Rgb, RgbImage};
use parking_lot::Mutex;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use image_edit_gateway::{
    api::create_router,
    backend::{InferenceBackend, InferenceRequest},
    config::Settings,
    response::base64,
    store::{DocumentStore, EditOperation, EditRecord, MemoryStore},
    AppError, AppState,
};

const RESULT_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake result image";
const BOUNDARY: &str = "----TestBoundary7MA4YWxkTrZu0gW";

/// Backend double recording what it was asked to do
#[derive(Default)]
struct FakeBackend {
    fail: bool,
    calls: AtomicUsize,
    requests: Mutex<Vec<InferenceRequest>>,
    /// Whether the scratch files existed while the provider was "running"
    files_present: Mutex<Vec<bool>>,
}

impl FakeBackend {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl InferenceBackend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    async fn predict(&self, request: &InferenceRequest) -> image_edit_gateway::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let present = request.image.exists() && request.mask.as_ref().map_or(true, |m| m.exists());
        self.files_present.lock().push(present);
        self.requests.lock().push(request.clone());

        if self.fail {
            Err(AppError::Provider("Replicate returned 500 Internal Server Error: boom".to_string()))
        } else {
            Ok("https://replicate.delivery/fake/output.png".to_string())
        }
    }

    async fn download(&self, _url: &str) -> image_edit_gateway::Result<Vec<u8>> {
        Ok(RESULT_BYTES.to_vec())
    }
}

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    upload_dir: PathBuf,
    _dir: TempDir,
}

fn test_app(backend: Option<Arc<FakeBackend>>) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let upload_dir = dir.path().join("uploads");

    let mut settings = Settings::default();
    settings.storage.upload_dir = upload_dir.to_string_lossy().to_string();

    let store = Arc::new(MemoryStore::new());
    let backend = backend.map(|b| b as Arc<dyn InferenceBackend>);
    let state = AppState::new(settings, backend, store.clone());

    TestApp {
        router: create_router(Arc::new(state)),
        store,
        upload_dir,
        _dir: dir,
    }
}

fn red_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([255, 0, 0]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn multipart_file(name: &str, content_type: &str, content: &[u8]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            name
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

fn multipart_fields(fields: &[(&str, &str)]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

async fn post(router: &Router, uri: &str, content_type: &str, body: Vec<u8>) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    read_json(response).await
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    read_json(response).await
}

async fn read_json(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

fn files_in(dir: &Path) -> Vec<String> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect(),
        Err(_) => Vec::new(),
    }
}

// ============================================================================
// Liveness & age verification
// ============================================================================

#[tokio::test]
async fn test_root_returns_message() {
    let app = test_app(None);

    for uri in ["/api/", "/api"] {
        let (status, json) = get(&app.router, uri).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["message"].as_str().unwrap().contains("AI Image Editor API"));
    }
}

#[tokio::test]
async fn test_age_verify_stores_record() {
    let app = test_app(None);

    let (status, json) = post(
        &app.router,
        "/api/age-verify",
        "application/json",
        br#"{"verified": true, "timestamp": "2024-05-01T12:00:00Z"}"#.to_vec(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "verified");
    assert_eq!(json["message"], "Age verification completed");

    let records = app.store.age_verifications();
    assert_eq!(records.len(), 1);
    assert!(records[0].verified);
    assert_eq!(records[0].timestamp.to_rfc3339(), "2024-05-01T12:00:00+00:00");
}

#[tokio::test]
async fn test_age_verify_accepts_timestamp_without_offset() {
    let app = test_app(None);

    let (status, json) = post(
        &app.router,
        "/api/age-verify",
        "application/json",
        br#"{"verified": true, "timestamp": "2024-05-01T12:00:00.123456"}"#.to_vec(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "verified");

    let records = app.store.age_verifications();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].timestamp.to_rfc3339(),
        "2024-05-01T12:00:00.123456+00:00"
    );
}

#[tokio::test]
async fn test_age_verify_rejects_bad_body() {
    let app = test_app(None);

    let (status, json) = post(
        &app.router,
        "/api/age-verify",
        "application/json",
        br#"{"timestamp": "yesterday"}"#.to_vec(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["type"], "invalid_request_error");
    assert!(app.store.age_verifications().is_empty());
}

// ============================================================================
// Upload & mask
// ============================================================================

#[tokio::test]
async fn test_upload_then_create_mask() {
    let app = test_app(None);
    let png = red_png(100, 100);

    let (content_type, body) = multipart_file("red.png", "image/png", &png);
    let (status, upload) = post(&app.router, "/api/upload-image", &content_type, body).await;

    assert_eq!(status, StatusCode::OK);
    let encoded = upload["base64"].as_str().unwrap();
    assert_eq!(base64::decode(encoded).unwrap().len(), png.len());
    assert_eq!(upload["size"], png.len() as u64);

    let filename = upload["filename"].as_str().unwrap();
    assert!(filename.ends_with(".png"));
    assert_eq!(std::fs::read(app.upload_dir.join(filename)).unwrap(), png);

    let images = app.store.images();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].original_name, "red.png");
    assert_eq!(images[0].content_type, "image/png");

    let (content_type, body) =
        multipart_fields(&[("image_base64", encoded), ("mask_data", "[[10, 10, 50, 50]]")]);
    let (status, json) = post(&app.router, "/api/create-mask", &content_type, body).await;

    assert_eq!(status, StatusCode::OK);
    let mask_png = base64::decode(json["mask_base64"].as_str().unwrap()).unwrap();
    let mask = image::load_from_memory(&mask_png).unwrap();
    assert_eq!(mask.dimensions(), (100, 100));

    let mask = mask.to_luma8();
    assert_eq!(mask.get_pixel(10, 10)[0], 255);
    assert_eq!(mask.get_pixel(50, 50)[0], 255);
    assert_eq!(mask.get_pixel(9, 10)[0], 0);
    assert_eq!(mask.get_pixel(51, 51)[0], 0);
}

#[tokio::test]
async fn test_upload_rejects_non_image() {
    let app = test_app(None);

    let (content_type, body) = multipart_file("notes.txt", "text/plain", b"hello");
    let (status, json) = post(&app.router, "/api/upload-image", &content_type, body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains("File must be an image"));
    assert!(app.store.images().is_empty());
    assert!(files_in(&app.upload_dir).is_empty());
}

#[tokio::test]
async fn test_create_mask_with_undecodable_image() {
    let app = test_app(None);
    let garbage = base64::encode(b"definitely not an image");

    let (content_type, body) =
        multipart_fields(&[("image_base64", &garbage), ("mask_data", "[[0, 0, 5, 5]]")]);
    let (status, json) = post(&app.router, "/api/create-mask", &content_type, body).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .starts_with("Failed to create mask"));
}

#[tokio::test]
async fn test_create_mask_accepts_urlencoded_form() {
    let app = test_app(None);
    let encoded = base64::encode(&red_png(20, 10));

    let body = format!(
        "image_base64={}&mask_data={}",
        urlencode(&encoded),
        urlencode("[[0, 0, 4, 4], [1, 2]]")
    );
    let (status, json) = post(
        &app.router,
        "/api/create-mask",
        "application/x-www-form-urlencoded",
        body.into_bytes(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let mask_png = base64::decode(json["mask_base64"].as_str().unwrap()).unwrap();
    let mask = image::load_from_memory(&mask_png).unwrap().to_luma8();
    assert_eq!(mask.dimensions(), (20, 10));
    assert_eq!(mask.get_pixel(4, 4)[0], 255);
    assert_eq!(mask.get_pixel(5, 5)[0], 0);
}

// ============================================================================
// Edit endpoints
// ============================================================================

#[tokio::test]
async fn test_edits_require_configured_provider() {
    let app = test_app(None);
    let encoded = base64::encode(&red_png(8, 8));

    for (uri, fields) in [
        ("/api/remove-object", vec![("image_base64", encoded.as_str()), ("mask_base64", encoded.as_str())]),
        ("/api/add-object", vec![("image_base64", encoded.as_str()), ("prompt", "a hat")]),
        ("/api/text-guided-edit", vec![("image_base64", encoded.as_str()), ("prompt", "make it blue")]),
    ] {
        let (content_type, body) = multipart_fields(&fields);
        let (status, json) = post(&app.router, uri, &content_type, body).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{}", uri);
        assert_eq!(json["error"]["type"], "configuration_error");
        assert!(json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("REPLICATE_API_KEY"));
    }

    assert!(files_in(&app.upload_dir).is_empty());
    assert_eq!(app.store.edit_count(), 0);
}

#[tokio::test]
async fn test_remove_object_success() {
    let backend = Arc::new(FakeBackend::default());
    let app = test_app(Some(backend.clone()));
    let image = base64::encode(&red_png(16, 16));
    let mask = base64::encode(&red_png(16, 16));

    let (content_type, body) = multipart_fields(&[("image_base64", &image), ("mask_base64", &mask)]);
    let (status, json) = post(&app.router, "/api/remove-object", &content_type, body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["operation_type"], "remove_object");
    assert_eq!(
        base64::decode(json["result_image_base64"].as_str().unwrap()).unwrap(),
        RESULT_BYTES
    );
    assert!(json["processing_time"].as_f64().unwrap() >= 0.0);

    let requests = backend.requests.lock();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model, "zsxkib/flux-dev-inpainting");
    assert_eq!(requests[0].prompt, "remove the selected object");
    assert_eq!(requests[0].params.strength, Some(0.95));
    assert_eq!(*backend.files_present.lock(), vec![true]);

    // Scratch files are gone once the request is done
    assert!(!requests[0].image.exists());
    assert!(!requests[0].mask.as_ref().unwrap().exists());

    let history = app.store.recent_edits(50).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id.to_string(), json["id"].as_str().unwrap());
}

#[tokio::test]
async fn test_provider_failure_persists_nothing() {
    let backend = Arc::new(FakeBackend::failing());
    let app = test_app(Some(backend.clone()));
    let image = base64::encode(&red_png(16, 16));

    let (content_type, body) =
        multipart_fields(&[("image_base64", &image), ("prompt", "snowy mountains")]);
    let (status, json) = post(&app.router, "/api/text-guided-edit", &content_type, body).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"]["type"], "provider_error");
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .starts_with("Failed to perform text-guided edit"));

    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    assert_eq!(app.store.edit_count(), 0);
    assert!(files_in(&app.upload_dir)
        .iter()
        .all(|name| !name.starts_with("temp_")));
}

#[tokio::test]
async fn test_add_object_model_selection() {
    let backend = Arc::new(FakeBackend::default());
    let app = test_app(Some(backend.clone()));
    let image = base64::encode(&red_png(16, 16));
    let mask = base64::encode(&red_png(16, 16));

    let (content_type, body) = multipart_fields(&[("image_base64", &image), ("prompt", "a red hat")]);
    let (status, json) = post(&app.router, "/api/add-object", &content_type, body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["operation_type"], "add_object");

    let (content_type, body) = multipart_fields(&[
        ("image_base64", &image),
        ("prompt", "a red hat"),
        ("mask_base64", &mask),
    ]);
    let (status, _) = post(&app.router, "/api/add-object", &content_type, body).await;
    assert_eq!(status, StatusCode::OK);

    let requests = backend.requests.lock();
    assert_eq!(requests[0].model, "black-forest-labs/flux-dev");
    assert!(requests[0].mask.is_none());
    assert_eq!(requests[1].model, "zsxkib/flux-dev-inpainting");
    assert!(requests[1].mask.is_some());
    assert_eq!(app.store.edit_count(), 2);
}

#[tokio::test]
async fn test_text_guided_edit_default_negative_prompt() {
    let backend = Arc::new(FakeBackend::default());
    let app = test_app(Some(backend.clone()));
    let image = base64::encode(&red_png(16, 16));

    let (content_type, body) =
        multipart_fields(&[("image_base64", &image), ("prompt", "turn it into a painting")]);
    let (status, json) = post(&app.router, "/api/text-guided-edit", &content_type, body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["operation_type"], "text_guided_edit");

    let requests = backend.requests.lock();
    assert_eq!(requests[0].model, "timothybrooks/instruct-pix2pix");
    assert_eq!(requests[0].negative_prompt.as_deref(), Some("blurry, low quality"));
}

#[tokio::test]
async fn test_missing_required_field() {
    let backend = Arc::new(FakeBackend::default());
    let app = test_app(Some(backend.clone()));
    let image = base64::encode(&red_png(16, 16));

    let (content_type, body) = multipart_fields(&[("image_base64", &image)]);
    let (status, json) = post(&app.router, "/api/add-object", &content_type, body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"]["message"].as_str().unwrap().contains("prompt"));
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_malformed_base64_is_decode_error() {
    let backend = Arc::new(FakeBackend::default());
    let app = test_app(Some(backend.clone()));

    let (content_type, body) =
        multipart_fields(&[("image_base64", "%%% not base64 %%%"), ("prompt", "a hat")]);
    let (status, json) = post(&app.router, "/api/add-object", &content_type, body).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"]["code"], "invalid_base64");
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}

// ============================================================================
// History
// ============================================================================

#[tokio::test]
async fn test_edit_history_newest_first() {
    let app = test_app(None);
    let now = Utc::now();

    for (prompt, offset) in [("t1", 1), ("t3", 3), ("t2", 2)] {
        let mut record = EditRecord::new(EditOperation::TextGuidedEdit, prompt, String::new(), 1.0);
        record.timestamp = now + Duration::seconds(offset);
        app.store.insert_edit(&record).await.unwrap();
    }

    let (status, json) = get(&app.router, "/api/edit-history").await;

    assert_eq!(status, StatusCode::OK);
    let prompts: Vec<&str> = json["history"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["prompt"].as_str().unwrap())
        .collect();
    assert_eq!(prompts, vec!["t3", "t2", "t1"]);
}

fn urlencode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{:02X}", b),
        })
        .collect()
}
