//! In-process mock of the share API and its presigned storage endpoint.
//!
//! Routes mirror the real server: multipart-form upload, multipart
//! init/complete, presigned part PUTs answering with a quoted ETag, download
//! with a per-token limit, and file info.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use drift_client::ApiClient;

/// Knobs for misbehaving servers
#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    /// Part size the server uses when signing URLs
    pub part_size: u64,
    /// Sign this many URLs fewer than the payload needs
    pub missing_urls: usize,
    /// Answer the PUT of this part without an ETag
    pub omit_etag_for: Option<u32>,
    /// Delay every part PUT
    pub part_delay: Option<Duration>,
    /// Reject `POST /upload` with this status
    pub reject_upload: Option<StatusCode>,
}

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub data: Vec<u8>,
    pub filename: String,
    pub download_limit: u32,
    pub download_count: u32,
}

#[derive(Default)]
pub struct MockState {
    pub base: String,
    pub behavior: MockBehavior,
    next_id: AtomicUsize,
    pub files: Mutex<HashMap<String, StoredFile>>,
    /// upload_id → (filename, part_number → bytes)
    pub pending: Mutex<HashMap<String, (String, HashMap<u32, Vec<u8>>)>>,
    /// Text fields of the last single-shot upload form
    pub form_fields: Mutex<HashMap<String, String>>,
    /// Part numbers of every completion call, in the order sent
    pub completed: Mutex<Vec<Vec<u32>>>,
    pub put_calls: AtomicUsize,
    pub complete_calls: AtomicUsize,
}

impl MockState {
    fn next_token(&self, prefix: &str) -> String {
        format!("{prefix}{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn download_url(&self, token: &str) -> String {
        format!("{}/api/download/{token}", self.base)
    }
}

pub struct MockServer {
    pub state: Arc<MockState>,
    pub api_url: String,
    pub share_url: String,
}

impl MockServer {
    pub async fn start(behavior: MockBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock");
        let addr = listener.local_addr().expect("local addr");
        let base = format!("http://{addr}");

        let behavior = MockBehavior {
            part_size: if behavior.part_size == 0 {
                drift_core::PART_SIZE
            } else {
                behavior.part_size
            },
            ..behavior
        };
        let state = Arc::new(MockState {
            base: base.clone(),
            behavior,
            ..Default::default()
        });

        let app = Router::new()
            .route("/api/upload", post(upload))
            .route("/api/upload/multipart/init", post(init_multipart))
            .route("/api/upload/multipart/complete", post(complete_multipart))
            .route("/s3/{upload_id}/{part}", put(put_part))
            .route("/api/download/{token}", get(download))
            .route("/api/download/{token}/info", get(info))
            .layer(DefaultBodyLimit::disable())
            .with_state(state.clone());

        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            state,
            api_url: format!("{base}/api"),
            share_url: base,
        }
    }

    pub fn api(&self) -> ApiClient {
        ApiClient::new(&self.api_url).expect("api client")
    }

    pub fn put_calls(&self) -> usize {
        self.state.put_calls.load(Ordering::SeqCst)
    }

    pub fn complete_calls(&self) -> usize {
        self.state.complete_calls.load(Ordering::SeqCst)
    }

    pub fn completed_orders(&self) -> Vec<Vec<u32>> {
        self.state.completed.lock().unwrap().clone()
    }

    pub fn form_field(&self, name: &str) -> Option<String> {
        self.state.form_fields.lock().unwrap().get(name).cloned()
    }

    pub fn stored(&self, token: &str) -> Option<StoredFile> {
        self.state.files.lock().unwrap().get(token).cloned()
    }
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

async fn upload(State(state): State<Arc<MockState>>, mut form: Multipart) -> Response {
    if let Some(status) = state.behavior.reject_upload {
        return error(status, "storage quota exceeded");
    }

    let mut data = None;
    let mut filename = String::new();
    let mut fields = HashMap::new();
    while let Ok(Some(field)) = form.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            filename = field.file_name().unwrap_or_default().to_string();
            data = field.bytes().await.ok().map(|b| b.to_vec());
        } else if let Ok(text) = field.text().await {
            fields.insert(name, text);
        }
    }
    let Some(data) = data else {
        return error(StatusCode::BAD_REQUEST, "missing file field");
    };

    let download_limit = fields
        .get("download_limit")
        .and_then(|v| v.parse().ok())
        .unwrap_or(1);
    *state.form_fields.lock().unwrap() = fields;

    let token = state.next_token("single-");
    state.files.lock().unwrap().insert(
        token.clone(),
        StoredFile {
            data,
            filename,
            download_limit,
            download_count: 0,
        },
    );

    Json(json!({
        "url": state.download_url(&token),
        "message": "File uploaded successfully",
        "expires_at": "2026-01-02T00:00:00Z",
        "download_limit": download_limit,
    }))
    .into_response()
}

async fn init_multipart(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    let filename = body["filename"].as_str().unwrap_or_default().to_string();
    let Some(file_size) = body["file_size"].as_u64() else {
        return error(StatusCode::BAD_REQUEST, "file_size required");
    };

    let upload_id = state.next_token("up-");
    let count = file_size.div_ceil(state.behavior.part_size) as usize;
    let count = count.saturating_sub(state.behavior.missing_urls);
    let urls: Vec<Value> = (1..=count as u32)
        .map(|n| json!({ "part_number": n, "url": format!("{}/s3/{upload_id}/{n}", state.base) }))
        .collect();

    state
        .pending
        .lock()
        .unwrap()
        .insert(upload_id.clone(), (filename, HashMap::new()));

    Json(json!({
        "upload_id": upload_id,
        "key": format!("uploads/{upload_id}"),
        "urls": urls,
    }))
    .into_response()
}

async fn put_part(
    State(state): State<Arc<MockState>>,
    Path((upload_id, part)): Path<(String, u32)>,
    body: Bytes,
) -> Response {
    state.put_calls.fetch_add(1, Ordering::SeqCst);
    if let Some(delay) = state.behavior.part_delay {
        tokio::time::sleep(delay).await;
    }

    let len = body.len();
    {
        let mut pending = state.pending.lock().unwrap();
        let Some((_, parts)) = pending.get_mut(&upload_id) else {
            return error(StatusCode::NOT_FOUND, "no such upload");
        };
        parts.insert(part, body.to_vec());
    }

    if state.behavior.omit_etag_for == Some(part) {
        return StatusCode::OK.into_response();
    }
    (
        StatusCode::OK,
        [(header::ETAG, format!("\"etag-{part}-{len}\""))],
    )
        .into_response()
}

async fn complete_multipart(
    State(state): State<Arc<MockState>>,
    Json(body): Json<Value>,
) -> Response {
    state.complete_calls.fetch_add(1, Ordering::SeqCst);

    let upload_id = body["upload_id"].as_str().unwrap_or_default().to_string();
    let parts = body["parts"].as_array().cloned().unwrap_or_default();
    let order: Vec<u32> = parts
        .iter()
        .filter_map(|p| p["part_number"].as_u64().map(|n| n as u32))
        .collect();
    state.completed.lock().unwrap().push(order.clone());

    let Some((filename, stored)) = state.pending.lock().unwrap().remove(&upload_id) else {
        return error(StatusCode::NOT_FOUND, "no such upload");
    };

    let mut data = Vec::new();
    for part in &parts {
        let number = part["part_number"].as_u64().unwrap_or_default() as u32;
        let Some(bytes) = stored.get(&number) else {
            return error(StatusCode::BAD_REQUEST, "unknown part");
        };
        let expected = format!("etag-{number}-{}", bytes.len());
        if part["etag"].as_str() != Some(expected.as_str()) {
            return error(StatusCode::BAD_REQUEST, "etag mismatch");
        }
        data.extend_from_slice(bytes);
    }

    let token = state.next_token("multi-");
    state.files.lock().unwrap().insert(
        token.clone(),
        StoredFile {
            data,
            filename,
            download_limit: 1,
            download_count: 0,
        },
    );

    Json(json!({
        "url": state.download_url(&token),
        "message": "Multipart upload completed",
        "expires_at": "2026-01-02T00:00:00Z",
        "download_limit": 1,
    }))
    .into_response()
}

async fn download(State(state): State<Arc<MockState>>, Path(token): Path<String>) -> Response {
    let mut files = state.files.lock().unwrap();
    let Some(file) = files.get_mut(&token) else {
        return error(StatusCode::NOT_FOUND, "File not found or expired");
    };
    if file.download_count >= file.download_limit {
        return error(StatusCode::GONE, "Download limit reached");
    }
    file.download_count += 1;
    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        file.data.clone(),
    )
        .into_response()
}

async fn info(State(state): State<Arc<MockState>>, Path(token): Path<String>) -> Response {
    let files = state.files.lock().unwrap();
    let Some(file) = files.get(&token) else {
        return error(StatusCode::NOT_FOUND, "File not found or expired");
    };
    Json(json!({
        "id": token,
        "expiration_time": "2026-01-02T00:00:00Z",
        "download_limit": file.download_limit,
        "download_count": file.download_count,
        "created_at": "2026-01-01T00:00:00Z",
        "filename": file.filename,
    }))
    .into_response()
}
