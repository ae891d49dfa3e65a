//! Shared test doubles: an in-memory backend and asset store, plus a stub HTTP
//! backend for tests that exercise the real clients.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use fusion_viewer::backend::GenerationBackend;
use fusion_viewer::models::{Job, JobId, JobStatus, PresignedLocation};
use fusion_viewer::proxy::{AssetResolver, AssetStore, FetchedAsset, Located};
use fusion_viewer::{Error, Result};

pub const PROMPT: &str = "misty cyberpunk alley";
pub const MANIFEST_JSON: &str =
    r#"{"job_id":"abc123","prompt":"misty cyberpunk alley","artifacts":{"scene_glb":"scene.glb"}}"#;
pub const SCENE_BYTES: &[u8] = b"glTF-stub";
pub const MANIFEST_URL: &str = "https://store.example/jobs/abc123/manifest.json";
pub const SCENE_URL: &str = "https://store.example/jobs/abc123/scene.glb";

pub fn job(id: &str) -> JobId {
    JobId::parse(id).expect("valid job id")
}

// ============================================================
// In-memory backend
// ============================================================

/// Scripted backend. Status results are served in order; the last one repeats.
pub struct FakeBackend {
    statuses: Mutex<VecDeque<Result<JobStatus>>>,
    presigned: Mutex<Result<PresignedLocation>>,
    delay: Duration,
    status_calls: AtomicUsize,
    presign_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            statuses: Mutex::new(VecDeque::new()),
            presigned: Mutex::new(Ok(PresignedLocation {
                manifest_url: Some(MANIFEST_URL.to_string()),
                scene_url: Some(SCENE_URL.to_string()),
                ..Default::default()
            })),
            delay: Duration::ZERO,
            status_calls: AtomicUsize::new(0),
            presign_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_statuses<'a>(statuses: impl IntoIterator<Item = &'a str>) -> Self {
        Self::with_results(statuses.into_iter().map(|s| Ok(JobStatus::new(s))))
    }

    pub fn with_results(results: impl IntoIterator<Item = Result<JobStatus>>) -> Self {
        let backend = Self::new();
        *backend.statuses.lock().unwrap() = results.into_iter().collect();
        backend
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_presigned(self, presigned: Result<PresignedLocation>) -> Self {
        *self.presigned.lock().unwrap() = presigned;
        self
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn presign_calls(&self) -> usize {
        self.presign_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_status(&self) -> Result<JobStatus> {
        let mut statuses = self.statuses.lock().unwrap();
        if statuses.len() > 1 {
            statuses.pop_front().unwrap()
        } else {
            statuses.front().cloned().unwrap_or_else(|| {
                Err(Error::NotFound {
                    body: "no status scripted".into(),
                })
            })
        }
    }
}

#[async_trait]
impl GenerationBackend for FakeBackend {
    async fn create_job(&self, prompt: &str) -> Result<Job> {
        if prompt.trim().is_empty() {
            return Err(Error::InvalidRequest("prompt is required".into()));
        }
        Ok(Job {
            id: job("abc123"),
            status: Some(JobStatus::new("queued")),
        })
    }

    async fn get_status(&self, _job_id: &JobId) -> Result<JobStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let result = self.next_status();

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn get_presigned_location(&self, _job_id: &JobId) -> Result<PresignedLocation> {
        self.presign_calls.fetch_add(1, Ordering::SeqCst);
        self.presigned.lock().unwrap().clone()
    }
}

// ============================================================
// In-memory asset store
// ============================================================

/// Serves canned bodies by URL and records every fetch.
pub struct FakeStore {
    assets: HashMap<String, Result<(&'static [u8], &'static str)>>,
    fetched: Mutex<Vec<String>>,
}

impl FakeStore {
    /// Manifest and scene for `abc123` at [`MANIFEST_URL`] / [`SCENE_URL`].
    pub fn new() -> Self {
        let mut assets = HashMap::new();
        assets.insert(
            MANIFEST_URL.to_string(),
            Ok((MANIFEST_JSON.as_bytes(), "binary/octet-stream")),
        );
        assets.insert(SCENE_URL.to_string(), Ok((SCENE_BYTES, "model/gltf-binary")));
        Self {
            assets,
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn with_asset(mut self, url: &str, asset: Result<(&'static [u8], &'static str)>) -> Self {
        self.assets.insert(url.to_string(), asset);
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetStore for FakeStore {
    async fn fetch(&self, located: &Located) -> Result<FetchedAsset> {
        self.fetched.lock().unwrap().push(located.url.clone());
        match self.assets.get(&located.url) {
            Some(Ok((bytes, content_type))) => {
                Ok(FetchedAsset::from_bytes(*bytes, Some(content_type.to_string())))
            }
            Some(Err(e)) => Err(e.clone()),
            None => Err(Error::UpstreamFetchError {
                status: 404,
                body: "NoSuchKey".into(),
            }),
        }
    }
}

pub fn resolver(backend: Arc<FakeBackend>, store: Arc<FakeStore>) -> AssetResolver {
    AssetResolver::new(backend, store)
}

// ============================================================
// Stub HTTP backend
// ============================================================

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Failed to read local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub server failed");
    });
    format!("http://{}", addr)
}

#[derive(Clone, Default)]
pub struct StubState {
    /// Status responses for `GET /status`, served in order; the last repeats.
    pub statuses: Arc<Mutex<VecDeque<&'static str>>>,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

impl StubState {
    pub fn with_statuses(statuses: &[&'static str]) -> Self {
        let state = Self::default();
        *state.statuses.lock().unwrap() = statuses.iter().copied().collect();
        state
    }
}

/// Stub of the generation backend plus the asset store it presigns into.
///
/// Job ids drive the presigned behaviour:
/// - `abc123`: manifest and scene available
/// - `noscene`: manifest only
/// - `nomanifest`: scene only
/// - `pending`: 404 from the backend
/// - `down`: 503 from the backend
/// - `expired`: scene URL that answers 403
/// - `garbled`: 200 with a non-JSON body
/// - `extras`: both locations plus fields this crate does not interpret
pub fn stub_backend(state: StubState) -> Router {
    Router::new()
        .route("/v1/generations", post(stub_create))
        .route("/v1/generations/{job_id}/status", get(stub_status))
        .route("/v1/generations/{job_id}/presigned", get(stub_presigned))
        .route("/store/{job_id}/manifest.json", get(stub_manifest))
        .route("/store/{job_id}/scene.glb", get(stub_scene))
        .with_state(state)
}

async fn stub_create(
    State(state): State<StubState>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let prompt = body["prompt"].as_str().unwrap_or_default().to_string();
    state.prompts.lock().unwrap().push(prompt);
    Json(serde_json::json!({ "job_id": "abc123", "status": "queued" })).into_response()
}

async fn stub_status(State(state): State<StubState>, Path(job_id): Path<String>) -> Response {
    if job_id == "down" {
        return (StatusCode::SERVICE_UNAVAILABLE, "status backend overloaded").into_response();
    }
    let mut statuses = state.statuses.lock().unwrap();
    let status = if statuses.len() > 1 {
        statuses.pop_front()
    } else {
        statuses.front().copied()
    };
    match status {
        Some(status) => Json(serde_json::json!({ "status": status })).into_response(),
        None => (StatusCode::NOT_FOUND, "unknown job").into_response(),
    }
}

async fn stub_presigned(headers: HeaderMap, Path(job_id): Path<String>) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("127.0.0.1")
        .to_string();
    let manifest_url = format!("http://{host}/store/{job_id}/manifest.json");
    let scene_url = format!("http://{host}/store/{job_id}/scene.glb");

    match job_id.as_str() {
        "pending" => (StatusCode::NOT_FOUND, r#"{"detail":"job not found"}"#).into_response(),
        "down" => (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable: backend overloaded")
            .into_response(),
        "garbled" => (StatusCode::OK, "<html>oops</html>").into_response(),
        "noscene" => Json(serde_json::json!({ "manifest_url": manifest_url })).into_response(),
        "nomanifest" => Json(serde_json::json!({ "scene_url": scene_url })).into_response(),
        "extras" => Json(serde_json::json!({
            "manifest_url": manifest_url,
            "scene_url": scene_url,
            "expires_in": 3600,
        }))
        .into_response(),
        _ => Json(serde_json::json!({
            "manifest_url": manifest_url,
            "scene_url": scene_url,
        }))
        .into_response(),
    }
}

async fn stub_manifest(Path(job_id): Path<String>) -> Response {
    if job_id == "expired" {
        return (StatusCode::FORBIDDEN, "<Error>AccessDenied</Error>").into_response();
    }
    // Object stores often label JSON as a generic binary type.
    (
        [(header::CONTENT_TYPE, "binary/octet-stream")],
        MANIFEST_JSON,
    )
        .into_response()
}

async fn stub_scene(Path(job_id): Path<String>) -> Response {
    if job_id == "expired" {
        return (StatusCode::FORBIDDEN, "<Error>AccessDenied</Error>").into_response();
    }
    (
        [
            (header::CONTENT_TYPE, "model/gltf-binary"),
            (header::CACHE_CONTROL, "private, max-age=60"),
        ],
        SCENE_BYTES,
    )
        .into_response()
}
