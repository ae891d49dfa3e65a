use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use fusion_core::{CreateJobInput, Job, JobId, PresignedLocation, StatusResponse};

use crate::error::Error;
use crate::proxy::{AssetResolver, ManifestDocument};

// ============================================================
// Error Handling
// ============================================================

/// Proxy-facing wrapper around [`Error`].
///
/// Anything the backend or the asset store said is forwarded with its original
/// status and body. Local failures get a JSON `{"error": ...}` body.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

fn error_body(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let e = self.0;
        match e {
            Error::BackendError { status, body }
            | Error::UpstreamFetchError { status, body } => {
                tracing::warn!(status, "forwarding upstream failure");
                let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                (status, body).into_response()
            }
            Error::NotFound { body } => (StatusCode::NOT_FOUND, body).into_response(),
            Error::InvalidRequest(msg) => error_body(StatusCode::BAD_REQUEST, msg),
            Error::AssetNotReady(_) => error_body(StatusCode::NOT_FOUND, e.to_string()),
            Error::BackendUnavailable(_)
            | Error::UpstreamUnavailable(_)
            | Error::MalformedResponse(_) => {
                tracing::error!("Internal error: {}", e);
                error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        }
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// First non-blank `job_id` query parameter. Other parameters (such as the
/// freshness token `t`) are ignored.
fn require_job_id(params: &[(String, String)]) -> ApiResult<JobId> {
    let raw = params
        .iter()
        .find(|(key, _)| key == "job_id")
        .map(|(_, value)| value.as_str())
        .unwrap_or_default();
    Ok(JobId::parse(raw).map_err(Error::from)?)
}

fn set_header(response: &mut Response, name: header::HeaderName, value: Option<&str>) {
    if let Some(value) = value.and_then(|v| HeaderValue::from_str(v).ok()) {
        response.headers_mut().insert(name, value);
    }
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Asset Resolution
// ============================================================

pub async fn presign(
    State(resolver): State<AssetResolver>,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<impl IntoResponse> {
    let job_id = require_job_id(&params)?;
    let location: PresignedLocation = resolver.presign(&job_id).await?;
    Ok((
        [(header::CACHE_CONTROL, ManifestDocument::CACHE_CONTROL)],
        Json(location),
    ))
}

pub async fn manifest(
    State(resolver): State<AssetResolver>,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<impl IntoResponse> {
    let job_id = require_job_id(&params)?;
    let document = resolver.resolve_manifest(&job_id).await?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, ManifestDocument::CONTENT_TYPE),
            (header::CACHE_CONTROL, ManifestDocument::CACHE_CONTROL),
        ],
        document.body,
    ))
}

pub async fn scene(
    State(resolver): State<AssetResolver>,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<Response> {
    let job_id = require_job_id(&params)?;
    let asset = resolver.resolve_scene(&job_id).await?;

    let content_type = asset.content_type.clone();
    let cache_control = asset.cache_control.clone();
    let content_length = asset.content_length.map(|len| len.to_string());

    let mut response = Body::from_stream(asset.body).into_response();
    set_header(&mut response, header::CONTENT_TYPE, content_type.as_deref());
    set_header(&mut response, header::CACHE_CONTROL, cache_control.as_deref());
    set_header(&mut response, header::CONTENT_LENGTH, content_length.as_deref());
    Ok(response)
}

// ============================================================
// Generations (pass-through to the backend)
// ============================================================

pub async fn create_generation(
    State(resolver): State<AssetResolver>,
    Json(input): Json<CreateJobInput>,
) -> ApiResult<(StatusCode, Json<Job>)> {
    let job = resolver.backend().create_job(&input.prompt).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

pub async fn generation_status(
    State(resolver): State<AssetResolver>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    let job_id = JobId::parse(&job_id).map_err(Error::from)?;
    let status = resolver.backend().get_status(&job_id).await?;
    Ok(Json(StatusResponse { status }))
}
