//! Gateway client for the generation backend.
//!
//! Thin request wrapper: one HTTP call per operation, typed decoding at the
//! boundary, no retries. The base URL comes from [`crate::config::Config`]
//! (`API_BASE`, default `http://localhost:8000`).

use async_trait::async_trait;
use fusion_core::{CreateJobInput, Job, JobId, JobStatus, PresignedLocation, StatusResponse};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Operations the generation backend exposes to this crate.
///
/// Implementations must be stateless with respect to callers so one instance
/// can be shared by any number of pollers and resolutions.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Submit a generation request.
    async fn create_job(&self, prompt: &str) -> Result<Job>;

    /// Current status of a job.
    async fn get_status(&self, job_id: &JobId) -> Result<JobStatus>;

    /// Presigned locations of a job's artifacts. `NotFound` while the job has
    /// nothing to show yet.
    async fn get_presigned_location(&self, job_id: &JobId) -> Result<PresignedLocation>;
}

/// HTTP implementation of [`GenerationBackend`].
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: Url,
    client: Client,
}

impl BackendClient {
    /// Create a client for the backend at `base_url`.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_client(base_url, Client::new())
    }

    /// Create with an explicit reqwest client (shared connection pool).
    pub fn with_client(base_url: &str, client: Client) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::InvalidRequest(format!("invalid backend url {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidRequest(format!(
                "invalid backend url {base_url}"
            )));
        }
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build `{base}/v1/generations/{segments..}`. Each segment is percent-encoded,
    /// so a job id can never escape its path position.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(["v1", "generations"]).extend(segments);
        }
        url
    }

    /// Send a request, mapping transport failures to `BackendUnavailable`.
    async fn send(&self, method: Method, url: Url, body: Option<&CreateJobInput>) -> Result<reqwest::Response> {
        tracing::debug!(%method, %url, "backend request");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(body);
        }
        req.send()
            .await
            .map_err(|e| Error::BackendUnavailable(e.to_string()))
    }

    /// Decode a success body, or turn a non-success status into `BackendError`.
    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::BackendError {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::BackendUnavailable(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| Error::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl GenerationBackend for BackendClient {
    async fn create_job(&self, prompt: &str) -> Result<Job> {
        if prompt.trim().is_empty() {
            return Err(Error::InvalidRequest("prompt is required".into()));
        }
        let input = CreateJobInput {
            prompt: prompt.to_string(),
        };
        let response = self
            .send(Method::POST, self.endpoint(&[]), Some(&input))
            .await?;
        let job: Job = Self::handle_response(response).await?;
        tracing::info!(job_id = %job.id, "created generation job");
        Ok(job)
    }

    async fn get_status(&self, job_id: &JobId) -> Result<JobStatus> {
        let url = self.endpoint(&[job_id.as_str(), "status"]);
        let response = self.send(Method::GET, url, None).await?;
        let body: StatusResponse = Self::handle_response(response).await?;
        Ok(body.status)
    }

    async fn get_presigned_location(&self, job_id: &JobId) -> Result<PresignedLocation> {
        let url = self.endpoint(&[job_id.as_str(), "presigned"]);
        let response = self.send(Method::GET, url, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::NotFound { body });
        }
        Self::handle_response(response).await
    }
}
