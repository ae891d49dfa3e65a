use async_trait::async_trait;
use fusion_core::{JobId, Manifest};
use reqwest::{Client, StatusCode, Url};

use super::{FreshnessToken, RenderableAsset};
use crate::error::{Error, Result};
use crate::proxy::{AssetResolver, DEFAULT_SCENE_CONTENT_TYPE};

/// Where a viewer session gets its scene and manifest from.
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn fetch_scene(&self, job_id: &JobId, token: FreshnessToken) -> Result<RenderableAsset>;

    async fn fetch_manifest(&self, job_id: &JobId, token: FreshnessToken) -> Result<Manifest>;
}

/// Talks to a running proxy over HTTP (`/api/scene`, `/api/manifest`).
#[derive(Debug, Clone)]
pub struct ProxyClient {
    base_url: Url,
    client: Client,
}

impl ProxyClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::InvalidRequest(format!("invalid proxy url {base_url}: {e}")))?;
        Ok(Self {
            base_url,
            client: Client::new(),
        })
    }

    /// `{base}/api/{endpoint}?job_id=..&t=..`
    fn url(&self, endpoint: &str, job_id: &JobId, token: FreshnessToken) -> Result<Url> {
        let mut url = self
            .base_url
            .join(&format!("api/{endpoint}"))
            .map_err(|e| Error::InvalidRequest(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("job_id", job_id.as_str())
            .append_pair("t", &token.to_string());
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::BAD_REQUEST => Error::InvalidRequest(body),
            StatusCode::NOT_FOUND => Error::NotFound { body },
            _ => Error::UpstreamFetchError {
                status: status.as_u16(),
                body,
            },
        })
    }
}

#[async_trait]
impl AssetSource for ProxyClient {
    async fn fetch_scene(&self, job_id: &JobId, token: FreshnessToken) -> Result<RenderableAsset> {
        let response = self.get(self.url("scene", job_id, token)?).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_SCENE_CONTENT_TYPE)
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::UpstreamUnavailable(e.to_string()))?;
        Ok(RenderableAsset::new(bytes, content_type))
    }

    async fn fetch_manifest(&self, job_id: &JobId, token: FreshnessToken) -> Result<Manifest> {
        let response = self.get(self.url("manifest", job_id, token)?).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::UpstreamUnavailable(e.to_string()))?;
        Manifest::from_slice(&bytes).map_err(|e| Error::MalformedResponse(e.to_string()))
    }
}

/// In-process resolution, for embedding the viewer next to the proxy. There is
/// no HTTP cache in between, so the freshness token is not needed.
#[async_trait]
impl AssetSource for AssetResolver {
    async fn fetch_scene(&self, job_id: &JobId, _token: FreshnessToken) -> Result<RenderableAsset> {
        let asset = self.resolve_scene(job_id).await?;
        let content_type = asset
            .content_type
            .clone()
            .unwrap_or_else(|| DEFAULT_SCENE_CONTENT_TYPE.to_string());
        let bytes = asset.into_bytes().await?;
        Ok(RenderableAsset::new(bytes, content_type))
    }

    async fn fetch_manifest(&self, job_id: &JobId, _token: FreshnessToken) -> Result<Manifest> {
        self.resolve_manifest(job_id).await?.parse()
    }
}
