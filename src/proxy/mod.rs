//! Asset resolution proxy.
//!
//! Every artifact is reached in two hops: [`resolve`] asks the backend where the
//! artifact lives, then an [`AssetStore`] fetches it server-side. The browser only
//! ever talks to our own origin, whatever storage the backend hands out URLs for.
//! Nothing is cached between calls; each resolution asks for fresh locations.

mod store;

pub use store::{AssetStore, FetchedAsset, HttpAssetStore};

use std::sync::Arc;

use bytes::Bytes;
use fusion_core::{AssetKind, JobId, Manifest, PresignedLocation};

use crate::backend::GenerationBackend;
use crate::error::{Error, Result};

/// The location of one artifact of a job, ready to be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub job_id: JobId,
    pub kind: AssetKind,
    pub url: String,
}

/// First hop: look up where `kind` lives for `job_id`.
///
/// Backend failures propagate unchanged. A presigned document without a
/// location for `kind` fails with `AssetNotReady`.
pub async fn resolve(
    backend: &dyn GenerationBackend,
    job_id: &JobId,
    kind: AssetKind,
) -> Result<Located> {
    let location = backend.get_presigned_location(job_id).await?;
    locate(job_id, kind, location)
}

fn locate(job_id: &JobId, kind: AssetKind, location: PresignedLocation) -> Result<Located> {
    let url = location
        .url_for(kind)
        .ok_or(Error::AssetNotReady(kind))?
        .to_string();
    Ok(Located {
        job_id: job_id.clone(),
        kind,
        url,
    })
}

/// A resolved manifest, served as a JSON document that must not be cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestDocument {
    pub body: Bytes,
}

impl ManifestDocument {
    pub const CONTENT_TYPE: &'static str = "application/json";
    pub const CACHE_CONTROL: &'static str = "no-store";

    pub fn parse(&self) -> Result<Manifest> {
        Manifest::from_slice(&self.body).map_err(|e| Error::MalformedResponse(e.to_string()))
    }
}

/// Scene responses fall back to these when upstream does not say otherwise.
pub const DEFAULT_SCENE_CONTENT_TYPE: &str = "application/octet-stream";
pub const DEFAULT_SCENE_CACHE_CONTROL: &str = "no-store";

/// Composes [`resolve`] with an [`AssetStore`].
#[derive(Clone)]
pub struct AssetResolver {
    backend: Arc<dyn GenerationBackend>,
    store: Arc<dyn AssetStore>,
}

impl AssetResolver {
    pub fn new(backend: Arc<dyn GenerationBackend>, store: Arc<dyn AssetStore>) -> Self {
        Self { backend, store }
    }

    pub fn backend(&self) -> &Arc<dyn GenerationBackend> {
        &self.backend
    }

    /// The presigned document for a job, as the backend returned it.
    pub async fn presign(&self, job_id: &JobId) -> Result<PresignedLocation> {
        self.backend.get_presigned_location(job_id).await
    }

    /// Resolve and fetch the manifest, buffered in full.
    pub async fn resolve_manifest(&self, job_id: &JobId) -> Result<ManifestDocument> {
        let located = resolve(self.backend.as_ref(), job_id, AssetKind::Manifest).await?;
        let body = self.store.fetch(&located).await?.into_bytes().await?;
        tracing::debug!(%job_id, bytes = body.len(), "resolved manifest");
        Ok(ManifestDocument { body })
    }

    /// Resolve and fetch the scene. The body is left streaming.
    pub async fn resolve_scene(&self, job_id: &JobId) -> Result<FetchedAsset> {
        let located = resolve(self.backend.as_ref(), job_id, AssetKind::Scene).await?;
        let mut asset = self.store.fetch(&located).await?;
        asset
            .content_type
            .get_or_insert_with(|| DEFAULT_SCENE_CONTENT_TYPE.to_string());
        asset
            .cache_control
            .get_or_insert_with(|| DEFAULT_SCENE_CACHE_CONTROL.to_string());
        tracing::debug!(%job_id, content_length = ?asset.content_length, "resolved scene");
        Ok(asset)
    }
}
