//! Viewer session controller.
//!
//! One [`ViewerSession`] per displayed job. Activation resolves the scene and the
//! manifest exactly once each, concurrently, and never retries: a failed half is
//! left empty and its error kept for display. The session owns whatever it
//! resolved until it is torn down or dropped.

mod render;
mod source;

pub use render::{FileRenderer, Renderer};
pub use source::{AssetSource, ProxyClient};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use fusion_core::{JobId, Manifest};
use reqwest::Url;
use tokio::sync::mpsc;

use crate::backend::GenerationBackend;
use crate::error::{Error, Result};
use crate::poller::{JobPoller, PollEvent};

/// Cache-busting tag attached to every proxy request (milliseconds since epoch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FreshnessToken(pub i64);

impl FreshnessToken {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }
}

impl fmt::Display for FreshnessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scene bytes ready to hand to a renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderableAsset {
    bytes: Bytes,
    content_type: String,
}

impl RenderableAsset {
    pub fn new(bytes: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Binary glTF starts with the ASCII magic `glTF`.
    pub fn is_glb(&self) -> bool {
        self.bytes.starts_with(b"glTF")
    }
}

/// Read `job_id` from a navigation URL such as `http://host/viewer?job_id=abc123`.
/// A bare query (`?job_id=abc123`) or relative path is accepted too.
pub fn job_id_from_location(location: &str) -> Result<JobId> {
    let url = match Url::parse(location) {
        Ok(url) => url,
        Err(_) => Url::parse("http://localhost/")
            .and_then(|base| base.join(location))
            .map_err(|e| Error::InvalidRequest(format!("invalid location {location}: {e}")))?,
    };
    let raw = url
        .query_pairs()
        .find(|(key, _)| key == "job_id")
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default();
    Ok(JobId::parse(&raw)?)
}

pub struct ViewerSession {
    job_id: JobId,
    source: Arc<dyn AssetSource>,
    activated: bool,
    asset: Option<RenderableAsset>,
    manifest: Option<Manifest>,
    scene_error: Option<Error>,
    manifest_error: Option<Error>,
    poller: Option<JobPoller>,
}

impl ViewerSession {
    pub fn new(job_id: JobId, source: Arc<dyn AssetSource>) -> Self {
        Self {
            job_id,
            source,
            activated: false,
            asset: None,
            manifest: None,
            scene_error: None,
            manifest_error: None,
            poller: None,
        }
    }

    /// Session for the job named in a navigation URL.
    pub fn from_location(location: &str, source: Arc<dyn AssetSource>) -> Result<Self> {
        Ok(Self::new(job_id_from_location(location)?, source))
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Resolve scene and manifest. Only the first call does anything.
    pub async fn activate(&mut self) {
        if self.activated {
            return;
        }
        self.activated = true;

        let source = Arc::clone(&self.source);
        let job_id = self.job_id.clone();
        let (scene, manifest) = tokio::join!(
            source.fetch_scene(&job_id, FreshnessToken::now()),
            source.fetch_manifest(&job_id, FreshnessToken::now()),
        );

        match scene {
            Ok(asset) => {
                tracing::info!(%job_id, bytes = asset.len(), "scene resolved");
                self.asset = Some(asset);
            }
            Err(e) => {
                tracing::warn!(%job_id, error = %e, "scene unavailable");
                self.scene_error = Some(e);
            }
        }
        match manifest {
            Ok(manifest) => self.manifest = Some(manifest),
            Err(e) => {
                tracing::warn!(%job_id, error = %e, "manifest unavailable");
                self.manifest_error = Some(e);
            }
        }
    }

    pub fn is_activated(&self) -> bool {
        self.activated
    }

    pub fn asset(&self) -> Option<&RenderableAsset> {
        self.asset.as_ref()
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    pub fn prompt(&self) -> Option<&str> {
        self.manifest.as_ref().and_then(|m| m.prompt.as_deref())
    }

    pub fn scene_error(&self) -> Option<&Error> {
        self.scene_error.as_ref()
    }

    pub fn manifest_error(&self) -> Option<&Error> {
        self.manifest_error.as_ref()
    }

    /// Hand the asset and prompt to `renderer`. Returns whether anything was
    /// loaded; without an asset the renderer is left alone.
    pub fn present<R: Renderer>(&self, renderer: &mut R) -> Result<bool, R::Error> {
        match &self.asset {
            Some(asset) => {
                renderer.load(asset, self.prompt())?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Follow the job's status alongside the view. The poller belongs to the
    /// session and stops with it.
    pub fn watch_status(
        &mut self,
        backend: Arc<dyn GenerationBackend>,
        interval: Duration,
    ) -> Result<mpsc::UnboundedReceiver<PollEvent>> {
        if let Some(mut previous) = self.poller.take() {
            previous.stop();
        }
        let mut poller = JobPoller::new(backend);
        let events = poller.start(self.job_id.clone(), interval)?;
        self.poller = Some(poller);
        Ok(events)
    }

    pub fn poller(&self) -> Option<&JobPoller> {
        self.poller.as_ref()
    }

    pub fn poller_mut(&mut self) -> Option<&mut JobPoller> {
        self.poller.as_mut()
    }

    /// Stop the owned poller and release the resolved asset. Idempotent.
    pub fn teardown(&mut self) {
        if let Some(poller) = self.poller.as_mut() {
            poller.stop();
        }
        if self.asset.take().is_some() {
            tracing::debug!(job_id = %self.job_id, "released scene");
        }
        self.manifest = None;
    }
}

impl Drop for ViewerSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
