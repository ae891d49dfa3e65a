//! Error taxonomy shared by the gateway client, proxy, poller and viewer.

use fusion_core::{AssetKind, EmptyJobId};
use thiserror::Error;

/// Everything that can go wrong between a job id and a renderable asset.
///
/// Status codes and bodies received from the backend or the asset store are kept
/// verbatim so the proxy can forward them unchanged. The type is `Clone` so the
/// poller can hold the latest failure as observable state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// Missing or malformed input; never retried.
    #[error("{0}")]
    InvalidRequest(String),

    /// The backend could not be reached.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend answered with a non-success status.
    #[error("backend returned {status}: {body}")]
    BackendError { status: u16, body: String },

    /// The backend does not know the job or its artifacts yet.
    #[error("not found: {body}")]
    NotFound { body: String },

    /// The presigned document has no location for this artifact.
    #[error("{} missing", .0.url_field())]
    AssetNotReady(AssetKind),

    /// The presigned location itself answered with a non-success status.
    #[error("upstream returned {status}: {body}")]
    UpstreamFetchError { status: u16, body: String },

    /// The presigned location could not be reached.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// A success response whose body did not match the expected shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// HTTP status this error maps to when surfaced by the proxy.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            Self::NotFound { .. } | Self::AssetNotReady(_) => 404,
            Self::BackendError { status, .. } | Self::UpstreamFetchError { status, .. } => *status,
            Self::BackendUnavailable(_)
            | Self::UpstreamUnavailable(_)
            | Self::MalformedResponse(_) => 500,
        }
    }

    /// Artifact not produced yet. Expected while a job is still running.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::AssetNotReady(_))
    }
}

impl From<EmptyJobId> for Error {
    fn from(e: EmptyJobId) -> Self {
        Self::InvalidRequest(e.to_string())
    }
}
