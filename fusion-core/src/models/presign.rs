use std::fmt;

use serde::{Deserialize, Serialize};

/// Which artifact of a job is being resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Manifest,
    Scene,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manifest => "manifest",
            Self::Scene => "scene",
        }
    }

    /// Name of the presigned field that points at this artifact.
    pub fn url_field(&self) -> &'static str {
        match self {
            Self::Manifest => "manifest_url",
            Self::Scene => "scene_url",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time-limited locations of a job's artifacts.
///
/// A missing field means the backend has not produced that artifact (yet); it is
/// not an error by itself. Locations expire, so they are fetched fresh for every
/// resolution and never cached.
///
/// Fields other than the two locations (expiry hints, further artifacts) are kept
/// in `extra` so the document survives a decode and re-encode unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresignedLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PresignedLocation {
    /// The location for `kind`, treating an empty string the same as absence.
    pub fn url_for(&self, kind: AssetKind) -> Option<&str> {
        let url = match kind {
            AssetKind::Manifest => self.manifest_url.as_deref(),
            AssetKind::Scene => self.scene_url.as_deref(),
        };
        url.filter(|u| !u.trim().is_empty())
    }
}
