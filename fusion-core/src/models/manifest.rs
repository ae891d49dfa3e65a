use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Metadata written by the backend next to a completed job's scene.
///
/// Only the fields below are interpreted; anything else the backend adds is kept
/// in `extra` so the document can be passed along unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    /// The prompt the job was created with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Artifact name (e.g. `scene_glb`) to storage path.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub artifacts: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub provenance: serde_json::Map<String, serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Manifest {
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_manifest() {
        let raw = br#"{
            "job_id": "abc123",
            "prompt": "misty cyberpunk alley",
            "artifacts": {"scene_glb": "/tmp/scene.glb"},
            "provenance": {"pipeline": "stub-fallback", "version": "0.1.0"},
            "seed": 42
        }"#;
        let manifest = Manifest::from_slice(raw).unwrap();

        assert_eq!(manifest.prompt.as_deref(), Some("misty cyberpunk alley"));
        assert_eq!(manifest.artifacts["scene_glb"], "/tmp/scene.glb");
        assert_eq!(manifest.provenance["pipeline"], "stub-fallback");
        assert_eq!(manifest.extra["seed"], 42);
    }

    #[test]
    fn tolerates_minimal_document() {
        let manifest = Manifest::from_slice(b"{}").unwrap();
        assert!(manifest.prompt.is_none());
        assert!(manifest.artifacts.is_empty());
    }
}
