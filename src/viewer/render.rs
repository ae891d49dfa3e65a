use std::path::{Path, PathBuf};

use super::RenderableAsset;

/// The rendering engine, as seen from a viewer session.
///
/// Only called when there is an asset to show; a session without one simply
/// never calls `load`.
pub trait Renderer {
    type Error;

    fn load(&mut self, asset: &RenderableAsset, prompt: Option<&str>) -> Result<(), Self::Error>;
}

/// Writes the scene to disk for an external viewer to pick up.
#[derive(Debug, Clone)]
pub struct FileRenderer {
    path: PathBuf,
    prompt: Option<String>,
    written: u64,
}

impl FileRenderer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            prompt: None,
            written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Prompt of the last loaded scene, if its manifest had one.
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }
}

impl Renderer for FileRenderer {
    type Error = std::io::Error;

    fn load(&mut self, asset: &RenderableAsset, prompt: Option<&str>) -> Result<(), Self::Error> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, asset.bytes())?;
        self.written = asset.len() as u64;
        self.prompt = prompt.map(str::to_string);
        tracing::info!(path = %self.path.display(), bytes = self.written, "scene written");
        Ok(())
    }
}
