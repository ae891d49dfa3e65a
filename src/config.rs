//! Process configuration.
//!
//! Layered, later wins: built-in defaults, the JSON config file
//! (`<config dir>/fusion-viewer/config.json` unless a path is given), then
//! environment variables. CLI flags are applied on top by the binary.
//!
//! | Variable                      | Field              |
//! |-------------------------------|--------------------|
//! | `API_BASE`                    | `api_base`         |
//! | `FUSION_VIEWER_BIND`          | `bind`             |
//! | `FUSION_VIEWER_PORT`          | `port`             |
//! | `FUSION_VIEWER_PROXY`         | `proxy_base`       |
//! | `FUSION_VIEWER_POLL_MS`       | `poll_interval_ms` |
//! | `FUSION_VIEWER_CORS_ORIGINS`  | `cors_origins` (comma-separated) |

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const APP_NAME: &str = "fusion-viewer";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the generation backend.
    pub api_base: String,
    /// Address the proxy binds to.
    pub bind: String,
    pub port: u16,
    /// Where client commands find a running proxy.
    pub proxy_base: String,
    pub poll_interval_ms: u64,
    /// Allowed CORS origins. `None` means permissive.
    pub cors_origins: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8000".to_string(),
            bind: "127.0.0.1".to_string(),
            port: 3000,
            proxy_base: "http://127.0.0.1:3000".to_string(),
            poll_interval_ms: 1000,
            cors_origins: None,
        }
    }
}

impl Config {
    /// Defaults, then the config file, then the environment.
    ///
    /// An explicitly given `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any variable lookup. Unparseable numbers are ignored.
    pub fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("API_BASE") {
            self.api_base = v;
        }
        if let Some(v) = lookup("FUSION_VIEWER_BIND") {
            self.bind = v;
        }
        if let Some(port) = lookup("FUSION_VIEWER_PORT").and_then(|s| s.parse().ok()) {
            self.port = port;
        }
        if let Some(v) = lookup("FUSION_VIEWER_PROXY") {
            self.proxy_base = v;
        }
        if let Some(ms) = lookup("FUSION_VIEWER_POLL_MS").and_then(|s| s.parse().ok()) {
            self.poll_interval_ms = ms;
        }
        if let Some(v) = lookup("FUSION_VIEWER_CORS_ORIGINS") {
            let origins: Vec<String> = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            self.cors_origins = (!origins.is_empty()).then_some(origins);
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// `<config dir>/fusion-viewer/config.json`, if the platform has a config dir.
pub fn default_path() -> Option<PathBuf> {
    let mut path = dirs::config_dir()?;
    path.push(APP_NAME);
    path.push(CONFIG_FILE);
    Some(path)
}
