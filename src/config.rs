// Application configuration: TOML file, then environment, then command-line flags

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::downloader::errors::DownloadError;
use crate::downloader::models::{default_output_dir, NetworkConfig};
use crate::downloader::utils::non_empty;

pub const ENV_BACKEND_URL: &str = "VIDGRAB_BACKEND_URL";
pub const ENV_OUTPUT_DIR: &str = "VIDGRAB_OUTPUT_DIR";
pub const ENV_PROXY: &str = "VIDGRAB_PROXY";

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5001";

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the backend serving /api/info and /api/download
    pub backend_url: String,
    /// Directory downloads are saved into
    pub output_dir: PathBuf,
    /// Proxy and timeouts
    pub network: NetworkConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            output_dir: default_output_dir(),
            network: NetworkConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration.
    ///
    /// An explicitly given file must parse. The default file is optional and
    /// falls back to defaults with a warning when it is broken.
    pub fn load(explicit: Option<&Path>) -> Result<Self, DownloadError> {
        if let Some(path) = explicit {
            let config = Self::load_from_file(path)?;
            info!("Loaded config from {}", path.display());
            return Ok(config);
        }

        match Self::config_path() {
            Some(path) if path.exists() => match Self::load_from_file(&path) {
                Ok(config) => {
                    info!("Loaded config from {}", path.display());
                    Ok(config)
                }
                Err(e) => {
                    warn!("{}. Using defaults.", e);
                    Ok(Self::default())
                }
            },
            _ => Ok(Self::default()),
        }
    }

    /// Default config location: `<config dir>/vidgrab/config.toml`
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("vidgrab").join("config.toml"))
    }

    pub fn load_from_file(path: &Path) -> Result<Self, DownloadError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DownloadError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| {
            DownloadError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an environment-like lookup
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let value = |key: &str| lookup(key).and_then(|v| non_empty(&v).map(str::to_string));

        if let Some(url) = value(ENV_BACKEND_URL) {
            self.backend_url = url;
        }
        if let Some(dir) = value(ENV_OUTPUT_DIR) {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(proxy) = value(ENV_PROXY) {
            self.network.proxy = Some(proxy);
        }
    }
}
