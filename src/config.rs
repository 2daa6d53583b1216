// Application configuration
//
// Loaded from a JSON file; every section and field has a default, so an empty
// object (or no file at all) is a valid configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::media::errors::ConfigError;
use crate::media::history::HISTORY_LIMIT;
use crate::media::providers::http::DEFAULT_INSTRUCTION;
use crate::media::transfers::simulated::DEFAULT_MAX_STEP;

pub const APP_DIR_NAME: &str = "media-link-resolver";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Http,
    Ytdlp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Simulated,
    Ytdlp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub instruction: String,
    pub timeout_seconds: u64,
    /// HTTP/SOCKS proxy for the provider and yt-dlp
    pub proxy: Option<String>,
    pub ytdlp_path: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Ytdlp,
            endpoint: None,
            api_key: None,
            instruction: DEFAULT_INSTRUCTION.to_string(),
            timeout_seconds: 30,
            proxy: None,
            ytdlp_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub backend: BackendKind,
    pub tick_interval_ms: u64,
    pub max_step: f32,
    pub settle_delay_ms: u64,
    pub output_dir: PathBuf,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Simulated,
            tick_interval_ms: 400,
            max_step: DEFAULT_MAX_STEP,
            settle_delay_ms: 800,
            output_dir: dirs::download_dir().unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Directory of the JSON key-value store
    pub dir: PathBuf,
    pub limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
            limit: HISTORY_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub download: DownloadConfig,
    pub history: HistoryConfig,
}

impl AppConfig {
    /// Read a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let mut config: Self = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.history.limit = config.history.limit.clamp(1, HISTORY_LIMIT);

        log::info!("[Config] Loaded {}", path.display());
        Ok(config)
    }

    /// Like [`AppConfig::load`], falling back to defaults when the file is
    /// missing or invalid
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("[Config] {} not found, using defaults", path.display());
            return Self::default();
        }

        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("[Config] {}; using defaults", e);
                Self::default()
            }
        }
    }

    /// Override provider settings from the environment
    pub fn apply_env_overrides(mut self) -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        if let Some(endpoint) = var("MEDIA_RESOLVER_ENDPOINT") {
            self.provider.endpoint = Some(endpoint);
            self.provider.kind = ProviderKind::Http;
        }
        if let Some(api_key) = var("MEDIA_RESOLVER_API_KEY") {
            self.provider.api_key = Some(api_key);
        }
        if let Some(proxy) = var("MEDIA_RESOLVER_PROXY") {
            self.provider.proxy = Some(proxy);
        }
        if let Some(path) = var("YTDLP_PATH") {
            self.provider.ytdlp_path = Some(path);
        }
        self
    }

    pub fn with_provider_kind(mut self, kind: ProviderKind) -> Self {
        self.provider.kind = kind;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.provider.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.provider.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.provider.timeout_seconds = seconds;
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.provider.proxy = proxy;
        self
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.download.backend = backend;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download.output_dir = dir.into();
        self
    }

    pub fn with_history_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.history.dir = dir.into();
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history.limit = limit.clamp(1, HISTORY_LIMIT);
        self
    }
}

/// `<data dir>/media-link-resolver`, or `./media-link-resolver` when the OS
/// has no data dir
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}
