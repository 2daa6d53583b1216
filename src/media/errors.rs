// Error types for resolution, selection, downloads and persistence

use thiserror::Error;

use super::diagnostics::diagnose_failure;

/// Failure reported by a metadata provider
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// Provider did not answer in time
    #[error("Provider did not respond in time")]
    Timeout,

    /// Transport-level failure (connection, DNS, TLS, spawn)
    #[error("Provider request failed: {0}")]
    Request(String),

    /// Provider answered with a non-success HTTP status
    #[error("Provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Response was not a structured object
    #[error("Unparsable provider response: {0}")]
    Parse(String),

    /// yt-dlp or another required tool is missing
    #[error("Tool not found: {0}")]
    ToolNotFound(String),
}

// Classifies raw tool stderr into a provider error
impl From<String> for ProviderError {
    fn from(s: String) -> Self {
        let lower = s.to_lowercase();

        if lower.contains("timeout") || lower.contains("timed out") {
            return Self::Timeout;
        }

        if lower.contains("command not found") || lower.contains("no such file") {
            return Self::ToolNotFound(s);
        }

        if lower.contains("json") || lower.contains("parse") {
            return Self::Parse(s);
        }

        Self::Request(s)
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Request(e.to_string())
        }
    }
}

/// Why a URL could not be turned into a media record
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolutionError {
    #[error("Please enter a URL")]
    EmptyUrl,

    #[error("Metadata lookup timed out after {0}s")]
    Timeout(u64),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl ResolutionError {
    /// User-facing suggestion for recovering from this failure
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::EmptyUrl => None,
            Self::Timeout(_) => Some("The lookup took too long. Check your connection and try again."),
            Self::Provider(e) => diagnose_failure(&e.to_string()).map(|r| r.suggestion()),
        }
    }

    /// Whether resolving the same URL again later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::EmptyUrl => false,
            Self::Timeout(_) => true,
            Self::Provider(e) => diagnose_failure(&e.to_string()).map_or(false, |r| r.is_retryable()),
        }
    }
}

/// Selection of a label the current media does not offer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Format '{label}' is not available for this media")]
pub struct InvalidFormatError {
    pub label: String,
}

/// Operation not allowed in the current session/orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidStateError {
    /// A download is running
    #[error("A download is already in progress")]
    Busy,

    #[error("No media has been resolved yet")]
    NoMediaResolved,

    #[error("No format selected")]
    NoFormatSelected,
}

/// History changed in memory but could not be persisted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("History was not saved: {message}")]
pub struct PersistenceWarning {
    pub message: String,
}

impl From<StorageError> for PersistenceWarning {
    fn from(e: StorageError) -> Self {
        Self {
            message: e.to_string(),
        }
    }
}

/// Key-value store failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(String),

    #[error("Storage is unavailable: {0}")]
    Unavailable(String),
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Transfer backend failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Download failed: {0}")]
    Execution(String),

    #[error("Download I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for DownloadError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Configuration could not be loaded or applied
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid provider setup: {0}")]
    Provider(String),
}

/// Any error surfaced by the session command surface
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    InvalidFormat(#[from] InvalidFormatError),

    #[error(transparent)]
    InvalidState(#[from] InvalidStateError),
}
