// Provider, transfer and progress-sink trait definitions

use async_trait::async_trait;

use super::errors::{DownloadError, ProviderError};
use super::models::{DownloadProgress, RawMetadata, TransferRequest};
use super::orchestrator::ProgressReporter;

/// External information service that describes a URL
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Name of the provider (for logging)
    fn name(&self) -> &'static str;

    /// Fetch raw, possibly partial metadata for a URL
    async fn fetch(&self, url: &str) -> Result<RawMetadata, ProviderError>;
}

/// Moves the bytes of one format, reporting progress as it goes
#[async_trait]
pub trait TransferBackend: Send + Sync {
    /// Name of the backend (for logging)
    fn name(&self) -> &'static str;

    /// Run the transfer to completion. Returning `Ok` completes the task,
    /// returning `Err` fails it.
    async fn transfer(
        &self,
        request: TransferRequest,
        progress: ProgressReporter,
    ) -> Result<(), DownloadError>;
}

/// Receives every progress change of the orchestrator
pub trait ProgressSink: Send + Sync {
    fn emit(&self, progress: DownloadProgress);
}

/// Sink that drops events; observers use the watch channel instead
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _progress: DownloadProgress) {}
}

/// Progress emitter for the desktop shell
#[cfg(feature = "desktop")]
pub struct ProgressEmitter {
    app_handle: tauri::AppHandle,
}

#[cfg(feature = "desktop")]
impl ProgressEmitter {
    pub fn new(app_handle: tauri::AppHandle) -> Self {
        Self { app_handle }
    }
}

#[cfg(feature = "desktop")]
impl ProgressSink for ProgressEmitter {
    fn emit(&self, progress: DownloadProgress) {
        use tauri::Emitter;

        if let Err(e) = self.app_handle.emit("download-progress", progress) {
            log::debug!("[Progress] Failed to emit event: {}", e);
        }
    }
}
