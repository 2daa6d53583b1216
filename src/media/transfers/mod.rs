// Transfer backends

pub mod simulated;
pub mod ytdlp;

pub use simulated::SimulatedTransfer;
pub use ytdlp::YtDlpTransfer;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{BackendKind, DownloadConfig, ProviderConfig};
use crate::media::traits::TransferBackend;
use crate::media::utils::find_ytdlp;

/// Build the transfer backend named by the config
pub fn from_config(download: &DownloadConfig, provider: &ProviderConfig) -> Arc<dyn TransferBackend> {
    match download.backend {
        BackendKind::Simulated => Arc::new(SimulatedTransfer::new(
            Duration::from_millis(download.tick_interval_ms),
            download.max_step,
            Duration::from_millis(download.settle_delay_ms),
        )),
        BackendKind::Ytdlp => Arc::new(YtDlpTransfer::new(
            find_ytdlp(provider.ytdlp_path.as_deref()),
            provider.proxy.clone().filter(|p| !p.trim().is_empty()),
        )),
    }
}
