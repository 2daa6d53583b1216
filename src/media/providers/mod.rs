// Metadata providers

pub mod http;
pub mod ytdlp;

use std::time::Duration;

pub use http::HttpMetadataProvider;
pub use ytdlp::YtDlpMetadataProvider;

use crate::config::{ProviderConfig, ProviderKind};
use crate::media::errors::ConfigError;
use crate::media::traits::MetadataProvider;

/// Build the provider named by the config
pub fn from_config(config: &ProviderConfig) -> Result<Box<dyn MetadataProvider>, ConfigError> {
    match config.kind {
        ProviderKind::Http => {
            let endpoint = config
                .endpoint
                .as_deref()
                .ok_or_else(|| ConfigError::Provider("http provider needs an endpoint".to_string()))?;

            let provider = HttpMetadataProvider::new(
                endpoint,
                Duration::from_secs(config.timeout_seconds.max(1)),
                config.proxy.as_deref(),
            )
            .map_err(|e| ConfigError::Provider(e.to_string()))?
            .with_api_key(config.api_key.clone())
            .with_instruction(config.instruction.clone());

            Ok(Box::new(provider))
        }
        ProviderKind::Ytdlp => Ok(Box::new(YtDlpMetadataProvider::new(
            config.ytdlp_path.as_deref(),
            config.proxy.clone(),
            config.timeout_seconds,
        ))),
    }
}
