// Metadata resolver - URL in, normalized MediaRecord out
//
// One provider call per resolution, bounded by a timeout. No retries and no
// history writes; the session decides what to do with the result.

use std::time::Duration;

use super::errors::ResolutionError;
use super::models::MediaRecord;
use super::normalize::normalize;
use super::traits::MetadataProvider;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct MetadataResolver {
    provider: Box<dyn MetadataProvider>,
    timeout: Duration,
}

impl MetadataResolver {
    pub fn new(provider: Box<dyn MetadataProvider>) -> Self {
        Self {
            provider,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub async fn resolve(&self, url: &str) -> Result<MediaRecord, ResolutionError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ResolutionError::EmptyUrl);
        }

        log::info!("[Resolver] Resolving {} via {}", url, self.provider.name());

        let raw = match tokio::time::timeout(self.timeout, self.provider.fetch(url)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                log::warn!("[Resolver] {} failed: {}", self.provider.name(), e);
                return Err(e.into());
            }
            Err(_) => {
                log::warn!("[Resolver] Timed out after {:?}", self.timeout);
                return Err(ResolutionError::Timeout(self.timeout.as_secs()));
            }
        };

        let record = normalize(raw);
        log::debug!(
            "[Resolver] '{}' with {} video / {} audio formats",
            record.title,
            record.video_qualities.len(),
            record.audio_formats.len()
        );
        Ok(record)
    }
}
