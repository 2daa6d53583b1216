// Metadata lookup through an HTTP information service
//
// POSTs `{ "url", "instruction" }` and expects a JSON object back, possibly
// wrapped in a code fence or prose (see normalize::parse_structured_response).

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::media::errors::ProviderError;
use crate::media::models::RawMetadata;
use crate::media::normalize::parse_structured_response;
use crate::media::traits::MetadataProvider;

pub const DEFAULT_INSTRUCTION: &str = "Describe the media at this URL. Answer with a single JSON object \
with the fields title, author, duration, thumbnail_url, video_qualities (array of labels like \"720p\") \
and audio_formats (array of labels like \"MP3 320kbps\").";

#[derive(Serialize)]
struct LookupRequest<'a> {
    url: &'a str,
    instruction: &'a str,
}

pub struct HttpMetadataProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    instruction: String,
}

impl HttpMetadataProvider {
    /// Build a provider for `endpoint`. An invalid proxy URL is an error
    /// rather than a silent direct connection.
    pub fn new(endpoint: impl Into<String>, timeout: Duration, proxy: Option<&str>) -> Result<Self, ProviderError> {
        let endpoint = endpoint.into();
        if endpoint.trim().is_empty() {
            return Err(ProviderError::Request("No provider endpoint configured".to_string()));
        }

        let mut builder = reqwest::Client::builder().timeout(timeout);
        if let Some(proxy_url) = proxy.map(str::trim).filter(|p| !p.is_empty()) {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| ProviderError::Request(format!("Invalid proxy URL {}: {}", proxy_url, e)))?;
            builder = builder.proxy(proxy);
            log::debug!("[HttpProvider] Using proxy {}", proxy_url);
        }

        let client = builder
            .build()
            .map_err(|e| ProviderError::Request(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            api_key: None,
            instruction: DEFAULT_INSTRUCTION.to_string(),
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.trim().is_empty());
        self
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        let instruction = instruction.into();
        if !instruction.trim().is_empty() {
            self.instruction = instruction;
        }
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl MetadataProvider for HttpMetadataProvider {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self, url: &str) -> Result<RawMetadata, ProviderError> {
        log::debug!("[HttpProvider] POST {} for {}", self.endpoint, url);

        let mut request = self.client.post(&self.endpoint).json(&LookupRequest {
            url,
            instruction: &self.instruction,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let body: String = body.chars().take(200).collect();
            log::warn!("[HttpProvider] {} answered HTTP {}", self.endpoint, status.as_u16());
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_structured_response(&body)
    }
}
