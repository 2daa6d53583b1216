// Metadata lookup by running `yt-dlp --dump-json`
//
// Heights are snapped to standard quality labels and audio-only codecs are
// turned into audio format labels. Anything missing is left for the
// normalization step to default.

use async_trait::async_trait;
use serde_json::Value;

use crate::media::diagnostics::diagnose_failure;
use crate::media::errors::ProviderError;
use crate::media::models::RawMetadata;
use crate::media::normalize::format_duration;
use crate::media::traits::MetadataProvider;
use crate::media::utils::{find_ytdlp, run_output_with_timeout};

const STANDARD_HEIGHTS: [u32; 8] = [144, 240, 360, 480, 720, 1080, 1440, 2160];

pub struct YtDlpMetadataProvider {
    ytdlp_path: String,
    proxy: Option<String>,
    timeout_secs: u64,
}

impl YtDlpMetadataProvider {
    pub fn new(ytdlp_path: Option<&str>, proxy: Option<String>, timeout_secs: u64) -> Self {
        let ytdlp_path = find_ytdlp(ytdlp_path);
        log::debug!("[YtDlpProvider] Using {}", ytdlp_path);
        Self {
            ytdlp_path,
            proxy: proxy.filter(|p| !p.trim().is_empty()),
            timeout_secs: timeout_secs.max(1),
        }
    }

    fn build_args(&self, url: &str) -> Vec<String> {
        let mut args: Vec<String> = ["--dump-json", "--no-playlist", "--no-warnings", "--skip-download"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        if let Some(proxy) = &self.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }

        args.push(url.to_string());
        args
    }

    /// Map yt-dlp's JSON dump into raw metadata
    pub fn parse_dump(stdout: &[u8]) -> Result<RawMetadata, ProviderError> {
        let json_str = String::from_utf8_lossy(stdout);
        let json: Value = serde_json::from_str(json_str.trim())
            .map_err(|e| ProviderError::Parse(format!("Invalid JSON: {}", e)))?;

        if !json.is_object() {
            return Err(ProviderError::Parse("yt-dlp output is not a JSON object".to_string()));
        }

        let text = |key: &str| json[key].as_str().map(str::to_string);
        let formats = json["formats"].as_array().map(Vec::as_slice).unwrap_or(&[]);

        let video_qualities = video_labels(formats);
        let audio_formats = audio_labels(formats);

        Ok(RawMetadata {
            title: text("title"),
            author: text("uploader").or_else(|| text("channel")),
            duration: json["duration"].as_f64().map(format_duration),
            thumbnail_url: text("thumbnail"),
            video_qualities: (!video_qualities.is_empty()).then_some(video_qualities),
            audio_formats: (!audio_formats.is_empty()).then_some(audio_formats),
        })
    }
}

/// Nearest standard height within 10%, if any
fn snap_height(height: u32) -> Option<u32> {
    STANDARD_HEIGHTS
        .iter()
        .copied()
        .filter(|target| {
            let tolerance = *target as f64 * 0.1;
            (height as f64 - *target as f64).abs() <= tolerance
        })
        .min_by_key(|target| target.abs_diff(height))
}

fn video_labels(formats: &[Value]) -> Vec<String> {
    let mut heights: Vec<u32> = formats
        .iter()
        .filter(|f| f["vcodec"].as_str().map_or(false, |v| v != "none"))
        .filter_map(|f| f["height"].as_u64())
        .filter_map(|h| u32::try_from(h).ok())
        .filter_map(snap_height)
        .collect();

    heights.sort_unstable();
    heights.dedup();
    heights.into_iter().map(|h| format!("{}p", h)).collect()
}

fn audio_labels(formats: &[Value]) -> Vec<String> {
    let mut codecs: Vec<&'static str> = Vec::new();

    for f in formats {
        let audio_only = f["acodec"].as_str().map_or(false, |a| a != "none")
            && f["vcodec"].as_str().map_or(true, |v| v == "none");
        if !audio_only {
            continue;
        }

        let acodec = f["acodec"].as_str().unwrap_or("").to_lowercase();
        let label = if acodec.starts_with("mp4a") || acodec.starts_with("aac") {
            "M4A"
        } else if acodec.starts_with("opus") {
            "OPUS"
        } else if acodec.starts_with("vorbis") {
            "VORBIS"
        } else if acodec.starts_with("mp3") {
            "MP3"
        } else {
            continue;
        };

        if !codecs.contains(&label) {
            codecs.push(label);
        }
    }

    // Any audio stream can be converted to MP3
    if !codecs.is_empty() {
        codecs.retain(|c| *c != "MP3");
        codecs.insert(0, "MP3");
    }

    codecs.into_iter().map(str::to_string).collect()
}

#[async_trait]
impl MetadataProvider for YtDlpMetadataProvider {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn fetch(&self, url: &str) -> Result<RawMetadata, ProviderError> {
        let args = self.build_args(url);
        let output = run_output_with_timeout(&self.ytdlp_path, &args, self.timeout_secs).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if let Some(reason) = diagnose_failure(&stderr) {
                log::warn!("[YtDlpProvider] {}: {}", reason.description(), url);
            }
            return Err(ProviderError::from(stderr));
        }

        Self::parse_dump(&output.stdout)
    }
}
