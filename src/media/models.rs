// Common data models for resolution, history and downloads

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const PLACEHOLDER_TITLE: &str = "Untitled media";
pub const PLACEHOLDER_AUTHOR: &str = "Unknown author";
pub const PLACEHOLDER_THUMBNAIL: &str = "https://placehold.co/640x360?text=No+Preview";
pub const UNKNOWN_DURATION: &str = "N/A";

pub const DEFAULT_VIDEO_QUALITIES: [&str; 3] = ["360p", "720p", "1080p"];
pub const DEFAULT_AUDIO_FORMATS: [&str; 3] = ["MP3 128kbps", "MP3 320kbps", "AAC 256kbps"];

/// Provider answer before normalization. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub duration: Option<String>,
    pub thumbnail_url: Option<String>,
    pub video_qualities: Option<Vec<String>>,
    pub audio_formats: Option<Vec<String>>,
}

/// Canonical, presentable metadata for one URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub title: String,
    pub author: String,
    pub thumbnail_url: String,
    pub duration: String,
    pub video_qualities: Vec<String>,
    pub audio_formats: Vec<String>,
}

impl MediaRecord {
    /// Video labels first, then audio labels
    pub fn formats(&self) -> impl Iterator<Item = &str> {
        self.video_qualities
            .iter()
            .chain(self.audio_formats.iter())
            .map(String::as_str)
    }

    pub fn offers(&self, label: &str) -> bool {
        self.formats().any(|f| f == label)
    }

    /// Format picked when the record is first shown: the second video
    /// quality if there is one, else the first video quality, else the first
    /// audio format
    pub fn default_format(&self) -> Option<&str> {
        self.video_qualities
            .get(1)
            .or_else(|| self.video_qualities.first())
            .or_else(|| self.audio_formats.first())
            .map(String::as_str)
    }

    pub fn kind_of(&self, label: &str) -> Option<FormatKind> {
        if self.video_qualities.iter().any(|v| v == label) {
            Some(FormatKind::Video)
        } else if self.audio_formats.iter().any(|a| a == label) {
            Some(FormatKind::Audio)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatKind {
    Video,
    Audio,
}

/// One past resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub url: String,
    pub title: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

/// Currently chosen format, observed by the presentation layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionState {
    pub selected_format: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    Idle,
    Running,
    Completed,
    Failed,
}

impl DownloadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// State of the orchestrator's current (or last) transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadTask {
    pub id: String,
    pub format: Option<String>,
    pub status: DownloadStatus,
    /// 0-100
    pub progress: f32,
    pub message: String,
    pub error: Option<String>,
}

impl DownloadTask {
    pub fn idle() -> Self {
        Self {
            id: String::new(),
            format: None,
            status: DownloadStatus::Idle,
            progress: 0.0,
            message: String::new(),
            error: None,
        }
    }

    pub fn running(id: String, format: String) -> Self {
        Self {
            id,
            message: format!("Starting {} download...", format),
            format: Some(format),
            status: DownloadStatus::Running,
            progress: 0.0,
            error: None,
        }
    }
}

impl Default for DownloadTask {
    fn default() -> Self {
        Self::idle()
    }
}

/// Download progress event payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub task_id: String,
    pub percent: f32,
    pub status: DownloadStatus,
    pub message: String,
}

impl From<&DownloadTask> for DownloadProgress {
    fn from(task: &DownloadTask) -> Self {
        Self {
            task_id: task.id.clone(),
            percent: task.progress,
            status: task.status,
            message: task.message.clone(),
        }
    }
}

/// What a transfer backend needs to fetch one format of one URL
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub url: String,
    pub format: String,
    pub kind: FormatKind,
    pub output_dir: PathBuf,
}

/// Read-only view of a whole session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub pending_url: String,
    pub record: Option<MediaRecord>,
    pub selection: SelectionState,
    pub download: DownloadTask,
    pub history: Vec<HistoryEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(video: &[&str], audio: &[&str]) -> MediaRecord {
        MediaRecord {
            title: "t".to_string(),
            author: "a".to_string(),
            thumbnail_url: String::new(),
            duration: UNKNOWN_DURATION.to_string(),
            video_qualities: video.iter().map(|s| s.to_string()).collect(),
            audio_formats: audio.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn default_format_prefers_second_video_quality() {
        assert_eq!(record(&["360p", "720p"], &["MP3"]).default_format(), Some("720p"));
        assert_eq!(record(&["360p"], &["MP3"]).default_format(), Some("360p"));
        assert_eq!(record(&[], &["MP3", "AAC"]).default_format(), Some("MP3"));
    }

    #[test]
    fn kind_of_distinguishes_lists() {
        let r = record(&["720p"], &["MP3"]);
        assert_eq!(r.kind_of("720p"), Some(FormatKind::Video));
        assert_eq!(r.kind_of("MP3"), Some(FormatKind::Audio));
        assert_eq!(r.kind_of("4K"), None);
        assert!(!r.offers("4K"));
    }
}
