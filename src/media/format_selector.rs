// FormatSelector - tracks the one format chosen out of the resolved record
//
// Seeding from a record replaces the options and resets the choice to the
// record's default format. Selection is only possible among the options of
// the record that was seeded last.

use super::errors::InvalidFormatError;
use super::models::{FormatKind, MediaRecord, SelectionState};

#[derive(Debug, Clone, Default)]
pub struct FormatSelector {
    video: Vec<String>,
    audio: Vec<String>,
    selected: Option<String>,
}

impl FormatSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace options with the record's and reset the selection
    pub fn seed(&mut self, record: &MediaRecord) {
        self.video = record.video_qualities.clone();
        self.audio = record.audio_formats.clone();
        self.selected = record.default_format().map(str::to_string);
    }

    /// Forget options and selection
    pub fn clear(&mut self) {
        self.video.clear();
        self.audio.clear();
        self.selected = None;
    }

    pub fn select(&mut self, label: &str) -> Result<(), InvalidFormatError> {
        if self.kind_of(label).is_none() {
            return Err(InvalidFormatError {
                label: label.to_string(),
            });
        }
        self.selected = Some(label.to_string());
        Ok(())
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn state(&self) -> SelectionState {
        SelectionState {
            selected_format: self.selected.clone(),
        }
    }

    pub fn kind_of(&self, label: &str) -> Option<FormatKind> {
        if self.video.iter().any(|v| v == label) {
            Some(FormatKind::Video)
        } else if self.audio.iter().any(|a| a == label) {
            Some(FormatKind::Audio)
        } else {
            None
        }
    }

    /// yt-dlp format spec for a video quality label ("720p", "4K", "best")
    pub fn format_spec(label: &str) -> String {
        match Self::label_height(label) {
            Some(height) => format!(
                "bv*[height<={h}]+ba/b[height<={h}]/bv*+ba/best",
                h = height
            ),
            None => "bv*+ba/best".to_string(),
        }
    }

    /// Pixel height named by a video label
    pub fn label_height(label: &str) -> Option<u32> {
        let lower = label.trim().to_lowercase();
        match lower.as_str() {
            "4k" | "uhd" => return Some(2160),
            "2k" | "qhd" => return Some(1440),
            "hd" => return Some(720),
            "full hd" | "fhd" => return Some(1080),
            _ => {}
        }

        let digits: String = lower.chars().take_while(|c| c.is_ascii_digit()).collect();
        let rest = &lower[digits.len()..];
        if digits.is_empty() || !rest.starts_with('p') {
            return None;
        }
        digits.parse().ok()
    }

    /// yt-dlp audio codec and optional bitrate (kbps) for an audio label
    /// such as "MP3 320kbps" or "AAC"
    pub fn audio_target(label: &str) -> (String, Option<u32>) {
        let lower = label.to_lowercase();
        let codec = match lower.split_whitespace().next().unwrap_or("") {
            "mp3" => "mp3",
            "aac" => "aac",
            "m4a" => "m4a",
            "opus" => "opus",
            "vorbis" | "ogg" => "vorbis",
            "flac" => "flac",
            "wav" => "wav",
            "alac" => "alac",
            _ => "best",
        };

        let bitrate = lower
            .split_whitespace()
            .skip(1)
            .find_map(|part| part.strip_suffix("kbps").and_then(|n| n.parse().ok()));

        (codec.to_string(), bitrate)
    }
}
