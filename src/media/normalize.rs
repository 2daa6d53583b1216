// Response parsing and field-by-field normalization
//
// Providers may answer with raw JSON, JSON inside a Markdown code fence, or
// JSON embedded in prose. Anything that is not a JSON object is a parse error;
// anything inside the object that is missing or malformed only degrades that
// one field to its default.

use serde_json::Value;

use super::errors::ProviderError;
use super::models::{
    MediaRecord, RawMetadata, DEFAULT_AUDIO_FORMATS, DEFAULT_VIDEO_QUALITIES, PLACEHOLDER_AUTHOR,
    PLACEHOLDER_THUMBNAIL, PLACEHOLDER_TITLE, UNKNOWN_DURATION,
};

/// Parse a provider body into raw metadata
pub fn parse_structured_response(body: &str) -> Result<RawMetadata, ProviderError> {
    let json = extract_json_object(body)?;
    Ok(RawMetadata::from_json(&json))
}

/// First '{' that starts a complete JSON object. Text after the object is
/// ignored, so trailing prose may contain braces of its own.
fn extract_json_object(body: &str) -> Result<Value, ProviderError> {
    let mut first_error = None;

    for (start, _) in body.match_indices('{') {
        let mut values = serde_json::Deserializer::from_str(&body[start..]).into_iter::<Value>();
        match values.next() {
            Some(Ok(json)) if json.is_object() => return Ok(json),
            Some(Ok(_)) | None => {}
            Some(Err(e)) => {
                first_error.get_or_insert(e);
            }
        }
    }

    Err(match first_error {
        Some(e) => ProviderError::Parse(format!("Invalid JSON: {}", e)),
        None => ProviderError::Parse("No JSON object in response".to_string()),
    })
}

impl RawMetadata {
    /// Pick known fields out of a provider object, tolerating wrong types
    pub fn from_json(json: &Value) -> Self {
        Self {
            title: text_field(json, &["title"]),
            author: text_field(json, &["author", "uploader", "channel"]),
            duration: duration_field(&json["duration"]),
            thumbnail_url: text_field(json, &["thumbnail_url", "thumbnail"]),
            video_qualities: list_field(&json["video_qualities"]),
            audio_formats: list_field(&json["audio_formats"]),
        }
    }
}

fn text_field(json: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| json[*k].as_str())
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn duration_field(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => n.as_f64().filter(|secs| *secs >= 0.0).map(format_duration),
        _ => None,
    }
}

fn list_field(value: &Value) -> Option<Vec<String>> {
    let items = value.as_array()?;
    let mut labels: Vec<String> = Vec::new();
    for label in items.iter().filter_map(Value::as_str).map(str::trim) {
        if !label.is_empty() && !labels.iter().any(|l| l == label) {
            labels.push(label.to_string());
        }
    }
    Some(labels)
}

/// Seconds → "m:ss" or "h:mm:ss"
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.round() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// Apply per-field defaults, producing the immutable record
pub fn normalize(raw: RawMetadata) -> MediaRecord {
    let non_blank = |s: Option<String>| s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let non_empty = |list: Option<Vec<String>>, defaults: &[&str]| {
        let cleaned: Vec<String> = list
            .unwrap_or_default()
            .into_iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .fold(Vec::new(), |mut acc, l| {
                if !acc.contains(&l) {
                    acc.push(l);
                }
                acc
            });
        if cleaned.is_empty() {
            defaults.iter().map(|d| d.to_string()).collect()
        } else {
            cleaned
        }
    };

    MediaRecord {
        title: non_blank(raw.title).unwrap_or_else(|| PLACEHOLDER_TITLE.to_string()),
        author: non_blank(raw.author).unwrap_or_else(|| PLACEHOLDER_AUTHOR.to_string()),
        thumbnail_url: non_blank(raw.thumbnail_url).unwrap_or_else(|| PLACEHOLDER_THUMBNAIL.to_string()),
        duration: non_blank(raw.duration).unwrap_or_else(|| UNKNOWN_DURATION.to_string()),
        video_qualities: non_empty(raw.video_qualities, &DEFAULT_VIDEO_QUALITIES[..]),
        audio_formats: non_empty(raw.audio_formats, &DEFAULT_AUDIO_FORMATS[..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_only_response_gets_defaults() {
        let raw = parse_structured_response(r#"{"title":"Demo"}"#).unwrap();
        let record = normalize(raw);

        assert_eq!(record.title, "Demo");
        assert_eq!(record.author, PLACEHOLDER_AUTHOR);
        assert_eq!(record.thumbnail_url, PLACEHOLDER_THUMBNAIL);
        assert_eq!(record.duration, "N/A");
        assert_eq!(record.video_qualities, vec!["360p", "720p", "1080p"]);
        assert_eq!(record.audio_formats.len(), 3);
    }

    #[test]
    fn fenced_json_is_accepted() {
        let body = "Here you go:\n```json\n{\"title\": \"Clip\", \"author\": \"Ann\", \
                    \"video_qualities\": [\"480p\", \"1080p\"]}\n```";
        let record = normalize(parse_structured_response(body).unwrap());
        assert_eq!(record.title, "Clip");
        assert_eq!(record.author, "Ann");
        assert_eq!(record.video_qualities, vec!["480p", "1080p"]);
    }

    #[test]
    fn trailing_prose_with_braces_is_ignored() {
        let body = "Here is the data: {\"title\":\"Demo\"} Let me know if you need {more} fields.";
        let record = normalize(parse_structured_response(body).unwrap());
        assert_eq!(record.title, "Demo");
    }

    #[test]
    fn braces_in_leading_prose_are_skipped() {
        let body = "Fields use {name} syntax. {\"title\":\"Clip\",\"author\":\"Ann\"}";
        let record = normalize(parse_structured_response(body).unwrap());
        assert_eq!(record.title, "Clip");
        assert_eq!(record.author, "Ann");
    }

    #[test]
    fn malformed_fields_degrade_independently() {
        let body = r#"{
            "title": "   ",
            "author": 42,
            "duration": 3725,
            "thumbnail_url": "https://img.example/t.jpg",
            "video_qualities": "720p",
            "audio_formats": ["", "MP3", "MP3", 7]
        }"#;
        let record = normalize(parse_structured_response(body).unwrap());

        assert_eq!(record.title, PLACEHOLDER_TITLE);
        assert_eq!(record.author, PLACEHOLDER_AUTHOR);
        assert_eq!(record.duration, "1:02:05");
        assert_eq!(record.thumbnail_url, "https://img.example/t.jpg");
        assert_eq!(record.video_qualities.len(), 3);
        assert_eq!(record.audio_formats, vec!["MP3"]);
    }

    #[test]
    fn empty_lists_fall_back_to_defaults() {
        let record = normalize(
            parse_structured_response(r#"{"video_qualities": [], "audio_formats": []}"#).unwrap(),
        );
        assert!(!record.video_qualities.is_empty());
        assert!(!record.audio_formats.is_empty());
    }

    #[test]
    fn non_object_responses_are_parse_errors() {
        for body in ["", "not json at all", "[1, 2, 3]", "{ broken"] {
            assert!(
                matches!(parse_structured_response(body), Err(ProviderError::Parse(_))),
                "body {:?} should fail",
                body
            );
        }
    }

    #[test]
    fn durations_are_formatted() {
        assert_eq!(format_duration(59.0), "0:59");
        assert_eq!(format_duration(212.4), "3:32");
        assert_eq!(format_duration(3600.0), "1:00:00");
    }
}
