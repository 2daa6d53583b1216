// Failure diagnostics - turns provider/tool error text into a reason and a hint
//
// Providers report failures as free text (HTTP bodies, yt-dlp stderr).
// Matching happens most-specific first so that e.g. a DRM message mentioning
// "premium" is not reported as a generic 403.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// DRM, Premium, rentals - no workaround
    DrmProtected,
    PrivateMedia,
    Unavailable,
    AgeRestricted,
    GeoBlocked,
    RateLimited,
    BotDetection,
    Forbidden,
    NetworkTimeout,
    UnsupportedUrl,
    Unknown,
}

impl FailureReason {
    /// Whether resolving the same URL again later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::BotDetection | Self::Forbidden | Self::NetworkTimeout | Self::Unknown
        )
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::DrmProtected => "DRM-protected content",
            Self::PrivateMedia => "Private media",
            Self::Unavailable => "Media unavailable",
            Self::AgeRestricted => "Age-restricted content",
            Self::GeoBlocked => "Geographic restriction",
            Self::RateLimited => "Rate limited",
            Self::BotDetection => "Bot detection triggered",
            Self::Forbidden => "Access denied (HTTP 403)",
            Self::NetworkTimeout => "Network timeout",
            Self::UnsupportedUrl => "Unsupported URL",
            Self::Unknown => "Unknown failure",
        }
    }

    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::DrmProtected => "This media is DRM-protected and cannot be downloaded.",
            Self::PrivateMedia => "This media is private. You need access from the uploader.",
            Self::Unavailable => "This media was removed or is no longer available.",
            Self::AgeRestricted => "This media is age-restricted. Sign in with an adult account and try again.",
            Self::GeoBlocked => "This media is not available in your region. Try a proxy in an allowed region.",
            Self::RateLimited => "Too many requests. Wait 10-15 minutes and try again.",
            Self::BotDetection => "The site flagged the request as automated. Try again later or use a proxy.",
            Self::Forbidden => "Access was denied. Try again later or use a proxy/VPN.",
            Self::NetworkTimeout => "Network timeout. Check your connection and try again.",
            Self::UnsupportedUrl => "This URL is not supported. Check that it points to a media page.",
            Self::Unknown => "Something went wrong. Check the URL and try again.",
        }
    }
}

/// Analyze error text and return the most specific reason
pub fn diagnose_failure(error: &str) -> Option<FailureReason> {
    if error.trim().is_empty() {
        return None;
    }

    let lower = error.to_lowercase();
    let has = |patterns: &[&str]| patterns.iter().any(|p| lower.contains(p));

    let reason = if has(&["drm", "widevine", "playready", "fairplay", "requires purchase", "rental"]) {
        FailureReason::DrmProtected
    } else if has(&["private video", "video is private", "granted access"]) {
        FailureReason::PrivateMedia
    } else if has(&["video unavailable", "has been removed", "no longer available", "is unavailable", "http error 404", " 404:", "404 not found"]) {
        FailureReason::Unavailable
    } else if has(&["age-restricted", "confirm your age"]) {
        FailureReason::AgeRestricted
    } else if has(&["not available in your country", "blocked in your country", "geo-restrict", "geo restrict"]) {
        FailureReason::GeoBlocked
    } else if has(&["429", "rate limit", "too many requests"]) {
        FailureReason::RateLimited
    } else if has(&["captcha", "unusual traffic", "not a bot", "automated"]) {
        FailureReason::BotDetection
    } else if has(&["403", "forbidden"]) {
        FailureReason::Forbidden
    } else if has(&["timeout", "timed out", "did not respond", "connection refused", "unreachable"]) {
        FailureReason::NetworkTimeout
    } else if has(&["unsupported url", "invalid url"]) {
        FailureReason::UnsupportedUrl
    } else {
        FailureReason::Unknown
    };

    Some(reason)
}
