use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Browser whose cookies the backend should borrow when extracting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    None,
    Chrome,
    Edge,
    Firefox,
    Brave,
    Opera,
    Safari,
}

impl Browser {
    pub const ALL: [Browser; 7] = [
        Browser::None,
        Browser::Chrome,
        Browser::Edge,
        Browser::Firefox,
        Browser::Brave,
        Browser::Opera,
        Browser::Safari,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::None => "none",
            Browser::Chrome => "chrome",
            Browser::Edge => "edge",
            Browser::Firefox => "firefox",
            Browser::Brave => "brave",
            Browser::Opera => "opera",
            Browser::Safari => "safari",
        }
    }
}

impl fmt::Display for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Browser::None => f.write_str("No cookies (default)"),
            other => write!(f, "Use {} cookies", crate::utils::capitalize(other.as_str())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadMode {
    Video,
    Audio,
}

/// One user-triggered download. Never mutated after it is handed to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub browser: Browser,
    pub format_id: Option<String>,
    pub mode: DownloadMode,
}

impl DownloadRequest {
    pub fn video(url: impl Into<String>, browser: Browser, format_id: Option<String>) -> Self {
        Self {
            url: url.into(),
            browser,
            format_id,
            mode: DownloadMode::Video,
        }
    }

    pub fn audio(url: impl Into<String>, browser: Browser) -> Self {
        Self {
            url: url.into(),
            browser,
            format_id: None,
            mode: DownloadMode::Audio,
        }
    }

    /// Format sent to the video endpoint; `best` when nothing was picked.
    pub fn effective_format(&self) -> &str {
        match self.format_id.as_deref() {
            Some(id) if !id.trim().is_empty() => id,
            _ => "best",
        }
    }
}

/// Latest progress reading from the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressState {
    pub label: String,
    pub fraction: Option<f32>,
}

fn percent_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").ok()).as_ref()
}

impl ProgressState {
    /// Keeps the raw text as the label. A fraction is only derived when the
    /// text carries a `%` marker with a readable number in front of it.
    pub fn parse(raw: &str) -> Self {
        let fraction = if raw.contains('%') {
            percent_regex()
                .and_then(|re| re.captures(raw))
                .and_then(|caps| caps[1].parse::<f32>().ok())
                .map(|pct| (pct / 100.0).clamp(0.0, 1.0))
        } else {
            None
        };

        Self {
            label: raw.to_string(),
            fraction,
        }
    }

    pub fn has_percent(&self) -> bool {
        self.label.contains('%')
    }
}

/// Successful resolution of a download call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredFile {
    pub file_url: String,
    pub file_name: String,
}

/// What a successful download call handed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// File is served over HTTP and still has to be saved here.
    Served(DeliveredFile),
    /// Backend already wrote the file to its own disk at this path.
    SavedOnServer(String),
}

/// How the save flow ended. Exactly one per delivered file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(PathBuf),
    Cancelled,
    FellBack(PathBuf),
    SavedOnServer(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPhase {
    Idle,
    Downloading,
    AwaitingSavePath,
    Completed,
    Cancelled,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_percent_strings() {
        let state = ProgressState::parse(" 45.3%");
        assert_eq!(state.label, " 45.3%");
        assert!((state.fraction.unwrap() - 0.453).abs() < 1e-6);

        assert_eq!(ProgressState::parse("100%").fraction, Some(1.0));
    }

    #[test]
    fn text_without_percent_has_no_fraction() {
        let state = ProgressState::parse("Converting (MP3)...");
        assert_eq!(state.fraction, None);
        assert!(!state.has_percent());
    }

    #[test]
    fn unreadable_percent_keeps_label_only() {
        let state = ProgressState::parse("N/A%");
        assert!(state.has_percent());
        assert_eq!(state.fraction, None);
    }

    #[test]
    fn video_request_defaults_to_best_format() {
        let req = DownloadRequest::video("https://x", Browser::None, None);
        assert_eq!(req.effective_format(), "best");

        let req = DownloadRequest::video("https://x", Browser::None, Some("137".into()));
        assert_eq!(req.effective_format(), "137");
    }

    #[test]
    fn browser_serializes_lowercase() {
        let json = serde_json::to_string(&Browser::Chrome).unwrap();
        assert_eq!(json, "\"chrome\"");
        assert_eq!(Browser::default(), Browser::None);
    }
}
