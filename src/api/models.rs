use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::Browser;
use crate::utils::format_megabytes;

/// Body of `/api/info` and `/api/download_mp3`
#[derive(Debug, Clone, Serialize)]
pub struct MediaBody<'a> {
    pub url: &'a str,
    pub browser: Browser,
}

/// Body of `/api/download`
#[derive(Debug, Clone, Serialize)]
pub struct VideoDownloadBody<'a> {
    pub url: &'a str,
    pub browser: Browser,
    pub format_id: &'a str,
}

/// Response from the /info endpoint
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct VideoInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub formats: Vec<FormatDescriptor>,
}

impl VideoInfo {
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Unknown title")
    }

    pub fn duration_secs(&self) -> Option<u64> {
        self.duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| d.round() as u64)
    }
}

/// One downloadable quality/container option.
///
/// Older backends send `format_id`/`resolution`, newer ones `id`/`res`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FormatDescriptor {
    #[serde(default, alias = "format_id")]
    pub id: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default, alias = "resolution")]
    pub res: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub filesize: Option<f64>,
}

impl FormatDescriptor {
    pub fn label(&self) -> String {
        let mut label = String::new();
        if let Some(kind) = self.kind.as_deref().filter(|k| !k.is_empty()) {
            label.push_str(kind);
            label.push(' ');
        }
        label.push_str(&format!("[{}] ", self.ext.as_deref().unwrap_or("?")));
        label.push_str(self.res.as_deref().unwrap_or("Audio Only"));
        if let Some(note) = self.note.as_deref().filter(|n| !n.is_empty()) {
            label.push_str(" - ");
            label.push_str(note);
        }
        if let Some(size) = self.filesize.filter(|s| *s > 0.0) {
            label.push_str(&format!(" ({})", format_megabytes(size as u64)));
        }
        label
    }
}

/// Response from the /download and /download_mp3 endpoints
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DownloadResponse {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    /// Server-side path, sent by backends that save locally
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
}

/// Response from the /progress endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProgressResponse {
    pub progress: String,
}

/// Body of any non-success response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<Value>,
}

impl ErrorBody {
    pub fn detail_message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            Value::Null => None,
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
        }
    }
}
