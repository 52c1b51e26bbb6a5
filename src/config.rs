use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;
use url::Url;

use crate::api::ApiConfig;

pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Where the backend lives relative to this machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deployment {
    /// Backend runs on this machine and can read local browser cookies.
    Local,
    /// Hosted backend with no access to the caller's machine.
    Remote,
}

impl Deployment {
    /// Loopback hosts are local, anything else is treated as hosted.
    pub fn detect(base_url: &str) -> Self {
        let host = Url::parse(base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_owned));
        match host.as_deref() {
            Some("localhost") | Some("127.0.0.1") | Some("[::1]") | Some("::1") => {
                Deployment::Local
            }
            _ => Deployment::Remote,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Deployment::Remote)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub deployment: Deployment,
    pub interactive_save: bool,
    pub download_dir: PathBuf,
    pub poll_interval: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        let api = ApiConfig::default();
        let deployment = Deployment::detect(&api.base_url);
        Self {
            api,
            deployment,
            interactive_save: true,
            download_dir: default_download_dir(),
            poll_interval: POLL_INTERVAL,
        }
    }
}

fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("Downloads"))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Applies `DOWNLOADER_*` overrides on top of the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(base) = lookup("DOWNLOADER_API_BASE").filter(|b| !b.trim().is_empty()) {
            config.api.base_url = base.trim().trim_end_matches('/').to_string();
            config.deployment = Deployment::detect(&config.api.base_url);
        }

        if let Some(raw) = lookup("DOWNLOADER_REMOTE") {
            match parse_flag(&raw) {
                Some(true) => config.deployment = Deployment::Remote,
                Some(false) => config.deployment = Deployment::Local,
                None => warn!(value = %raw, "ignoring unreadable DOWNLOADER_REMOTE"),
            }
        }

        if let Some(raw) = lookup("DOWNLOADER_SAVE_DIALOG") {
            match parse_flag(&raw) {
                Some(flag) => config.interactive_save = flag,
                None => warn!(value = %raw, "ignoring unreadable DOWNLOADER_SAVE_DIALOG"),
            }
        }

        if let Some(dir) = lookup("DOWNLOADER_DOWNLOAD_DIR").filter(|d| !d.trim().is_empty()) {
            config.download_dir = PathBuf::from(dir);
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn loopback_backends_are_local() {
        assert_eq!(Deployment::detect("http://127.0.0.1:8000"), Deployment::Local);
        assert_eq!(Deployment::detect("http://localhost"), Deployment::Local);
        assert_eq!(Deployment::detect("http://[::1]:8000"), Deployment::Local);
        assert_eq!(
            Deployment::detect("https://downloader.onrender.com"),
            Deployment::Remote
        );
    }

    #[test]
    fn defaults_point_at_local_backend() {
        let config = AppConfig::from_lookup(lookup(&[]));
        assert_eq!(config.api.base_url, "http://127.0.0.1:8000");
        assert_eq!(config.deployment, Deployment::Local);
        assert!(config.interactive_save);
        assert_eq!(config.poll_interval, Duration::from_millis(500));
    }

    #[test]
    fn hosted_base_switches_to_remote() {
        let config = AppConfig::from_lookup(lookup(&[(
            "DOWNLOADER_API_BASE",
            "https://downloader.example.com/",
        )]));
        assert_eq!(config.api.base_url, "https://downloader.example.com");
        assert!(config.deployment.is_remote());
    }

    #[test]
    fn explicit_flags_override_detection() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DOWNLOADER_API_BASE", "https://downloader.example.com"),
            ("DOWNLOADER_REMOTE", "false"),
            ("DOWNLOADER_SAVE_DIALOG", "0"),
            ("DOWNLOADER_DOWNLOAD_DIR", "/tmp/media"),
        ]));
        assert_eq!(config.deployment, Deployment::Local);
        assert!(!config.interactive_save);
        assert_eq!(config.download_dir, PathBuf::from("/tmp/media"));
    }

    #[test]
    fn unreadable_flags_are_ignored() {
        let config = AppConfig::from_lookup(lookup(&[("DOWNLOADER_SAVE_DIALOG", "maybe")]));
        assert!(config.interactive_save);
    }
}
