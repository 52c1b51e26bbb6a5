use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::StreamExt;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::domain::{AppError, DeliveredFile, SaveOutcome};
use crate::utils::sanitize_filename;

/// Lets the user pick where a delivered file goes. `None` means they declined.
pub trait SaveDialog: Send + Sync {
    fn choose_destination<'a>(&'a self, suggested_name: &'a str) -> BoxFuture<'a, Option<PathBuf>>;
}

/// Saves a delivered file without asking for a path.
pub trait FallbackDownloader: Send + Sync {
    fn download<'a>(
        &'a self,
        api: &'a ApiClient,
        file: &'a DeliveredFile,
    ) -> BoxFuture<'a, Result<PathBuf, AppError>>;
}

/// What the host can do, probed once at startup.
#[derive(Clone)]
pub enum SaveCapability {
    InteractiveSaveCapable(Arc<dyn SaveDialog>),
    FallbackOnly,
}

impl SaveCapability {
    pub fn probe(enabled: bool) -> Self {
        if enabled && has_desktop_session() {
            SaveCapability::InteractiveSaveCapable(Arc::new(NativeSaveDialog))
        } else {
            SaveCapability::FallbackOnly
        }
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
fn has_desktop_session() -> bool {
    std::env::var_os("DISPLAY").is_some() || std::env::var_os("WAYLAND_DISPLAY").is_some()
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
fn has_desktop_session() -> bool {
    true
}

pub struct NativeSaveDialog;

impl SaveDialog for NativeSaveDialog {
    fn choose_destination<'a>(&'a self, suggested_name: &'a str) -> BoxFuture<'a, Option<PathBuf>> {
        Box::pin(async move {
            rfd::AsyncFileDialog::new()
                .set_title("Save media file")
                .set_file_name(suggested_name)
                .add_filter("Media file", &["mp4", "mp3", "webm"])
                .save_file()
                .await
                .map(|handle| handle.path().to_path_buf())
        })
    }
}

/// Streams the file into a fixed directory, the way a browser drops files
/// into its downloads folder.
pub struct DirectDownloader {
    dir: PathBuf,
}

impl DirectDownloader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn stream_to_disk(&self, api: &ApiClient, file: &DeliveredFile) -> Result<PathBuf, SaveError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = unique_path(&self.dir, &suggested_name(file));
        let (total, stream) = api.download_file_stream(&file.file_url).await?;
        let mut stream = Box::pin(stream);

        let mut out = tokio::fs::File::create(&path).await?;
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            out.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        out.sync_all().await?;

        debug!(written, ?total, path = %path.display(), "direct download finished");
        Ok(path)
    }
}

impl FallbackDownloader for DirectDownloader {
    fn download<'a>(
        &'a self,
        api: &'a ApiClient,
        file: &'a DeliveredFile,
    ) -> BoxFuture<'a, Result<PathBuf, AppError>> {
        Box::pin(async move {
            self.stream_to_disk(api, file).await.map_err(|e| {
                warn!(error = %e, dir = %self.dir.display(), "direct download failed");
                AppError::SaveFailed
            })
        })
    }
}

/// Why writing a delivered file failed. Logged, never shown to the user.
#[derive(Debug, Error)]
enum SaveError {
    #[error("could not fetch delivered file: {0}")]
    Fetch(#[from] ApiError),

    #[error("could not write file: {0}")]
    Write(#[from] std::io::Error),
}

pub struct SaveDelivery {
    capability: SaveCapability,
    fallback: Arc<dyn FallbackDownloader>,
}

impl SaveDelivery {
    pub fn new(capability: SaveCapability, fallback: Arc<dyn FallbackDownloader>) -> Self {
        Self {
            capability,
            fallback,
        }
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self.capability, SaveCapability::InteractiveSaveCapable(_))
    }

    /// Ends in exactly one of: interactive save, cancellation, fallback.
    pub async fn deliver(
        &self,
        api: &ApiClient,
        file: &DeliveredFile,
    ) -> Result<SaveOutcome, AppError> {
        if let SaveCapability::InteractiveSaveCapable(dialog) = &self.capability {
            match save_interactively(dialog.as_ref(), api, file).await {
                Ok(Some(path)) => {
                    info!(path = %path.display(), "saved to chosen location");
                    return Ok(SaveOutcome::Saved(path));
                }
                Ok(None) => {
                    info!("save dialog dismissed");
                    return Ok(SaveOutcome::Cancelled);
                }
                Err(e) => warn!(error = %e, "interactive save failed, using direct download"),
            }
        }

        let path = self.fallback.download(api, file).await?;
        info!(path = %path.display(), "saved to downloads folder");
        Ok(SaveOutcome::FellBack(path))
    }
}

async fn save_interactively(
    dialog: &dyn SaveDialog,
    api: &ApiClient,
    file: &DeliveredFile,
) -> Result<Option<PathBuf>, SaveError> {
    let bytes = api.fetch_bytes(&file.file_url).await?;

    let Some(path) = dialog.choose_destination(&suggested_name(file)).await else {
        return Ok(None);
    };

    tokio::fs::write(&path, &bytes).await?;
    Ok(Some(path))
}

fn suggested_name(file: &DeliveredFile) -> String {
    let name = sanitize_filename(&file.file_name);
    if name.is_empty() {
        "download".to_string()
    } else {
        name
    }
}

/// `name`, or `stem (n).ext` when that is already taken.
fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };

    (1..)
        .map(|n| match ext {
            Some(ext) => dir.join(format!("{} ({}).{}", stem, n, ext)),
            None => dir.join(format!("{} ({})", stem, n)),
        })
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}
