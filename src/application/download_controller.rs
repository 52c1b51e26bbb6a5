use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::progress_poller::ProgressPoller;
use super::save_delivery::{DirectDownloader, SaveCapability, SaveDelivery};
use crate::{
    api::{ApiClient, ApiError, VideoInfo},
    config::{AppConfig, Deployment, POLL_INTERVAL},
    domain::{
        AppError, Browser, DeliveredFile, Delivery, DownloadMode, DownloadRequest, ProgressState,
        SaveOutcome,
    },
};

pub const INFO_FALLBACK: &str = "Failed to fetch video information";
pub const VIDEO_FALLBACK: &str = "Download failed";
pub const AUDIO_FALLBACK: &str = "Audio conversion failed";

pub const STATUS_STARTING_VIDEO: &str = "Starting extraction...";
pub const STATUS_STARTING_AUDIO: &str = "Starting audio extraction...";
pub const STATUS_DELIVERING: &str = "Delivering file...";
pub const STATUS_AWAITING_SAVE: &str = "Waiting for a save location...";

/// Everything the presentation layer gets told while an operation runs.
///
/// For a download the last event is always `Completed` or `Failed`, and no
/// `Progress` follows it.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEvent {
    BrowserReset(Browser),
    Status(String),
    Progress(ProgressState),
    Delivered(DeliveredFile),
    Completed(SaveOutcome),
    Failed(String),
}

pub type EventSender = UnboundedSender<DownloadEvent>;

fn notify(events: &EventSender, event: DownloadEvent) {
    if events.send(event).is_err() {
        debug!("event receiver dropped");
    }
}

fn user_message(error: &ApiError, fallback: &str) -> String {
    error.detail().unwrap_or(fallback).to_string()
}

/// Single outstanding request per controller; a newer one cancels the older poller.
#[derive(Default)]
struct ActiveSlot {
    generation: u64,
    poller: Option<CancellationToken>,
}

/// Clears the slot on drop unless a newer download has claimed it, so an
/// abandoned `start_download` future does not leave the controller busy.
struct SlotRelease {
    active: Arc<Mutex<ActiveSlot>>,
    generation: u64,
}

impl Drop for SlotRelease {
    fn drop(&mut self) {
        let mut slot = self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if slot.generation == self.generation {
            if let Some(poller) = slot.poller.take() {
                poller.cancel();
            }
        }
    }
}

#[derive(Clone)]
pub struct DownloadController {
    api_client: ApiClient,
    deployment: Deployment,
    delivery: Arc<SaveDelivery>,
    poll_interval: Duration,
    active: Arc<Mutex<ActiveSlot>>,
}

impl DownloadController {
    pub fn new(api_client: ApiClient, deployment: Deployment, delivery: SaveDelivery) -> Self {
        Self {
            api_client,
            deployment,
            delivery: Arc::new(delivery),
            poll_interval: POLL_INTERVAL,
            active: Arc::new(Mutex::new(ActiveSlot::default())),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let capability = SaveCapability::probe(config.interactive_save);
        let delivery = SaveDelivery::new(
            capability,
            Arc::new(DirectDownloader::new(config.download_dir.clone())),
        );
        info!(
            base_url = %config.api.base_url,
            deployment = ?config.deployment,
            interactive_save = delivery.is_interactive(),
            "download controller ready"
        );

        Self::new(ApiClient::new(config.api.clone()), config.deployment, delivery)
            .with_poll_interval(config.poll_interval)
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, ActiveSlot> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn claim_slot(&self, poller: CancellationToken) -> SlotRelease {
        let mut slot = self.lock_slot();
        if let Some(previous) = slot.poller.replace(poller) {
            info!("new download started, cancelling previous progress polling");
            previous.cancel();
        }
        slot.generation += 1;
        SlotRelease {
            active: self.active.clone(),
            generation: slot.generation,
        }
    }

    /// Looks up metadata and formats for `url`.
    ///
    /// A hosted backend cannot read this machine's browser cookies, so any
    /// browser other than `none` is refused locally and the selector is reset.
    pub async fn fetch_info(
        &self,
        url: &str,
        browser: Browser,
        events: &EventSender,
    ) -> Result<VideoInfo, AppError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(AppError::InvalidInput);
        }

        if self.deployment.is_remote() && browser != Browser::None {
            warn!(browser = browser.as_str(), "browser cookies requested against a remote backend");
            notify(events, DownloadEvent::BrowserReset(Browser::None));
            return Err(AppError::RemoteCookiesUnavailable);
        }

        info!(%url, browser = browser.as_str(), "fetching video info");
        self.api_client.info(url, browser).await.map_err(|e| {
            warn!(error = %e, "info request failed");
            AppError::InfoFetch(user_message(&e, INFO_FALLBACK))
        })
    }

    /// Runs one download end to end: backend call with progress polling,
    /// then the save flow.
    pub async fn start_download(
        &self,
        request: DownloadRequest,
        events: EventSender,
    ) -> Result<SaveOutcome, AppError> {
        let url = request.url.trim().to_string();
        if url.is_empty() {
            notify(&events, DownloadEvent::Failed(AppError::InvalidInput.to_string()));
            return Err(AppError::InvalidInput);
        }

        let starting = match request.mode {
            DownloadMode::Video => STATUS_STARTING_VIDEO,
            DownloadMode::Audio => STATUS_STARTING_AUDIO,
        };
        notify(&events, DownloadEvent::Status(starting.to_string()));

        let poller = ProgressPoller::spawn(
            self.api_client.clone(),
            url.clone(),
            self.poll_interval,
            events.clone(),
        );
        let slot = self.claim_slot(poller.token());

        info!(%url, mode = ?request.mode, "download requested");
        let call = match request.mode {
            DownloadMode::Video => self
                .api_client
                .download(&url, request.browser, request.effective_format())
                .await
                .map_err(|e| user_message(&e, VIDEO_FALLBACK)),
            DownloadMode::Audio => self
                .api_client
                .download_mp3(&url, request.browser)
                .await
                .map_err(|e| user_message(&e, AUDIO_FALLBACK)),
        };

        let polls = poller.stop().await;
        drop(slot);
        debug!(polls, "progress polling stopped");

        let file = match call {
            Ok(Delivery::Served(file)) => file,
            Ok(Delivery::SavedOnServer(path)) => {
                info!(%path, "backend saved the file itself");
                let outcome = SaveOutcome::SavedOnServer(path);
                notify(&events, DownloadEvent::Completed(outcome.clone()));
                return Ok(outcome);
            }
            Err(message) => {
                warn!(%message, "download failed");
                notify(&events, DownloadEvent::Failed(message.clone()));
                return Err(AppError::Download(message));
            }
        };

        notify(&events, DownloadEvent::Delivered(file.clone()));
        notify(&events, DownloadEvent::Status(STATUS_AWAITING_SAVE.to_string()));

        match self.delivery.deliver(&self.api_client, &file).await {
            Ok(outcome) => {
                notify(&events, DownloadEvent::Completed(outcome.clone()));
                Ok(outcome)
            }
            Err(e) => {
                warn!(error = %e, "saving delivered file failed");
                notify(&events, DownloadEvent::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Best effort; the backend's answer is ignored.
    pub async fn open_folder(&self) {
        if let Err(e) = self.api_client.open_folder().await {
            warn!(error = %e, "could not open downloads folder");
        }
    }
}
