use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::download_controller::DownloadEvent;
use crate::api::ApiClient;
use crate::domain::ProgressState;

/// Background task reading `/api/progress` while a download call is pending.
///
/// The first read happens one period after spawning. Failed reads are logged
/// and skipped. [`ProgressPoller::stop`] cancels the task and waits for it, so
/// once it returns no further read is issued and no further
/// [`DownloadEvent::Progress`] is sent.
pub struct ProgressPoller {
    token: CancellationToken,
    handle: Option<JoinHandle<u32>>,
}

impl ProgressPoller {
    pub fn spawn(
        api: ApiClient,
        url: String,
        period: Duration,
        events: UnboundedSender<DownloadEvent>,
    ) -> Self {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut polls = 0u32;

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                polls += 1;
                let reading = tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    reading = api.progress(&url) => reading,
                };

                match reading {
                    Ok(raw) => {
                        if events.send(DownloadEvent::Progress(ProgressState::parse(&raw))).is_err() {
                            debug!("progress receiver dropped, stopping poller");
                            break;
                        }
                    }
                    Err(e) => debug!(error = %e, "progress poll failed"),
                }
            }

            polls
        });

        Self {
            token,
            handle: Some(handle),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Stops polling and returns how many reads were issued.
    pub async fn stop(mut self) -> u32 {
        self.token.cancel();
        match self.handle.take() {
            Some(handle) => handle.await.unwrap_or_else(|e| {
                warn!(error = %e, "progress poller did not shut down cleanly");
                0
            }),
            None => 0,
        }
    }
}

impl Drop for ProgressPoller {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
