use crate::api::VideoInfo;
use crate::application::{DownloadController, DownloadEvent};
use crate::config::AppConfig;
use crate::domain::{AppError, DownloadRequest, SaveOutcome};
use crate::ui::{DownloadMessage, DownloadView};
use futures::stream::BoxStream;
use futures::StreamExt;
use iced::Task;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::debug;

pub struct DownloadApp {
    view: DownloadView,
    controller: DownloadController,
}

impl Default for DownloadApp {
    fn default() -> Self {
        Self::new(&AppConfig::from_env())
    }
}

impl DownloadApp {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            view: DownloadView::default(),
            controller: DownloadController::from_config(config),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    UiMessage(DownloadMessage),
    /// Reported by the controller while an operation runs
    Controller(DownloadEvent),
    InfoFetched(Result<VideoInfo, AppError>),
    /// The download future returned; the UI already followed its events
    DownloadSettled(Result<SaveOutcome, AppError>),
    FolderOpened,
}

/// Turns the controller's event channel into a message stream that ends
/// once every sender is gone.
fn event_stream(rx: UnboundedReceiver<DownloadEvent>) -> BoxStream<'static, Message> {
    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| (Message::Controller(event), rx))
    })
    .boxed()
}

fn start_download(app: &mut DownloadApp, request: DownloadRequest) -> Task<Message> {
    app.view.begin_download();

    let controller = app.controller.clone();
    let (tx, rx) = mpsc::unbounded_channel();

    Task::batch([
        Task::perform(
            async move { controller.start_download(request, tx).await },
            Message::DownloadSettled,
        ),
        Task::stream(event_stream(rx)),
    ])
}

pub fn update(app: &mut DownloadApp, message: Message) -> Task<Message> {
    match message {
        Message::UiMessage(ui_msg) => {
            app.view.update(ui_msg.clone());

            match ui_msg {
                DownloadMessage::FetchPressed if app.view.can_fetch() => {
                    app.view.begin_fetch();

                    let controller = app.controller.clone();
                    let url = app.view.url.clone();
                    let browser = app.view.browser;
                    let (tx, rx) = mpsc::unbounded_channel();

                    return Task::batch([
                        Task::perform(
                            async move { controller.fetch_info(&url, browser, &tx).await },
                            Message::InfoFetched,
                        ),
                        Task::stream(event_stream(rx)),
                    ]);
                }
                DownloadMessage::DownloadVideoPressed if app.view.can_download() => {
                    let request = DownloadRequest::video(
                        app.view.url.clone(),
                        app.view.browser,
                        app.view.selected_format(),
                    );
                    return start_download(app, request);
                }
                DownloadMessage::DownloadAudioPressed if app.view.can_download() => {
                    let request = DownloadRequest::audio(app.view.url.clone(), app.view.browser);
                    return start_download(app, request);
                }
                DownloadMessage::OpenFolderPressed => {
                    let controller = app.controller.clone();
                    return Task::perform(
                        async move { controller.open_folder().await },
                        |_| Message::FolderOpened,
                    );
                }
                _ => {}
            }
        }
        Message::Controller(event) => match event {
            DownloadEvent::BrowserReset(browser) => app.view.browser = browser,
            DownloadEvent::Status(status) => app.view.set_status(status),
            DownloadEvent::Progress(state) => app.view.apply_progress(&state),
            DownloadEvent::Delivered(_) => app.view.show_delivered(),
            DownloadEvent::Completed(outcome) => app.view.finish(&outcome),
            DownloadEvent::Failed(message) => app.view.fail(message),
        },
        Message::InfoFetched(result) => match result {
            Ok(info) => app.view.show_info(info),
            Err(e) => app.view.show_fetch_error(e.to_string()),
        },
        Message::DownloadSettled(result) => {
            debug!(?result, "download operation settled");
        }
        Message::FolderOpened => {}
    }
    Task::none()
}

pub fn view(app: &DownloadApp) -> iced::Element<'_, Message> {
    app.view.view().map(Message::UiMessage)
}
