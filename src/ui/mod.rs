use std::fmt;

use iced::{
    widget::{button, column, pick_list, progress_bar, row, text, text_input, Column, Space},
    Element, Length,
};

use crate::api::VideoInfo;
use crate::application::download_controller::{STATUS_AWAITING_SAVE, STATUS_DELIVERING};
use crate::domain::{Browser, DownloadPhase, ProgressState, SaveOutcome};
use crate::utils::{capitalize, format_duration};

/// Entry of the quality selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityOption {
    pub id: String,
    pub label: String,
}

impl QualityOption {
    pub fn best() -> Self {
        Self {
            id: "best".to_string(),
            label: "Best automatic quality".to_string(),
        }
    }
}

impl fmt::Display for QualityOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Main view state
pub struct DownloadView {
    pub url: String,
    pub browser: Browser,
    pub qualities: Vec<QualityOption>,
    pub quality: Option<QualityOption>,
    pub info: Option<VideoInfo>,
    pub error: Option<String>,
    pub is_fetching: bool,
    pub phase: DownloadPhase,
    pub progress_visible: bool,
    pub progress_bar: f32,
    pub progress_text: String,
    pub progress_failed: bool,
    pub show_open_folder: bool,
}

impl Default for DownloadView {
    fn default() -> Self {
        Self {
            url: String::new(),
            browser: Browser::None,
            qualities: Vec::new(),
            quality: None,
            info: None,
            error: None,
            is_fetching: false,
            phase: DownloadPhase::Idle,
            progress_visible: false,
            progress_bar: 0.0,
            progress_text: String::new(),
            progress_failed: false,
            show_open_folder: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum DownloadMessage {
    UrlChanged(String),
    BrowserSelected(Browser),
    QualitySelected(QualityOption),
    FetchPressed,
    DownloadVideoPressed,
    DownloadAudioPressed,
    OpenFolderPressed,
}

impl DownloadView {
    pub fn update(&mut self, message: DownloadMessage) {
        match message {
            DownloadMessage::UrlChanged(url) => {
                self.url = url;
            }
            DownloadMessage::BrowserSelected(browser) => {
                self.browser = browser;
            }
            DownloadMessage::QualitySelected(quality) => {
                self.quality = Some(quality);
            }
            DownloadMessage::FetchPressed
            | DownloadMessage::DownloadVideoPressed
            | DownloadMessage::DownloadAudioPressed
            | DownloadMessage::OpenFolderPressed => {
                // Will be handled by the app
            }
        }
    }

    pub fn is_downloading(&self) -> bool {
        matches!(
            self.phase,
            DownloadPhase::Downloading | DownloadPhase::AwaitingSavePath
        )
    }

    pub fn can_fetch(&self) -> bool {
        !self.is_fetching && !self.is_downloading()
    }

    pub fn can_download(&self) -> bool {
        self.info.is_some() && !self.is_fetching && !self.is_downloading()
    }

    pub fn selected_format(&self) -> Option<String> {
        self.quality.as_ref().map(|q| q.id.clone())
    }

    pub fn begin_fetch(&mut self) {
        self.error = None;
        self.info = None;
        self.is_fetching = true;
        self.show_open_folder = false;
        self.progress_visible = false;
    }

    pub fn show_info(&mut self, info: VideoInfo) {
        self.is_fetching = false;
        self.qualities = std::iter::once(QualityOption::best())
            .chain(info.formats.iter().map(|f| QualityOption {
                id: f.id.clone(),
                label: f.label(),
            }))
            .collect();
        self.quality = self.qualities.first().cloned();
        self.info = Some(info);
    }

    /// Shows an error and hides any earlier result.
    pub fn show_fetch_error(&mut self, message: String) {
        self.is_fetching = false;
        self.info = None;
        self.qualities.clear();
        self.quality = None;
        self.error = Some(message);
    }

    pub fn begin_download(&mut self) {
        self.error = None;
        self.phase = DownloadPhase::Downloading;
        self.progress_visible = true;
        self.progress_bar = 0.0;
        self.progress_failed = false;
        self.show_open_folder = false;
    }

    pub fn set_status(&mut self, status: String) {
        if status == STATUS_AWAITING_SAVE {
            self.phase = DownloadPhase::AwaitingSavePath;
        }
        self.progress_text = status;
    }

    /// The text always follows the backend; the bar only moves on a percentage.
    pub fn apply_progress(&mut self, state: &ProgressState) {
        if !self.is_downloading() {
            return;
        }
        self.progress_text = state.label.clone();
        if let Some(fraction) = state.fraction.filter(|_| state.has_percent()) {
            self.progress_bar = fraction;
        }
    }

    pub fn show_delivered(&mut self) {
        self.progress_bar = 1.0;
        self.progress_text = STATUS_DELIVERING.to_string();
    }

    pub fn finish(&mut self, outcome: &SaveOutcome) {
        match outcome {
            SaveOutcome::Saved(path) | SaveOutcome::FellBack(path) => {
                self.phase = DownloadPhase::Completed;
                self.progress_text = format!("Saved successfully! ({})", path.display());
                self.show_open_folder = true;
            }
            SaveOutcome::SavedOnServer(path) => {
                self.phase = DownloadPhase::Completed;
                self.progress_bar = 1.0;
                self.progress_text = format!("Saved as: {}", path);
                self.show_open_folder = true;
            }
            SaveOutcome::Cancelled => {
                self.phase = DownloadPhase::Cancelled;
                self.progress_text = "Download cancelled by user.".to_string();
            }
        }
    }

    pub fn fail(&mut self, message: String) {
        self.phase = DownloadPhase::Failed;
        self.progress_text = "Failed!".to_string();
        self.progress_failed = true;
        self.error = Some(message);
    }

    pub fn view(&self) -> Element<'_, DownloadMessage> {
        let fetch_label = if self.is_fetching { "Analyzing..." } else { "Analyze link" };
        let (video_label, audio_label) = if self.is_downloading() {
            ("Downloading...", "Working...")
        } else {
            ("Save file (video)", "Audio only (MP3)")
        };

        let mut content = Column::new()
            .push(text("Media Downloader").size(32))
            .push(Space::new().height(Length::Fixed(20.0)))
            .push(
                text_input("Paste a video link...", &self.url)
                    .on_input(DownloadMessage::UrlChanged)
                    .padding(10),
            )
            .push(row![
                pick_list(
                    Browser::ALL,
                    Some(self.browser),
                    DownloadMessage::BrowserSelected
                ),
                button(fetch_label)
                    .on_press_maybe(self.can_fetch().then_some(DownloadMessage::FetchPressed))
                    .padding([10, 20]),
            ]
            .spacing(10));

        if let Some(error) = &self.error {
            content = content.push(text(error.as_str()).size(14).style(text::danger));
        }

        if let Some(info) = &self.info {
            let platform = capitalize(info.platform.as_deref().unwrap_or("unknown"));
            content = content
                .push(text(info.display_title()).size(20))
                .push(text(format!("{}  {}", platform, format_duration(info.duration_secs()))).size(14));

            if !self.qualities.is_empty() {
                content = content.push(pick_list(
                    &self.qualities[..],
                    self.quality.clone(),
                    DownloadMessage::QualitySelected,
                ));
            }

            content = content.push(
                row![
                    button(video_label)
                        .on_press_maybe(
                            self.can_download()
                                .then_some(DownloadMessage::DownloadVideoPressed)
                        )
                        .padding([10, 20]),
                    button(audio_label)
                        .on_press_maybe(
                            self.can_download()
                                .then_some(DownloadMessage::DownloadAudioPressed)
                        )
                        .padding([10, 20]),
                ]
                .spacing(10),
            );
        }

        if self.progress_visible {
            let bar = progress_bar(0.0..=1.0, self.progress_bar);
            let bar = if self.progress_failed {
                bar.style(progress_bar::danger)
            } else {
                bar
            };
            content = content.push(column![bar, text(self.progress_text.as_str()).size(14)].spacing(5));
        }

        if self.show_open_folder {
            content = content.push(
                button("Open downloads folder")
                    .on_press(DownloadMessage::OpenFolderPressed)
                    .padding([10, 20]),
            );
        }

        content.padding(20).spacing(10).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::FormatDescriptor;
    use std::path::PathBuf;

    fn downloading_view() -> DownloadView {
        let mut view = DownloadView::default();
        view.begin_download();
        view
    }

    #[test]
    fn percent_progress_moves_the_bar() {
        let mut view = downloading_view();
        view.apply_progress(&ProgressState::parse(" 45.3%"));
        assert_eq!(view.progress_text, " 45.3%");
        assert!((view.progress_bar - 0.453).abs() < 1e-6);
    }

    #[test]
    fn text_progress_leaves_the_bar_alone() {
        let mut view = downloading_view();
        view.apply_progress(&ProgressState::parse("60%"));
        view.apply_progress(&ProgressState::parse("Converting (MP3)..."));
        assert_eq!(view.progress_text, "Converting (MP3)...");
        assert!((view.progress_bar - 0.6).abs() < 1e-6);
    }

    #[test]
    fn progress_is_ignored_once_finished() {
        let mut view = downloading_view();
        view.finish(&SaveOutcome::Cancelled);
        view.apply_progress(&ProgressState::parse("80%"));
        assert_eq!(view.progress_text, "Download cancelled by user.");
        assert_eq!(view.progress_bar, 0.0);
    }

    #[test]
    fn quality_selector_leads_with_best() {
        let mut view = DownloadView::default();
        view.show_info(VideoInfo {
            formats: vec![FormatDescriptor {
                id: "22".into(),
                ext: Some("mp4".into()),
                res: Some("1280x720".into()),
                ..Default::default()
            }],
            ..Default::default()
        });

        assert_eq!(view.qualities.len(), 2);
        assert_eq!(view.selected_format().as_deref(), Some("best"));
        assert_eq!(view.qualities[1].id, "22");
        assert!(view.can_download());
    }

    #[test]
    fn fetch_error_hides_previous_result() {
        let mut view = DownloadView::default();
        view.show_info(VideoInfo::default());
        view.show_fetch_error("Invalid URL".into());
        assert!(view.info.is_none());
        assert_eq!(view.error.as_deref(), Some("Invalid URL"));
    }

    #[test]
    fn failure_marks_bar_and_reenables_buttons() {
        let mut view = DownloadView::default();
        view.show_info(VideoInfo::default());
        view.begin_download();
        assert!(!view.can_download());

        view.fail("Unsupported URL".into());
        assert!(view.progress_failed);
        assert_eq!(view.progress_text, "Failed!");
        assert!(view.can_download());
    }

    #[test]
    fn successful_save_offers_open_folder() {
        let mut view = downloading_view();
        view.finish(&SaveOutcome::FellBack(PathBuf::from("/d/x.mp4")));
        assert!(view.show_open_folder);
        assert_eq!(view.phase, DownloadPhase::Completed);
    }

    #[test]
    fn file_saved_by_backend_is_a_success() {
        let mut view = downloading_view();
        view.finish(&SaveOutcome::SavedOnServer("Downloads/youtube/clip.mp4".into()));
        assert_eq!(view.phase, DownloadPhase::Completed);
        assert_eq!(view.progress_text, "Saved as: Downloads/youtube/clip.mp4");
        assert!(!view.progress_failed);
        assert!(view.show_open_folder);
        assert!(view.error.is_none());
    }
}
