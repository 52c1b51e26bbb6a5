pub mod download_controller;
pub mod progress_poller;
pub mod save_delivery;

pub use download_controller::{DownloadController, DownloadEvent};
