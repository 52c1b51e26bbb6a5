pub mod error;
pub mod model;

pub use error::AppError;
pub use model::{
    Browser, DeliveredFile, Delivery, DownloadMode, DownloadPhase, DownloadRequest, ProgressState,
    SaveOutcome,
};
