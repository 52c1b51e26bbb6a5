use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("Please enter a valid video link.")]
    InvalidInput,

    #[error(
        "The backend is running remotely and cannot read browser cookies from this machine. \
         Browser cookies only work when the backend runs locally; use the default option instead."
    )]
    RemoteCookiesUnavailable,

    /// Carries the backend detail, or a generic fallback, verbatim.
    #[error("{0}")]
    InfoFetch(String),

    #[error("{0}")]
    Download(String),

    #[error("Could not save the file")]
    SaveFailed,
}
