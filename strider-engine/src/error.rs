use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExploreError {
    #[error("invalid worker pool size {0}: at least one worker is required")]
    InvalidWorkerCount(usize),

    /// The increment/decrement ordering of the termination protocol was
    /// broken. There is no safe recovery; callers should fail fast.
    #[error("termination protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("worker task failed: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, ExploreError>;
