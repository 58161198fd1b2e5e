use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture device unavailable: {0}")]
    Unavailable(String),

    #[error("capture device not ready: {0}")]
    NotReady(String),

    #[error("frame capture failed: {0}")]
    Frame(String),

    #[error("age scoring failed: {0}")]
    Scoring(String),
}
