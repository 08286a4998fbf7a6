use thiserror::Error;

/// Errors raised by the broadcast/sink layer of the audio pipeline.
#[derive(Debug, Clone, Error)]
pub enum AudioError {
    #[error("failed to send chunk downstream")]
    Send,

    #[error("failed to receive chunk from upstream")]
    Receive,

    #[error("processing error: {0}")]
    Processing(String),
}

pub type Result<T> = std::result::Result<T, AudioError>;
