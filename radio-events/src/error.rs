//! Types d'erreurs pour radio-events

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("unknown subscriber session {0}")]
    UnknownSession(uuid::Uuid),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, EventError>;
