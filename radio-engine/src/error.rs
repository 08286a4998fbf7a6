//! Types d'erreurs pour radio-engine

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no track available to play (queue, default playlists and fallback directory are all empty)")]
    NoTrackAvailable,

    #[error("requested seek offset {0} is negative")]
    InvalidSeekOffset(i64),

    #[error("a transition is already in progress")]
    TransitionInProgress,

    #[error(transparent)]
    Fetch(#[from] radio_fetcher::FetchError),

    #[error(transparent)]
    Audio(#[from] radio_audio::AudioError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
