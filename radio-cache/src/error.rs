use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache database error")]
    Database(#[from] rusqlite::Error),

    #[error("filesystem error")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CacheError>;
