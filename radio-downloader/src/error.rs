//! Types d'erreurs pour radio-downloader

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("cache error")]
    Cache(#[from] radio_cache::CacheError),

    #[error("filesystem error")]
    Io(#[from] std::io::Error),

    #[error("http error")]
    Http(#[from] reqwest::Error),

    #[error("failed to decrypt jiosaavn media url")]
    Decrypt,

    #[error("{tool} exited with status {status}: {stderr}")]
    SubprocessFailed {
        tool: String,
        status: i32,
        stderr: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, DownloadError>;
