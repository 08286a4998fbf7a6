//! Types d'erreurs pour radio-fetcher

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("store error")]
    Store(#[from] radio_store::Error),

    #[error("cache error")]
    Cache(#[from] radio_cache::CacheError),

    #[error("download error")]
    Download(#[from] radio_downloader::DownloadError),

    #[error("filesystem error")]
    Io(#[from] std::io::Error),

    #[error("no fallback track available in the fallback directory")]
    NoFallbackAvailable,

    #[error("gave up after {attempts} consecutive failures")]
    RetriesExhausted { attempts: u32 },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, FetchError>;
