//! Types d'erreurs pour radio-store

/// Erreurs de gestion des listes persistantes (file d'attente, blocklist,
/// playlists par défaut).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read store file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write store file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to (de)serialize store contents: {0}")]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
