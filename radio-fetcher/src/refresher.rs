//! Déclenchement du rafraîchissement de métadonnées d'une playlist par
//! défaut (retrait puis réinsertion via le service d'API distant).
//!
//! Ce service distant (recherche Spotify/jiosaavn des titres d'une
//! playlist) n'a pas de module dédié dans cette station : seul le point
//! d'extension est modélisé ici, pour que l'algorithme de
//! [`crate::NextTrackFetcher`] reste fidèle à l'original sans avoir à
//! réimplémenter des clients de playlists tiers.
pub trait MetadataRefresher: Send + Sync {
    fn schedule_refresh(&self, playlist_id: &str);
}

/// Implémentation par défaut : journalise l'intention sans agir.
#[derive(Debug, Default)]
pub struct NoopMetadataRefresher;

impl MetadataRefresher for NoopMetadataRefresher {
    fn schedule_refresh(&self, playlist_id: &str) {
        tracing::debug!(%playlist_id, "default playlist metadata is stale, refresh not wired up");
    }
}
