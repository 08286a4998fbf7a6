//! radio-fetcher - décide quelle piste jouer ensuite
//!
//! Implémente l'algorithme de `NextTrackFetcher` comme une petite machine
//! à états explicite (`TryQueueHead | TryDefault | TryFallback` croisé avec
//! `CacheHit | Download | Error×retry`) plutôt que la récursion de
//! l'original : plus simple à auditer, avec un nombre d'essais borné.

mod error;
mod pending;
mod refresher;

pub use error::{FetchError, Result};
pub use refresher::{MetadataRefresher, NoopMetadataRefresher};

use chrono::{DateTime, Duration, Utc};
use pending::PendingTrack;
use radio_downloader::MediaDownloader;
use radio_store::{DefaultPlaylistMetadataStore, DefaultPlaylistStore, SongQueue, Track};
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const MAX_CONSECUTIVE_FAILURES: u32 = 3;
const STALE_METADATA_AGE: Duration = Duration::days(2);

pub struct NextTrackFetcher {
    queue: Arc<SongQueue>,
    default_playlists: Arc<DefaultPlaylistStore>,
    default_playlist_metadata: Arc<DefaultPlaylistMetadataStore>,
    downloader: Arc<MediaDownloader>,
    fallback_dir: PathBuf,
    default_playlist_genre: String,
    metadata_refresher: Arc<dyn MetadataRefresher>,
}

impl NextTrackFetcher {
    pub fn new(
        queue: Arc<SongQueue>,
        default_playlists: Arc<DefaultPlaylistStore>,
        default_playlist_metadata: Arc<DefaultPlaylistMetadataStore>,
        downloader: Arc<MediaDownloader>,
        fallback_dir: impl Into<PathBuf>,
        default_playlist_genre: impl Into<String>,
    ) -> Self {
        Self {
            queue,
            default_playlists,
            default_playlist_metadata,
            downloader,
            fallback_dir: fallback_dir.into(),
            default_playlist_genre: default_playlist_genre.into(),
            metadata_refresher: Arc::new(NoopMetadataRefresher),
        }
    }

    pub fn with_metadata_refresher(mut self, refresher: Arc<dyn MetadataRefresher>) -> Self {
        self.metadata_refresher = refresher;
        self
    }

    /// Résout la prochaine piste jouable. Remarque : `MediaDownloader::fetch`
    /// implémente déjà lui-même "consulter le cache, télécharger sur
    /// échec, admettre dans le cache sur succès" (§4.1/§4.3) ; il n'y a donc
    /// rien à dupliquer ici, juste à choisir la candidate et réagir à son
    /// résultat.
    pub async fn next_track(&self) -> Result<Track> {
        let mut failures = 0u32;

        loop {
            let pending = match self.queue.first() {
                Some(item) => PendingTrack::from_queue(item),
                None => self.empty_queue_handler().await?,
            };

            match self
                .downloader
                .fetch(&pending.url, &pending.title, pending.url_type)
                .await
            {
                Ok(resolved_path) => {
                    if pending.from_user_queue {
                        self.queue.remove_front()?;
                    }
                    return Ok(pending.into_track(resolved_path.to_string_lossy().into_owned()));
                }
                Err(err) => {
                    tracing::warn!(title = %pending.title, %err, "failed to resolve track, skipping");
                    if pending.from_user_queue {
                        self.queue.remove_front()?;
                    }

                    failures += 1;
                    if failures >= MAX_CONSECUTIVE_FAILURES {
                        return Err(FetchError::RetriesExhausted { attempts: failures });
                    }
                }
            }
        }
    }

    async fn empty_queue_handler(&self) -> Result<PendingTrack> {
        let genre = &self.default_playlist_genre;
        let genre_disabled = genre.eq_ignore_ascii_case("all");

        let active: Vec<_> = self
            .default_playlists
            .active()
            .into_iter()
            .filter(|p| genre_disabled || p.genre.eq_ignore_ascii_case(genre))
            .collect();

        let now = Utc::now();
        for playlist in &active {
            let is_stale = match &playlist.metadata_updated_at {
                Some(ts) => DateTime::parse_from_rfc3339(ts)
                    .map(|updated| now.signed_duration_since(updated) > STALE_METADATA_AGE)
                    .unwrap_or(true),
                None => true,
            };
            if is_stale {
                self.metadata_refresher.schedule_refresh(&playlist.playlist_id);
            }
        }

        let mut candidates = Vec::new();
        for playlist in &active {
            candidates.extend(self.default_playlist_metadata.filter(
                None,
                Some(playlist.playlist_id.as_str()),
                Some(true),
                if genre_disabled { None } else { Some(genre.as_str()) },
            ));
        }

        if let Some(chosen) = candidates.choose(&mut rand::thread_rng()) {
            return Ok(PendingTrack::from_default_playlist(chosen.clone()));
        }

        self.fallback_track().await
    }

    async fn fallback_track(&self) -> Result<PendingTrack> {
        let mut entries = tokio::fs::read_dir(&self.fallback_dir).await?;
        let mut candidates = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("mp3") {
                candidates.push(path);
            }
        }

        let chosen = candidates
            .choose(&mut rand::thread_rng())
            .ok_or(FetchError::NoFallbackAvailable)?;

        Ok(PendingTrack::fallback(
            file_stem(chosen),
            chosen.to_string_lossy().into_owned(),
        ))
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("fallback")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use radio_cache::FileCache;
    use radio_downloader::MediaDownloaderConfig;
    use radio_store::{QueueItem, UrlType};

    fn queue_item(url: &str) -> QueueItem {
        QueueItem {
            title: format!("title for {url}"),
            url: url.to_string(),
            url_type: UrlType::Fallback,
            duration: 180,
            requested_by: "anonymous".to_string(),
        }
    }

    #[tokio::test]
    async fn queue_head_is_popped_after_successful_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Arc::new(SongQueue::new(dir.path().join("queue.json")).unwrap());
        let playlists = Arc::new(DefaultPlaylistStore::new(dir.path().join("playlists.json")).unwrap());
        let metadata =
            Arc::new(DefaultPlaylistMetadataStore::new(dir.path().join("metadata.json")).unwrap());
        let cache = Arc::new(FileCache::new(dir.path().join("cache"), 1024 * 1024).unwrap());
        let downloader = Arc::new(MediaDownloader::new(
            cache,
            MediaDownloaderConfig {
                tracks_dir: dir.path().join("tracks"),
                ..Default::default()
            },
        ));

        // A fallback-typed queue item bypasses cache/download entirely in
        // MediaDownloader, letting this test exercise the pop-on-success path
        // without touching any external process.
        queue.append(queue_item("/some/local/file.mp3")).unwrap();

        let fetcher = NextTrackFetcher::new(
            queue.clone(),
            playlists,
            metadata,
            downloader,
            dir.path().join("fallback"),
            "all",
        );

        let track = fetcher.next_track().await.unwrap();
        assert_eq!(track.url, "/some/local/file.mp3");
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn empty_queue_and_no_default_playlists_falls_back_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Arc::new(SongQueue::new(dir.path().join("queue.json")).unwrap());
        let playlists = Arc::new(DefaultPlaylistStore::new(dir.path().join("playlists.json")).unwrap());
        let metadata =
            Arc::new(DefaultPlaylistMetadataStore::new(dir.path().join("metadata.json")).unwrap());
        let cache = Arc::new(FileCache::new(dir.path().join("cache"), 1024 * 1024).unwrap());
        let downloader = Arc::new(MediaDownloader::new(
            cache,
            MediaDownloaderConfig {
                tracks_dir: dir.path().join("tracks"),
                ..Default::default()
            },
        ));

        let fallback_dir = dir.path().join("fallback");
        tokio::fs::create_dir_all(&fallback_dir).await.unwrap();
        tokio::fs::write(fallback_dir.join("silence.mp3"), b"fake mp3")
            .await
            .unwrap();

        let fetcher = NextTrackFetcher::new(
            queue,
            playlists,
            metadata,
            downloader,
            fallback_dir,
            "all",
        );

        let track = fetcher.next_track().await.unwrap();
        assert_eq!(track.requested_by, "fallback");
        assert_eq!(track.title, "silence");
    }

    #[tokio::test]
    async fn no_candidates_anywhere_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Arc::new(SongQueue::new(dir.path().join("queue.json")).unwrap());
        let playlists = Arc::new(DefaultPlaylistStore::new(dir.path().join("playlists.json")).unwrap());
        let metadata =
            Arc::new(DefaultPlaylistMetadataStore::new(dir.path().join("metadata.json")).unwrap());
        let cache = Arc::new(FileCache::new(dir.path().join("cache"), 1024 * 1024).unwrap());
        let downloader = Arc::new(MediaDownloader::new(
            cache,
            MediaDownloaderConfig {
                tracks_dir: dir.path().join("tracks"),
                ..Default::default()
            },
        ));

        let fallback_dir = dir.path().join("fallback");
        tokio::fs::create_dir_all(&fallback_dir).await.unwrap();

        let fetcher = NextTrackFetcher::new(
            queue,
            playlists,
            metadata,
            downloader,
            fallback_dir,
            "all",
        );

        let err = fetcher.next_track().await.unwrap_err();
        assert!(matches!(err, FetchError::NoFallbackAvailable));
    }
}
