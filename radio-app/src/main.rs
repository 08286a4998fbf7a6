//! radio-app - point d'entrée de la station
//!
//! Assemble la configuration, les listes persistantes, le cache de fichiers,
//! le résolveur de piste suivante, le moteur de lecture et la façade HTTP en
//! un seul processus.

use radio_cache::FileCache;
use radio_config::get_config;
use radio_downloader::{MediaDownloader, MediaDownloaderConfig};
use radio_engine::PlaybackEngine;
use radio_events::EventBus;
use radio_fetcher::NextTrackFetcher;
use radio_server::logs::LoggingOptions;
use radio_server::routes::ControlState;
use radio_server::{ServerBuilder, control_surface_router};
use radio_store::{BlockList, DefaultPlaylistMetadataStore, DefaultPlaylistStore, SongQueue};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ========== PHASE 1 : Configuration et stockage ==========

    let config = get_config();

    let data_dir = config.get_managed_dir(&["store", "data_directory"], "data")?;
    let queue = Arc::new(SongQueue::new(Path::new(&data_dir).join("queue.json"))?);
    let blocklist = Arc::new(BlockList::new(Path::new(&data_dir).join("blocklist.json"))?);
    let default_playlists = Arc::new(DefaultPlaylistStore::new(
        Path::new(&data_dir).join("default_playlists.json"),
    )?);
    let default_playlist_metadata = Arc::new(DefaultPlaylistMetadataStore::new(
        Path::new(&data_dir).join("default_playlist_metadata.json"),
    )?);

    let cache_dir = config.get_cache_dir()?;
    let cache = Arc::new(FileCache::new(cache_dir, config.get_max_cache_bytes())?);

    let downloader = Arc::new(MediaDownloader::new(
        cache.clone(),
        MediaDownloaderConfig {
            tracks_dir: config.get_tracks_dir()?.into(),
            ..Default::default()
        },
    ));

    // ========== PHASE 2 : Moteur de lecture ==========

    info!("wiring next-track fetcher and playback engine");

    let fallback_dir = config.get_fallback_dir()?;
    let fetcher = Arc::new(NextTrackFetcher::new(
        queue.clone(),
        default_playlists.clone(),
        default_playlist_metadata,
        downloader,
        fallback_dir,
        config.get_default_playlist_genre(),
    ));

    let events = EventBus::new();
    let engine = Arc::new(PlaybackEngine::new_configured(fetcher, events.clone()));
    let broadcaster = engine.broadcaster();
    engine.clone().start().await;

    // ========== PHASE 3 : Démarrage du serveur HTTP ==========

    info!("starting HTTP server");

    let control_state = ControlState {
        engine,
        broadcaster,
        queue,
        blocklist,
        default_playlists: default_playlists.clone(),
        config: config.clone(),
    };

    let mut server = ServerBuilder::new_configured().build();
    server.init_logging(LoggingOptions::default()).await;
    server.add_router("/", control_surface_router(control_state)).await;
    server
        .add_router("/", radio_events::playback_events_router(events))
        .await;

    server.start().await;
    info!("radio-app is ready, press Ctrl+C to stop");
    server.wait().await;

    info!("shutting down");
    Ok(())
}
