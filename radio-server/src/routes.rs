//! Façade REST du moteur de lecture
//!
//! Expose la file d'attente, les transitions de lecture (skip/previous/seek),
//! la liste des titres bloqués, les playlists par défaut et la configuration
//! commune, via l'enveloppe JSON uniforme [`ApiResponse`].

use async_stream::stream;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use radio_audio::{Broadcaster, Received};
use radio_config::Config;
use radio_engine::PlaybackEngine;
use radio_store::{BlockEntry, BlockList, DefaultPlaylist, DefaultPlaylistStore, QueueItem, SongQueue};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// État partagé par toutes les routes de la façade.
#[derive(Clone)]
pub struct ControlState {
    pub engine: Arc<PlaybackEngine>,
    pub broadcaster: Arc<Broadcaster>,
    pub queue: Arc<SongQueue>,
    pub blocklist: Arc<BlockList>,
    pub default_playlists: Arc<DefaultPlaylistStore>,
    pub config: Arc<Config>,
}

/// Flux MP3 brut, en aval du fan-out du moteur de lecture. Se ferme quand
/// l'auditeur coupe la connexion (le corps de la réponse cesse d'être lu).
async fn listen(State(state): State<ControlState>) -> impl IntoResponse {
    let mut subscriber = state.broadcaster.subscribe();

    let body = Body::from_stream(stream! {
        loop {
            match subscriber.recv().await {
                Received::Chunk(chunk) => yield Ok::<_, std::io::Error>(chunk),
                Received::Lagged { .. } => continue,
                Received::Closed => break,
            }
        }
    });

    (
        [
            (header::CONTENT_TYPE, "audio/mpeg"),
            (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
        ],
        body,
    )
}

#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(message: impl Into<String>, data: T) -> Self {
        Self { success: true, message: message.into(), data: Some(data), error: None }
    }

    fn err(message: impl Into<String>) -> Self {
        let message = message.into();
        Self { success: false, message: message.clone(), data: None, error: Some(message) }
    }
}

impl ApiResponse<()> {
    fn ok_empty(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into(), data: None, error: None }
    }
}

type JsonResponse<T> = (axum::http::StatusCode, Json<ApiResponse<T>>);

fn ok<T: Serialize>(message: impl Into<String>, data: T) -> JsonResponse<T> {
    (axum::http::StatusCode::OK, Json(ApiResponse::ok(message, data)))
}

fn ok_empty(message: impl Into<String>) -> JsonResponse<()> {
    (axum::http::StatusCode::OK, Json(ApiResponse::ok_empty(message)))
}

fn bad_request<T: Serialize>(message: impl Into<String>) -> JsonResponse<T> {
    (axum::http::StatusCode::BAD_REQUEST, Json(ApiResponse::err(message)))
}

// ============================================================================
// File d'attente
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddSongRequest {
    title: String,
    url: String,
    url_type: radio_store::UrlType,
    duration: u32,
    #[serde(default = "default_requested_by")]
    requested_by: String,
}

fn default_requested_by() -> String {
    "anonymous".to_string()
}

impl AddSongRequest {
    fn into_queue_item(self) -> QueueItem {
        QueueItem {
            title: self.title,
            url: self.url,
            url_type: self.url_type,
            duration: self.duration,
            requested_by: self.requested_by,
        }
    }
}

async fn add_song(
    State(state): State<ControlState>,
    Json(req): Json<AddSongRequest>,
) -> JsonResponse<QueueItem> {
    if state.blocklist.is_blocked(&req.title) {
        return bad_request(format!("\"{}\" is blocked and cannot be queued", req.title));
    }

    let item = req.into_queue_item();
    match state.queue.append(item.clone()) {
        Ok(true) => ok("song added to queue", item),
        Ok(false) => bad_request("song is already queued or invalid"),
        Err(err) => bad_request(err.to_string()),
    }
}

async fn add_song_front(
    State(state): State<ControlState>,
    Json(req): Json<AddSongRequest>,
) -> JsonResponse<QueueItem> {
    if state.blocklist.is_blocked(&req.title) {
        return bad_request(format!("\"{}\" is blocked and cannot be queued", req.title));
    }

    let item = req.into_queue_item();
    match state.queue.prepend(item.clone()) {
        Ok(true) => ok("song added to the front of the queue", item),
        Ok(false) => bad_request("song is already queued or invalid"),
        Err(err) => bad_request(err.to_string()),
    }
}

async fn remove_song_by_requester(
    State(state): State<ControlState>,
    Path(requested_by): Path<String>,
) -> JsonResponse<Option<QueueItem>> {
    match state.queue.remove_last_requested_by(&requested_by) {
        Ok(Some(item)) => ok("song removed from queue", Some(item)),
        Ok(None) => bad_request(format!("no queued song requested by \"{requested_by}\"")),
        Err(err) => bad_request(err.to_string()),
    }
}

async fn list_queue(State(state): State<ControlState>) -> JsonResponse<Vec<QueueItem>> {
    ok("queue listing", state.queue.all())
}

// ============================================================================
// Transitions de lecture
// ============================================================================

async fn skip(State(state): State<ControlState>) -> JsonResponse<()> {
    match state.engine.skip().await {
        Ok(()) => ok_empty("skipped to the next track"),
        Err(err) => bad_request(err.to_string()),
    }
}

async fn previous(State(state): State<ControlState>) -> JsonResponse<()> {
    match state.engine.previous().await {
        Ok(()) => ok_empty("returned to the previous track"),
        Err(err) => bad_request(err.to_string()),
    }
}

#[derive(Deserialize)]
struct SeekRequest {
    seconds: i64,
}

async fn seek(
    State(state): State<ControlState>,
    Json(req): Json<SeekRequest>,
) -> JsonResponse<()> {
    match state.engine.seek(req.seconds).await {
        Ok(()) => ok_empty("seeked"),
        Err(err) => bad_request(err.to_string()),
    }
}

async fn current(State(state): State<ControlState>) -> JsonResponse<radio_engine::EngineState> {
    ok("current playback state", state.engine.get_current())
}

async fn upcoming(State(state): State<ControlState>) -> JsonResponse<Vec<radio_store::Track>> {
    ok("upcoming tracks", state.engine.get_upcoming().await)
}

// ============================================================================
// Liste des titres bloqués
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockSongRequest {
    song_name: String,
    #[serde(default = "default_requested_by")]
    requested_by: String,
}

async fn block_song(
    State(state): State<ControlState>,
    Json(req): Json<BlockSongRequest>,
) -> JsonResponse<BlockEntry> {
    let entry = BlockEntry {
        song_name: req.song_name,
        requested_by: req.requested_by,
        blocked_at: chrono::Utc::now().to_rfc3339(),
    };

    match state.blocklist.block(entry.clone()) {
        Ok(true) => ok("song blocked", entry),
        Ok(false) => bad_request("song is already blocked"),
        Err(err) => bad_request(err.to_string()),
    }
}

async fn list_blocked(State(state): State<ControlState>) -> JsonResponse<Vec<BlockEntry>> {
    ok("blocklist", state.blocklist.all())
}

async fn unblock_song(
    State(state): State<ControlState>,
    Path(index): Path<usize>,
) -> JsonResponse<Option<BlockEntry>> {
    match state.blocklist.remove_at(index) {
        Ok(Some(entry)) => ok("song unblocked", Some(entry)),
        Ok(None) => bad_request(format!("no blocked song at index {index}")),
        Err(err) => bad_request(err.to_string()),
    }
}

async fn clear_blocked(State(state): State<ControlState>) -> JsonResponse<()> {
    match state.blocklist.clear() {
        Ok(()) => ok_empty("blocklist cleared"),
        Err(err) => bad_request(err.to_string()),
    }
}

// ============================================================================
// Playlists par défaut
// ============================================================================

async fn add_default_playlist(
    State(state): State<ControlState>,
    Json(playlist): Json<DefaultPlaylist>,
) -> JsonResponse<DefaultPlaylist> {
    match state.default_playlists.append(playlist.clone()) {
        Ok(true) => ok("default playlist added", playlist),
        Ok(false) => bad_request("playlist id is already registered or invalid"),
        Err(err) => bad_request(err.to_string()),
    }
}

async fn list_default_playlists(State(state): State<ControlState>) -> JsonResponse<Vec<DefaultPlaylist>> {
    ok("default playlists", state.default_playlists.all())
}

async fn remove_default_playlist(
    State(state): State<ControlState>,
    Path(index): Path<usize>,
) -> JsonResponse<Option<DefaultPlaylist>> {
    match state.default_playlists.remove_at(index) {
        Ok(Some(playlist)) => ok("default playlist removed", Some(playlist)),
        Ok(None) => bad_request(format!("no default playlist at index {index}")),
        Err(err) => bad_request(err.to_string()),
    }
}

// ============================================================================
// Configuration commune
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CommonConfig {
    default_playlist_genre: String,
    min_queue_size: usize,
    http_port: u16,
}

async fn get_common_config(State(state): State<ControlState>) -> JsonResponse<CommonConfig> {
    ok(
        "common configuration",
        CommonConfig {
            default_playlist_genre: state.config.get_default_playlist_genre(),
            min_queue_size: state.config.get_min_queue_size(),
            http_port: state.config.get_http_port(),
        },
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateCommonConfig {
    default_playlist_genre: Option<String>,
}

async fn put_common_config(
    State(state): State<ControlState>,
    Json(req): Json<UpdateCommonConfig>,
) -> JsonResponse<()> {
    if let Some(genre) = req.default_playlist_genre {
        if let Err(err) = state
            .config
            .set_value(&["playback", "default_playlist_genre"], serde_yaml::Value::String(genre))
        {
            return bad_request(err.to_string());
        }
    }
    ok_empty("configuration updated")
}

// ============================================================================
// Router
// ============================================================================

/// Compose la façade REST complète du moteur de lecture.
pub fn control_surface_router(state: ControlState) -> Router {
    Router::new()
        .route("/stream", get(listen))
        .route("/queue", get(list_queue).post(add_song))
        .route("/queue/front", post(add_song_front))
        .route("/queue/{requested_by}", delete(remove_song_by_requester))
        .route("/skip", post(skip))
        .route("/previous", post(previous))
        .route("/seek", post(seek))
        .route("/current", get(current))
        .route("/upcoming", get(upcoming))
        .route("/blocklist", get(list_blocked).post(block_song).delete(clear_blocked))
        .route("/blocklist/{index}", delete(unblock_song))
        .route("/playlists", get(list_default_playlists).post(add_default_playlist))
        .route("/playlists/{index}", delete(remove_default_playlist))
        .route("/config", get(get_common_config).put(put_common_config))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_envelope_carries_data_and_no_error() {
        let (status, Json(body)) = ok("queue listing", vec![1, 2, 3]);
        assert_eq!(status, axum::http::StatusCode::OK);
        assert!(body.success);
        assert_eq!(body.message, "queue listing");
        assert_eq!(body.data, Some(vec![1, 2, 3]));
        assert_eq!(body.error, None);
    }

    #[test]
    fn ok_empty_envelope_carries_no_data() {
        let (status, Json(body)) = ok_empty("skipped to the next track");
        assert_eq!(status, axum::http::StatusCode::OK);
        assert!(body.success);
        assert_eq!(body.data, None);
        assert_eq!(body.error, None);
    }

    #[test]
    fn bad_request_envelope_mirrors_message_into_error() {
        let (status, Json(body)) = bad_request::<()>("song is already blocked");
        assert_eq!(status, axum::http::StatusCode::BAD_REQUEST);
        assert!(!body.success);
        assert_eq!(body.message, "song is already blocked");
        assert_eq!(body.error.as_deref(), Some("song is already blocked"));
    }

    #[test]
    fn api_response_skips_absent_fields_when_serialized() {
        let envelope = ApiResponse::ok_empty("configuration updated");
        let value = serde_json::to_value(&envelope).unwrap();
        assert!(value.get("data").is_none());
        assert!(value.get("error").is_none());
    }

    #[test]
    fn add_song_request_defaults_requested_by_to_anonymous() {
        let req: AddSongRequest = serde_json::from_str(
            r#"{"title":"Song","url":"https://example.test/song","urlType":"youtube","duration":180}"#,
        )
        .unwrap();
        assert_eq!(req.requested_by, "anonymous");

        let item = req.into_queue_item();
        assert_eq!(item.title, "Song");
        assert_eq!(item.url_type, radio_store::UrlType::Youtube);
    }

    #[test]
    fn add_song_request_honors_explicit_requested_by() {
        let req: AddSongRequest = serde_json::from_str(
            r#"{"title":"Song","url":"https://example.test/song","urlType":"local","duration":10,"requestedBy":"alice"}"#,
        )
        .unwrap();
        assert_eq!(req.requested_by, "alice");
    }

    #[test]
    fn common_config_serializes_as_camel_case() {
        let config = CommonConfig {
            default_playlist_genre: "all".to_string(),
            min_queue_size: 2,
            http_port: 8080,
        };
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["defaultPlaylistGenre"], "all");
        assert_eq!(value["minQueueSize"], 2);
        assert_eq!(value["httpPort"], 8080);
    }
}
