//! SSE pour suivre les évènements de lecture (changement de piste, avancement,
//! chunks audio, en-tête de mise en mémoire tampon) et le ping/pong de
//! vivacité associé.
//!
//! Route type : `GET /api/events`, `POST /api/events/:session_id/pong`

use crate::bus::{EventBus, HEARTBEAT_INTERVAL};
use crate::event::Event as PlaybackEvent;
use async_stream::stream;
use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::interval;
use uuid::Uuid;

#[derive(Debug, Serialize)]
struct SessionPayload {
    session_id: Uuid,
}

/// Handler SSE : diffuse les évènements de lecture plus un `ping` toutes les
/// [`HEARTBEAT_INTERVAL`]. Si le client ne répond pas par un `pong` avant le
/// `ping` suivant, la session est considérée morte et le flux se termine.
pub async fn playback_events_sse(State(bus): State<EventBus>) -> impl IntoResponse {
    let mut sub = bus.subscribe();
    let session_id = sub.id;

    // Émis en premier pour que le client connaisse son identifiant de
    // session avant le premier `ping`, nécessaire pour répondre par `pong`.
    let announce = Event::default()
        .event("session")
        .data(serde_json::to_string(&SessionPayload { session_id }).unwrap_or_default());

    let buffer_header = bus.latest_buffer_header();

    let stream = stream! {
        yield Ok::<_, axum::Error>(announce);

        if let Some(header) = buffer_header {
            if let Ok(json) = PlaybackEvent::BufferHeader(header).sse_data() {
                yield Ok(Event::default().event("bufferHeader").data(json));
            }
        }

        let mut heartbeat = interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await; // le premier tick est immédiat, on l'ignore

        loop {
            tokio::select! {
                received = sub.receiver.recv() => {
                    match received {
                        Ok(event) => {
                            if let Ok(json) = event.sse_data() {
                                yield Ok(Event::default().event(event.sse_event_name()).data(json));
                            }
                        }
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    }
                }
                _ = heartbeat.tick() => {
                    if !sub.is_alive(HEARTBEAT_INTERVAL) {
                        break;
                    }
                    yield Ok(Event::default().event("ping").data(""));
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Enregistre le `pong` renvoyé par le client en réponse à un `ping`.
pub async fn record_pong(
    State(bus): State<EventBus>,
    Path(session_id): Path<Uuid>,
) -> impl IntoResponse {
    bus.record_pong(session_id);
    Json(serde_json::json!({ "success": true }))
}

/// Router prêt à être monté (ex: `/api/events`).
pub fn playback_events_router(bus: EventBus) -> Router {
    Router::new()
        .route("/events", get(playback_events_sse))
        .route("/events/{session_id}/pong", post(record_pong))
        .with_state(bus)
}
