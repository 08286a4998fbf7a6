//! radio-events - bus d'évènements de lecture et canal SSE
//!
//! Modélise le canal d'évènements décrit pour le moteur de diffusion :
//! `trackChanged`, `progress`, `stream` (chunks audio encodés en base64
//! pour le transport SSE) et `bufferHeader` (premier chunk, rejoué aux
//! nouveaux abonnés qui démarrent en cours de piste), plus un ping/pong de
//! vivacité par session.

mod bus;
mod error;
mod event;
mod sse;

pub use bus::{EventBus, EventSubscription, HEARTBEAT_INTERVAL};
pub use error::{EventError, Result};
pub use event::{Event, Progress, TrackChanged};
pub use sse::{playback_events_router, playback_events_sse, record_pong};
