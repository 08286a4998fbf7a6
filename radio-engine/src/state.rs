//! État public du moteur de lecture : piste courante, précédente, et depuis
//! quand la piste courante joue.

use chrono::{DateTime, Utc};
use radio_store::Track;
use serde::Serialize;

/// Vue figée de `EngineState`, exposée par `GetCurrent`/`GetUpcoming`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineState {
    pub current: Option<Track>,
    pub previous: Option<Track>,
    #[serde(skip)]
    pub started_at: Option<DateTime<Utc>>,
    pub silence_mode: bool,
}

impl EngineState {
    pub fn elapsed_seconds(&self) -> f64 {
        match self.started_at {
            Some(started) => (Utc::now() - started).num_milliseconds() as f64 / 1000.0,
            None => 0.0,
        }
    }
}
