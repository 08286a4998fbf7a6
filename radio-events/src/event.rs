//! Évènements diffusés aux auditeurs abonnés au canal SSE.

use bytes::Bytes;
use serde::Serialize;

/// Changement de piste en cours de lecture. Doit toujours être émis avant
/// le premier chunk `Stream` de la nouvelle piste.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackChanged {
    pub title: String,
    pub duration: u32,
    pub requested_by: String,
}

/// Avancement de la lecture de la piste courante, émis périodiquement par
/// le ticker de progression.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub title: String,
    pub elapsed: f64,
}

/// Évènement diffusé à tous les abonnés du canal d'évènements.
///
/// `Stream` et `BufferHeader` transportent des octets opaques (la sortie
/// de l'encodeur) : ils sont encodés en base64 une fois sérialisés en SSE,
/// le flux audio binaire lui-même n'emprunte pas ce canal.
#[derive(Debug, Clone)]
pub enum Event {
    TrackChanged(TrackChanged),
    Progress(Progress),
    Stream(Bytes),
    /// Premier chunk d'une piste, conservé pour les abonnés qui rejoignent
    /// le flux en cours de lecture et ont besoin d'un en-tête MP3 valide.
    BufferHeader(Bytes),
}

impl Event {
    /// Nom de l'évènement SSE correspondant (`event: <name>`).
    pub fn sse_event_name(&self) -> &'static str {
        match self {
            Event::TrackChanged(_) => "trackChanged",
            Event::Progress(_) => "progress",
            Event::Stream(_) => "stream",
            Event::BufferHeader(_) => "bufferHeader",
        }
    }

    /// Corps JSON de l'évènement SSE (`data: <json>`).
    pub fn sse_data(&self) -> serde_json::Result<String> {
        use base64::Engine as _;

        match self {
            Event::TrackChanged(payload) => serde_json::to_string(payload),
            Event::Progress(payload) => serde_json::to_string(payload),
            Event::Stream(bytes) | Event::BufferHeader(bytes) => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
                serde_json::to_string(&encoded)
            }
        }
    }
}
