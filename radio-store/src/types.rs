//! Types de données partagés par les listes persistantes.

use serde::{Deserialize, Serialize};

fn default_requested_by() -> String {
    "anonymous".to_string()
}

fn default_bitrate() -> u32 {
    128_000
}

/// Origine d'une piste : quel résolveur sait la retrouver / la re-télécharger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UrlType {
    Youtube,
    Jiosaavn,
    Soundcloud,
    Fallback,
    Local,
}

/// Piste en cours ou sur le point de jouer. Le débit binaire n'est connu
/// qu'après ouverture du fichier source, d'où sa présence ici et son
/// absence du [`QueueItem`] persistant correspondant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub title: String,
    pub url: String,
    pub url_type: UrlType,
    pub duration: u32,
    #[serde(default = "default_requested_by")]
    pub requested_by: String,
    #[serde(default = "default_bitrate")]
    pub bitrate: u32,
}

impl Track {
    /// Vue persistable de cette piste, une fois son débit binaire oublié.
    pub fn to_queue_item(&self) -> QueueItem {
        QueueItem {
            title: self.title.clone(),
            url: self.url.clone(),
            url_type: self.url_type,
            duration: self.duration,
            requested_by: self.requested_by.clone(),
        }
    }
}

/// Entrée persistante de la file d'attente, dédupliquée par `url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub title: String,
    pub url: String,
    pub url_type: UrlType,
    pub duration: u32,
    #[serde(default = "default_requested_by")]
    pub requested_by: String,
}

impl QueueItem {
    /// Matérialise cette entrée en piste jouable, une fois son débit
    /// binaire détecté par le moteur de lecture.
    pub fn into_track(self, bitrate: u32) -> Track {
        Track {
            title: self.title,
            url: self.url,
            url_type: self.url_type,
            duration: self.duration,
            requested_by: self.requested_by,
            bitrate,
        }
    }
}

/// Titre bloqué par un auditeur ; la déduplication se fait par comparaison
/// floue ([`crate::fuzzy`]) plutôt que par égalité stricte.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockEntry {
    pub song_name: String,
    pub requested_by: String,
    pub blocked_at: String,
}

/// Playlist de secours jouée quand la file d'attente est sous le seuil
/// minimal, dédupliquée par `playlist_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultPlaylist {
    pub playlist_id: String,
    pub title: String,
    pub source: String,
    pub is_active: bool,
    pub genre: String,
    pub metadata_updated_at: Option<String>,
}

/// Piste individuelle matérialisée à partir d'une [`DefaultPlaylist`],
/// dédupliquée par `url` et filtrable par type, playlist, activité ou genre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultPlaylistItem {
    pub title: String,
    pub url: String,
    pub url_type: UrlType,
    pub duration: u32,
    pub playlist_id: String,
    pub genre: String,
    pub is_active: bool,
}
