//! Piste candidate en cours de résolution, avant que son chemin jouable
//! ne soit connu.

use radio_store::{DefaultPlaylistItem, QueueItem, Track, UrlType};

#[derive(Debug, Clone)]
pub struct PendingTrack {
    pub title: String,
    pub url: String,
    pub url_type: UrlType,
    pub duration: u32,
    pub requested_by: String,
    /// `true` si cette candidate vient de la file d'attente persistante de
    /// l'utilisateur : dans ce cas, elle doit être dépilée une fois traitée
    /// (succès ou échec), jamais remise à plus tard.
    pub from_user_queue: bool,
}

impl PendingTrack {
    pub fn from_queue(item: QueueItem) -> Self {
        Self {
            title: item.title,
            url: item.url,
            url_type: item.url_type,
            duration: item.duration,
            requested_by: item.requested_by,
            from_user_queue: true,
        }
    }

    pub fn from_default_playlist(item: DefaultPlaylistItem) -> Self {
        Self {
            title: item.title,
            url: item.url,
            url_type: item.url_type,
            duration: item.duration,
            requested_by: "anonymous".to_string(),
            from_user_queue: false,
        }
    }

    pub fn fallback(title: String, path: String) -> Self {
        Self {
            title,
            url: path,
            url_type: UrlType::Fallback,
            duration: 0,
            requested_by: "fallback".to_string(),
            from_user_queue: false,
        }
    }

    /// Matérialise cette candidate en piste jouable une fois son chemin
    /// résolu par le `MediaDownloader`. Le débit binaire reste à `0`
    /// (inconnu) : c'est au moteur de lecture de le sonder paresseusement
    /// avant de jouer le fichier.
    pub fn into_track(self, resolved_path: String) -> Track {
        Track {
            title: self.title,
            url: resolved_path,
            url_type: self.url_type,
            duration: self.duration,
            requested_by: self.requested_by,
            bitrate: 0,
        }
    }
}
