//! radio-store - listes persistantes de la station : file d'attente,
//! titres bloqués, playlists par défaut et leur contenu matérialisé.
//!
//! Toutes reposent sur le même [`Store<T>`] générique (validation,
//! déduplication, persistance JSON atomique) ; ce module n'ajoute que la
//! configuration propre à chacune.

mod error;
mod fuzzy;
mod store;
mod types;

pub use error::{Error, Result};
pub use fuzzy::{is_similar, token_set_ratio, BLOCK_MATCH_THRESHOLD};
pub use store::Store;
pub use types::{BlockEntry, DefaultPlaylist, DefaultPlaylistItem, QueueItem, Track, UrlType};

use std::ops::Deref;
use std::path::PathBuf;

/// File d'attente des titres à venir, dédupliquée par `url`.
pub struct SongQueue {
    inner: Store<QueueItem>,
}

impl SongQueue {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let inner = Store::new(
            path,
            |item: &QueueItem| !item.title.is_empty() && !item.url.is_empty(),
            |item: &QueueItem| Some(item.url.clone()),
            |item: QueueItem| item,
        )?;
        Ok(Self { inner })
    }

    /// Retire la dernière entrée ajoutée par `requested_by`, en partant de
    /// la fin de la file (le dernier morceau qu'un auditeur a demandé).
    pub fn remove_last_requested_by(&self, requested_by: &str) -> Result<Option<QueueItem>> {
        self.inner
            .remove_last_matching(|item| item.requested_by == requested_by)
    }
}

impl Deref for SongQueue {
    type Target = Store<QueueItem>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Titres bloqués par les auditeurs. La déduplication se fait par
/// comparaison floue des titres plutôt que par égalité stricte : deux
/// orthographes du même morceau ne doivent produire qu'une entrée.
pub struct BlockList {
    inner: Store<BlockEntry>,
}

impl BlockList {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let inner = Store::new(
            path,
            |item: &BlockEntry| !item.song_name.is_empty(),
            |_: &BlockEntry| None,
            |item: BlockEntry| item,
        )?;
        Ok(Self { inner })
    }

    /// `true` si `song_name` correspond (floue, seuil
    /// [`BLOCK_MATCH_THRESHOLD`]) à une entrée déjà bloquée.
    pub fn is_blocked(&self, song_name: &str) -> bool {
        self.inner
            .all()
            .iter()
            .any(|entry| is_similar(&entry.song_name, song_name))
    }

    /// Ajoute `entry` si son titre n'est pas déjà bloqué. Retourne `false`
    /// sans effet sinon.
    pub fn block(&self, entry: BlockEntry) -> Result<bool> {
        if self.is_blocked(&entry.song_name) {
            return Ok(false);
        }
        self.inner.append(entry)
    }
}

impl Deref for BlockList {
    type Target = Store<BlockEntry>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Playlists de secours connues de la station, dédupliquées par `playlist_id`.
pub struct DefaultPlaylistStore {
    inner: Store<DefaultPlaylist>,
}

impl DefaultPlaylistStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let inner = Store::new(
            path,
            |item: &DefaultPlaylist| !item.playlist_id.is_empty() && !item.title.is_empty(),
            |item: &DefaultPlaylist| Some(item.playlist_id.clone()),
            |item: DefaultPlaylist| item,
        )?;
        Ok(Self { inner })
    }

    pub fn active(&self) -> Vec<DefaultPlaylist> {
        self.inner.all().into_iter().filter(|p| p.is_active).collect()
    }
}

impl Deref for DefaultPlaylistStore {
    type Target = Store<DefaultPlaylist>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Titres matérialisés à partir des playlists par défaut, dédupliqués par
/// `url` et filtrables par type de source, playlist, activité ou genre.
pub struct DefaultPlaylistMetadataStore {
    inner: Store<DefaultPlaylistItem>,
}

impl DefaultPlaylistMetadataStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let inner = Store::new(
            path,
            |item: &DefaultPlaylistItem| !item.url.is_empty() && !item.title.is_empty(),
            |item: &DefaultPlaylistItem| Some(item.url.clone()),
            |item: DefaultPlaylistItem| item,
        )?;
        Ok(Self { inner })
    }

    /// Filtre les titres matérialisés selon des critères optionnels ;
    /// `None` n'applique pas le critère correspondant.
    pub fn filter(
        &self,
        url_type: Option<UrlType>,
        playlist_id: Option<&str>,
        is_active: Option<bool>,
        genre: Option<&str>,
    ) -> Vec<DefaultPlaylistItem> {
        self.inner
            .all()
            .into_iter()
            .filter(|item| url_type.map_or(true, |t| item.url_type == t))
            .filter(|item| playlist_id.map_or(true, |id| item.playlist_id == id))
            .filter(|item| is_active.map_or(true, |a| item.is_active == a))
            .filter(|item| genre.map_or(true, |g| item.genre.eq_ignore_ascii_case(g)))
            .collect()
    }
}

impl Deref for DefaultPlaylistMetadataStore {
    type Target = Store<DefaultPlaylistItem>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue_item(url: &str) -> QueueItem {
        QueueItem {
            title: format!("title for {url}"),
            url: url.to_string(),
            url_type: UrlType::Youtube,
            duration: 180,
            requested_by: "anonymous".to_string(),
        }
    }

    #[test]
    fn song_queue_rejects_duplicate_url() {
        let dir = tempfile::tempdir().unwrap();
        let queue = SongQueue::new(dir.path().join("queue.json")).unwrap();

        assert!(queue.append(queue_item("https://example/a")).unwrap());
        assert!(!queue.append(queue_item("https://example/a")).unwrap());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn song_queue_removes_last_item_requested_by_user() {
        let dir = tempfile::tempdir().unwrap();
        let queue = SongQueue::new(dir.path().join("queue.json")).unwrap();

        let mut first = queue_item("https://example/a");
        first.requested_by = "alice".to_string();
        let mut second = queue_item("https://example/b");
        second.requested_by = "alice".to_string();
        let mut third = queue_item("https://example/c");
        third.requested_by = "bob".to_string();

        queue.append(first).unwrap();
        queue.append(second).unwrap();
        queue.append(third).unwrap();

        let removed = queue.remove_last_requested_by("alice").unwrap().unwrap();
        assert_eq!(removed.url, "https://example/b");
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn block_list_rejects_fuzzy_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let blocks = BlockList::new(dir.path().join("blocks.json")).unwrap();

        assert!(blocks
            .block(BlockEntry {
                song_name: "Bohemian Rhapsody".to_string(),
                requested_by: "alice".to_string(),
                blocked_at: "2026-01-01T00:00:00Z".to_string(),
            })
            .unwrap());

        assert!(!blocks
            .block(BlockEntry {
                song_name: "bohemian rhapsody".to_string(),
                requested_by: "bob".to_string(),
                blocked_at: "2026-01-02T00:00:00Z".to_string(),
            })
            .unwrap());
        assert_eq!(blocks.len(), 1);
        assert!(blocks.is_blocked("Bohemian Rhapsody (remastered)"));
    }

    #[test]
    fn default_playlist_metadata_filters_by_genre_and_playlist() {
        let dir = tempfile::tempdir().unwrap();
        let store = DefaultPlaylistMetadataStore::new(dir.path().join("default.json")).unwrap();

        store
            .append(DefaultPlaylistItem {
                title: "Track 1".to_string(),
                url: "https://example/1".to_string(),
                url_type: UrlType::Youtube,
                duration: 200,
                playlist_id: "p1".to_string(),
                genre: "jazz".to_string(),
                is_active: true,
            })
            .unwrap();
        store
            .append(DefaultPlaylistItem {
                title: "Track 2".to_string(),
                url: "https://example/2".to_string(),
                url_type: UrlType::Youtube,
                duration: 200,
                playlist_id: "p2".to_string(),
                genre: "rock".to_string(),
                is_active: true,
            })
            .unwrap();

        let jazz = store.filter(None, None, None, Some("jazz"));
        assert_eq!(jazz.len(), 1);
        assert_eq!(jazz[0].playlist_id, "p1");
    }
}
