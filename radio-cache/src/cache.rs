//! FileCache - cache de fichiers sur disque indexé par titre sanitisé
//!
//! Associe un titre de piste (après nettoyage des caractères interdits sur
//! la plupart des systèmes de fichiers) à au plus un fichier dans un
//! répertoire donné. La taille totale du cache est plafonnée à `max_bytes`
//! ; au-delà, les entrées les plus anciennes (par date de dernier accès)
//! sont évincées jusqu'à repasser sous la limite.

use crate::db::Db;
use crate::error::{CacheError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;

const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Remplace les caractères interdits dans un nom de fichier par `_`.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| if FORBIDDEN_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// Cache de fichiers à capacité bornée, persistant ses métadonnées
/// (taille, dernier accès) dans une base SQLite embarquée.
pub struct FileCache {
    dir: PathBuf,
    max_bytes: u64,
    db: Db,
    /// Verrou par titre pour garantir l'exclusion mutuelle des écrivains.
    write_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: u64) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let db = Db::init(&dir.join("cache.db"))?;

        Ok(Self {
            dir,
            max_bytes,
            db,
            write_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, title: &str) -> PathBuf {
        self.dir.join(sanitize_title(title))
    }

    fn lock_for(&self, title: &str) -> Arc<AsyncMutex<()>> {
        self.write_locks
            .lock()
            .unwrap()
            .entry(title.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Retourne le chemin du fichier en cache pour ce titre s'il existe,
    /// et met à jour sa date de dernier accès.
    pub async fn lookup(&self, title: &str) -> Result<Option<PathBuf>> {
        let sanitized = sanitize_title(title);
        let path = self.path_for(title);

        if !path.exists() {
            return Ok(None);
        }

        self.db.touch(&sanitized)?;
        Ok(Some(path))
    }

    /// Déplace `src_path` dans le cache sous le nom canonique de `title`,
    /// puis déclenche une éviction si la taille totale dépasse la limite.
    pub async fn admit(&self, src_path: &Path, title: &str) -> Result<PathBuf> {
        let sanitized = sanitize_title(title);
        let lock = self.lock_for(&sanitized);
        let _guard = lock.lock().await;

        let dest = self.path_for(title);

        let metadata = tokio::fs::metadata(src_path).await?;
        let size_bytes = metadata.len();

        tokio::fs::rename(src_path, &dest).await.map_err(|_| {
            CacheError::Other(anyhow::anyhow!(
                "failed to move {} into cache",
                src_path.display()
            ))
        })?;

        self.db.upsert(&sanitized, size_bytes)?;
        self.evict().await?;

        Ok(dest)
    }

    /// Supprime les entrées les plus anciennes jusqu'à repasser sous
    /// `max_bytes`.
    pub async fn evict(&self) -> Result<()> {
        let mut total = self.db.total_size()?;
        if total <= self.max_bytes {
            return Ok(());
        }

        for entry in self.db.oldest_first()? {
            if total <= self.max_bytes {
                break;
            }

            let path = self.dir.join(&entry.title);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    tracing::warn!(title = %entry.title, %err, "failed to evict cache entry");
                    continue;
                }
            }

            self.db.delete(&entry.title)?;
            total = total.saturating_sub(entry.size_bytes);
        }

        Ok(())
    }

    pub fn total_size(&self) -> Result<u64> {
        Ok(self.db.total_size()?)
    }

    pub fn clear(&self) -> Result<()> {
        Ok(self.db.clear()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_title_replaces_forbidden_characters() {
        assert_eq!(sanitize_title("AC/DC: Thunder?"), "AC_DC_ Thunder_");
    }

    #[tokio::test]
    async fn admit_then_lookup_round_trips() {
        let temp = tempfile::tempdir().unwrap();
        let cache = FileCache::new(temp.path(), 1024 * 1024).unwrap();

        let src = temp.path().join("incoming.mp3");
        tokio::fs::write(&src, b"some mp3 bytes").await.unwrap();

        let stored = cache.admit(&src, "Song Title").await.unwrap();
        assert!(stored.exists());

        let found = cache.lookup("Song Title").await.unwrap();
        assert_eq!(found, Some(stored));
    }

    #[tokio::test]
    async fn evict_removes_oldest_entries_first_over_budget() {
        let temp = tempfile::tempdir().unwrap();
        let cache = FileCache::new(temp.path(), 10).unwrap();

        for (name, data) in [("a", b"12345" as &[u8]), ("b", b"12345"), ("c", b"12345")] {
            let src = temp.path().join(format!("{name}.src"));
            tokio::fs::write(&src, data).await.unwrap();
            cache.admit(&src, name).await.unwrap();
        }

        // max_bytes=10: only the two most recently admitted should survive.
        assert!(cache.lookup("a").await.unwrap().is_none());
        assert!(cache.lookup("b").await.unwrap().is_some());
        assert!(cache.lookup("c").await.unwrap().is_some());
        assert!(cache.total_size().unwrap() <= 10);
    }
}
