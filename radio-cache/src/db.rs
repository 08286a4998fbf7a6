//! Base de données SQLite pour les métadonnées du FileCache
//!
//! Une table unique associe un titre de piste (clé primaire, déjà sanitisé)
//! à sa taille sur disque et sa date de dernier accès, ce qui suffit à
//! implémenter l'éviction LRU décrite pour le cache de fichiers.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

/// Une entrée du cache telle que stockée en base.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub title: String,
    pub size_bytes: u64,
    pub last_access_at: String,
}

#[derive(Debug)]
pub struct Db {
    conn: Mutex<Connection>,
}

impl Db {
    pub fn init(path: &Path) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS cache_entries (
                title TEXT PRIMARY KEY,
                size_bytes INTEGER NOT NULL,
                last_access_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_cache_entries_lru
                ON cache_entries (last_access_at ASC, title ASC)",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn upsert(&self, title: &str, size_bytes: u64) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO cache_entries (title, size_bytes, last_access_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(title) DO UPDATE SET
                 size_bytes = excluded.size_bytes,
                 last_access_at = excluded.last_access_at",
            params![title, size_bytes as i64, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn touch(&self, title: &str) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE cache_entries SET last_access_at = ?1 WHERE title = ?2",
            params![Utc::now().to_rfc3339(), title],
        )?;
        Ok(())
    }

    pub fn get(&self, title: &str) -> rusqlite::Result<Option<CacheEntry>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT title, size_bytes, last_access_at FROM cache_entries WHERE title = ?1",
            [title],
            |row| {
                Ok(CacheEntry {
                    title: row.get(0)?,
                    size_bytes: row.get::<_, i64>(1)? as u64,
                    last_access_at: row.get(2)?,
                })
            },
        )
        .optional()
    }

    pub fn delete(&self, title: &str) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM cache_entries WHERE title = ?1", [title])?;
        Ok(())
    }

    pub fn total_size(&self) -> rusqlite::Result<u64> {
        let conn = self.conn.lock().unwrap();
        let total: i64 = conn.query_row(
            "SELECT COALESCE(SUM(size_bytes), 0) FROM cache_entries",
            [],
            |row| row.get(0),
        )?;
        Ok(total as u64)
    }

    /// Entrées triées de la plus ancienne (évincer en premier) à la plus
    /// récente ; les égalités de date sont départagées par titre.
    pub fn oldest_first(&self) -> rusqlite::Result<Vec<CacheEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT title, size_bytes, last_access_at FROM cache_entries
             ORDER BY last_access_at ASC, title ASC",
        )?;
        stmt.query_map([], |row| {
            Ok(CacheEntry {
                title: row.get(0)?,
                size_bytes: row.get::<_, i64>(1)? as u64,
                last_access_at: row.get(2)?,
            })
        })?
        .collect()
    }

    pub fn clear(&self) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM cache_entries", [])?;
        Ok(())
    }
}
