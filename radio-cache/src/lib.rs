//! radio-cache - cache de fichiers sur disque avec éviction LRU
//!
//! Stocke les pistes téléchargées sous un nom de fichier dérivé de leur
//! titre, borné par une taille totale configurée (`MAX_CACHE_BYTES`), avec
//! les métadonnées (taille, dernier accès) persistées dans une base SQLite
//! embarquée - le même motif que les caches de contenu de référence, réduit
//! à un seul type d'entrée.

pub mod cache;
mod db;
mod error;

pub use cache::{sanitize_title, FileCache};
pub use error::{CacheError, Result};
