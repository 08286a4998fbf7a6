//! `Store<T>` - liste ordonnée validée, dédupliquée et persistée en JSON
//!
//! Chaque mutation réécrit intégralement le fichier support (écriture dans
//! un fichier temporaire puis renommage atomique) : adapté à des listes de
//! taille modeste (file d'attente, blocklist, playlists par défaut) où la
//! simplicité prime sur le débit d'écriture.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

type ValidateFn<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;
type DedupKeyFn<T> = Box<dyn Fn(&T) -> Option<String> + Send + Sync>;
type FormatFn<T> = Box<dyn Fn(T) -> T + Send + Sync>;

/// Liste persistante générique, protégée par un verrou interne.
///
/// - `validate` rejette un item avant insertion (`InvalidItem`).
/// - `dedup_key` calcule une clé de déduplication ; `None` désactive la
///   déduplication pour cet item (la blocklist n'en a pas besoin, la
///   proximité floue étant vérifiée en amont).
/// - `format` normalise un item avant stockage (ex : valeurs par défaut).
pub struct Store<T> {
    path: PathBuf,
    items: Mutex<VecDeque<T>>,
    validate: ValidateFn<T>,
    dedup_key: DedupKeyFn<T>,
    format: FormatFn<T>,
}

impl<T> Store<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    pub fn new(
        path: impl Into<PathBuf>,
        validate: impl Fn(&T) -> bool + Send + Sync + 'static,
        dedup_key: impl Fn(&T) -> Option<String> + Send + Sync + 'static,
        format: impl Fn(T) -> T + Send + Sync + 'static,
    ) -> Result<Self> {
        let path = path.into();
        let items = load(&path)?;

        Ok(Self {
            path,
            items: Mutex::new(items),
            validate: Box::new(validate),
            dedup_key: Box::new(dedup_key),
            format: Box::new(format),
        })
    }

    fn persist(&self, items: &VecDeque<T>) -> Result<()> {
        save(&self.path, items)
    }

    fn existing_keys(items: &VecDeque<T>, dedup_key: &DedupKeyFn<T>) -> Vec<String> {
        items.iter().filter_map(|i| dedup_key(i)).collect()
    }

    /// Insère `item` en fin de liste. Retourne `false` sans effet si un item
    /// portant la même clé de déduplication est déjà présent.
    pub fn append(&self, item: T) -> Result<bool> {
        self.insert_at(item, true)
    }

    /// Insère `item` en tête de liste.
    pub fn prepend(&self, item: T) -> Result<bool> {
        self.insert_at(item, false)
    }

    fn insert_at(&self, item: T, back: bool) -> Result<bool> {
        if !(self.validate)(&item) {
            return Ok(false);
        }
        let item = (self.format)(item);

        let mut items = self.items.lock().unwrap();
        if let Some(key) = (self.dedup_key)(&item) {
            if Self::existing_keys(&items, &self.dedup_key).contains(&key) {
                return Ok(false);
            }
        }

        if back {
            items.push_back(item);
        } else {
            items.push_front(item);
        }
        self.persist(&items)?;
        Ok(true)
    }

    /// Insère plusieurs items en fin de liste dans l'ordre donné, en sautant
    /// les doublons. Retourne le nombre réellement inséré.
    pub fn append_many(&self, new_items: Vec<T>) -> Result<usize> {
        self.insert_many(new_items, true)
    }

    pub fn prepend_many(&self, new_items: Vec<T>) -> Result<usize> {
        self.insert_many(new_items, false)
    }

    fn insert_many(&self, new_items: Vec<T>, back: bool) -> Result<usize> {
        let mut items = self.items.lock().unwrap();
        let mut inserted = 0usize;

        for item in new_items {
            if !(self.validate)(&item) {
                continue;
            }
            let item = (self.format)(item);

            if let Some(key) = (self.dedup_key)(&item) {
                if Self::existing_keys(&items, &self.dedup_key).contains(&key) {
                    continue;
                }
            }

            if back {
                items.push_back(item);
            } else {
                items.push_front(item);
            }
            inserted += 1;
        }

        if inserted > 0 {
            self.persist(&items)?;
        }
        Ok(inserted)
    }

    pub fn remove_front(&self) -> Result<Option<T>> {
        let mut items = self.items.lock().unwrap();
        let removed = items.pop_front();
        if removed.is_some() {
            self.persist(&items)?;
        }
        Ok(removed)
    }

    pub fn remove_back(&self) -> Result<Option<T>> {
        let mut items = self.items.lock().unwrap();
        let removed = items.pop_back();
        if removed.is_some() {
            self.persist(&items)?;
        }
        Ok(removed)
    }

    /// Retire l'item à la position `index` (1-indexée). `None` si hors bornes.
    pub fn remove_at(&self, index: usize) -> Result<Option<T>> {
        if index == 0 {
            return Ok(None);
        }
        let mut items = self.items.lock().unwrap();
        let removed = items.remove(index - 1);
        if removed.is_some() {
            self.persist(&items)?;
        }
        Ok(removed)
    }

    /// Retire le dernier item pour lequel `predicate` retourne `true`,
    /// en parcourant la liste de la fin vers le début.
    pub fn remove_last_matching(
        &self,
        predicate: impl Fn(&T) -> bool,
    ) -> Result<Option<T>> {
        let mut items = self.items.lock().unwrap();
        let position = items.iter().rposition(predicate);
        let Some(position) = position else {
            return Ok(None);
        };
        let removed = items.remove(position);
        if removed.is_some() {
            self.persist(&items)?;
        }
        Ok(removed)
    }

    pub fn first(&self) -> Option<T> {
        self.items.lock().unwrap().front().cloned()
    }

    pub fn last(&self) -> Option<T> {
        self.items.lock().unwrap().back().cloned()
    }

    pub fn all(&self) -> Vec<T> {
        self.items.lock().unwrap().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) -> Result<()> {
        let mut items = self.items.lock().unwrap();
        items.clear();
        self.persist(&items)
    }
}

fn load<T: DeserializeOwned>(path: &PathBuf) -> Result<VecDeque<T>> {
    match fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(VecDeque::new()),
        Err(err) => Err(Error::Read {
            path: path.display().to_string(),
            source: err,
        }),
    }
}

fn save<T: Serialize>(path: &PathBuf, items: &VecDeque<T>) -> Result<()> {
    let items: Vec<&T> = items.iter().collect();
    let payload = serde_json::to_vec_pretty(&items)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| Error::Write {
            path: path.display().to_string(),
            source,
        })?;
    }

    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, payload).map_err(|source| Error::Write {
        path: tmp_path.display().to_string(),
        source,
    })?;
    fs::rename(&tmp_path, path).map_err(|source| Error::Write {
        path: path.display().to_string(),
        source,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Item {
        key: String,
        value: u32,
    }

    fn store(path: impl Into<PathBuf>) -> Store<Item> {
        Store::new(
            path,
            |item: &Item| !item.key.is_empty(),
            |item: &Item| Some(item.key.clone()),
            |item: Item| item,
        )
        .unwrap()
    }

    #[test]
    fn append_then_reload_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        {
            let s = store(&path);
            s.append(Item {
                key: "a".into(),
                value: 1,
            })
            .unwrap();
        }

        let reloaded = store(&path);
        assert_eq!(reloaded.all().len(), 1);
        assert_eq!(reloaded.first().unwrap().value, 1);
    }

    #[test]
    fn append_rejects_duplicate_key() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path().join("store.json"));

        assert!(s
            .append(Item {
                key: "a".into(),
                value: 1
            })
            .unwrap());
        assert!(!s
            .append(Item {
                key: "a".into(),
                value: 2
            })
            .unwrap());
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn append_rejects_invalid_item_without_erroring() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path().join("store.json"));

        let accepted = s
            .append(Item {
                key: "".into(),
                value: 1,
            })
            .unwrap();
        assert!(!accepted);
        assert!(s.is_empty());
    }

    #[test]
    fn remove_at_is_one_indexed() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path().join("store.json"));
        for key in ["a", "b", "c"] {
            s.append(Item {
                key: key.into(),
                value: 0,
            })
            .unwrap();
        }

        let removed = s.remove_at(2).unwrap().unwrap();
        assert_eq!(removed.key, "b");
        assert_eq!(
            s.all().iter().map(|i| i.key.clone()).collect::<Vec<_>>(),
            vec!["a", "c"]
        );
    }

    #[test]
    fn remove_last_matching_scans_from_the_back() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path().join("store.json"));
        for (key, value) in [("a", 1), ("b", 2), ("a2", 1)] {
            s.append(Item {
                key: key.into(),
                value,
            })
            .unwrap();
        }

        let removed = s.remove_last_matching(|i| i.value == 1).unwrap().unwrap();
        assert_eq!(removed.key, "a2");
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path().join("does-not-exist.json"));
        assert!(s.is_empty());
    }
}
