//! Local durable cache tier: one JSON file per title key
//!
//! Directory layout mirrors the remote tier's key scheme:
//! ```text
//! {root}/
//! ├── french/
//! │   ├── {title-key-hash}.json
//! │   └── ...
//! └── german/
//!     └── {title-key-hash}.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};

use crate::entry::{CacheEntry, Outcome};
use crate::key::TitleKey;

/// Durable key→entry store on local disk, readable without network access.
///
/// Writes are serialized through a store-scoped lock (workers complete and
/// record concurrently) and committed with tmp→rename so a crash never
/// leaves a half-written entry behind.
pub struct LocalStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl LocalStore {
    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// An unusable root is a fatal configuration error; the run must not
    /// proceed without a working local tier.
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)
            .with_context(|| format!("cannot create cache store at {}", root.display()))?;
        Ok(Self {
            root: root.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    fn entry_path(&self, key: &TitleKey) -> PathBuf {
        self.root.join(key.object_key())
    }

    /// Read the entry for `key`, if present. Corrupt entries are treated
    /// as absent (they will be overwritten by the next record).
    pub fn get(&self, key: &TitleKey) -> Option<CacheEntry> {
        let path = self.entry_path(key);
        let json = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&json) {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("corrupt cache entry {}: {e}", path.display());
                None
            }
        }
    }

    /// Write the entry for `key` (atomic tmp→rename, last writer wins).
    pub fn put(&self, key: &TitleKey, entry: &CacheEntry) -> Result<()> {
        let _guard = self.write_lock.lock().expect("worker thread panicked");
        let path = self.entry_path(key);
        let dir = path.parent().expect("entry path has language dir");
        fs::create_dir_all(dir)
            .with_context(|| format!("cannot create {}", dir.display()))?;

        let json = serde_json::to_string_pretty(entry).context("serialize cache entry")?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("cannot write {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("cannot commit {}", path.display()))?;
        Ok(())
    }

    /// Remove the entry for `key`. Returns whether an entry existed.
    pub fn remove(&self, key: &TitleKey) -> Result<bool> {
        let _guard = self.write_lock.lock().expect("worker thread panicked");
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).with_context(|| format!("cannot remove {}", path.display()))?;
        Ok(true)
    }

    /// All readable entries across every language directory.
    /// Stale `.tmp` files and unparsable entries are skipped.
    pub fn entries(&self) -> Vec<CacheEntry> {
        let mut out = Vec::new();
        let Ok(languages) = fs::read_dir(&self.root) else {
            return out;
        };
        for lang_dir in languages.filter_map(|e| e.ok()) {
            if !lang_dir.path().is_dir() {
                continue;
            }
            let Ok(files) = fs::read_dir(lang_dir.path()) else {
                continue;
            };
            for file in files.filter_map(|e| e.ok()) {
                let path = file.path();
                if path.extension().is_none_or(|ext| ext != "json") {
                    continue;
                }
                match fs::read_to_string(&path)
                    .map_err(anyhow::Error::from)
                    .and_then(|json| serde_json::from_str(&json).map_err(Into::into))
                {
                    Ok(entry) => out.push(entry),
                    Err(e) => log::warn!("skipping {}: {e}", path.display()),
                }
            }
        }
        out
    }

    /// Drop every failed entry. Returns the removed entries so callers can
    /// propagate deletes to the remote tier.
    pub fn clear_failed(&self) -> Result<Vec<CacheEntry>> {
        let mut removed = Vec::new();
        for entry in self.entries() {
            if entry.outcome == Outcome::Failed {
                let key = TitleKey::new(&entry.title, &entry.language);
                if self.remove(&key)? {
                    removed.push(entry);
                }
            }
        }
        Ok(removed)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn failed_entry(key: &TitleKey, reason: &str) -> CacheEntry {
        CacheEntry {
            title: key.normalized().to_string(),
            language: key.language().to_string(),
            outcome: Outcome::Failed,
            reason: reason.to_string(),
            recorded_at: Utc::now(),
            attempts: 1,
        }
    }

    #[test]
    fn open_creates_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("cache");
        LocalStore::open(&root).unwrap();
        assert!(root.exists());
    }

    #[test]
    fn get_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        let key = TitleKey::new("Heidi", "german");
        assert!(store.get(&key).is_none());
    }

    #[test]
    fn put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        let key = TitleKey::new("Heidi", "german");

        store.put(&key, &failed_entry(&key, "http-404")).unwrap();

        let entry = store.get(&key).expect("entry should exist");
        assert_eq!(entry.title, "heidi");
        assert_eq!(entry.reason, "http-404");
        // No stale tmp left behind
        assert!(!dir.path().join("german").join("any.tmp").exists());
    }

    #[test]
    fn put_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        let key = TitleKey::new("Momo", "german");

        store.put(&key, &failed_entry(&key, "http-404")).unwrap();
        let mut second = failed_entry(&key, "ocr-quality-low");
        second.attempts = 2;
        store.put(&key, &second).unwrap();

        let entry = store.get(&key).unwrap();
        assert_eq!(entry.reason, "ocr-quality-low");
        assert_eq!(entry.attempts, 2);
    }

    #[test]
    fn corrupt_entry_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        let key = TitleKey::new("Heidi", "german");

        let path = dir.path().join(key.object_key());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"not json").unwrap();

        assert!(store.get(&key).is_none());
    }

    #[test]
    fn remove_reports_existence() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        let key = TitleKey::new("Heidi", "german");

        assert!(!store.remove(&key).unwrap());
        store.put(&key, &failed_entry(&key, "http-404")).unwrap();
        assert!(store.remove(&key).unwrap());
        assert!(store.get(&key).is_none());
    }

    #[test]
    fn entries_spans_languages() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        let k1 = TitleKey::new("Heidi", "german");
        let k2 = TitleKey::new("Le Petit Prince", "french");

        store.put(&k1, &failed_entry(&k1, "http-404")).unwrap();
        store.put(&k2, &failed_entry(&k2, "title-mismatch")).unwrap();

        let entries = store.entries();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn clear_failed_keeps_success() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();

        let failed_key = TitleKey::new("Heidi", "german");
        store
            .put(&failed_key, &failed_entry(&failed_key, "http-404"))
            .unwrap();

        let ok_key = TitleKey::new("Momo", "german");
        let mut ok = failed_entry(&ok_key, "");
        ok.outcome = Outcome::Success;
        store.put(&ok_key, &ok).unwrap();

        let removed = store.clear_failed().unwrap();
        assert_eq!(removed.len(), 1);
        assert!(store.get(&failed_key).is_none());
        assert!(store.get(&ok_key).is_some());
    }
}
