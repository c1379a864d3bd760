//! Dual-tier cache coordinator: the gatekeeper before any network work
//!
//! Lookup order: local tier, then remote tier with write-through. Records
//! go to the local tier synchronously and to the remote tier best-effort
//! via the background sync thread. Consistency across instances is
//! eventual: two instances racing on the same title is bounded waste, not
//! an error, and no distributed locking is attempted.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;

use crate::entry::{CacheEntry, Outcome};
use crate::key::TitleKey;
use crate::local::LocalStore;
use crate::remote::RemoteTier;
use crate::sync::RemoteSyncHandle;

/// Result of a cache lookup. Expired entries are reported as `Absent`.
#[derive(Debug)]
pub enum Lookup {
    Absent,
    Hit(CacheEntry),
}

/// Counters surfaced by the `cache stats` command and the run summary.
#[derive(Debug)]
pub struct CacheStats {
    pub total: usize,
    pub failed: usize,
    pub success: usize,
    pub remote_enabled: bool,
    pub remote_sync_errors: bool,
    pub remote_sync_dropped: usize,
}

pub struct CacheCoordinator {
    local: LocalStore,
    remote: Option<Arc<dyn RemoteTier>>,
    sync: Option<RemoteSyncHandle>,
    ttl: chrono::Duration,
}

impl CacheCoordinator {
    /// Build a coordinator over an opened local store and an optional
    /// remote tier. `remote: None` is the capability-degraded local-only
    /// mode (no credentials, or the startup probe failed).
    pub fn new(local: LocalStore, remote: Option<Arc<dyn RemoteTier>>, ttl_days: i64) -> Self {
        let sync = remote.clone().map(RemoteSyncHandle::spawn);
        Self {
            local,
            remote,
            sync,
            ttl: chrono::Duration::days(ttl_days),
        }
    }

    /// Check both tiers for a still-valid entry.
    ///
    /// A remote hit is written through to the local tier so the next
    /// lookup needs no network. Remote failures are logged and treated as
    /// absent; they must never surface to the caller.
    pub fn lookup(&self, key: &TitleKey) -> Lookup {
        let now = Utc::now();

        if let Some(entry) = self.local.get(key) {
            if entry.is_valid_at(self.ttl, now) {
                return Lookup::Hit(entry);
            }
        }

        if let Some(remote) = &self.remote {
            match remote.get(&key.object_key()) {
                Ok(Some(body)) => match serde_json::from_slice::<CacheEntry>(&body) {
                    Ok(entry) if entry.is_valid_at(self.ttl, now) => {
                        if let Err(e) = self.local.put(key, &entry) {
                            log::warn!("write-through for {key} failed: {e:#}");
                        }
                        return Lookup::Hit(entry);
                    }
                    Ok(_) => {} // expired on the remote side too
                    Err(e) => log::debug!("unparsable remote entry for {key}: {e}"),
                },
                Ok(None) => {}
                Err(e) => log::debug!("remote lookup for {key} failed, treating as absent: {e}"),
            }
        }

        Lookup::Absent
    }

    /// Record an outcome: synchronous local write, best-effort async
    /// remote write. Only a local-store failure propagates; that is a
    /// fatal store problem, not a per-title condition.
    pub fn record(&self, key: &TitleKey, outcome: Outcome, reason: &str) -> Result<CacheEntry> {
        // Count prior attempts even when the old entry already expired
        let attempts = self.local.get(key).map_or(0, |e| e.attempts) + 1;
        let entry = CacheEntry {
            title: key.normalized().to_string(),
            language: key.language().to_string(),
            outcome,
            reason: reason.to_string(),
            recorded_at: Utc::now(),
            attempts,
        };

        self.local
            .put(key, &entry)
            .with_context(|| format!("local cache write for {key}"))?;

        if let Some(sync) = &self.sync {
            match serde_json::to_vec(&entry) {
                Ok(body) => sync.enqueue_put(key.object_key(), body),
                Err(e) => log::warn!("cannot serialize entry for {key}: {e}"),
            }
        }
        Ok(entry)
    }

    /// Forget a title in both tiers so the next run retries it.
    pub fn remove(&self, key: &TitleKey) -> Result<bool> {
        let existed = self.local.remove(key)?;
        if let Some(sync) = &self.sync {
            sync.enqueue_delete(key.object_key());
        }
        Ok(existed)
    }

    /// Drop all failed entries (both tiers). Success entries are kept.
    pub fn clear_failed(&self) -> Result<usize> {
        let removed = self.local.clear_failed()?;
        if let Some(sync) = &self.sync {
            for entry in &removed {
                let key = TitleKey::new(&entry.title, &entry.language);
                sync.enqueue_delete(key.object_key());
            }
        }
        Ok(removed.len())
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.local.entries();
        let failed = entries
            .iter()
            .filter(|e| e.outcome == Outcome::Failed)
            .count();
        CacheStats {
            total: entries.len(),
            failed,
            success: entries.len() - failed,
            remote_enabled: self.remote.is_some(),
            remote_sync_errors: self.sync.as_ref().is_some_and(|s| s.had_errors()),
            remote_sync_dropped: self.sync.as_ref().map_or(0, |s| s.dropped()),
        }
    }

    /// Export the failed-title list, sorted, one per line.
    pub fn export_failed(&self, path: &Path) -> Result<usize> {
        let mut titles: Vec<String> = self
            .local
            .entries()
            .into_iter()
            .filter(|e| e.outcome == Outcome::Failed)
            .map(|e| format!("{} [{}]: {}", e.title, e.language, e.reason))
            .collect();
        titles.sort();
        let count = titles.len();
        let mut content = titles.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        std::fs::write(path, content)
            .with_context(|| format!("cannot write {}", path.display()))?;
        Ok(count)
    }

    /// Drain the remote sync queue. Returns the synced write count, or
    /// `None` in local-only mode.
    pub fn finish(mut self) -> Option<usize> {
        self.sync.take().map(|s| s.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteError;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Shared in-memory remote tier standing in for the object store.
    #[derive(Default)]
    struct MemoryRemote {
        objects: Mutex<HashMap<String, Vec<u8>>>,
        gets: AtomicUsize,
        fail: bool,
    }

    impl RemoteTier for MemoryRemote {
        fn get(&self, object_key: &str) -> Result<Option<Vec<u8>>, RemoteError> {
            self.gets.fetch_add(1, Ordering::Relaxed);
            if self.fail {
                return Err(RemoteError::Http(bookline_core::HttpError::Timeout));
            }
            Ok(self.objects.lock().unwrap().get(object_key).cloned())
        }

        fn put(&self, object_key: &str, body: &[u8]) -> Result<(), RemoteError> {
            if self.fail {
                return Err(RemoteError::Http(bookline_core::HttpError::Timeout));
            }
            self.objects
                .lock()
                .unwrap()
                .insert(object_key.to_string(), body.to_vec());
            Ok(())
        }

        fn delete(&self, object_key: &str) -> Result<(), RemoteError> {
            if self.fail {
                return Err(RemoteError::Http(bookline_core::HttpError::Timeout));
            }
            self.objects.lock().unwrap().remove(object_key);
            Ok(())
        }
    }

    fn local_only(dir: &tempfile::TempDir) -> CacheCoordinator {
        CacheCoordinator::new(LocalStore::open(dir.path()).unwrap(), None, 14)
    }

    #[test]
    fn lookup_absent_on_fresh_store() {
        let dir = tempfile::tempdir().unwrap();
        let cache = local_only(&dir);
        let key = TitleKey::new("Heidi", "german");
        assert!(matches!(cache.lookup(&key), Lookup::Absent));
    }

    #[test]
    fn record_then_lookup_hits_locally() {
        let dir = tempfile::tempdir().unwrap();
        let cache = local_only(&dir);
        let key = TitleKey::new("Heidi", "german");

        cache.record(&key, Outcome::Failed, "http-404").unwrap();

        match cache.lookup(&key) {
            Lookup::Hit(entry) => {
                assert_eq!(entry.outcome, Outcome::Failed);
                assert_eq!(entry.reason, "http-404");
                assert_eq!(entry.attempts, 1);
            }
            Lookup::Absent => panic!("expected hit"),
        }
    }

    #[test]
    fn expired_failed_entry_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalStore::open(dir.path()).unwrap();
        let key = TitleKey::new("Heidi", "german");

        // Backdated entry past the TTL window
        let stale = CacheEntry {
            title: key.normalized().to_string(),
            language: key.language().to_string(),
            outcome: Outcome::Failed,
            reason: "http-404".to_string(),
            recorded_at: Utc::now() - chrono::Duration::days(15),
            attempts: 1,
        };
        local.put(&key, &stale).unwrap();

        let cache = CacheCoordinator::new(local, None, 14);
        assert!(matches!(cache.lookup(&key), Lookup::Absent));
    }

    #[test]
    fn success_entry_never_expires() {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalStore::open(dir.path()).unwrap();
        let key = TitleKey::new("Momo", "german");

        let old = CacheEntry {
            title: key.normalized().to_string(),
            language: key.language().to_string(),
            outcome: Outcome::Success,
            reason: String::new(),
            recorded_at: Utc::now() - chrono::Duration::days(10_000),
            attempts: 1,
        };
        local.put(&key, &old).unwrap();

        let cache = CacheCoordinator::new(local, None, 14);
        assert!(matches!(cache.lookup(&key), Lookup::Hit(_)));
    }

    #[test]
    fn attempts_increment_across_records() {
        let dir = tempfile::tempdir().unwrap();
        let cache = local_only(&dir);
        let key = TitleKey::new("Heidi", "german");

        cache.record(&key, Outcome::Failed, "http-404").unwrap();
        let second = cache.record(&key, Outcome::Failed, "http-503").unwrap();
        assert_eq!(second.attempts, 2);
    }

    #[test]
    fn second_instance_sees_remote_entry() {
        // Scenario B: instance 1 records a failure; instance 2 (separate
        // local store, same bucket) must see it without any adapter work.
        let remote = Arc::new(MemoryRemote::default());
        let key = TitleKey::new("Le Petit Prince", "french");

        let dir1 = tempfile::tempdir().unwrap();
        let cache1 = CacheCoordinator::new(
            LocalStore::open(dir1.path()).unwrap(),
            Some(remote.clone()),
            14,
        );
        cache1.record(&key, Outcome::Failed, "ocr-quality-low").unwrap();
        cache1.finish();

        let dir2 = tempfile::tempdir().unwrap();
        let cache2 = CacheCoordinator::new(
            LocalStore::open(dir2.path()).unwrap(),
            Some(remote.clone()),
            14,
        );
        match cache2.lookup(&key) {
            Lookup::Hit(entry) => assert_eq!(entry.reason, "ocr-quality-low"),
            Lookup::Absent => panic!("expected remote hit"),
        }

        // Write-through: the second lookup is served locally
        let gets_before = remote.gets.load(Ordering::Relaxed);
        assert!(matches!(cache2.lookup(&key), Lookup::Hit(_)));
        assert_eq!(remote.gets.load(Ordering::Relaxed), gets_before);
    }

    #[test]
    fn remote_failure_never_raises_from_record() {
        let remote = Arc::new(MemoryRemote {
            fail: true,
            ..Default::default()
        });
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheCoordinator::new(
            LocalStore::open(dir.path()).unwrap(),
            Some(remote),
            14,
        );
        let key = TitleKey::new("Heidi", "german");

        // Caller contract unchanged by the dead remote tier
        cache.record(&key, Outcome::Failed, "http-404").unwrap();
        assert!(matches!(cache.lookup(&key), Lookup::Hit(_)));
    }

    #[test]
    fn remove_forces_retry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = local_only(&dir);
        let key = TitleKey::new("Heidi", "german");

        cache.record(&key, Outcome::Failed, "http-404").unwrap();
        assert!(cache.remove(&key).unwrap());
        assert!(matches!(cache.lookup(&key), Lookup::Absent));
    }

    #[test]
    fn clear_failed_propagates_deletes() {
        let remote = Arc::new(MemoryRemote::default());
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheCoordinator::new(
            LocalStore::open(dir.path()).unwrap(),
            Some(remote.clone()),
            14,
        );

        let failed_key = TitleKey::new("Heidi", "german");
        cache.record(&failed_key, Outcome::Failed, "http-404").unwrap();
        let ok_key = TitleKey::new("Momo", "german");
        cache.record(&ok_key, Outcome::Success, "").unwrap();

        let cleared = cache.clear_failed().unwrap();
        assert_eq!(cleared, 1);
        cache.finish();

        let objects = remote.objects.lock().unwrap();
        assert!(!objects.contains_key(&failed_key.object_key()));
        assert!(objects.contains_key(&ok_key.object_key()));
    }

    #[test]
    fn stats_counts_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let cache = local_only(&dir);

        cache
            .record(&TitleKey::new("Heidi", "german"), Outcome::Failed, "http-404")
            .unwrap();
        cache
            .record(&TitleKey::new("Momo", "german"), Outcome::Success, "")
            .unwrap();

        let stats = cache.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.success, 1);
        assert!(!stats.remote_enabled);
    }

    #[test]
    fn export_failed_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let cache = local_only(&dir);

        cache
            .record(&TitleKey::new("Momo", "german"), Outcome::Failed, "http-404")
            .unwrap();
        cache
            .record(&TitleKey::new("Heidi", "german"), Outcome::Failed, "title-mismatch")
            .unwrap();

        let out = dir.path().join("failed.txt");
        let count = cache.export_failed(&out).unwrap();
        assert_eq!(count, 2);

        let content = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert!(lines[0].starts_with("heidi"));
        assert!(lines[1].starts_with("momo"));
    }
}
