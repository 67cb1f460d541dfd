//! Registry of active runs, one per repository key.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::cancellation::CancellationToken;
use crate::core::RunId;
use crate::errors::{LaunchpadError, Result};
use crate::progress::ProgressChannel;
use crate::repository::RepositoryKey;

/// A non-terminal run.
#[derive(Debug, Clone)]
pub struct ActiveRun {
    /// The run.
    pub run_id: RunId,
    /// The repository it operates on.
    pub key: RepositoryKey,
    /// Cooperative cancellation of the run.
    pub cancel: Arc<CancellationToken>,
    /// The run's progress channel.
    pub channel: Arc<ProgressChannel>,
    /// When the run was registered.
    pub started_at: DateTime<Utc>,
}

/// Active runs keyed by repository, plus per-key admission locks.
///
/// Registration uses the map's entry API so that two concurrent requests
/// for one key can never both succeed. Administrative operations hold the
/// key's lock while they check for an active run and write the record.
#[derive(Debug, Default)]
pub struct RunRegistry {
    by_key: DashMap<RepositoryKey, ActiveRun>,
    by_run: DashMap<RunId, RepositoryKey>,
    locks: DashMap<RepositoryKey, Arc<Mutex<()>>>,
}

impl RunRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive admission to `key`.
    ///
    /// The key's lock entry is dropped again once the last holder or waiter
    /// lets go of it.
    pub async fn lock_key(&self, key: &RepositoryKey) -> KeyGuard<'_> {
        let lock = self.locks.entry(key.clone()).or_default().clone();
        let guard = lock.lock_owned().await;
        KeyGuard {
            registry: self,
            key: key.clone(),
            guard: Some(guard),
        }
    }

    /// Number of keys with a held or awaited admission lock.
    #[must_use]
    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }

    /// Registers the run built by `make` unless `key` already has one.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyRunning` naming the active run.
    pub fn register(&self, key: &RepositoryKey, make: impl FnOnce() -> ActiveRun) -> Result<ActiveRun> {
        match self.by_key.entry(key.clone()) {
            Entry::Occupied(existing) => Err(LaunchpadError::AlreadyRunning {
                key: key.to_string(),
                run_id: existing.get().run_id,
            }),
            Entry::Vacant(slot) => {
                let run = make();
                self.by_run.insert(run.run_id, key.clone());
                slot.insert(run.clone());
                debug!(repository = %key, run_id = %run.run_id, "Registered run");
                Ok(run)
            }
        }
    }

    /// Removes `run_id` if it is still the active run of `key`.
    pub fn deregister(&self, key: &RepositoryKey, run_id: RunId) {
        self.by_key.remove_if(key, |_, run| run.run_id == run_id);
        self.by_run.remove(&run_id);
        debug!(repository = %key, run_id = %run_id, "Deregistered run");
    }

    /// The active run of a repository.
    #[must_use]
    pub fn by_key(&self, key: &RepositoryKey) -> Option<ActiveRun> {
        self.by_key.get(key).map(|run| run.value().clone())
    }

    /// An active run by id.
    #[must_use]
    pub fn by_run(&self, run_id: RunId) -> Option<ActiveRun> {
        let key = self.by_run.get(&run_id).map(|k| k.value().clone())?;
        self.by_key(&key).filter(|run| run.run_id == run_id)
    }

    /// Returns true if `key` has an active run.
    #[must_use]
    pub fn is_active(&self, key: &RepositoryKey) -> bool {
        self.by_key.contains_key(key)
    }

    /// Number of active runs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    /// Returns true if no run is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

/// Exclusive admission to one repository key.
#[derive(Debug)]
pub struct KeyGuard<'a> {
    registry: &'a RunRegistry,
    key: RepositoryKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold their own clone, so a count of one means only the map is left.
        self.registry
            .locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MonotonicCounter;
    use crate::errors::ErrorKind;
    use crate::progress::ChannelConfig;

    fn active(run_id: u64, key: &RepositoryKey) -> ActiveRun {
        let run_id = RunId::new(run_id);
        ActiveRun {
            run_id,
            key: key.clone(),
            cancel: Arc::new(CancellationToken::new()),
            channel: Arc::new(ProgressChannel::new(
                run_id,
                Arc::new(MonotonicCounter::new()),
                ChannelConfig::default(),
            )),
            started_at: Utc::now(),
        }
    }

    #[test]
    fn test_second_registration_rejected() {
        let registry = RunRegistry::new();
        let key = RepositoryKey::new("acme", "widgets", "main");

        registry.register(&key, || active(1, &key)).unwrap();
        let err = registry.register(&key, || active(2, &key)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyRunning);
        assert!(err.to_string().contains("run-1"));
        assert_eq!(registry.len(), 1);
        assert!(registry.by_run(RunId::new(2)).is_none());
    }

    #[test]
    fn test_deregister_only_removes_matching_run() {
        let registry = RunRegistry::new();
        let key = RepositoryKey::new("acme", "widgets", "main");
        registry.register(&key, || active(1, &key)).unwrap();

        registry.deregister(&key, RunId::new(9));
        assert!(registry.is_active(&key));

        registry.deregister(&key, RunId::new(1));
        assert!(registry.is_empty());
        assert!(registry.by_run(RunId::new(1)).is_none());
    }

    #[test]
    fn test_independent_keys() {
        let registry = RunRegistry::new();
        let widgets = RepositoryKey::new("acme", "widgets", "main");
        let gadgets = RepositoryKey::new("acme", "gadgets", "main");
        registry.register(&widgets, || active(1, &widgets)).unwrap();
        registry.register(&gadgets, || active(2, &gadgets)).unwrap();

        assert_eq!(registry.by_run(RunId::new(2)).unwrap().key, gadgets);
        assert_eq!(registry.by_key(&widgets).unwrap().run_id, RunId::new(1));
    }

    #[tokio::test]
    async fn test_lock_key_serializes() {
        let registry = Arc::new(RunRegistry::new());
        let key = RepositoryKey::new("acme", "widgets", "main");

        let guard = registry.lock_key(&key).await;
        let contender = {
            let registry = registry.clone();
            let key = key.clone();
            tokio::spawn(async move {
                let _guard = registry.lock_key(&key).await;
            })
        };
        tokio::task::yield_now().await;
        assert!(!contender.is_finished());
        drop(guard);
        contender.await.unwrap();
        assert_eq!(registry.lock_count(), 0);
    }

    #[tokio::test]
    async fn test_released_locks_are_not_retained() {
        let registry = RunRegistry::new();
        for n in 0..100 {
            let key = RepositoryKey::new("acme", &format!("unknown-{n}"), "main");
            let _guard = registry.lock_key(&key).await;
            assert_eq!(registry.lock_count(), 1);
        }
        assert_eq!(registry.lock_count(), 0);
    }

    #[tokio::test]
    async fn test_lock_survives_release_while_contended() {
        let registry = Arc::new(RunRegistry::new());
        let key = RepositoryKey::new("acme", "widgets", "main");
        let held = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let guard = registry.lock_key(&key).await;
        let contenders: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                let key = key.clone();
                let held = held.clone();
                tokio::spawn(async move {
                    let _guard = registry.lock_key(&key).await;
                    assert_eq!(held.fetch_add(1, std::sync::atomic::Ordering::SeqCst), 0);
                    tokio::task::yield_now().await;
                    held.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
                })
            })
            .collect();
        tokio::task::yield_now().await;
        drop(guard);
        assert_eq!(registry.lock_count(), 1);

        for contender in contenders {
            contender.await.unwrap();
        }
        assert_eq!(registry.lock_count(), 0);
    }
}
