//! The single shared mutable reference: "the current cache".
//!
//! The catalog owns the write side; every other component is a read-only
//! consumer holding whatever snapshot was current when it asked. The lock
//! is held only for the pointer-sized swap, so readers never wait on I/O.

use std::sync::{
    Arc, RwLock,
    atomic::{AtomicUsize, Ordering},
};

use metrics::counter;
use tracing::{info, warn};

use crate::application::cache::GarfCache;
use crate::application::error::AppError;
use crate::application::store::GarfStore;

const SOURCE: &str = "application::catalog";

pub struct GarfCatalog {
    store: Arc<dyn GarfStore>,
    current: RwLock<GarfCache>,
    approved_count: AtomicUsize,
}

impl GarfCatalog {
    /// Build the initial snapshot from the store. There is no valid state
    /// without one, so an empty or unreadable approved directory fails
    /// startup.
    pub async fn bootstrap(store: Arc<dyn GarfStore>) -> Result<Self, AppError> {
        let names = store
            .list_approved()
            .await
            .map_err(|err| AppError::unexpected(format!("initial approved listing: {err}")))?;
        let count = names.len();
        let cache = GarfCache::new(names).map_err(|err| {
            AppError::validation(format!("cannot start without approved garfs: {err}"))
        })?;

        info!(
            source = SOURCE,
            approved = count,
            "initial garf cache built"
        );

        Ok(Self {
            store,
            current: RwLock::new(cache),
            approved_count: AtomicUsize::new(count),
        })
    }

    /// Latest snapshot; non-blocking beyond the lock itself and cheap to
    /// clone (Arc-backed).
    pub fn current(&self) -> GarfCache {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => {
                warn!(
                    source = SOURCE,
                    result = "poisoned_recovered",
                    "recovered from poisoned cache lock"
                );
                poisoned.into_inner().clone()
            }
        }
    }

    /// Display-only approved count, recomputed on every refresh from the
    /// same listing. Eventually consistent with the cache, not atomic
    /// with it.
    pub fn approved_count(&self) -> usize {
        self.approved_count.load(Ordering::Relaxed)
    }

    /// Rebuild the snapshot wholesale from the store and swap it in.
    ///
    /// Never propagates: a failed listing or an empty directory leaves the
    /// previous snapshot authoritative and is retried on the next tick.
    pub async fn refresh(&self) {
        counter!("garfapi_refresh_total").increment(1);

        let names = match self.store.list_approved().await {
            Ok(names) => names,
            Err(err) => {
                counter!("garfapi_refresh_failure_total").increment(1);
                warn!(
                    source = SOURCE,
                    error = %err,
                    "approved listing failed; keeping previous snapshot"
                );
                return;
            }
        };

        let count = names.len();
        let cache = match GarfCache::new(names) {
            Ok(cache) => cache,
            Err(err) => {
                counter!("garfapi_refresh_failure_total").increment(1);
                warn!(
                    source = SOURCE,
                    error = %err,
                    "rebuilt cache was invalid; keeping previous snapshot"
                );
                return;
            }
        };

        match self.current.write() {
            Ok(mut guard) => *guard = cache,
            Err(poisoned) => {
                warn!(
                    source = SOURCE,
                    result = "poisoned_recovered",
                    "recovered from poisoned cache lock"
                );
                *poisoned.into_inner() = cache;
            }
        }
        self.approved_count.store(count, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::store::{GarfStore, StoreError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Store stub whose approved listing can be changed or made to fail
    /// between refreshes.
    pub(crate) struct ScriptedStore {
        approved: Mutex<Vec<String>>,
        failing: Mutex<bool>,
    }

    impl ScriptedStore {
        pub(crate) fn with_approved(names: &[&str]) -> Self {
            Self {
                approved: Mutex::new(names.iter().map(|s| s.to_string()).collect()),
                failing: Mutex::new(false),
            }
        }

        pub(crate) fn set_approved(&self, names: &[&str]) {
            *self.approved.lock().unwrap() = names.iter().map(|s| s.to_string()).collect();
        }

        pub(crate) fn fail_listings(&self, failing: bool) {
            *self.failing.lock().unwrap() = failing;
        }
    }

    #[async_trait]
    impl GarfStore for ScriptedStore {
        async fn list_approved(&self) -> Result<Vec<String>, StoreError> {
            if *self.failing.lock().unwrap() {
                return Err(StoreError::Io(std::io::Error::other("listing exploded")));
            }
            Ok(self.approved.lock().unwrap().clone())
        }

        async fn list_pending(&self) -> Result<Vec<String>, StoreError> {
            Ok(Vec::new())
        }

        async fn promote(&self, name: &str) -> Result<(), StoreError> {
            Err(StoreError::not_found(name))
        }

        async fn reject(&self, name: &str) -> Result<(), StoreError> {
            Err(StoreError::not_found(name))
        }

        async fn stat_approved(&self, _name: &str) -> Result<u64, StoreError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_on_empty_approved_directory() {
        let store = Arc::new(ScriptedStore::with_approved(&[]));
        assert!(GarfCatalog::bootstrap(store).await.is_err());
    }

    #[tokio::test]
    async fn bootstrap_fails_on_unreadable_store() {
        let store = Arc::new(ScriptedStore::with_approved(&["a.jpg"]));
        store.fail_listings(true);
        assert!(GarfCatalog::bootstrap(store.clone()).await.is_err());
    }

    #[tokio::test]
    async fn refresh_picks_up_new_listing() {
        let store = Arc::new(ScriptedStore::with_approved(&["a.jpg"]));
        let catalog = GarfCatalog::bootstrap(store.clone()).await.unwrap();

        store.set_approved(&["a.jpg", "b.png"]);
        catalog.refresh().await;

        assert_eq!(catalog.current().names(), ["a.jpg", "b.png"]);
        assert_eq!(catalog.approved_count(), 2);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot_queryable() {
        let store = Arc::new(ScriptedStore::with_approved(&["a.jpg", "b.png"]));
        let catalog = GarfCatalog::bootstrap(store.clone()).await.unwrap();

        store.fail_listings(true);
        catalog.refresh().await;

        let snapshot = catalog.current();
        assert_eq!(snapshot.names(), ["a.jpg", "b.png"]);
        assert_eq!(catalog.approved_count(), 2);
        // Still fully usable for picks.
        assert!(snapshot.names().contains(&snapshot.random().to_string()));
    }

    #[tokio::test]
    async fn refresh_to_empty_directory_keeps_previous_snapshot() {
        let store = Arc::new(ScriptedStore::with_approved(&["a.jpg"]));
        let catalog = GarfCatalog::bootstrap(store.clone()).await.unwrap();

        store.set_approved(&[]);
        catalog.refresh().await;

        assert_eq!(catalog.current().names(), ["a.jpg"]);
    }

    #[tokio::test]
    async fn double_refresh_without_change_is_idempotent() {
        let store = Arc::new(ScriptedStore::with_approved(&["a.jpg", "b.png"]));
        let catalog = GarfCatalog::bootstrap(store.clone()).await.unwrap();

        catalog.refresh().await;
        let first = catalog.current();
        catalog.refresh().await;
        let second = catalog.current();

        assert_eq!(first.names(), second.names());
    }
}
