mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;

pub use availability::{booked_dates, free_ranges, merge_overlapping, subtract_ranges};
pub use error::EngineError;

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use ulid::Ulid;

use crate::compactor;
use crate::config::Config;
use crate::notify::NotifyHub;
use crate::observability;
use crate::store::{ResourceStore, WalStore};

/// Per-resource critical section. Holds no data: the history lives in the store.
type ResourceLock = Arc<Mutex<()>>;

/// Reservation engine.
///
/// Every `reserve` on a resource runs load, overlap check and commit under
/// that resource's lock. Resources never share a lock, so bookings for
/// different cars proceed in parallel. Lock entries exist only while a
/// resource has a holder or waiters.
pub struct Engine {
    store: Arc<dyn ResourceStore>,
    pub notify: Arc<NotifyHub>,
    locks: DashMap<Ulid, ResourceLock>,
    lock_timeout: Duration,
}

impl Engine {
    pub fn new(store: Arc<dyn ResourceStore>, notify: Arc<NotifyHub>, lock_timeout: Duration) -> Self {
        Self {
            store,
            notify,
            locks: DashMap::new(),
            lock_timeout,
        }
    }

    /// Open the durable store under `config.data_dir` and start its compactor.
    /// Must be called from within a tokio runtime.
    pub fn open(config: &Config) -> io::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let store = Arc::new(WalStore::open(&config.wal_path())?);

        let compactor_store = Arc::downgrade(&store);
        let threshold = config.compact_threshold;
        tokio::spawn(async move {
            compactor::run_compactor(compactor_store, threshold).await;
        });

        tracing::info!(
            data_dir = %config.data_dir.display(),
            lock_timeout_ms = config.lock_timeout.as_millis() as u64,
            compact_threshold = threshold,
            "reservation engine ready"
        );
        Ok(Self::new(store, Arc::new(NotifyHub::new()), config.lock_timeout))
    }

    /// Handle for the catalog side: creating and removing cars.
    pub fn store(&self) -> &Arc<dyn ResourceStore> {
        &self.store
    }

    /// Acquire a resource's lock, waiting at most `lock_timeout`.
    /// The guard is released on drop, including when the caller is cancelled.
    pub(super) async fn lock_resource(
        &self,
        resource_id: Ulid,
    ) -> Result<OwnedMutexGuard<()>, EngineError> {
        let lock = self.locks.entry(resource_id).or_default().clone();
        let wait_start = Instant::now();
        let guard = tokio::time::timeout(self.lock_timeout, lock.lock_owned())
            .await
            .map_err(|_| EngineError::Timeout(resource_id))?;
        metrics::histogram!(observability::LOCK_WAIT_SECONDS)
            .record(wait_start.elapsed().as_secs_f64());
        Ok(guard)
    }

    /// Drop a resource's lock entry once nobody holds or waits on it.
    /// Holders and waiters each own a clone, so a count of one is the map's.
    pub(super) fn prune_lock(&self, resource_id: Ulid) {
        self.locks
            .remove_if(&resource_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
