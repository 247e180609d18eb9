use std::sync::Weak;
use std::time::Duration;

use tracing::{debug, warn};

use crate::store::WalStore;

const CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Background task that compacts the reservation log once enough appends
/// have piled up since the last compaction. Exits when the store is dropped.
pub async fn run_compactor(store: Weak<WalStore>, threshold: u64) {
    let mut interval = tokio::time::interval(CHECK_INTERVAL);
    loop {
        interval.tick().await;
        let Some(store) = store.upgrade() else {
            debug!("store dropped, compactor exiting");
            return;
        };
        compact_if_needed(&store, threshold).await;
    }
}

/// Compact when at least `threshold` appends happened since the last compaction.
/// Returns whether a compaction ran.
pub async fn compact_if_needed(store: &WalStore, threshold: u64) -> bool {
    let appends = store.appends_since_compact().await;
    if appends < threshold {
        return false;
    }
    match store.compact().await {
        Ok(()) => true,
        Err(e) => {
            warn!(appends, "WAL compaction failed: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ResourceStore;
    use std::path::PathBuf;
    use std::sync::Arc;
    use ulid::Ulid;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("fleetbook_test_compactor");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    #[tokio::test]
    async fn compacts_only_past_threshold() {
        let store = WalStore::open(&test_wal_path("threshold.wal")).unwrap();
        for _ in 0..3 {
            store.create_resource(Ulid::new(), None).await.unwrap();
        }

        assert!(!compact_if_needed(&store, 4).await);
        assert_eq!(store.appends_since_compact().await, 3);

        assert!(compact_if_needed(&store, 3).await);
        assert_eq!(store.appends_since_compact().await, 0);
        assert_eq!(store.resource_ids().len(), 3);
    }

    #[tokio::test]
    async fn exits_when_store_dropped() {
        let store = Arc::new(WalStore::open(&test_wal_path("exits.wal")).unwrap());
        let weak = Arc::downgrade(&store);
        drop(store);
        // First tick fires immediately; upgrade fails and the task returns.
        tokio::time::timeout(Duration::from_secs(5), run_compactor(weak, 1))
            .await
            .unwrap();
    }
}
