use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use ulid::Ulid;

use crate::limits::WAL_CHANNEL_CAPACITY;
use crate::model::*;
use crate::observability;
use crate::wal::Wal;

use super::{ResourceStore, StoreError, validate_name};

type Resources = Arc<DashMap<Ulid, Resource>>;
type Responder = oneshot::Sender<Result<(), StoreError>>;

// ── Group-commit WAL channel ─────────────────────────────

enum WalCommand {
    Append {
        event: Event,
        response: Responder,
    },
    Compact {
        response: oneshot::Sender<Result<usize, StoreError>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
    #[cfg(test)]
    FailNextSync,
}

/// Owns the WAL and is the only writer of the materialized state.
///
/// Checks, logging and applying all happen here, in channel order, so a
/// mutation's outcome never depends on whether its caller is still waiting.
struct WalWriter {
    wal: Wal,
    resources: Resources,
    /// Set when a failed batch could not be rolled back. The file no longer
    /// matches memory, so every later write is refused until reopen.
    poisoned: bool,
}

/// Background task that batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Drain all immediately available Appends (the batch window).
/// 3. Check each against current state, buffer the accepted ones.
/// 4. Single flush_sync for the whole batch, then apply and respond.
async fn wal_writer_loop(mut writer: WalWriter, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break, // channel empty, flush batch
                    }
                }

                writer.commit_batch(batch);
                if let Some(other) = deferred {
                    writer.handle(other);
                }
            }
            other => writer.handle(other),
        }
    }
    tracing::debug!(path = %writer.wal.path().display(), "WAL writer stopped");
}

impl WalWriter {
    fn handle(&mut self, cmd: WalCommand) {
        match cmd {
            WalCommand::Append { event, response } => self.commit_batch(vec![(event, response)]),
            WalCommand::Compact { response } => {
                let _ = response.send(self.compact());
            }
            WalCommand::AppendsSinceCompact { response } => {
                let _ = response.send(self.wal.appends_since_compact());
            }
            #[cfg(test)]
            WalCommand::FailNextSync => self.wal.fail_next_sync(),
        }
    }

    fn exists(&self, pending: &HashMap<Ulid, bool>, id: &Ulid) -> bool {
        pending
            .get(id)
            .copied()
            .unwrap_or_else(|| self.resources.contains_key(id))
    }

    /// Existence checks against current state plus the earlier events of
    /// the same batch. Overlap is the engine's job, not the store's.
    fn check(&self, pending: &HashMap<Ulid, bool>, event: &Event) -> Result<(), StoreError> {
        if self.poisoned {
            return Err(StoreError::Storage(
                "reservation log is inconsistent, reopen the store".into(),
            ));
        }
        match event {
            Event::ResourceCreated { id, .. } if self.exists(pending, id) => {
                Err(StoreError::AlreadyExists(*id))
            }
            Event::ResourceRemoved { id } | Event::ReservationCommitted { resource_id: id, .. }
                if !self.exists(pending, id) =>
            {
                Err(StoreError::NotFound(*id))
            }
            _ => Ok(()),
        }
    }

    fn commit_batch(&mut self, batch: Vec<(Event, Responder)>) {
        let mut pending = HashMap::new();
        let mut accepted = Vec::with_capacity(batch.len());
        for (event, response) in batch {
            if let Err(e) = self.check(&pending, &event) {
                let _ = response.send(Err(e));
                continue;
            }
            match &event {
                Event::ResourceCreated { id, .. } => {
                    pending.insert(*id, true);
                }
                Event::ResourceRemoved { id } => {
                    pending.insert(*id, false);
                }
                Event::ReservationCommitted { .. } => {}
            }
            accepted.push((event, response));
        }
        if accepted.is_empty() {
            return;
        }

        metrics::histogram!(observability::WAL_FLUSH_BATCH_SIZE).record(accepted.len() as f64);
        let mark = self.wal.mark();
        let flush_start = Instant::now();
        let result = self.write_batch(&accepted);
        metrics::histogram!(observability::WAL_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());

        match result {
            Ok(()) => {
                for (event, response) in accepted {
                    apply_event(&self.resources, &event);
                    let _ = response.send(Ok(()));
                }
            }
            Err(e) => {
                tracing::error!(batch = accepted.len(), "WAL flush failed: {e}");
                if let Err(rb) = self.wal.rollback(mark) {
                    tracing::error!("WAL rollback failed, refusing further writes: {rb}");
                    self.poisoned = true;
                }
                let msg = e.to_string();
                for (_, response) in accepted {
                    let _ = response.send(Err(StoreError::Storage(msg.clone())));
                }
            }
        }
    }

    fn write_batch(&mut self, batch: &[(Event, Responder)]) -> io::Result<()> {
        for (event, _) in batch {
            self.wal.append_buffered(event)?;
        }
        self.wal.flush_sync()
    }

    /// Every event logged so far has been applied, so the map is an exact
    /// snapshot of the log.
    fn compact(&mut self) -> Result<usize, StoreError> {
        if self.poisoned {
            return Err(StoreError::Storage(
                "reservation log is inconsistent, reopen the store".into(),
            ));
        }
        let mut events = Vec::new();
        for entry in self.resources.iter() {
            let rs = entry.value();
            events.push(Event::ResourceCreated {
                id: rs.id,
                name: rs.name.clone(),
            });
            events.extend(rs.reservations.iter().map(|r| Event::ReservationCommitted {
                resource_id: rs.id,
                reservation: r.clone(),
            }));
        }
        self.wal.compact(&events)?;
        Ok(events.len())
    }
}

/// Apply a replayed or freshly logged event to the materialized state.
/// A repeated create never replaces an existing history.
fn apply_event(resources: &DashMap<Ulid, Resource>, event: &Event) {
    match event {
        Event::ResourceCreated { id, name } => {
            resources
                .entry(*id)
                .or_insert_with(|| Resource::new(*id, name.clone()));
        }
        Event::ResourceRemoved { id } => {
            resources.remove(id);
        }
        Event::ReservationCommitted {
            resource_id,
            reservation,
        } => {
            if let Some(mut rs) = resources.get_mut(resource_id) {
                rs.insert_reservation(reservation.clone());
            }
        }
    }
}

/// WAL-backed store. Every mutation is fsynced (group commit) before it
/// becomes visible through `load_resource`.
pub struct WalStore {
    resources: Resources,
    wal_tx: mpsc::Sender<WalCommand>,
}

impl WalStore {
    /// Replay the WAL at `path` and spawn its writer task.
    /// Must be called from within a tokio runtime.
    pub fn open(path: &Path) -> io::Result<Self> {
        let events = Wal::recover(path)?;
        let wal = Wal::open(path)?;

        let resources: Resources = Arc::new(DashMap::new());
        for event in &events {
            apply_event(&resources, event);
        }
        tracing::info!(
            path = %path.display(),
            events = events.len(),
            resources = resources.len(),
            "replayed reservation log"
        );
        metrics::gauge!(observability::RESOURCES_ACTIVE).set(resources.len() as f64);

        let (wal_tx, wal_rx) = mpsc::channel(WAL_CHANNEL_CAPACITY);
        let writer = WalWriter {
            wal,
            resources: resources.clone(),
            poisoned: false,
        };
        tokio::spawn(wal_writer_loop(writer, wal_rx));

        Ok(Self { resources, wal_tx })
    }

    /// Hand a mutation to the writer and wait for its verdict. Once the
    /// command is queued it is checked, logged and applied even if this
    /// future is dropped.
    async fn submit(&self, event: Event) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event,
                response: tx,
            })
            .await
            .map_err(|_| StoreError::Storage("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Storage("WAL writer dropped response".into()))?
    }

    /// Rewrite the WAL with only the events needed to recreate the current state.
    pub async fn compact(&self) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { response: tx })
            .await
            .map_err(|_| StoreError::Storage("WAL writer shut down".into()))?;
        let count = rx
            .await
            .map_err(|_| StoreError::Storage("WAL writer dropped response".into()))??;

        metrics::counter!(observability::WAL_COMPACTIONS_TOTAL).increment(1);
        tracing::info!(events = count, "compacted reservation log");
        Ok(())
    }

    pub async fn appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    #[cfg(test)]
    async fn fail_next_sync(&self) {
        let _ = self.wal_tx.send(WalCommand::FailNextSync).await;
    }
}

#[async_trait]
impl ResourceStore for WalStore {
    async fn load_resource(&self, id: Ulid) -> Result<Resource, StoreError> {
        self.resources
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(StoreError::NotFound(id))
    }

    async fn commit_reservation(
        &self,
        id: Ulid,
        reservation: Reservation,
    ) -> Result<(), StoreError> {
        self.submit(Event::ReservationCommitted {
            resource_id: id,
            reservation,
        })
        .await
    }

    async fn create_resource(&self, id: Ulid, name: Option<String>) -> Result<(), StoreError> {
        validate_name(name.as_deref())?;
        self.submit(Event::ResourceCreated { id, name }).await?;
        metrics::gauge!(observability::RESOURCES_ACTIVE).set(self.resources.len() as f64);
        Ok(())
    }

    async fn remove_resource(&self, id: Ulid) -> Result<(), StoreError> {
        self.submit(Event::ResourceRemoved { id }).await?;
        metrics::gauge!(observability::RESOURCES_ACTIVE).set(self.resources.len() as f64);
        Ok(())
    }

    fn resource_ids(&self) -> Vec<Ulid> {
        self.resources.iter().map(|e| *e.key()).collect()
    }
}
