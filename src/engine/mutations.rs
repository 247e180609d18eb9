use std::time::Instant;

use chrono::NaiveDate;
use tracing::{debug, error, info, warn};
use ulid::Ulid;

use crate::model::*;
use crate::observability::{self, outcome_label};

use super::conflict::{check_no_conflict, today, validate_range};
use super::{Engine, EngineError};

impl Engine {
    /// Book `[from, to)` on a resource. Returns the new reservation's id.
    ///
    /// Among concurrent overlapping requests for one resource, the first to
    /// take the resource's lock wins and the rest get `DateConflict`.
    /// A `StorageFailure` here means the commit's outcome is unknown.
    pub async fn reserve(
        &self,
        resource_id: Ulid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Ulid, EngineError> {
        let start = Instant::now();
        let result = self.reserve_locked(resource_id, from, to).await;
        self.prune_lock(resource_id);

        metrics::counter!(observability::RESERVATIONS_TOTAL, "outcome" => outcome_label(&result))
            .increment(1);
        metrics::histogram!(observability::RESERVE_DURATION_SECONDS)
            .record(start.elapsed().as_secs_f64());

        match &result {
            Ok(id) => info!(%resource_id, reservation_id = %id, %from, %to, "reservation accepted"),
            Err(e) if e.is_rejection() => {
                debug!(%resource_id, %from, %to, "reservation rejected: {e}")
            }
            Err(e @ EngineError::Timeout(_)) => warn!(%resource_id, %from, %to, "{e}"),
            Err(e) => error!(%resource_id, %from, %to, "reservation commit failed: {e}"),
        }
        result
    }

    async fn reserve_locked(
        &self,
        resource_id: Ulid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Ulid, EngineError> {
        let range = validate_range(from, to, today())?;

        let guard = self.lock_resource(resource_id).await?;
        let resource = self.store.load_resource(resource_id).await?;
        check_no_conflict(&resource, &range)?;

        let reservation = Reservation::new(range);
        let id = reservation.id;
        let event = Event::ReservationCommitted {
            resource_id,
            reservation: reservation.clone(),
        };

        // The commit owns the guard on its own task: if this future is
        // dropped, the lock is held until the commit has landed or failed.
        let store = self.store.clone();
        let commit = tokio::spawn(async move {
            let _guard = guard;
            store.commit_reservation(resource_id, reservation).await
        });
        commit
            .await
            .map_err(|e| EngineError::StorageFailure(format!("commit task failed: {e}")))??;

        self.notify.send(resource_id, &event);
        Ok(id)
    }

    /// Retire a car. Waits out any booking in flight on it, then removes it
    /// from the store and closes its notification channel.
    pub async fn remove_resource(&self, resource_id: Ulid) -> Result<(), EngineError> {
        let result = async {
            let _guard = self.lock_resource(resource_id).await?;
            self.store.remove_resource(resource_id).await?;
            Ok::<(), EngineError>(())
        }
        .await;
        self.prune_lock(resource_id);

        match &result {
            Ok(()) => {
                self.notify
                    .send(resource_id, &Event::ResourceRemoved { id: resource_id });
                self.notify.remove(&resource_id);
                info!(%resource_id, "resource removed");
            }
            Err(e) => debug!(%resource_id, "resource removal failed: {e}"),
        }
        result
    }
}
