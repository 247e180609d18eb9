use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::*;

use super::availability;
use super::conflict::{today, validate_range, validate_window};
use super::{Engine, EngineError};

impl Engine {
    /// Read-only preview of `reserve`. Takes no lock and may be stale by the
    /// time the caller acts on it; only `reserve` is safe against races.
    pub async fn is_available(
        &self,
        resource_id: Ulid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<bool, EngineError> {
        let range = validate_range(from, to, today())?;
        let resource = self.store.load_resource(resource_id).await?;
        Ok(resource.overlapping(&range).next().is_none())
    }

    /// Committed rental history, sorted by start date.
    pub async fn reservations(&self, resource_id: Ulid) -> Result<Vec<Reservation>, EngineError> {
        Ok(self.store.load_resource(resource_id).await?.reservations)
    }

    /// Days inside `window` already taken, for greying out a date picker.
    pub async fn booked_dates(
        &self,
        resource_id: Ulid,
        window: DateRange,
    ) -> Result<Vec<NaiveDate>, EngineError> {
        validate_window(&window)?;
        let resource = self.store.load_resource(resource_id).await?;
        Ok(availability::booked_dates(&resource, &window))
    }

    /// Maximal free sub-ranges of `window`, optionally only those lasting at
    /// least `min_days`.
    pub async fn free_ranges(
        &self,
        resource_id: Ulid,
        window: DateRange,
        min_days: Option<u64>,
    ) -> Result<Vec<DateRange>, EngineError> {
        validate_window(&window)?;
        let resource = self.store.load_resource(resource_id).await?;
        let mut free = availability::free_ranges(&resource, &window);
        if let Some(min) = min_days {
            free.retain(|r| r.days() >= min);
        }
        Ok(free)
    }
}
