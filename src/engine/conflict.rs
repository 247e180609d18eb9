use chrono::{NaiveDate, Utc};

use crate::model::*;

use super::EngineError;

pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Pure input checks for a booking request. Never touches the store.
pub(crate) fn validate_range(
    from: NaiveDate,
    to: NaiveDate,
    today: NaiveDate,
) -> Result<DateRange, EngineError> {
    use crate::limits::MAX_RANGE_DAYS;
    let range = DateRange::new(from, to)
        .ok_or(EngineError::InvalidRange("from date must be before to date"))?;
    if range.from < today {
        return Err(EngineError::InvalidRange("from date is in the past"));
    }
    if range.days() > MAX_RANGE_DAYS {
        return Err(EngineError::InvalidRange("range too long"));
    }
    Ok(range)
}

/// Query windows may lie in the past (history views) but are bounded.
pub(crate) fn validate_window(window: &DateRange) -> Result<(), EngineError> {
    use crate::limits::MAX_QUERY_WINDOW_DAYS;
    if window.is_empty() {
        return Err(EngineError::InvalidRange("window from date must be before to date"));
    }
    if window.days() > MAX_QUERY_WINDOW_DAYS {
        return Err(EngineError::InvalidRange("query window too wide"));
    }
    Ok(())
}

/// First committed reservation overlapping `range`, as a conflict.
pub(crate) fn check_no_conflict(rs: &Resource, range: &DateRange) -> Result<(), EngineError> {
    match rs.overlapping(range).next() {
        Some(existing) => Err(EngineError::DateConflict(existing.id)),
        None => Ok(()),
    }
}
