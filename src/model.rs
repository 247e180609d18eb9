use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Half-open calendar range `[from, to)`.
///
/// `to` is the return date: a car booked `[Jan 10, Jan 15)` is free again on
/// Jan 15, so the next customer may pick it up that same day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDateRange")]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// Wire shape of `DateRange`; decoding goes through `DateRange::new`.
#[derive(Deserialize)]
struct RawDateRange {
    from: NaiveDate,
    to: NaiveDate,
}

impl TryFrom<RawDateRange> for DateRange {
    type Error = &'static str;

    fn try_from(raw: RawDateRange) -> Result<Self, Self::Error> {
        DateRange::new(raw.from, raw.to).ok_or("date range must have from < to")
    }
}

impl DateRange {
    /// Returns `None` for zero-length or inverted ranges.
    pub fn new(from: NaiveDate, to: NaiveDate) -> Option<Self> {
        (from < to).then_some(Self { from, to })
    }

    /// Number of rental days. Zero only for a range built by hand with
    /// `from >= to`.
    pub fn days(&self) -> u64 {
        (self.to - self.from).num_days().max(0) as u64
    }

    pub fn is_empty(&self) -> bool {
        self.from >= self.to
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.from < other.to && other.from < self.to
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.from <= date && date < self.to
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_range(&self, other: &DateRange) -> bool {
        self.from <= other.from && other.to <= self.to
    }

    /// Every calendar day in the range, `from` inclusive, `to` exclusive.
    pub fn dates(self) -> impl Iterator<Item = NaiveDate> {
        let to = self.to;
        self.from.iter_days().take_while(move |d| *d < to)
    }

    /// Clamp to `window`. `None` if they don't overlap.
    pub fn clamp_to(&self, window: &DateRange) -> Option<DateRange> {
        DateRange::new(self.from.max(window.from), self.to.min(window.to))
    }

    /// Range starting at `from` and lasting `days` days.
    pub fn starting(from: NaiveDate, days: u64) -> Option<Self> {
        let to = from.checked_add_days(Days::new(days))?;
        DateRange::new(from, to)
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.from, self.to)
    }
}

/// A committed booking. Owned by exactly one resource, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub range: DateRange,
    /// Audit only; plays no part in overlap checks.
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    pub fn new(range: DateRange) -> Self {
        Self {
            id: Ulid::new(),
            range,
            created_at: Utc::now(),
        }
    }
}

/// A rentable car and its committed reservation history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub id: Ulid,
    pub name: Option<String>,
    /// Sorted by `range.from`. No two entries overlap.
    pub reservations: Vec<Reservation>,
}

impl Resource {
    pub fn new(id: Ulid, name: Option<String>) -> Self {
        Self {
            id,
            name,
            reservations: Vec::new(),
        }
    }

    /// Insert reservation maintaining sort order by `range.from`.
    pub fn insert_reservation(&mut self, reservation: Reservation) {
        let pos = self
            .reservations
            .binary_search_by_key(&reservation.range.from, |r| r.range.from)
            .unwrap_or_else(|e| e);
        self.reservations.insert(pos, reservation);
    }

    /// Return only reservations whose range overlaps the query window.
    /// Uses binary search to skip reservations starting at or after `query.to`.
    pub fn overlapping(&self, query: &DateRange) -> impl Iterator<Item = &Reservation> {
        let right_bound = self
            .reservations
            .partition_point(|r| r.range.from < query.to);
        self.reservations[..right_bound]
            .iter()
            .filter(move |r| r.range.to > query.from)
    }
}

/// WAL record format. Flat, no nesting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ResourceCreated {
        id: Ulid,
        name: Option<String>,
    },
    ResourceRemoved {
        id: Ulid,
    },
    ReservationCommitted {
        resource_id: Ulid,
        reservation: Reservation,
    },
}

impl Event {
    pub fn resource_id(&self) -> Ulid {
        match self {
            Event::ResourceCreated { id, .. } | Event::ResourceRemoved { id } => *id,
            Event::ReservationCommitted { resource_id, .. } => *resource_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, m, day).unwrap()
    }

    fn range(from: NaiveDate, to: NaiveDate) -> DateRange {
        DateRange::new(from, to).unwrap()
    }

    #[test]
    fn range_rejects_empty_and_inverted() {
        assert!(DateRange::new(d(1, 10), d(1, 10)).is_none());
        assert!(DateRange::new(d(1, 11), d(1, 10)).is_none());
        assert!(DateRange::new(d(1, 10), d(1, 11)).is_some());
    }

    #[test]
    fn range_basics() {
        let r = range(d(1, 10), d(1, 15));
        assert_eq!(r.days(), 5);
        assert!(r.contains_date(d(1, 10)));
        assert!(r.contains_date(d(1, 14)));
        assert!(!r.contains_date(d(1, 15))); // half-open
        assert_eq!(r.dates().count(), 5);
    }

    #[test]
    fn range_overlap() {
        let a = range(d(1, 10), d(1, 15));
        let b = range(d(1, 14), d(1, 18));
        let c = range(d(1, 15), d(1, 20));
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c)); // adjacent, not overlapping
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn range_across_month_boundary() {
        let r = range(d(1, 30), d(2, 2));
        assert_eq!(r.days(), 3);
        assert!(r.contains_date(d(2, 1)));
    }

    #[test]
    fn range_contains_and_clamp() {
        let outer = range(d(1, 1), d(1, 31));
        let inner = range(d(1, 5), d(1, 10));
        let partial = range(d(1, 25), d(2, 5));
        assert!(outer.contains_range(&inner));
        assert!(!outer.contains_range(&partial));
        assert_eq!(partial.clamp_to(&outer), Some(range(d(1, 25), d(1, 31))));
        assert_eq!(range(d(3, 1), d(3, 2)).clamp_to(&outer), None);
    }

    #[test]
    fn starting_builds_range_of_length() {
        let r = DateRange::starting(d(1, 30), 3).unwrap();
        assert_eq!(r, range(d(1, 30), d(2, 2)));
        assert!(DateRange::starting(d(1, 30), 0).is_none());
    }

    #[test]
    fn resource_keeps_reservations_sorted() {
        let mut rs = Resource::new(Ulid::new(), None);
        rs.insert_reservation(Reservation::new(range(d(3, 1), d(3, 5))));
        rs.insert_reservation(Reservation::new(range(d(1, 1), d(1, 5))));
        rs.insert_reservation(Reservation::new(range(d(2, 1), d(2, 5))));
        let starts: Vec<_> = rs.reservations.iter().map(|r| r.range.from).collect();
        assert_eq!(starts, vec![d(1, 1), d(2, 1), d(3, 1)]);
    }

    #[test]
    fn overlapping_skips_disjoint_reservations() {
        let mut rs = Resource::new(Ulid::new(), None);
        rs.insert_reservation(Reservation::new(range(d(1, 1), d(1, 5))));
        rs.insert_reservation(Reservation::new(range(d(1, 5), d(1, 10))));
        rs.insert_reservation(Reservation::new(range(d(1, 20), d(1, 25))));

        let hits: Vec<_> = rs
            .overlapping(&range(d(1, 4), d(1, 6)))
            .map(|r| r.range)
            .collect();
        assert_eq!(hits, vec![range(d(1, 1), d(1, 5)), range(d(1, 5), d(1, 10))]);

        assert_eq!(rs.overlapping(&range(d(1, 10), d(1, 20))).count(), 0);
    }

    #[test]
    fn event_resource_id() {
        let rid = Ulid::new();
        let committed = Event::ReservationCommitted {
            resource_id: rid,
            reservation: Reservation::new(range(d(1, 1), d(1, 2))),
        };
        assert_eq!(committed.resource_id(), rid);
        assert_eq!(Event::ResourceRemoved { id: rid }.resource_id(), rid);
    }

    #[test]
    fn decoding_rejects_inverted_range() {
        let inverted = (d(1, 15), d(1, 10));
        let bytes = bincode::serialize(&inverted).unwrap();
        assert!(bincode::deserialize::<DateRange>(&bytes).is_err());

        let good = range(d(1, 10), d(1, 15));
        let bytes = bincode::serialize(&good).unwrap();
        assert_eq!(bincode::deserialize::<DateRange>(&bytes).unwrap(), good);
    }

    #[test]
    fn hand_built_empty_range() {
        let empty = DateRange { from: d(1, 10), to: d(1, 10) };
        let inverted = DateRange { from: d(1, 12), to: d(1, 10) };
        assert!(empty.is_empty());
        assert!(inverted.is_empty());
        assert_eq!(inverted.days(), 0);
        assert!(!range(d(1, 10), d(1, 11)).is_empty());
    }
}
