use chrono::NaiveDate;

use crate::model::*;

// ── Availability algorithm ────────────────────────────────────────

/// Free sub-ranges of `window`: the window minus every committed reservation.
pub fn free_ranges(resource: &Resource, window: &DateRange) -> Vec<DateRange> {
    if window.is_empty() {
        return Vec::new();
    }
    let booked: Vec<DateRange> = resource
        .overlapping(window)
        .filter_map(|r| r.range.clamp_to(window))
        .collect();
    if booked.is_empty() {
        return vec![*window];
    }
    // Already sorted by `from`: reservations are kept sorted.
    subtract_ranges(&[*window], &merge_overlapping(&booked))
}

/// Every day in `window` that some reservation occupies.
pub fn booked_dates(resource: &Resource, window: &DateRange) -> Vec<NaiveDate> {
    resource
        .overlapping(window)
        .filter_map(|r| r.range.clamp_to(window))
        .flat_map(|r| r.dates())
        .collect()
}

/// Merge sorted overlapping/adjacent ranges into disjoint ranges.
pub fn merge_overlapping(sorted: &[DateRange]) -> Vec<DateRange> {
    let mut merged: Vec<DateRange> = Vec::new();
    for &range in sorted {
        if let Some(last) = merged.last_mut()
            && range.from <= last.to {
                last.to = last.to.max(range.to);
                continue;
            }
        merged.push(range);
    }
    merged
}

/// `base` minus `to_remove`. Both sorted by `from` and internally disjoint.
pub fn subtract_ranges(base: &[DateRange], to_remove: &[DateRange]) -> Vec<DateRange> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_from = b.from;
        let current_to = b.to;

        while ri < to_remove.len() && to_remove[ri].to <= current_from {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].from < current_to {
            let r = &to_remove[j];
            if r.from > current_from {
                result.push(DateRange { from: current_from, to: r.from });
            }
            current_from = current_from.max(r.to);
            j += 1;
        }

        if current_from < current_to {
            result.push(DateRange { from: current_from, to: current_to });
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 7, day).unwrap()
    }

    fn r(from: u32, to: u32) -> DateRange {
        DateRange::new(d(from), d(to)).unwrap()
    }

    fn make_resource(ranges: &[DateRange]) -> Resource {
        let mut rs = Resource::new(Ulid::new(), None);
        for range in ranges {
            rs.insert_reservation(Reservation::new(*range));
        }
        rs
    }

    #[test]
    fn merge_joins_overlapping_and_adjacent() {
        let merged = merge_overlapping(&[r(1, 3), r(2, 5), r(5, 7), r(10, 12)]);
        assert_eq!(merged, vec![r(1, 7), r(10, 12)]);
    }

    #[test]
    fn subtract_splits_base() {
        let result = subtract_ranges(&[r(1, 20)], &[r(3, 5), r(10, 12)]);
        assert_eq!(result, vec![r(1, 3), r(5, 10), r(12, 20)]);
    }

    #[test]
    fn subtract_covering_removal_leaves_nothing() {
        assert!(subtract_ranges(&[r(5, 10)], &[r(1, 20)]).is_empty());
    }

    #[test]
    fn subtract_multiple_bases() {
        let result = subtract_ranges(&[r(1, 5), r(8, 15)], &[r(4, 9), r(12, 13)]);
        assert_eq!(result, vec![r(1, 4), r(9, 12), r(13, 15)]);
    }

    #[test]
    fn free_ranges_of_empty_resource_is_window() {
        let rs = make_resource(&[]);
        assert_eq!(free_ranges(&rs, &r(1, 31)), vec![r(1, 31)]);
    }

    #[test]
    fn free_ranges_excludes_reservations() {
        let rs = make_resource(&[r(10, 15), r(15, 20), r(25, 28)]);
        assert_eq!(
            free_ranges(&rs, &r(1, 31)),
            vec![r(1, 10), r(20, 25), r(28, 31)]
        );
    }

    #[test]
    fn free_ranges_clamps_reservations_straddling_window() {
        let rs = make_resource(&[r(1, 6), r(20, 30)]);
        assert_eq!(free_ranges(&rs, &r(4, 25)), vec![r(6, 20)]);
    }

    #[test]
    fn booked_dates_lists_occupied_days_in_window() {
        let rs = make_resource(&[r(10, 12), r(20, 23)]);
        assert_eq!(booked_dates(&rs, &r(11, 22)), vec![d(11), d(20), d(21)]);
        assert!(booked_dates(&rs, &r(12, 20)).is_empty());
    }

    #[test]
    fn empty_window_has_no_free_ranges() {
        let rs = make_resource(&[]);
        let empty = DateRange { from: d(5), to: d(5) };
        assert!(free_ranges(&rs, &empty).is_empty());
    }
}
