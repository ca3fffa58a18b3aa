//! # Interval Model
//!
//! Half-open time slots `[start, end)` occupied by a resource.
//!
//! ```text
//!   09:00        10:00        11:00
//!     ├────────────┤                 A = [09:00, 10:00)
//!                  ├────────────┤    B = [10:00, 11:00)   A and B abut: no overlap
//!           ├────────────┤           C = [09:30, 10:30)   overlaps A and B
//! ```
//!
//! Business days are computed in a fixed UTC offset supplied by the caller
//! (the tenant's local time), never in the server's local time.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::DEFAULT_SERVICE_MINUTES;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeSlot {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        debug_assert!(start <= end, "TimeSlot start must not be after end");
        TimeSlot { start, end }
    }

    /// Slot starting at `start` lasting `minutes`.
    pub fn starting_at(start: DateTime<Utc>, minutes: i64) -> Self {
        TimeSlot::new(start, start + Duration::minutes(minutes))
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// `s1 < e2 && s2 < e1`. Shared boundaries do not overlap.
    #[inline]
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// `"HH:MM–HH:MM"` in the given offset, for user-facing messages.
    pub fn describe(&self, offset: FixedOffset) -> String {
        format!(
            "{}–{}",
            self.start.with_timezone(&offset).format("%H:%M"),
            self.end.with_timezone(&offset).format("%H:%M")
        )
    }
}

/// Duration of a service, falling back to the default when unset or invalid.
#[inline]
pub fn resolve_duration(minutes: Option<i64>) -> i64 {
    match minutes {
        Some(m) if m > 0 => m,
        _ => DEFAULT_SERVICE_MINUTES,
    }
}

/// Calendar day of `instant` in the business offset.
pub fn business_day(instant: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    instant.with_timezone(&offset).date_naive()
}

/// The whole business day `[00:00, next 00:00)` as a UTC slot.
pub fn business_day_slot(day: NaiveDate, offset: FixedOffset) -> TimeSlot {
    let local_midnight = day.and_time(NaiveTime::MIN);
    let start = Utc.from_utc_datetime(&local_midnight)
        - Duration::seconds(i64::from(offset.local_minus_utc()));
    TimeSlot::new(start, start + Duration::days(1))
}

/// Drops seconds and sub-seconds; bookings are made at minute granularity.
pub fn normalize_to_minute(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(instant)
}

/// Builds a `FixedOffset` from minutes east of UTC.
pub fn offset_from_minutes(minutes: i32) -> Option<FixedOffset> {
    FixedOffset::east_opt(minutes.checked_mul(60)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, h, m, 0).unwrap()
    }

    #[test]
    fn test_overlap_cases() {
        let base = TimeSlot::starting_at(at(10, 0), 60);

        // partial overlap at either edge
        assert!(base.overlaps(&TimeSlot::starting_at(at(9, 30), 60)));
        assert!(base.overlaps(&TimeSlot::starting_at(at(10, 30), 60)));
        // containment both ways
        assert!(base.overlaps(&TimeSlot::starting_at(at(10, 15), 15)));
        assert!(base.overlaps(&TimeSlot::starting_at(at(9, 0), 180)));
        // identical
        assert!(base.overlaps(&base));
        // abutting
        assert!(!base.overlaps(&TimeSlot::starting_at(at(11, 0), 60)));
        assert!(!base.overlaps(&TimeSlot::starting_at(at(9, 0), 60)));
    }

    #[test]
    fn test_resolve_duration_defaults() {
        assert_eq!(resolve_duration(Some(45)), 45);
        assert_eq!(resolve_duration(None), 60);
        assert_eq!(resolve_duration(Some(0)), 60);
        assert_eq!(resolve_duration(Some(-10)), 60);
    }

    #[test]
    fn test_business_day_uses_offset() {
        let sao_paulo = offset_from_minutes(-180).unwrap();
        // 01:30 UTC on the 11th is 22:30 on the 10th in UTC-3
        let instant = Utc.with_ymd_and_hms(2024, 5, 11, 1, 30, 0).unwrap();
        assert_eq!(
            business_day(instant, sao_paulo),
            NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
        );

        let slot = business_day_slot(NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(), sao_paulo);
        assert_eq!(slot.start, Utc.with_ymd_and_hms(2024, 5, 10, 3, 0, 0).unwrap());
        assert_eq!(slot.duration_minutes(), 24 * 60);
    }

    #[test]
    fn test_describe_and_normalize() {
        let offset = offset_from_minutes(-180).unwrap();
        let slot = TimeSlot::starting_at(at(17, 0), 90);
        assert_eq!(slot.describe(offset), "14:00–15:30");

        let messy = Utc.with_ymd_and_hms(2024, 5, 10, 10, 0, 42).unwrap()
            + Duration::milliseconds(250);
        assert_eq!(normalize_to_minute(messy), at(10, 0));
    }
}
