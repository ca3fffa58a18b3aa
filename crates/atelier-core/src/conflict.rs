//! # Conflict Checker
//!
//! Decides whether a proposed appointment overlaps an existing,
//! non-cancelled appointment of the same resource on the same day.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  atelier-db loads the day's appointments for the resource              │
//! │  (with each one's service duration and client name)                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  check_conflict(proposed, existing, exclude) ← THIS MODULE              │
//! │       │                                                                 │
//! │       ├── cancelled?         → skip                                    │
//! │       ├── excluded (self)?   → skip (rescheduling)                     │
//! │       ├── s1 < e2 && s2 < e1 → Conflict (first match wins)             │
//! │       └── none matched       → NoConflict                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::interval::{resolve_duration, TimeSlot};
use crate::types::AppointmentStatus;

/// An existing appointment as seen by the checker.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledAppointment {
    pub appointment_id: String,
    pub client_name: String,
    pub start_time: DateTime<Utc>,
    /// Raw duration from the service catalog; `None` when unset or unknown.
    pub duration_minutes: Option<i64>,
    pub status: AppointmentStatus,
}

impl ScheduledAppointment {
    pub fn slot(&self) -> TimeSlot {
        TimeSlot::starting_at(self.start_time, resolve_duration(self.duration_minutes))
    }
}

/// Who already holds the slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ConflictDetails {
    pub other_appointment_id: String,
    pub other_client_name: String,
    /// e.g. `"14:00–15:00"` in the business offset.
    pub other_interval_description: String,
}

/// Outcome of a conflict check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ConflictResult {
    NoConflict,
    Conflict(ConflictDetails),
}

impl ConflictResult {
    pub fn is_conflict(&self) -> bool {
        matches!(self, ConflictResult::Conflict(_))
    }

    /// Turns a conflict into the rejection callers surface to the user.
    pub fn into_result(self) -> CoreResult<()> {
        match self {
            ConflictResult::NoConflict => Ok(()),
            ConflictResult::Conflict(details) => Err(details.into()),
        }
    }
}

impl From<ConflictDetails> for CoreError {
    fn from(details: ConflictDetails) -> Self {
        CoreError::SlotConflict {
            other_appointment_id: details.other_appointment_id,
            other_client_name: details.other_client_name,
            other_interval: details.other_interval_description,
        }
    }
}

/// Checks `proposed` against `existing`.
///
/// `existing` is scanned in order; callers pass it sorted by start time so
/// the earliest conflicting appointment is the one reported.
pub fn check_conflict(
    proposed: &TimeSlot,
    existing: &[ScheduledAppointment],
    exclude_appointment_id: Option<&str>,
    offset: FixedOffset,
) -> ConflictResult {
    for other in existing {
        if !other.status.occupies_slot() {
            continue;
        }
        if exclude_appointment_id == Some(other.appointment_id.as_str()) {
            continue;
        }
        let slot = other.slot();
        if slot.overlaps(proposed) {
            return ConflictResult::Conflict(ConflictDetails {
                other_appointment_id: other.appointment_id.clone(),
                other_client_name: other.client_name.clone(),
                other_interval_description: slot.describe(offset),
            });
        }
    }
    ConflictResult::NoConflict
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, h, m, 0).unwrap()
    }

    fn existing(id: &str, client: &str, start: DateTime<Utc>, minutes: Option<i64>) -> ScheduledAppointment {
        ScheduledAppointment {
            appointment_id: id.to_string(),
            client_name: client.to_string(),
            start_time: start,
            duration_minutes: minutes,
            status: AppointmentStatus::Scheduled,
        }
    }

    #[test]
    fn test_partial_overlap_reports_client_and_interval() {
        let day = vec![existing("a-1", "Maria", at(14, 0), Some(60))];
        let proposed = TimeSlot::starting_at(at(14, 30), 60);

        match check_conflict(&proposed, &day, None, utc()) {
            ConflictResult::Conflict(d) => {
                assert_eq!(d.other_appointment_id, "a-1");
                assert_eq!(d.other_client_name, "Maria");
                assert_eq!(d.other_interval_description, "14:00–15:00");
            }
            ConflictResult::NoConflict => panic!("expected conflict"),
        }
    }

    #[test]
    fn test_abutting_bookings_are_accepted() {
        let day = vec![existing("a-1", "Maria", at(14, 0), Some(60))];

        let after = TimeSlot::starting_at(at(15, 0), 30);
        let before = TimeSlot::starting_at(at(13, 0), 60);
        assert_eq!(check_conflict(&after, &day, None, utc()), ConflictResult::NoConflict);
        assert_eq!(check_conflict(&before, &day, None, utc()), ConflictResult::NoConflict);
    }

    #[test]
    fn test_unknown_duration_defaults_to_sixty_minutes() {
        let day = vec![existing("a-1", "Maria", at(9, 0), None)];

        assert!(check_conflict(&TimeSlot::starting_at(at(9, 59), 10), &day, None, utc()).is_conflict());
        assert!(!check_conflict(&TimeSlot::starting_at(at(10, 0), 10), &day, None, utc()).is_conflict());
    }

    #[test]
    fn test_cancelled_and_excluded_are_ignored() {
        let mut cancelled = existing("a-1", "Maria", at(9, 0), Some(60));
        cancelled.status = AppointmentStatus::Cancelled;
        let own = existing("a-2", "Joana", at(9, 0), Some(60));
        let day = vec![cancelled, own];

        let proposed = TimeSlot::starting_at(at(9, 15), 30);
        assert!(check_conflict(&proposed, &day, None, utc()).is_conflict());
        assert_eq!(
            check_conflict(&proposed, &day, Some("a-2"), utc()),
            ConflictResult::NoConflict
        );
    }

    #[test]
    fn test_first_conflict_in_order_is_reported() {
        let day = vec![
            existing("a-1", "Maria", at(9, 0), Some(60)),
            existing("a-2", "Joana", at(10, 0), Some(60)),
        ];
        let proposed = TimeSlot::starting_at(at(9, 30), 60);

        let err = check_conflict(&proposed, &day, None, utc())
            .into_result()
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::SlotConflict { ref other_client_name, .. } if other_client_name == "Maria"
        ));
    }

    proptest! {
        /// Whatever sequence of bookings is attempted, the accepted ones
        /// never overlap pairwise.
        #[test]
        fn accepted_bookings_never_overlap(
            requests in prop::collection::vec((0i64..(22 * 60), 5i64..180), 1..40),
        ) {
            let day_start = at(0, 0);
            let mut accepted: Vec<ScheduledAppointment> = Vec::new();

            for (i, (offset_min, minutes)) in requests.into_iter().enumerate() {
                let start = day_start + Duration::minutes(offset_min);
                let proposed = TimeSlot::starting_at(start, minutes);
                if !check_conflict(&proposed, &accepted, None, utc()).is_conflict() {
                    accepted.push(existing(&format!("a-{i}"), "c", start, Some(minutes)));
                }
            }

            for (i, a) in accepted.iter().enumerate() {
                for b in accepted.iter().skip(i + 1) {
                    prop_assert!(!a.slot().overlaps(&b.slot()));
                }
            }
        }
    }
}
