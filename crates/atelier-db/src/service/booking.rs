//! # Booking Service
//!
//! Appointment booking with conflict detection.
//!
//! ## Booking Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  book(new)                                                             │
//! │    │                                                                    │
//! │    ├── validate fields                                                 │
//! │    ├── look up resource, client, service (pool)                        │
//! │    │     missing → LookupFailed                                        │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │  BEGIN                                                                  │
//! │    INSERT appointment            ← writer lock: concurrent bookers     │
//! │    │                               of any slot queue here              │
//! │    SELECT day's appointments       (excluding the new row)             │
//! │    check_conflict                                                      │
//! │    ├── Conflict   → ROLLBACK, SlotConflict { client, interval }        │
//! │    └── NoConflict → COMMIT                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reschedule is the same transaction with an UPDATE as the first write and
//! the moved appointment excluded from the scan.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};

use atelier_core::conflict::{check_conflict, ScheduledAppointment};
use atelier_core::interval::{
    business_day, business_day_slot, normalize_to_minute, resolve_duration, TimeSlot,
};
use atelier_core::validation::{validate_notes, validate_required};
use atelier_core::{Appointment, AppointmentStatus, ConflictResult, CoreError, CoreResult};

use crate::config::EngineSettings;
use crate::error::EngineResult;
use crate::repository::appointment::AppointmentRepository;
use crate::repository::catalog::{CatalogRepository, Service};
use crate::repository::generate_id;
use crate::service::with_timeout;

/// Request to book an appointment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAppointment {
    pub resource_id: String,
    pub client_id: String,
    pub service_id: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewAppointment {
    pub fn validate(&self) -> CoreResult<()> {
        validate_required("resource_id", &self.resource_id)?;
        validate_required("client_id", &self.client_id)?;
        validate_required("service_id", &self.service_id)?;
        validate_notes("notes", self.notes.as_deref())?;
        Ok(())
    }
}

/// Books, moves and updates appointments for one tenant.
#[derive(Debug, Clone)]
pub struct BookingService {
    pool: SqlitePool,
    tenant_id: String,
    settings: EngineSettings,
    appointments: AppointmentRepository,
    catalog: CatalogRepository,
}

impl BookingService {
    pub fn new(pool: SqlitePool, tenant_id: &str, settings: EngineSettings) -> Self {
        BookingService {
            pool,
            tenant_id: tenant_id.to_string(),
            settings,
            appointments: AppointmentRepository::new(tenant_id),
            catalog: CatalogRepository::new(tenant_id),
        }
    }

    /// Read-only pre-check for the booking screen.
    ///
    /// The authoritative check runs again inside [`BookingService::book`].
    pub async fn validate_booking(
        &self,
        resource_id: &str,
        start: DateTime<Utc>,
        service_id: &str,
    ) -> EngineResult<ConflictResult> {
        with_timeout(self.settings.operation_timeout, "validate_booking", async {
            self.require_resource(resource_id).await?;
            let service = self.require_service(service_id).await?;

            let proposed = self.proposed_slot(start, &service);
            let existing = self
                .appointments
                .scheduled_in_window(&self.pool, resource_id, &self.day_window(&proposed), None)
                .await?;

            Ok(self.check(&proposed, &existing, None))
        })
        .await
    }

    /// Books an appointment, rejecting it if the slot is taken.
    pub async fn book(&self, new: NewAppointment) -> EngineResult<Appointment> {
        with_timeout(self.settings.operation_timeout, "book", async {
            new.validate()?;

            self.require_resource(&new.resource_id).await?;
            self.require_client(&new.client_id).await?;
            let service = self.require_service(&new.service_id).await?;

            let proposed = self.proposed_slot(new.start_time, &service);
            let now = Utc::now();
            let appointment = Appointment {
                id: generate_id(),
                tenant_id: self.tenant_id.clone(),
                resource_id: new.resource_id,
                client_id: new.client_id,
                service_id: new.service_id,
                start_time: proposed.start,
                status: AppointmentStatus::Scheduled,
                notes: new.notes,
                created_at: now,
                updated_at: now,
            };

            let mut tx = self.pool.begin().await?;

            self.appointments.insert(&mut *tx, &appointment).await?;

            let existing = self
                .appointments
                .scheduled_in_window(
                    &mut *tx,
                    &appointment.resource_id,
                    &self.day_window(&proposed),
                    Some(&appointment.id),
                )
                .await?;

            if let ConflictResult::Conflict(details) = self.check(&proposed, &existing, None) {
                tx.rollback().await?;
                info!(
                    resource_id = %appointment.resource_id,
                    start = %appointment.start_time,
                    taken_by = %details.other_appointment_id,
                    "Booking rejected: slot taken"
                );
                return Err(CoreError::from(details).into());
            }

            tx.commit().await?;

            info!(
                id = %appointment.id,
                resource_id = %appointment.resource_id,
                start = %appointment.start_time,
                minutes = proposed.duration_minutes(),
                "Appointment booked"
            );
            Ok(appointment)
        })
        .await
    }

    /// Moves an appointment, optionally changing its service.
    pub async fn reschedule(
        &self,
        appointment_id: &str,
        new_start: DateTime<Utc>,
        new_service_id: Option<&str>,
    ) -> EngineResult<Appointment> {
        with_timeout(self.settings.operation_timeout, "reschedule", async {
            validate_required("appointment_id", appointment_id).map_err(CoreError::from)?;

            let current = self.require_appointment(appointment_id).await?;
            if current.status.is_terminal() {
                return Err(CoreError::InvalidAppointmentTransition {
                    appointment_id: current.id,
                    from: current.status,
                    to: current.status,
                }
                .into());
            }

            let service_id = new_service_id.unwrap_or(&current.service_id).to_string();
            let service = self.require_service(&service_id).await?;
            let proposed = self.proposed_slot(new_start, &service);

            let mut tx = self.pool.begin().await?;

            self.appointments
                .update_schedule(&mut *tx, &current.id, proposed.start, &service_id)
                .await?;

            let existing = self
                .appointments
                .scheduled_in_window(
                    &mut *tx,
                    &current.resource_id,
                    &self.day_window(&proposed),
                    Some(&current.id),
                )
                .await?;

            if let ConflictResult::Conflict(details) =
                self.check(&proposed, &existing, Some(&current.id))
            {
                tx.rollback().await?;
                info!(id = %current.id, start = %proposed.start, "Reschedule rejected: slot taken");
                return Err(CoreError::from(details).into());
            }

            let updated = self
                .appointments
                .get_by_id(&mut *tx, &current.id)
                .await?
                .ok_or_else(|| CoreError::not_found("Appointment", current.id.as_str()))?;

            tx.commit().await?;

            info!(id = %updated.id, start = %updated.start_time, "Appointment rescheduled");
            Ok(updated)
        })
        .await
    }

    /// Moves an appointment along its lifecycle.
    ///
    /// Allowed: scheduled → confirmed | completed | cancelled,
    /// confirmed → completed | cancelled.
    pub async fn set_status(
        &self,
        appointment_id: &str,
        status: AppointmentStatus,
    ) -> EngineResult<Appointment> {
        with_timeout(self.settings.operation_timeout, "set_status", async {
            let current = self.require_appointment(appointment_id).await?;
            let rejected = |from: AppointmentStatus| CoreError::InvalidAppointmentTransition {
                appointment_id: appointment_id.to_string(),
                from,
                to: status,
            };

            if !current.status.can_transition_to(status) {
                return Err(rejected(current.status).into());
            }

            let updated = self
                .appointments
                .update_status(&self.pool, appointment_id, current.status, status)
                .await?;
            if !updated {
                // Someone else moved it first; report against the fresh status.
                let fresh = self.require_appointment(appointment_id).await?;
                return Err(rejected(fresh.status).into());
            }

            info!(
                id = %appointment_id,
                from = current.status.as_str(),
                to = status.as_str(),
                "Appointment status changed"
            );
            self.require_appointment(appointment_id).await
        })
        .await
    }

    /// Every appointment of a resource on a business day, any status.
    pub async fn list_day(&self, resource_id: &str, day: NaiveDate) -> EngineResult<Vec<Appointment>> {
        with_timeout(self.settings.operation_timeout, "list_day", async {
            let window = business_day_slot(day, self.settings.business_offset);
            let appointments = self
                .appointments
                .list_for_resource(&self.pool, resource_id, &window)
                .await?;
            Ok(appointments)
        })
        .await
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn proposed_slot(&self, start: DateTime<Utc>, service: &Service) -> TimeSlot {
        TimeSlot::starting_at(
            normalize_to_minute(start),
            resolve_duration(service.duration_minutes),
        )
    }

    /// The business day `proposed` starts on.
    fn day_window(&self, proposed: &TimeSlot) -> TimeSlot {
        let offset = self.settings.business_offset;
        business_day_slot(business_day(proposed.start, offset), offset)
    }

    fn check(
        &self,
        proposed: &TimeSlot,
        existing: &[ScheduledAppointment],
        exclude: Option<&str>,
    ) -> ConflictResult {
        let result = check_conflict(proposed, existing, exclude, self.settings.business_offset);
        debug!(
            checked = existing.len(),
            conflict = result.is_conflict(),
            "Conflict check"
        );
        result
    }

    async fn require_resource(&self, id: &str) -> EngineResult<()> {
        match self.catalog.get_resource(&self.pool, id).await? {
            Some(_) => Ok(()),
            None => Err(CoreError::not_found("Resource", id).into()),
        }
    }

    async fn require_client(&self, id: &str) -> EngineResult<()> {
        match self.catalog.get_client(&self.pool, id).await? {
            Some(_) => Ok(()),
            None => Err(CoreError::not_found("Client", id).into()),
        }
    }

    async fn require_service(&self, id: &str) -> EngineResult<Service> {
        self.catalog
            .get_service(&self.pool, id)
            .await?
            .ok_or_else(|| CoreError::not_found("Service", id).into())
    }

    async fn require_appointment(&self, id: &str) -> EngineResult<Appointment> {
        self.appointments
            .get_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| CoreError::not_found("Appointment", id).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset, TimeZone};

    use crate::error::{EngineError, ErrorCode};
    use crate::pool::DbConfig;
    use crate::service::test_support::{
        add_client, at, date, fixture, fixture_with, remove_db_files, temp_db_path, Fixture, TENANT,
    };

    fn booking(f: &Fixture) -> BookingService {
        f.db.booking(TENANT, EngineSettings::default())
    }

    fn request(f: &Fixture, client_id: &str, service_id: &str, start: DateTime<Utc>) -> NewAppointment {
        NewAppointment {
            resource_id: f.resource_id.clone(),
            client_id: client_id.to_string(),
            service_id: service_id.to_string(),
            start_time: start,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_overlapping_booking_is_rejected_with_names() {
        let f = fixture().await;
        let svc = booking(&f);
        let first = svc
            .book(request(&f, &f.client_id, &f.service_id, at(14, 0)))
            .await
            .unwrap();

        let ana = add_client(&f.db, "Ana").await;
        let err = svc
            .book(request(&f, &ana, &f.service_id, at(14, 30)))
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::Conflict);
        assert!(!err.is_retryable());
        match err {
            EngineError::Core(CoreError::SlotConflict {
                other_appointment_id,
                other_client_name,
                other_interval,
            }) => {
                assert_eq!(other_appointment_id, first.id);
                assert_eq!(other_client_name, "Maria");
                assert_eq!(other_interval, "14:00–15:00");
            }
            other => panic!("unexpected error {:?}", other),
        }

        let day = svc.list_day(&f.resource_id, date(2024, 5, 10)).await.unwrap();
        assert_eq!(day.len(), 1);
    }

    #[tokio::test]
    async fn test_abutting_bookings_succeed() {
        let f = fixture().await;
        let svc = booking(&f);

        svc.book(request(&f, &f.client_id, &f.service_id, at(10, 0)))
            .await
            .unwrap();
        svc.book(request(&f, &f.client_id, &f.service_id, at(11, 0)))
            .await
            .unwrap();
        svc.book(request(&f, &f.client_id, &f.short_service_id, at(9, 30)))
            .await
            .unwrap();

        let day = svc.list_day(&f.resource_id, date(2024, 5, 10)).await.unwrap();
        let starts: Vec<_> = day.iter().map(|a| a.start_time).collect();
        assert_eq!(starts, vec![at(9, 30), at(10, 0), at(11, 0)]);
    }

    #[tokio::test]
    async fn test_validate_booking_reports_without_writing() {
        let f = fixture().await;
        let svc = booking(&f);

        assert_eq!(
            svc.validate_booking(&f.resource_id, at(10, 0), &f.service_id)
                .await
                .unwrap(),
            ConflictResult::NoConflict
        );

        svc.book(request(&f, &f.client_id, &f.service_id, at(10, 0)))
            .await
            .unwrap();

        let result = svc
            .validate_booking(&f.resource_id, at(10, 45), &f.short_service_id)
            .await
            .unwrap();
        assert!(result.is_conflict());

        let day = svc.list_day(&f.resource_id, date(2024, 5, 10)).await.unwrap();
        assert_eq!(day.len(), 1);
    }

    #[tokio::test]
    async fn test_service_without_duration_occupies_sixty_minutes() {
        let f = fixture().await;
        let svc = booking(&f);

        svc.book(request(&f, &f.client_id, &f.untimed_service_id, at(10, 0)))
            .await
            .unwrap();

        let result = svc
            .validate_booking(&f.resource_id, at(10, 59), &f.short_service_id)
            .await
            .unwrap();
        assert!(result.is_conflict());

        svc.book(request(&f, &f.client_id, &f.short_service_id, at(11, 0)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_appointment_frees_its_slot() {
        let f = fixture().await;
        let svc = booking(&f);

        let first = svc
            .book(request(&f, &f.client_id, &f.service_id, at(15, 0)))
            .await
            .unwrap();
        svc.set_status(&first.id, AppointmentStatus::Cancelled)
            .await
            .unwrap();

        svc.book(request(&f, &f.client_id, &f.service_id, at(15, 0)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_reschedule_ignores_itself_but_not_others() {
        let f = fixture().await;
        let svc = booking(&f);

        let moving = svc
            .book(request(&f, &f.client_id, &f.service_id, at(10, 0)))
            .await
            .unwrap();
        let fixed = svc
            .book(request(&f, &f.client_id, &f.service_id, at(13, 0)))
            .await
            .unwrap();

        let moved = svc.reschedule(&moving.id, at(10, 30), None).await.unwrap();
        assert_eq!(moved.start_time, at(10, 30));

        let err = svc
            .reschedule(&moving.id, at(12, 30), None)
            .await
            .unwrap_err();
        assert!(matches!(
            &err,
            EngineError::Core(CoreError::SlotConflict { other_appointment_id, .. })
                if *other_appointment_id == fixed.id
        ));

        // Rejected move left the row where it was.
        let day = svc.list_day(&f.resource_id, date(2024, 5, 10)).await.unwrap();
        let kept = day.iter().find(|a| a.id == moving.id).unwrap();
        assert_eq!(kept.start_time, at(10, 30));

        // A shorter service fits before the fixed appointment.
        let shorter = svc
            .reschedule(&moving.id, at(12, 30), Some(&f.short_service_id))
            .await
            .unwrap();
        assert_eq!(shorter.service_id, f.short_service_id);
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let f = fixture().await;
        let svc = booking(&f);
        let appt = svc
            .book(request(&f, &f.client_id, &f.service_id, at(9, 0)))
            .await
            .unwrap();

        let confirmed = svc
            .set_status(&appt.id, AppointmentStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(confirmed.status, AppointmentStatus::Confirmed);

        svc.set_status(&appt.id, AppointmentStatus::Completed)
            .await
            .unwrap();

        let err = svc
            .set_status(&appt.id, AppointmentStatus::Cancelled)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidTransition);

        let err = svc.reschedule(&appt.id, at(16, 0), None).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidTransition);
    }

    #[tokio::test]
    async fn test_missing_references_fail_lookup() {
        let f = fixture().await;
        let svc = booking(&f);

        let err = svc
            .book(request(&f, &f.client_id, "no-such-service", at(9, 0)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::LookupFailed);
        assert!(err.to_string().contains("no-such-service"));

        let err = svc
            .validate_booking("no-such-resource", at(9, 0), &f.service_id)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::LookupFailed);

        let mut blank = request(&f, &f.client_id, &f.service_id, at(9, 0));
        blank.resource_id = String::new();
        let err = svc.book(blank).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Validation);
    }

    #[tokio::test]
    async fn test_start_is_normalised_to_the_minute() {
        let f = fixture().await;
        let svc = booking(&f);

        let booked = svc
            .book(request(
                &f,
                &f.client_id,
                &f.service_id,
                at(10, 0) + Duration::seconds(45),
            ))
            .await
            .unwrap();
        assert_eq!(booked.start_time, at(10, 0));
    }

    #[tokio::test]
    async fn test_day_follows_business_offset() {
        let f = fixture().await;
        let sao_paulo = FixedOffset::west_opt(3 * 3600).unwrap();
        let svc = f
            .db
            .booking(TENANT, EngineSettings::default().with_offset(sao_paulo));

        // 20:30 local on the 10th.
        let evening = Utc.with_ymd_and_hms(2024, 5, 10, 23, 30, 0).unwrap();
        svc.book(request(&f, &f.client_id, &f.service_id, evening))
            .await
            .unwrap();

        // 21:00 local, still the 10th, although already the 11th in UTC.
        let later = Utc.with_ymd_and_hms(2024, 5, 11, 0, 0, 0).unwrap();
        let result = svc
            .validate_booking(&f.resource_id, later, &f.service_id)
            .await
            .unwrap();
        match result {
            ConflictResult::Conflict(details) => {
                assert_eq!(details.other_interval_description, "20:30–21:30");
            }
            ConflictResult::NoConflict => panic!("expected a conflict"),
        }
    }

    #[tokio::test]
    async fn test_concurrent_bookings_for_one_slot_commit_once() {
        let path = temp_db_path();
        let f = fixture_with(DbConfig::new(&path).max_connections(5)).await;
        let svc = booking(&f);

        let mut handles = Vec::new();
        for _ in 0..6 {
            let svc = svc.clone();
            let req = request(&f, &f.client_id, &f.service_id, at(10, 0));
            handles.push(tokio::spawn(async move { svc.book(req).await }));
        }

        let mut booked = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => booked += 1,
                Err(e) if e.code() == ErrorCode::Conflict => conflicts += 1,
                Err(e) => panic!("unexpected error {:?}", e),
            }
        }
        assert_eq!(booked, 1);
        assert_eq!(conflicts, 5);

        let day = svc.list_day(&f.resource_id, date(2024, 5, 10)).await.unwrap();
        assert_eq!(day.len(), 1);

        f.db.close().await;
        remove_db_files(&path);
    }
}
