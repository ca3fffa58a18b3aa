//! # Appointment Repository
//!
//! Bookings of a resource (technician) by a client.
//!
//! ## Day Scan
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  scheduled_in_window(resource, [day 00:00, next day 00:00), exclude)   │
//! │                                                                         │
//! │  appointments a                                                         │
//! │    LEFT JOIN services s  → duration_minutes (NULL → 60 in the core)    │
//! │    LEFT JOIN clients  c  → client name for the conflict message        │
//! │  WHERE status != 'cancelled' AND id != exclude                          │
//! │  ORDER BY start_time         → first conflict by start time wins       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `start_time` is stored as RFC 3339 text normalised to whole minutes, so
//! text comparison orders the same way as the instants do.

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite};
use tracing::debug;

use atelier_core::conflict::ScheduledAppointment;
use atelier_core::interval::TimeSlot;
use atelier_core::{Appointment, AppointmentStatus};

use crate::error::{DbError, DbResult};

/// Row shape of the day scan.
#[derive(Debug, sqlx::FromRow)]
struct ScheduledRow {
    appointment_id: String,
    client_name: String,
    start_time: DateTime<Utc>,
    duration_minutes: Option<i64>,
    status: AppointmentStatus,
}

impl From<ScheduledRow> for ScheduledAppointment {
    fn from(row: ScheduledRow) -> Self {
        ScheduledAppointment {
            appointment_id: row.appointment_id,
            client_name: row.client_name,
            start_time: row.start_time,
            duration_minutes: row.duration_minutes,
            status: row.status,
        }
    }
}

const APPOINTMENT_COLUMNS: &str = "id, tenant_id, resource_id, client_id, service_id, \
     start_time, status, notes, created_at, updated_at";

/// Repository for appointment database operations.
#[derive(Debug, Clone)]
pub struct AppointmentRepository {
    tenant_id: String,
}

impl AppointmentRepository {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        AppointmentRepository {
            tenant_id: tenant_id.into(),
        }
    }

    /// Inserts an appointment. The row's tenant is forced to this repository's.
    pub async fn insert<'e, E>(&self, executor: E, appointment: &Appointment) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(
            id = %appointment.id,
            resource_id = %appointment.resource_id,
            start = %appointment.start_time,
            "Inserting appointment"
        );

        sqlx::query(
            r#"
            INSERT INTO appointments (
                id, tenant_id, resource_id, client_id, service_id,
                start_time, status, notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&appointment.id)
        .bind(&self.tenant_id)
        .bind(&appointment.resource_id)
        .bind(&appointment.client_id)
        .bind(&appointment.service_id)
        .bind(appointment.start_time)
        .bind(appointment.status)
        .bind(&appointment.notes)
        .bind(appointment.created_at)
        .bind(appointment.updated_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn get_by_id<'e, E>(&self, executor: E, id: &str) -> DbResult<Option<Appointment>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "SELECT {} FROM appointments WHERE id = ?1 AND tenant_id = ?2",
            APPOINTMENT_COLUMNS
        );
        let appointment = sqlx::query_as::<_, Appointment>(&sql)
            .bind(id)
            .bind(&self.tenant_id)
            .fetch_optional(executor)
            .await?;

        Ok(appointment)
    }

    /// Moves an appointment to a new start (and optionally a new service).
    pub async fn update_schedule<'e, E>(
        &self,
        executor: E,
        id: &str,
        start_time: DateTime<Utc>,
        service_id: &str,
    ) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(id = %id, start = %start_time, "Rescheduling appointment");

        let result = sqlx::query(
            r#"
            UPDATE appointments
            SET start_time = ?3, service_id = ?4, updated_at = ?5
            WHERE id = ?1 AND tenant_id = ?2
            "#,
        )
        .bind(id)
        .bind(&self.tenant_id)
        .bind(start_time)
        .bind(service_id)
        .bind(Utc::now())
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Appointment", id));
        }
        Ok(())
    }

    /// Sets the status if it is still `expected`.
    ///
    /// Returns false when another writer changed it first.
    pub async fn update_status<'e, E>(
        &self,
        executor: E,
        id: &str,
        expected: AppointmentStatus,
        status: AppointmentStatus,
    ) -> DbResult<bool>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(id = %id, from = expected.as_str(), to = status.as_str(), "Updating appointment status");

        let result = sqlx::query(
            r#"
            UPDATE appointments
            SET status = ?4, updated_at = ?5
            WHERE id = ?1 AND tenant_id = ?2 AND status = ?3
            "#,
        )
        .bind(id)
        .bind(&self.tenant_id)
        .bind(expected)
        .bind(status)
        .bind(Utc::now())
        .execute(executor)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// All appointments of a resource starting inside `window`, any status.
    pub async fn list_for_resource<'e, E>(
        &self,
        executor: E,
        resource_id: &str,
        window: &TimeSlot,
    ) -> DbResult<Vec<Appointment>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "SELECT {} FROM appointments \
             WHERE tenant_id = ?1 AND resource_id = ?2 AND start_time >= ?3 AND start_time < ?4 \
             ORDER BY start_time, id",
            APPOINTMENT_COLUMNS
        );
        let appointments = sqlx::query_as::<_, Appointment>(&sql)
            .bind(&self.tenant_id)
            .bind(resource_id)
            .bind(window.start)
            .bind(window.end)
            .fetch_all(executor)
            .await?;

        Ok(appointments)
    }

    /// Non-cancelled appointments of a resource starting inside `window`,
    /// with their service duration and client name, ordered by start.
    pub async fn scheduled_in_window<'e, E>(
        &self,
        executor: E,
        resource_id: &str,
        window: &TimeSlot,
        exclude_appointment_id: Option<&str>,
    ) -> DbResult<Vec<ScheduledAppointment>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let rows = sqlx::query_as::<_, ScheduledRow>(
            r#"
            SELECT
                a.id AS appointment_id,
                COALESCE(c.name, '') AS client_name,
                a.start_time,
                s.duration_minutes,
                a.status
            FROM appointments a
            LEFT JOIN services s ON s.id = a.service_id AND s.tenant_id = a.tenant_id
            LEFT JOIN clients c ON c.id = a.client_id AND c.tenant_id = a.tenant_id
            WHERE a.tenant_id = ?1
              AND a.resource_id = ?2
              AND a.start_time >= ?3
              AND a.start_time < ?4
              AND a.status != 'cancelled'
              AND (?5 IS NULL OR a.id != ?5)
            ORDER BY a.start_time, a.id
            "#,
        )
        .bind(&self.tenant_id)
        .bind(resource_id)
        .bind(window.start)
        .bind(window.end)
        .bind(exclude_appointment_id)
        .fetch_all(executor)
        .await?;

        debug!(
            resource_id = %resource_id,
            count = rows.len(),
            "Loaded scheduled appointments for day"
        );

        Ok(rows.into_iter().map(ScheduledAppointment::from).collect())
    }
}
