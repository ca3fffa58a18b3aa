//! # Posted Event Repository
//!
//! Idempotency keys for the cascade engine.
//!
//! ## Claim-First Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    One Cascade Transaction                              │
//! │                                                                         │
//! │  1. INSERT INTO posted_events (...) ON CONFLICT DO NOTHING             │
//! │       │                                                                 │
//! │       ├── 0 rows → key already posted: ROLLBACK, return stored outcome │
//! │       │            (rejected if it was posted by another event type) │
//! │       │                                                                 │
//! │       └── 1 row  → we own the key (and SQLite's write lock)            │
//! │              │                                                          │
//! │              ▼                                                          │
//! │  2. primary record, stock delta, batch draws, ledger entry             │
//! │              │                                                          │
//! │              ▼                                                          │
//! │  3. UPDATE posted_events SET derived = <JSON of derived records>       │
//! │              │                                                          │
//! │              ▼                                                          │
//! │  COMMIT ← key and records land together or not at all                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{Executor, Sqlite};
use tracing::debug;

use atelier_core::{DerivedRecord, ReferenceType};

use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct PostedEventRepository {
    tenant_id: String,
}

impl PostedEventRepository {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        PostedEventRepository {
            tenant_id: tenant_id.into(),
        }
    }

    /// Records the key. Returns false when it was already posted.
    pub async fn claim<'e, E>(
        &self,
        executor: E,
        reference_type: ReferenceType,
        reference_id: &str,
        event_type: &str,
    ) -> DbResult<bool>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"
            INSERT INTO posted_events (
                tenant_id, reference_type, reference_id, event_type, derived, created_at
            ) VALUES (?1, ?2, ?3, ?4, '[]', ?5)
            ON CONFLICT (tenant_id, reference_type, reference_id) DO NOTHING
            "#,
        )
        .bind(&self.tenant_id)
        .bind(reference_type)
        .bind(reference_id)
        .bind(event_type)
        .bind(Utc::now())
        .execute(executor)
        .await?;

        let claimed = result.rows_affected() == 1;
        debug!(
            reference_type = reference_type.as_str(),
            reference_id = %reference_id,
            claimed,
            "Claimed event key"
        );
        Ok(claimed)
    }

    /// Stores the derived records of a claimed key.
    pub async fn store_derived<'e, E>(
        &self,
        executor: E,
        reference_type: ReferenceType,
        reference_id: &str,
        derived: &[DerivedRecord],
    ) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let json = serde_json::to_string(derived)?;

        let result = sqlx::query(
            r#"
            UPDATE posted_events SET derived = ?4
            WHERE tenant_id = ?1 AND reference_type = ?2 AND reference_id = ?3
            "#,
        )
        .bind(&self.tenant_id)
        .bind(reference_type)
        .bind(reference_id)
        .bind(json)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("PostedEvent", reference_id));
        }
        Ok(())
    }

    /// Event type and derived records stored for a key, `None` if it was
    /// never posted.
    pub async fn load<'e, E>(
        &self,
        executor: E,
        reference_type: ReferenceType,
        reference_id: &str,
    ) -> DbResult<Option<(String, Vec<DerivedRecord>)>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row: Option<(String, String)> = sqlx::query_as(
            r#"
            SELECT event_type, derived FROM posted_events
            WHERE tenant_id = ?1 AND reference_type = ?2 AND reference_id = ?3
            "#,
        )
        .bind(&self.tenant_id)
        .bind(reference_type)
        .bind(reference_id)
        .fetch_optional(executor)
        .await?;

        match row {
            Some((event_type, json)) => {
                let derived: Vec<DerivedRecord> = serde_json::from_str(&json)?;
                Ok(Some((event_type, derived)))
            }
            None => Ok(None),
        }
    }

    pub async fn count<'e, E>(&self, executor: E) -> DbResult<i64>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM posted_events WHERE tenant_id = ?1")
                .bind(&self.tenant_id)
                .fetch_one(executor)
                .await?;

        Ok(count)
    }
}
