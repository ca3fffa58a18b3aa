//! # Ledger Repository
//!
//! Payables and receivables. One repository serves both tables; the
//! [`LedgerDirection`] picks which.
//!
//! ## Status Transitions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  pending ──settle──► paid (payable) / received (receivable)            │
//! │     │                                                                   │
//! │     └────cancel────► cancelled                                         │
//! │                                                                         │
//! │  Both updates are guarded with `AND status = 'pending'`; zero rows      │
//! │  affected means the entry was not pending (or does not exist).         │
//! │  'overdue' is never written; LedgerEntry::effective_status derives it. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The tables have no `direction` column: it is selected as a literal so
//! rows decode straight into [`LedgerEntry`].

use chrono::NaiveDate;
use sqlx::{Executor, Sqlite};
use tracing::debug;

use atelier_core::{LedgerDirection, LedgerEntry, LedgerStatus, ReferenceType};

use crate::error::DbResult;

fn select_from(direction: LedgerDirection) -> String {
    format!(
        "SELECT id, tenant_id, '{}' AS direction, description, amount_cents, due_date, status, \
         payment_date, reference_type, reference_id, counterparty_name, created_at FROM {}",
        direction.as_str(),
        direction.table()
    )
}

/// Repository for ledger (accounts payable / receivable) operations.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    tenant_id: String,
}

impl LedgerRepository {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        LedgerRepository {
            tenant_id: tenant_id.into(),
        }
    }

    /// Inserts an entry into the table of its direction.
    ///
    /// A second entry for the same `(reference_type, reference_id)` fails
    /// with a unique violation.
    pub async fn insert<'e, E>(&self, executor: E, entry: &LedgerEntry) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(
            id = %entry.id,
            direction = entry.direction.as_str(),
            amount = entry.amount_cents,
            reference = %entry.reference_id,
            "Inserting ledger entry"
        );

        let sql = format!(
            r#"
            INSERT INTO {} (
                id, tenant_id, description, amount_cents, due_date, status,
                payment_date, reference_type, reference_id, counterparty_name, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            entry.direction.table()
        );

        sqlx::query(&sql)
            .bind(&entry.id)
            .bind(&self.tenant_id)
            .bind(&entry.description)
            .bind(entry.amount_cents)
            .bind(entry.due_date)
            .bind(entry.status)
            .bind(entry.payment_date)
            .bind(entry.reference_type)
            .bind(&entry.reference_id)
            .bind(&entry.counterparty_name)
            .bind(entry.created_at)
            .execute(executor)
            .await?;

        Ok(())
    }

    pub async fn get_by_id<'e, E>(
        &self,
        executor: E,
        direction: LedgerDirection,
        id: &str,
    ) -> DbResult<Option<LedgerEntry>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!("{} WHERE id = ?1 AND tenant_id = ?2", select_from(direction));
        let entry = sqlx::query_as::<_, LedgerEntry>(&sql)
            .bind(id)
            .bind(&self.tenant_id)
            .fetch_optional(executor)
            .await?;

        Ok(entry)
    }

    /// All entries of one direction, earliest due first.
    pub async fn list<'e, E>(&self, executor: E, direction: LedgerDirection) -> DbResult<Vec<LedgerEntry>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "{} WHERE tenant_id = ?1 ORDER BY due_date, created_at, id",
            select_from(direction)
        );
        let entries = sqlx::query_as::<_, LedgerEntry>(&sql)
            .bind(&self.tenant_id)
            .fetch_all(executor)
            .await?;

        Ok(entries)
    }

    /// Entries of both directions derived from one primary record.
    pub async fn for_reference<'e, E>(
        &self,
        executor: E,
        reference_type: ReferenceType,
        reference_id: &str,
    ) -> DbResult<Vec<LedgerEntry>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "{payable} WHERE tenant_id = ?1 AND reference_type = ?2 AND reference_id = ?3 \
             UNION ALL \
             {receivable} WHERE tenant_id = ?1 AND reference_type = ?2 AND reference_id = ?3 \
             ORDER BY created_at, id",
            payable = select_from(LedgerDirection::Payable),
            receivable = select_from(LedgerDirection::Receivable),
        );
        let entries = sqlx::query_as::<_, LedgerEntry>(&sql)
            .bind(&self.tenant_id)
            .bind(reference_type)
            .bind(reference_id)
            .fetch_all(executor)
            .await?;

        Ok(entries)
    }

    /// Marks a pending entry paid/received. Returns false if it was not pending.
    pub async fn mark_settled<'e, E>(
        &self,
        executor: E,
        direction: LedgerDirection,
        id: &str,
        payment_date: NaiveDate,
    ) -> DbResult<bool>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(id = %id, direction = direction.as_str(), %payment_date, "Settling ledger entry");

        let sql = format!(
            "UPDATE {} SET status = ?3, payment_date = ?4 \
             WHERE id = ?1 AND tenant_id = ?2 AND status = 'pending'",
            direction.table()
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(&self.tenant_id)
            .bind(direction.settled_status())
            .bind(payment_date)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Cancels a pending entry. Returns false if it was not pending.
    pub async fn mark_cancelled<'e, E>(
        &self,
        executor: E,
        direction: LedgerDirection,
        id: &str,
    ) -> DbResult<bool>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(id = %id, direction = direction.as_str(), "Cancelling ledger entry");

        let sql = format!(
            "UPDATE {} SET status = ?3 \
             WHERE id = ?1 AND tenant_id = ?2 AND status = 'pending'",
            direction.table()
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(&self.tenant_id)
            .bind(LedgerStatus::Cancelled)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn count<'e, E>(&self, executor: E, direction: LedgerDirection) -> DbResult<i64>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE tenant_id = ?1", direction.table());
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(&self.tenant_id)
            .fetch_one(executor)
            .await?;

        Ok(count)
    }
}
