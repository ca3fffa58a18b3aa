//! # Batch Repository
//!
//! Product lots with expiry dates. Batch quantities are advisory and are
//! tracked separately from `products.stock_quantity`.

use chrono::Utc;
use sqlx::{Executor, Sqlite};
use tracing::debug;

use atelier_core::ProductBatch;

use crate::error::DbResult;

const BATCH_COLUMNS: &str = "id, tenant_id, product_id, batch_number, manufacturing_date, \
     expiry_date, quantity, location_id";

#[derive(Debug, Clone)]
pub struct BatchRepository {
    tenant_id: String,
}

impl BatchRepository {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        BatchRepository {
            tenant_id: tenant_id.into(),
        }
    }

    pub async fn insert<'e, E>(&self, executor: E, batch: &ProductBatch) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(id = %batch.id, product_id = %batch.product_id, "Inserting product batch");

        sqlx::query(
            r#"
            INSERT INTO product_batches (
                id, tenant_id, product_id, batch_number, manufacturing_date,
                expiry_date, quantity, location_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&batch.id)
        .bind(&self.tenant_id)
        .bind(&batch.product_id)
        .bind(&batch.batch_number)
        .bind(batch.manufacturing_date)
        .bind(batch.expiry_date)
        .bind(batch.quantity)
        .bind(&batch.location_id)
        .bind(Utc::now())
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn get_by_id<'e, E>(&self, executor: E, id: &str) -> DbResult<Option<ProductBatch>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "SELECT {} FROM product_batches WHERE id = ?1 AND tenant_id = ?2",
            BATCH_COLUMNS
        );
        let batch = sqlx::query_as::<_, ProductBatch>(&sql)
            .bind(id)
            .bind(&self.tenant_id)
            .fetch_optional(executor)
            .await?;

        Ok(batch)
    }

    /// Batches with quantity left, optionally for one product.
    ///
    /// Returned in insertion order; ranking happens in the core.
    pub async fn list_available<'e, E>(
        &self,
        executor: E,
        product_id: Option<&str>,
    ) -> DbResult<Vec<ProductBatch>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "SELECT {} FROM product_batches \
             WHERE tenant_id = ?1 AND quantity > 0 AND (?2 IS NULL OR product_id = ?2) \
             ORDER BY created_at, id",
            BATCH_COLUMNS
        );
        let batches = sqlx::query_as::<_, ProductBatch>(&sql)
            .bind(&self.tenant_id)
            .bind(product_id)
            .fetch_all(executor)
            .await?;

        Ok(batches)
    }

    /// Takes `quantity` from a batch if it still holds that many.
    pub async fn draw<'e, E>(&self, executor: E, id: &str, quantity: i64) -> DbResult<bool>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(id = %id, quantity, "Drawing from batch");

        let result = sqlx::query(
            r#"
            UPDATE product_batches
            SET quantity = quantity - ?3
            WHERE id = ?1 AND tenant_id = ?2 AND quantity >= ?3
            "#,
        )
        .bind(id)
        .bind(&self.tenant_id)
        .bind(quantity)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
