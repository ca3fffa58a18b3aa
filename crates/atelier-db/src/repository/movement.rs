//! # Stock Movement Repository
//!
//! Manual stock entries and exits. Rows are immutable: there is no update
//! or delete here.

use sqlx::{Executor, Sqlite};
use tracing::debug;

use atelier_core::StockMovement;

use crate::error::DbResult;

#[derive(Debug, Clone)]
pub struct StockMovementRepository {
    tenant_id: String,
}

impl StockMovementRepository {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        StockMovementRepository {
            tenant_id: tenant_id.into(),
        }
    }

    pub async fn insert<'e, E>(&self, executor: E, movement: &StockMovement) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(
            id = %movement.id,
            product_id = %movement.product_id,
            movement_type = ?movement.movement_type,
            quantity = movement.quantity,
            "Inserting stock movement"
        );

        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, tenant_id, product_id, movement_type, quantity,
                location_id, reason, unit_cost_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&movement.id)
        .bind(&self.tenant_id)
        .bind(&movement.product_id)
        .bind(movement.movement_type)
        .bind(movement.quantity)
        .bind(&movement.location_id)
        .bind(&movement.reason)
        .bind(movement.unit_cost_cents)
        .bind(movement.created_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn get_by_id<'e, E>(&self, executor: E, id: &str) -> DbResult<Option<StockMovement>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let movement = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, tenant_id, product_id, movement_type, quantity,
                   location_id, reason, unit_cost_cents, created_at
            FROM stock_movements
            WHERE id = ?1 AND tenant_id = ?2
            "#,
        )
        .bind(id)
        .bind(&self.tenant_id)
        .fetch_optional(executor)
        .await?;

        Ok(movement)
    }

    /// Movements of one product, oldest first.
    pub async fn list_for_product<'e, E>(
        &self,
        executor: E,
        product_id: &str,
    ) -> DbResult<Vec<StockMovement>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, tenant_id, product_id, movement_type, quantity,
                   location_id, reason, unit_cost_cents, created_at
            FROM stock_movements
            WHERE tenant_id = ?1 AND product_id = ?2
            ORDER BY created_at, id
            "#,
        )
        .bind(&self.tenant_id)
        .bind(product_id)
        .fetch_all(executor)
        .await?;

        Ok(movements)
    }
}
