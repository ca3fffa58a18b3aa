//! # Product Repository
//!
//! Products and their running stock balance.
//!
//! ## Delta Updates
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Stock Update Strategy                            │
//! │                                                                     │
//! │  ❌ WRONG: read, compute, write back                               │
//! │     SELECT stock_quantity ...  → 5                                  │
//! │     UPDATE products SET stock_quantity = 2                          │
//! │     (a concurrent sale between the two is lost)                    │
//! │                                                                     │
//! │  ✅ CORRECT: guarded delta in one statement                        │
//! │     UPDATE products                                                 │
//! │     SET stock_quantity = stock_quantity - 3                         │
//! │     WHERE id = ? AND stock_quantity >= 3 RETURNING stock_quantity   │
//! │                                                                     │
//! │  no row returned → not enough stock (or no such product)           │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only the cascade engine calls the stock methods, inside its transaction.

use chrono::Utc;
use sqlx::{Executor, Sqlite};
use tracing::debug;

use atelier_core::Product;

use crate::error::DbResult;

const PRODUCT_COLUMNS: &str = "id, tenant_id, name, sku, unit_cost_cents, sale_price_cents, \
     stock_quantity, created_at, updated_at";

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    tenant_id: String,
}

impl ProductRepository {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        ProductRepository {
            tenant_id: tenant_id.into(),
        }
    }

    /// Inserts a new product.
    pub async fn insert<'e, E>(&self, executor: E, product: &Product) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, tenant_id, name, sku, unit_cost_cents, sale_price_cents,
                stock_quantity, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&product.id)
        .bind(&self.tenant_id)
        .bind(&product.name)
        .bind(&product.sku)
        .bind(product.unit_cost_cents)
        .bind(product.sale_price_cents)
        .bind(product.stock_quantity)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Gets a product by its ID.
    pub async fn get_by_id<'e, E>(&self, executor: E, id: &str) -> DbResult<Option<Product>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "SELECT {} FROM products WHERE id = ?1 AND tenant_id = ?2",
            PRODUCT_COLUMNS
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .bind(&self.tenant_id)
            .fetch_optional(executor)
            .await?;

        Ok(product)
    }

    pub async fn list<'e, E>(&self, executor: E) -> DbResult<Vec<Product>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "SELECT {} FROM products WHERE tenant_id = ?1 ORDER BY name",
            PRODUCT_COLUMNS
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(&self.tenant_id)
            .fetch_all(executor)
            .await?;

        Ok(products)
    }

    /// Current balance, `None` if the product does not exist.
    pub async fn stock_quantity<'e, E>(&self, executor: E, id: &str) -> DbResult<Option<i64>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let quantity: Option<i64> = sqlx::query_scalar(
            "SELECT stock_quantity FROM products WHERE id = ?1 AND tenant_id = ?2",
        )
        .bind(id)
        .bind(&self.tenant_id)
        .fetch_optional(executor)
        .await?;

        Ok(quantity)
    }

    /// Adds `quantity` units and returns the new balance.
    ///
    /// `None` if the product does not exist.
    pub async fn add_stock<'e, E>(&self, executor: E, id: &str, quantity: i64) -> DbResult<Option<i64>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(id = %id, delta = quantity, "Adding stock");

        let after: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity + ?3, updated_at = ?4
            WHERE id = ?1 AND tenant_id = ?2
            RETURNING stock_quantity
            "#,
        )
        .bind(id)
        .bind(&self.tenant_id)
        .bind(quantity)
        .bind(Utc::now())
        .fetch_optional(executor)
        .await?;

        Ok(after)
    }

    /// Removes `quantity` units if at least that many are in stock and
    /// returns the new balance.
    ///
    /// `None`, with nothing changed, when stock is insufficient.
    pub async fn remove_stock<'e, E>(
        &self,
        executor: E,
        id: &str,
        quantity: i64,
    ) -> DbResult<Option<i64>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(id = %id, delta = -quantity, "Removing stock");

        let after: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity - ?3, updated_at = ?4
            WHERE id = ?1 AND tenant_id = ?2 AND stock_quantity >= ?3
            RETURNING stock_quantity
            "#,
        )
        .bind(id)
        .bind(&self.tenant_id)
        .bind(quantity)
        .bind(Utc::now())
        .fetch_optional(executor)
        .await?;

        Ok(after)
    }

    /// Counts products (for diagnostics).
    pub async fn count<'e, E>(&self, executor: E) -> DbResult<i64>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE tenant_id = ?1")
            .bind(&self.tenant_id)
            .fetch_one(executor)
            .await?;

        Ok(count)
    }
}
