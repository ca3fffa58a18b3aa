//! # Sale Repository
//!
//! Primary records of the `product_sale` and `package_sale` events.
//!
//! ## Write Order
//! ```text
//! product_sale:  remove_stock → insert_product_sale → ledger (received)
//! package_sale:  insert_package_sale → ledger (pending)
//! ```
//! Both run inside the cascade transaction; neither is ever updated here.

use sqlx::{Executor, Sqlite};
use tracing::debug;

use atelier_core::{PackageSale, ProductSale};

use crate::error::DbResult;

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    tenant_id: String,
}

impl SaleRepository {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        SaleRepository {
            tenant_id: tenant_id.into(),
        }
    }

    // =========================================================================
    // Product Sales
    // =========================================================================

    pub async fn insert_product_sale<'e, E>(&self, executor: E, sale: &ProductSale) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(
            id = %sale.id,
            product_id = %sale.product_id,
            quantity = sale.quantity,
            total = sale.total_cents,
            "Inserting product sale"
        );

        sqlx::query(
            r#"
            INSERT INTO product_sales (
                id, tenant_id, product_id, client_id, quantity,
                unit_price_cents, total_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&sale.id)
        .bind(&self.tenant_id)
        .bind(&sale.product_id)
        .bind(&sale.client_id)
        .bind(sale.quantity)
        .bind(sale.unit_price_cents)
        .bind(sale.total_cents)
        .bind(sale.created_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn get_product_sale<'e, E>(&self, executor: E, id: &str) -> DbResult<Option<ProductSale>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sale = sqlx::query_as::<_, ProductSale>(
            r#"
            SELECT id, tenant_id, product_id, client_id, quantity,
                   unit_price_cents, total_cents, created_at
            FROM product_sales
            WHERE id = ?1 AND tenant_id = ?2
            "#,
        )
        .bind(id)
        .bind(&self.tenant_id)
        .fetch_optional(executor)
        .await?;

        Ok(sale)
    }

    // =========================================================================
    // Package Sales
    // =========================================================================

    pub async fn insert_package_sale<'e, E>(&self, executor: E, sale: &PackageSale) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(
            id = %sale.id,
            client_id = %sale.client_id,
            package_id = %sale.package_id,
            "Inserting package sale"
        );

        sqlx::query(
            r#"
            INSERT INTO service_package_sales (
                id, tenant_id, client_id, package_id, price_cents,
                purchased_quantity, remaining_quantity, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&sale.id)
        .bind(&self.tenant_id)
        .bind(&sale.client_id)
        .bind(&sale.package_id)
        .bind(sale.price_cents)
        .bind(sale.purchased_quantity)
        .bind(sale.remaining_quantity)
        .bind(sale.status)
        .bind(sale.created_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn get_package_sale<'e, E>(&self, executor: E, id: &str) -> DbResult<Option<PackageSale>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sale = sqlx::query_as::<_, PackageSale>(
            r#"
            SELECT id, tenant_id, client_id, package_id, price_cents,
                   purchased_quantity, remaining_quantity, status, created_at
            FROM service_package_sales
            WHERE id = ?1 AND tenant_id = ?2
            "#,
        )
        .bind(id)
        .bind(&self.tenant_id)
        .fetch_optional(executor)
        .await?;

        Ok(sale)
    }
}
