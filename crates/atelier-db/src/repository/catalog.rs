//! # Catalog Repository
//!
//! The reference data the core reads but never derives: resources
//! (technicians), clients, services and service packages. Their CRUD
//! screens live outside this workspace; inserts here serve seeding and
//! tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, Sqlite};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::generate_id;

// =============================================================================
// Rows
// =============================================================================

/// A technician whose time is booked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Resource {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Resource {
    pub fn new(tenant_id: &str, name: &str) -> Self {
        Resource {
            id: generate_id(),
            tenant_id: tenant_id.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Client {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Client {
    pub fn new(tenant_id: &str, name: &str) -> Self {
        Client {
            id: generate_id(),
            tenant_id: tenant_id.to_string(),
            name: name.to_string(),
            phone: None,
            created_at: Utc::now(),
        }
    }
}

/// A bookable service. Its duration defines an appointment's length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Service {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub duration_minutes: Option<i64>,
    pub price_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl Service {
    pub fn new(tenant_id: &str, name: &str, duration_minutes: Option<i64>) -> Self {
        Service {
            id: generate_id(),
            tenant_id: tenant_id.to_string(),
            name: name.to_string(),
            duration_minutes,
            price_cents: 0,
            created_at: Utc::now(),
        }
    }
}

/// A sellable bundle of sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ServicePackage {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub price_cents: i64,
    pub session_count: i64,
    pub created_at: DateTime<Utc>,
}

impl ServicePackage {
    pub fn new(tenant_id: &str, name: &str, price_cents: i64, session_count: i64) -> Self {
        ServicePackage {
            id: generate_id(),
            tenant_id: tenant_id.to_string(),
            name: name.to_string(),
            price_cents,
            session_count,
            created_at: Utc::now(),
        }
    }
}

/// A client with the start of their last completed appointment.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClientVisitRow {
    pub client_id: String,
    pub client_name: String,
    /// Raw `MAX(start_time)`; aggregate columns carry no declared type.
    pub last_visit_start: Option<String>,
}

impl ClientVisitRow {
    pub fn last_visit_at(&self) -> DbResult<Option<DateTime<Utc>>> {
        self.last_visit_start
            .as_deref()
            .map(|raw| {
                DateTime::parse_from_rfc3339(raw)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| DbError::Corrupt(format!("start_time '{}': {}", raw, e)))
            })
            .transpose()
    }
}

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct CatalogRepository {
    tenant_id: String,
}

impl CatalogRepository {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        CatalogRepository {
            tenant_id: tenant_id.into(),
        }
    }

    pub async fn insert_resource<'e, E>(&self, executor: E, resource: &Resource) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(id = %resource.id, name = %resource.name, "Inserting resource");
        sqlx::query("INSERT INTO resources (id, tenant_id, name, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(&resource.id)
            .bind(&self.tenant_id)
            .bind(&resource.name)
            .bind(resource.created_at)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn get_resource<'e, E>(&self, executor: E, id: &str) -> DbResult<Option<Resource>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query_as::<_, Resource>(
            "SELECT id, tenant_id, name, created_at FROM resources WHERE id = ?1 AND tenant_id = ?2",
        )
        .bind(id)
        .bind(&self.tenant_id)
        .fetch_optional(executor)
        .await?;
        Ok(row)
    }

    pub async fn insert_client<'e, E>(&self, executor: E, client: &Client) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(id = %client.id, "Inserting client");
        sqlx::query(
            "INSERT INTO clients (id, tenant_id, name, phone, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&client.id)
        .bind(&self.tenant_id)
        .bind(&client.name)
        .bind(&client.phone)
        .bind(client.created_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn get_client<'e, E>(&self, executor: E, id: &str) -> DbResult<Option<Client>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query_as::<_, Client>(
            "SELECT id, tenant_id, name, phone, created_at FROM clients WHERE id = ?1 AND tenant_id = ?2",
        )
        .bind(id)
        .bind(&self.tenant_id)
        .fetch_optional(executor)
        .await?;
        Ok(row)
    }

    pub async fn insert_service<'e, E>(&self, executor: E, service: &Service) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(id = %service.id, duration = ?service.duration_minutes, "Inserting service");
        sqlx::query(
            r#"
            INSERT INTO services (id, tenant_id, name, duration_minutes, price_cents, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&service.id)
        .bind(&self.tenant_id)
        .bind(&service.name)
        .bind(service.duration_minutes)
        .bind(service.price_cents)
        .bind(service.created_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn get_service<'e, E>(&self, executor: E, id: &str) -> DbResult<Option<Service>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query_as::<_, Service>(
            r#"
            SELECT id, tenant_id, name, duration_minutes, price_cents, created_at
            FROM services WHERE id = ?1 AND tenant_id = ?2
            "#,
        )
        .bind(id)
        .bind(&self.tenant_id)
        .fetch_optional(executor)
        .await?;
        Ok(row)
    }

    pub async fn insert_package<'e, E>(&self, executor: E, package: &ServicePackage) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(id = %package.id, "Inserting service package");
        sqlx::query(
            r#"
            INSERT INTO service_packages (id, tenant_id, name, price_cents, session_count, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&package.id)
        .bind(&self.tenant_id)
        .bind(&package.name)
        .bind(package.price_cents)
        .bind(package.session_count)
        .bind(package.created_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn get_package<'e, E>(&self, executor: E, id: &str) -> DbResult<Option<ServicePackage>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query_as::<_, ServicePackage>(
            r#"
            SELECT id, tenant_id, name, price_cents, session_count, created_at
            FROM service_packages WHERE id = ?1 AND tenant_id = ?2
            "#,
        )
        .bind(id)
        .bind(&self.tenant_id)
        .fetch_optional(executor)
        .await?;
        Ok(row)
    }

    /// Every client of the tenant with their last completed appointment.
    pub async fn client_visits<'e, E>(&self, executor: E) -> DbResult<Vec<ClientVisitRow>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let rows = sqlx::query_as::<_, ClientVisitRow>(
            r#"
            SELECT
                c.id AS client_id,
                c.name AS client_name,
                MAX(a.start_time) AS last_visit_start
            FROM clients c
            LEFT JOIN appointments a
                ON a.client_id = c.id
               AND a.tenant_id = c.tenant_id
               AND a.status = 'completed'
            WHERE c.tenant_id = ?1
            GROUP BY c.id, c.name
            ORDER BY c.name
            "#,
        )
        .bind(&self.tenant_id)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    pub async fn count_clients<'e, E>(&self, executor: E) -> DbResult<i64>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clients WHERE tenant_id = ?1")
            .bind(&self.tenant_id)
            .fetch_one(executor)
            .await?;
        Ok(count)
    }
}
