//! Shared fixtures for the service tests.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::path::PathBuf;

use atelier_core::{Product, ProductBatch};

use crate::pool::{Database, DbConfig};
use crate::repository::batch::BatchRepository;
use crate::repository::catalog::{CatalogRepository, Client, Resource, Service, ServicePackage};
use crate::repository::generate_id;
use crate::repository::product::ProductRepository;

pub(crate) const TENANT: &str = "tenant-a";

pub(crate) struct Fixture {
    pub db: Database,
    pub resource_id: String,
    pub client_id: String,
    /// 60 minute service.
    pub service_id: String,
    /// 30 minute service.
    pub short_service_id: String,
    /// Service without a duration (falls back to 60).
    pub untimed_service_id: String,
    /// "Esmalte": 10 in stock, cost R$ 12,50, price R$ 39,90.
    pub product_id: String,
    /// "10 Escovas": R$ 450,00 for 10 sessions.
    pub package_id: String,
}

pub(crate) async fn fixture() -> Fixture {
    fixture_with(DbConfig::in_memory()).await
}

pub(crate) async fn fixture_with(config: DbConfig) -> Fixture {
    let db = Database::new(config).await.unwrap();
    let catalog = CatalogRepository::new(TENANT);

    let resource = Resource::new(TENANT, "Juliana");
    catalog.insert_resource(db.pool(), &resource).await.unwrap();

    let client = Client::new(TENANT, "Maria");
    catalog.insert_client(db.pool(), &client).await.unwrap();

    let service = Service::new(TENANT, "Escova", Some(60));
    let short = Service::new(TENANT, "Franja", Some(30));
    let untimed = Service::new(TENANT, "Avaliação", None);
    for s in [&service, &short, &untimed] {
        catalog.insert_service(db.pool(), s).await.unwrap();
    }

    let package = ServicePackage::new(TENANT, "10 Escovas", 45_000, 10);
    catalog.insert_package(db.pool(), &package).await.unwrap();

    let product_id = add_product(&db, "Esmalte", 10, 1250, 3990).await;

    Fixture {
        db,
        resource_id: resource.id,
        client_id: client.id,
        service_id: service.id,
        short_service_id: short.id,
        untimed_service_id: untimed.id,
        product_id,
        package_id: package.id,
    }
}

pub(crate) async fn add_product(
    db: &Database,
    name: &str,
    stock: i64,
    unit_cost_cents: i64,
    sale_price_cents: i64,
) -> String {
    let now = Utc::now();
    let product = Product {
        id: generate_id(),
        tenant_id: TENANT.to_string(),
        name: name.to_string(),
        sku: None,
        unit_cost_cents,
        sale_price_cents,
        stock_quantity: stock,
        created_at: now,
        updated_at: now,
    };
    ProductRepository::new(TENANT)
        .insert(db.pool(), &product)
        .await
        .unwrap();
    product.id
}

pub(crate) async fn add_client(db: &Database, name: &str) -> String {
    let client = Client::new(TENANT, name);
    CatalogRepository::new(TENANT)
        .insert_client(db.pool(), &client)
        .await
        .unwrap();
    client.id
}

pub(crate) async fn add_batch(
    db: &Database,
    product_id: &str,
    batch_number: &str,
    expiry_date: Option<NaiveDate>,
    quantity: i64,
) -> String {
    let batch = ProductBatch {
        id: generate_id(),
        tenant_id: TENANT.to_string(),
        product_id: product_id.to_string(),
        batch_number: batch_number.to_string(),
        manufacturing_date: None,
        expiry_date,
        quantity,
        location_id: None,
    };
    BatchRepository::new(TENANT)
        .insert(db.pool(), &batch)
        .await
        .unwrap();
    batch.id
}

pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// 2024-05-10 at `h:m` UTC.
pub(crate) fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 10, h, m, 0).unwrap()
}

/// Unique database file under the system temp directory.
pub(crate) fn temp_db_path() -> PathBuf {
    std::env::temp_dir().join(format!("atelier-test-{}.db", generate_id()))
}

/// Removes a temp database and its WAL side files.
pub(crate) fn remove_db_files(path: &PathBuf) {
    for suffix in ["", "-wal", "-shm"] {
        let mut file = path.clone().into_os_string();
        file.push(suffix);
        let _ = std::fs::remove_file(file);
    }
}
