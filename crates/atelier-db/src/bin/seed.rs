//! # Seed Data Generator
//!
//! Populates a database with a small salon for development: one
//! professional, a handful of clients, services, a package, products with
//! batches, a few posted events and a week of appointments.
//!
//! ## Usage
//! ```bash
//! # Seed the configured database for tenant "demo"
//! cargo run -p atelier-db --bin seed
//!
//! # Specify database path and tenant
//! cargo run -p atelier-db --bin seed -- --db ./data/atelier.db --tenant salon-1
//! ```
//!
//! Settings (business UTC offset, FIFO batch consumption) come from
//! `atelier.toml` and `ATELIER_*` environment variables, as for any caller.

use chrono::{Duration, NaiveDate, Utc};
use std::env;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use atelier_core::cascade::{PackageSaleInput, ProductSaleInput, StockMovementInput};
use atelier_core::interval::business_day_slot;
use atelier_core::{AppointmentStatus, BusinessEvent, Product, ProductBatch};
use atelier_db::repository::batch::BatchRepository;
use atelier_db::repository::catalog::{Client, Resource, Service, ServicePackage};
use atelier_db::repository::generate_id;
use atelier_db::repository::product::ProductRepository;
use atelier_db::{AtelierConfig, Database, EngineSettings, NewAppointment};

const CLIENTS: &[&str] = &["Maria Souza", "Ana Lima", "Beatriz Costa", "Carla Dias", "Fernanda Reis"];

/// (name, minutes)
const SERVICES: &[(&str, Option<i64>)] = &[
    ("Corte", Some(45)),
    ("Escova", Some(60)),
    ("Coloração", Some(120)),
    ("Avaliação", None),
];

/// (name, unit cost, sale price, initial batches as (number, days to expiry, qty))
const PRODUCTS: &[(&str, i64, i64, &[(&str, Option<i64>, i64)])] = &[
    ("Esmalte Vermelho", 1250, 3990, &[("EV-01", Some(-3), 2), ("EV-02", Some(20), 6)]),
    ("Shampoo 1L", 3800, 8900, &[("SH-10", Some(180), 4), ("SH-11", None, 2)]),
    ("Máscara Capilar", 2900, 7500, &[("MC-07", Some(5), 3)]),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<String> = None;
    let mut tenant = String::from("demo");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--tenant" | "-t" => {
                if i + 1 < args.len() {
                    tenant = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Atelier Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>        Database file path (default: from atelier.toml)");
                println!("  -t, --tenant <ID>      Tenant id (default: demo)");
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            other => warn!(argument = other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let mut config = AtelierConfig::load(None)?;
    if let Some(path) = db_path {
        config.database.path = path.into();
    }
    let settings = config.engine_settings()?;
    let db = Database::new(config.db_config()).await?;
    info!(path = %config.database.path.display(), tenant = %tenant, "Connected");

    let products = ProductRepository::new(tenant.as_str());
    let existing = products.count(db.pool()).await?;
    if existing > 0 {
        warn!(existing, "Database already has products; delete the file to regenerate");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let today = settings.today();

    // Catalog
    let catalog = db.catalog(&tenant);
    let resource = Resource::new(&tenant, "Juliana");
    catalog.insert_resource(db.pool(), &resource).await?;

    let mut client_ids = Vec::with_capacity(CLIENTS.len());
    for name in CLIENTS {
        let client = Client::new(&tenant, name);
        catalog.insert_client(db.pool(), &client).await?;
        client_ids.push(client.id);
    }

    let mut service_ids = Vec::with_capacity(SERVICES.len());
    for (name, minutes) in SERVICES {
        let service = Service::new(&tenant, name, *minutes);
        catalog.insert_service(db.pool(), &service).await?;
        service_ids.push(service.id);
    }

    let package = ServicePackage::new(&tenant, "10 Escovas", 45_000, 10);
    catalog.insert_package(db.pool(), &package).await?;
    let clients = catalog.count_clients(db.pool()).await?;
    info!(
        clients,
        services = service_ids.len(),
        "Catalog created"
    );

    // Products and batches
    let batches = BatchRepository::new(tenant.as_str());
    let mut product_ids = Vec::with_capacity(PRODUCTS.len());
    for (name, cost, price, lots) in PRODUCTS {
        let now = Utc::now();
        let stock: i64 = lots.iter().map(|(_, _, qty)| qty).sum();
        let product = Product {
            id: generate_id(),
            tenant_id: tenant.clone(),
            name: name.to_string(),
            sku: None,
            unit_cost_cents: *cost,
            sale_price_cents: *price,
            stock_quantity: stock,
            created_at: now,
            updated_at: now,
        };
        products.insert(db.pool(), &product).await?;

        for (number, days, qty) in lots.iter() {
            let batch = ProductBatch {
                id: generate_id(),
                tenant_id: tenant.clone(),
                product_id: product.id.clone(),
                batch_number: number.to_string(),
                manufacturing_date: None,
                expiry_date: days.map(|d| today + Duration::days(d)),
                quantity: *qty,
                location_id: None,
            };
            batches.insert(db.pool(), &batch).await?;
        }
        product_ids.push(product.id);
    }
    info!(products = product_ids.len(), "Products created");

    // Events
    let cascade = db.cascade(&tenant, settings);
    let events = [
        BusinessEvent::StockEntry(StockMovementInput {
            product_id: product_ids[0].clone(),
            quantity: 12,
            counterparty_name: Some("Distribuidora Bela".to_string()),
            due_date: Some(today + Duration::days(30)),
            ..Default::default()
        }),
        BusinessEvent::StockExit(StockMovementInput {
            product_id: product_ids[1].clone(),
            quantity: 1,
            reason: Some("Uso interno".to_string()),
            ..Default::default()
        }),
        BusinessEvent::ProductSale(ProductSaleInput {
            product_id: product_ids[0].clone(),
            quantity: 2,
            client_id: Some(client_ids[0].clone()),
            ..Default::default()
        }),
        BusinessEvent::PackageSale(PackageSaleInput {
            client_id: client_ids[1].clone(),
            package_id: package.id.clone(),
            due_date: Some(today - Duration::days(3)),
            ..Default::default()
        }),
    ];
    for event in events {
        let kind = event.event_type();
        let outcome = cascade.apply_event(event).await?;
        info!(
            event_type = kind,
            primary_id = %outcome.primary_id,
            derived = outcome.derived.len(),
            "Event applied"
        );
    }

    // Appointments: past completed visits at varied distances, then the next days.
    let booking = db.booking(&tenant, settings);
    let history: &[(usize, i64)] = &[(0, 5), (1, 40), (2, 75), (3, 120)];
    for (client, days_ago) in history {
        let day = today - Duration::days(*days_ago);
        let appt = booking
            .book(appointment(
                &resource.id,
                &client_ids[*client],
                &service_ids[1],
                day,
                10,
                settings,
            ))
            .await?;
        booking.set_status(&appt.id, AppointmentStatus::Completed).await?;
    }

    let mut booked = 0;
    for offset in 1..=5 {
        let day = today + Duration::days(offset);
        for (slot, hour) in [9, 11, 14].into_iter().enumerate() {
            let client = &client_ids[(offset as usize + slot) % client_ids.len()];
            let service = &service_ids[slot % service_ids.len()];
            match booking
                .book(appointment(&resource.id, client, service, day, hour, settings))
                .await
            {
                Ok(_) => booked += 1,
                Err(e) => warn!(error = %e, %day, hour, "Skipping appointment"),
            }
        }
    }
    info!(booked, "Appointments created");

    // Summary
    let reports = db.reports(&tenant, settings);
    let tiers = reports.classify_clients(today).await?;
    info!(
        urgent = tiers.urgent.len(),
        warning = tiers.warning.len(),
        recent = tiers.recent.len(),
        active = tiers.active.len(),
        never_visited = tiers.never_visited.len(),
        "Client tiers"
    );
    for product in products.list(db.pool()).await? {
        info!(product = %product.name, stock = product.stock_quantity, "Stock");
    }
    for ranked in reports.get_batch_priority(None, today).await? {
        info!(
            batch = %ranked.batch.batch_number,
            quantity = ranked.batch.quantity,
            status = ?ranked.status,
            days_until_expiry = ?ranked.days_until_expiry,
            "Batch"
        );
    }

    info!(elapsed_ms = start.elapsed().as_millis() as u64, "Seed complete");
    db.close().await;
    Ok(())
}

/// Tracing setup; `RUST_LOG` overrides the default filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,atelier_db=debug,sqlx=warn"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("tracing subscriber already set");
    }
}

fn appointment(
    resource_id: &str,
    client_id: &str,
    service_id: &str,
    day: NaiveDate,
    hour: i64,
    settings: EngineSettings,
) -> NewAppointment {
    let midnight = business_day_slot(day, settings.business_offset).start;
    NewAppointment {
        resource_id: resource_id.to_string(),
        client_id: client_id.to_string(),
        service_id: service_id.to_string(),
        start_time: midnight + Duration::hours(hour),
        notes: None,
    }
}
