//! # Repository Module
//!
//! Tenant-scoped SQL for every table the core reads or writes.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories and Transactions                        │
//! │                                                                         │
//! │  Service (booking / cascade)                                           │
//! │       │                                                                 │
//! │       │  let mut tx = pool.begin().await?;                             │
//! │       │  events.claim(&mut *tx, ...)        ← first write: takes lock  │
//! │       │  products.remove_stock(&mut *tx, ...)                          │
//! │       │  ledger.insert(&mut *tx, ...)                                  │
//! │       │  tx.commit().await?;                                           │
//! │       ▼                                                                 │
//! │  XxxRepository { tenant_id }                                           │
//! │  └── every method takes an executor: `&SqlitePool` for one-off reads,  │
//! │      `&mut *tx` to join the caller's transaction                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (every statement filters on tenant_id)                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`AppointmentRepository`](appointment::AppointmentRepository) - bookings and day scans
//! - [`CatalogRepository`](catalog::CatalogRepository) - resources, clients, services, packages
//! - [`ProductRepository`](product::ProductRepository) - products and stock deltas
//! - [`StockMovementRepository`](movement::StockMovementRepository) - immutable movements
//! - [`BatchRepository`](batch::BatchRepository) - product batches
//! - [`SaleRepository`](sale::SaleRepository) - product and package sales
//! - [`LedgerRepository`](ledger::LedgerRepository) - payables and receivables
//! - [`PostedEventRepository`](event::PostedEventRepository) - idempotency keys

pub mod appointment;
pub mod batch;
pub mod catalog;
pub mod event;
pub mod ledger;
pub mod movement;
pub mod product;
pub mod sale;

use uuid::Uuid;

/// Generates a new record id.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
