//! # atelier-db: Persistence and Services for Atelier
//!
//! SQLite storage for the salon admin plus the three services callers use:
//! booking, the event cascade and read-only reports.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Atelier Data Flow                                │
//! │                                                                         │
//! │  Caller (UI command, HTTP handler, seed binary)                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   atelier-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Services    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │ (service/)    │    │ (repository/) │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ BookingSvc    │───►│ Appointment   │    │ 001_initial  │  │   │
//! │  │   │ CascadeSvc    │───►│ Product/Batch │    │              │  │   │
//! │  │   │ ReportSvc     │───►│ Ledger/Event  │    │              │  │   │
//! │  │   └───────┬───────┘    └───────────────┘    └──────────────┘  │   │
//! │  │           │ rules                                               │   │
//! │  │           ▼                                                     │   │
//! │  │     atelier-core (conflict, cascade, classify, batch)          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - `atelier.toml` + environment overrides
//! - [`pool`] - Connection pool creation and service accessors
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Store, service and config error types
//! - [`repository`] - Tenant-scoped table access
//! - [`service`] - Booking, cascade and report operations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use atelier_db::{AtelierConfig, Database};
//!
//! let config = AtelierConfig::load(None)?;
//! let db = Database::new(config.db_config()).await?;
//! let settings = config.engine_settings()?;
//!
//! let receipt = db
//!     .cascade(tenant_id, settings)
//!     .post_event("stock_entry", r#"{"product_id": "...", "quantity": 5}"#)
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{AtelierConfig, EngineSettings};
pub use error::{ConfigError, DbError, EngineError, EngineResult, ErrorCode};
pub use pool::{Database, DbConfig};

pub use service::booking::{BookingService, NewAppointment};
pub use service::cascade::CascadeService;
pub use service::reports::ReportService;
