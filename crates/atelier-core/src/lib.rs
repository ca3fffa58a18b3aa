//! # atelier-core: Pure Business Logic for Atelier
//!
//! The booking/ledger consistency rules of Atelier as pure functions with
//! zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Atelier Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Admin UI (external)                          │   │
//! │  │    Agenda ──► Estoque ──► Vendas ──► Financeiro                 │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ in-process calls                       │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    atelier-db (services)                        │   │
//! │  │    validate_booking, book, post_event, get_batch_priority      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ atelier-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────┐ │   │
//! │  │   │ interval │ │ conflict │ │ cascade  │ │  batch   │ │classi│ │   │
//! │  │   │ TimeSlot │ │  check   │ │  rules   │ │  rank    │ │ -fy  │ │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────┘ └──────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Persisted domain types (Appointment, Product, LedgerEntry, ...)
//! - [`money`] - Integer centavo amounts
//! - [`interval`] - Half-open time slots and business days
//! - [`conflict`] - Appointment overlap detection
//! - [`cascade`] - Business events and the ledger/stock records they derive
//! - [`batch`] - Expiry ranking and FIFO draw planning
//! - [`classify`] - Threshold tiers for client inactivity and batch expiry
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use atelier_core::classify::{classify, client_inactivity_thresholds, ClientTier};
//! use atelier_core::interval::TimeSlot;
//! use chrono::{TimeZone, Utc};
//!
//! let t = client_inactivity_thresholds();
//! assert_eq!(classify(91, &t), ClientTier::Urgent);
//! assert_eq!(classify(90, &t), ClientTier::Warning);
//!
//! let a = TimeSlot::starting_at(Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap(), 60);
//! let b = TimeSlot::starting_at(Utc.with_ymd_and_hms(2024, 5, 10, 10, 0, 0).unwrap(), 60);
//! assert!(!a.overlaps(&b));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod batch;
pub mod cascade;
pub mod classify;
pub mod conflict;
pub mod error;
pub mod interval;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cascade::{BusinessEvent, CascadeOutcome, DerivedRecord, EventReceipt};
pub use conflict::ConflictResult;
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Duration used when a service has no (or a non-positive) duration.
pub const DEFAULT_SERVICE_MINUTES: i64 = 60;

/// Counterparty on stock-entry payables when no supplier is named.
pub const DEFAULT_SUPPLIER_NAME: &str = "Fornecedor";

/// Counterparty on receivables when no client is named.
pub const DEFAULT_CLIENT_NAME: &str = "Cliente";

pub const MAX_NAME_LENGTH: usize = 200;

pub const MAX_NOTES_LENGTH: usize = 1000;
