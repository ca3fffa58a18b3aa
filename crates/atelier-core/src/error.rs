//! # Error Types
//!
//! Domain-specific error types for atelier-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  atelier-core errors (this file)                                       │
//! │  ├── CoreError        - Business rule rejections                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  atelier-db errors (separate crate)                                    │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── EngineError      - What callers of the services see               │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → UI message          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Every rejection names the resource involved (client, product, slot)
//! 2. Errors are enum variants, never String
//! 3. The UI shows these messages verbatim, so they must be specific

use thiserror::Error;

use crate::types::{AppointmentStatus, LedgerStatus};

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised by the pure core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The proposed appointment overlaps an existing one.
    ///
    /// ## User Workflow
    /// ```text
    /// Book 14:30 with Ana (60 min)
    ///      │
    ///      ▼
    /// Existing: Maria 14:00–15:00 (same technician, same day)
    ///      │
    ///      ▼
    /// SlotConflict { client: "Maria", interval: "14:00–15:00" }
    ///      │
    ///      ▼
    /// UI shows: "Time slot taken by Maria (14:00–15:00)"
    /// ```
    #[error("Time slot taken by {other_client_name} ({other_interval}), appointment {other_appointment_id}")]
    SlotConflict {
        other_appointment_id: String,
        other_client_name: String,
        other_interval: String,
    },

    /// Not enough stock to complete a sale or stock exit.
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// A record referenced by the request does not exist for this tenant.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Appointment status change not allowed.
    #[error("Appointment {appointment_id} cannot move from {from:?} to {to:?}")]
    InvalidAppointmentTransition {
        appointment_id: String,
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    /// Ledger entry status change not allowed.
    #[error("Ledger entry {entry_id} cannot move from {from:?} to {to:?}")]
    InvalidLedgerTransition {
        entry_id: String,
        from: LedgerStatus,
        to: LedgerStatus,
    },

    /// Unknown event type on the wire.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any write happens; never retried automatically.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID, malformed payload).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A supplied record id was already posted by a different event type.
    #[error("id {id} was already posted as {posted_as}")]
    IdAlreadyPosted { id: String, posted_as: String },
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
