//! # Validation Module
//!
//! Input validation for bookings and business events.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (forms, wire decoding)                                │
//! │  └── Type validation (deserialization)                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Required ids present                                              │
//! │  ├── Quantities positive, amounts non-negative                         │
//! │  └── Free text within length limits                                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (quantity > 0), CHECK (stock_quantity >= 0)                 │
//! │  └── UNIQUE (tenant_id, reference_type, reference_id)                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything here runs before the first write of a transaction, so a
//! validation failure never leaves anything behind.
//!
//! ## Usage
//! ```rust
//! use atelier_core::validation::{validate_quantity, validate_required};
//!
//! assert!(validate_quantity("quantity", 4).is_ok());
//! assert!(validate_required("resource_id", "  ").is_err());
//! ```

use crate::error::ValidationError;
use crate::{MAX_NAME_LENGTH, MAX_NOTES_LENGTH};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Rejects empty or whitespace-only values.
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a free-text name (counterparty, client).
pub fn validate_name(field: &str, value: &str) -> ValidationResult<()> {
    validate_required(field, value)?;
    if value.trim().chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LENGTH,
        });
    }
    Ok(())
}

/// Validates optional notes / reasons. Empty is fine.
pub fn validate_notes(field: &str, value: Option<&str>) -> ValidationResult<()> {
    match value {
        Some(text) if text.chars().count() > MAX_NOTES_LENGTH => Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NOTES_LENGTH,
        }),
        _ => Ok(()),
    }
}

/// Validates a UUID string.
///
/// Used for caller-supplied primary record ids, which double as
/// idempotency keys.
///
/// ## Example
/// ```rust
/// use atelier_core::validation::validate_uuid;
///
/// assert!(validate_uuid("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    validate_required(field, id)?;
    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a movement or sale quantity: any positive count.
pub fn validate_quantity(field: &str, qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a monetary amount in centavos. Zero is allowed.
pub fn validate_amount_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_required() {
        assert!(validate_required("client_id", "c-1").is_ok());
        assert!(validate_required("client_id", "").is_err());
        assert!(validate_required("client_id", "   ").is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("counterparty_name", "Distribuidora Sul").is_ok());
        assert!(validate_name("counterparty_name", "").is_err());
        assert!(matches!(
            validate_name("counterparty_name", &"A".repeat(MAX_NAME_LENGTH + 1)),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn test_validate_notes() {
        assert!(validate_notes("notes", None).is_ok());
        assert!(validate_notes("notes", Some("")).is_ok());
        assert!(validate_notes("notes", Some(&"x".repeat(MAX_NOTES_LENGTH + 1))).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity("quantity", 1).is_ok());
        assert!(validate_quantity("quantity", 250_000).is_ok());

        assert!(matches!(
            validate_quantity("quantity", 0),
            Err(ValidationError::MustBePositive { .. })
        ));
        assert!(validate_quantity("quantity", -3).is_err());
    }

    #[test]
    fn test_validate_amount_cents() {
        assert!(validate_amount_cents("unit_cost", 0).is_ok());
        assert!(validate_amount_cents("unit_cost", 1099).is_ok());
        assert!(matches!(
            validate_amount_cents("unit_cost", -1),
            Err(ValidationError::MustNotBeNegative { .. })
        ));
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("id", "").is_err());
        assert!(validate_uuid("id", "123").is_err());
    }
}
