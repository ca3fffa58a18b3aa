//! # Error Types
//!
//! Errors raised by the persistence layer and the services built on it.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)          Business rule (CoreError)          │
//! │       │                                     │                           │
//! │       ▼                                     │                           │
//! │  DbError ← adds categorization              │                           │
//! │       │                                     │                           │
//! │       └──────────────┬──────────────────────┘                           │
//! │                      ▼                                                  │
//! │  EngineError ← what service callers see                                │
//! │       │          .code()         → machine-readable ErrorCode          │
//! │       │          .is_retryable() → may the caller try again?           │
//! │       ▼                                                                 │
//! │  UI displays the message, which names the resource involved            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use atelier_core::CoreError;

// =============================================================================
// Database Error
// =============================================================================

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - A second ledger entry for the same `(reference_type, reference_id)`
    /// - Reusing a primary record id
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation (e.g. stock would go negative).
    #[error("Constraint violation: {message}")]
    CheckViolation { message: String },

    /// Another writer held the database lock past `busy_timeout`.
    #[error("Database busy: {0}")]
    Busy(String),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A stored value could not be decoded.
    #[error("Corrupt stored value: {0}")]
    Corrupt(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Whether the store was temporarily unavailable.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DbError::Busy(_)
                | DbError::ConnectionFailed(_)
                | DbError::PoolExhausted
                | DbError::Internal(_)
        )
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type / lock
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::ColumnDecode   → DbError::Corrupt
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                // Lock: "database is locked" / "database table is locked"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed") {
                    DbError::CheckViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("is locked") || msg.contains("busy") {
                    DbError::Busy(msg.to_string())
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                DbError::Corrupt(err.to_string())
            }

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Corrupt(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Engine Error
// =============================================================================

/// Error returned by the booking, cascade and report services.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A business rule rejected the request.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The store failed.
    #[error(transparent)]
    Db(#[from] DbError),

    /// The operation did not finish in time; its transaction was rolled back.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::Db(DbError::from(err))
    }
}

/// Machine-readable error category.
///
/// ```text
/// VALIDATION          missing field, non-positive quantity   no retry
/// CONFLICT            slot taken; names client and time      no retry
/// INSUFFICIENT_STOCK  names product, available, requested    no retry
/// LOOKUP_FAILED       referenced record absent               no retry
/// INVALID_TRANSITION  status change not allowed              no retry
/// PERSISTENCE         store unavailable, busy, timeout       retry
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Validation,
    Conflict,
    InsufficientStock,
    LookupFailed,
    InvalidTransition,
    Persistence,
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Core(core) => match core {
                CoreError::Validation(_) | CoreError::UnknownEventType(_) => ErrorCode::Validation,
                CoreError::SlotConflict { .. } => ErrorCode::Conflict,
                CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
                CoreError::NotFound { .. } => ErrorCode::LookupFailed,
                CoreError::InvalidAppointmentTransition { .. }
                | CoreError::InvalidLedgerTransition { .. } => ErrorCode::InvalidTransition,
            },
            EngineError::Db(DbError::NotFound { .. })
            | EngineError::Db(DbError::ForeignKeyViolation { .. }) => ErrorCode::LookupFailed,
            EngineError::Db(_) | EngineError::Timeout(_) => ErrorCode::Persistence,
        }
    }

    /// Whether the same request may succeed if sent again.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Core(_) => false,
            EngineError::Db(db) => db.is_transient(),
            EngineError::Timeout(_) => true,
        }
    }
}

/// Result type for service operations.
pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// Config Error
// =============================================================================

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_core::ValidationError;

    #[test]
    fn test_codes_and_retryability() {
        let conflict = EngineError::from(CoreError::SlotConflict {
            other_appointment_id: "a-1".to_string(),
            other_client_name: "Maria".to_string(),
            other_interval: "14:00–15:00".to_string(),
        });
        assert_eq!(conflict.code(), ErrorCode::Conflict);
        assert!(!conflict.is_retryable());

        let missing = EngineError::from(CoreError::not_found("Product", "p-9"));
        assert_eq!(missing.code(), ErrorCode::LookupFailed);

        let invalid = EngineError::from(CoreError::from(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        }));
        assert_eq!(invalid.code(), ErrorCode::Validation);

        let busy = EngineError::from(DbError::Busy("database is locked".to_string()));
        assert_eq!(busy.code(), ErrorCode::Persistence);
        assert!(busy.is_retryable());

        let timeout = EngineError::Timeout(Duration::from_secs(5));
        assert!(timeout.is_retryable());
        assert_eq!(timeout.code(), ErrorCode::Persistence);
    }

    #[test]
    fn test_sqlx_errors_reach_callers_as_store_failures() {
        let closed = EngineError::from(sqlx::Error::PoolClosed);
        assert!(matches!(closed, EngineError::Db(DbError::ConnectionFailed(_))));
        assert_eq!(closed.code(), ErrorCode::Persistence);
        assert!(closed.is_retryable());

        let exhausted = EngineError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(exhausted, EngineError::Db(DbError::PoolExhausted)));

        let missing = EngineError::from(sqlx::Error::RowNotFound);
        assert_eq!(missing.code(), ErrorCode::LookupFailed);
        assert!(!missing.is_retryable());
    }

    #[test]
    fn test_error_code_serialization() {
        assert_eq!(
            serde_json::to_string(&ErrorCode::InsufficientStock).unwrap(),
            "\"INSUFFICIENT_STOCK\""
        );
    }
}
