//! # Services
//!
//! The operations callers invoke. Each service holds the pool, a tenant id
//! and the resolved [`EngineSettings`], and builds its repositories from
//! the tenant id.
//!
//! ## Operation Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  with_timeout(settings.operation_timeout, "book", async {              │
//! │      1. validate input                 (atelier-core, no I/O)          │
//! │      2. look up referenced records     (pool, before the transaction)  │
//! │      3. let mut tx = pool.begin()                                      │
//! │      4. first statement is a WRITE     (takes SQLite's writer lock)    │
//! │      5. read current state, apply rule (atelier-core)                  │
//! │      6. rollback on rejection / commit                                 │
//! │  })                                                                     │
//! │                                                                         │
//! │  Timeout → the future is dropped → sqlx rolls the transaction back     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lookups run before `begin` so an in-memory pool with a single
//! connection never waits on itself.

pub mod booking;
pub mod cascade;
pub mod reports;

#[cfg(test)]
pub(crate) mod test_support;

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;
use tracing::warn;

use crate::error::{EngineError, EngineResult};

/// Runs `operation`, failing with a retryable [`EngineError::Timeout`] if it
/// takes longer than `limit`.
pub(crate) async fn with_timeout<T, F>(
    limit: Duration,
    operation: &'static str,
    future: F,
) -> EngineResult<T>
where
    F: Future<Output = EngineResult<T>>,
{
    match timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => {
            warn!(operation, timeout_ms = limit.as_millis() as u64, "Operation timed out");
            Err(EngineError::Timeout(limit))
        }
    }
}
