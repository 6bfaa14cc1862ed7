//! svcbill Database Layer
//!
//! This crate provides the billing record store behind the core's store
//! traits. It includes:
//!
//! - Connection pool management and migrations with sqlx
//! - PostgreSQL repositories for company services, invoices and history
//! - Version-checked status transitions committed with their history row
//! - An in-memory store with fault injection for tests and local runs

pub mod memory;
pub mod pool;
pub mod repositories;
pub mod store;

pub use memory::InMemoryBillingStore;
pub use pool::{create_pool, run_migrations};
pub use repositories::*;
pub use store::PgBillingStore;

// Re-export commonly used types
pub use svcbill_core::{AppError, AppResult};
pub use sqlx::{PgPool, Postgres, Transaction};

use tracing::error;

/// Convert a sqlx error into an `AppError`.
///
/// Connectivity failures become `StoreUnavailable` so callers can tell them
/// apart from query errors.
pub(crate) fn map_sqlx_error(context: &str, e: sqlx::Error) -> AppError {
    error!("{}: {}", context, e);
    match &e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            AppError::StoreUnavailable(format!("{}: {}", context, e))
        }
        _ => AppError::Database(format!("{}: {}", context, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_errors_are_retryable() {
        // what pool.begin() yields when the database is gone
        let err = map_sqlx_error(
            "Failed to start transition transaction",
            sqlx::Error::PoolTimedOut,
        );
        assert!(matches!(err, AppError::StoreUnavailable(_)));
        assert!(err.is_retryable());

        let err = map_sqlx_error("Failed to commit transition", sqlx::Error::PoolClosed);
        assert_eq!(err.error_code(), "store_unavailable");
    }

    #[test]
    fn test_query_errors_map_to_database() {
        let err = map_sqlx_error("Failed to find company service", sqlx::Error::RowNotFound);
        assert!(matches!(err, AppError::Database(_)));
    }
}
