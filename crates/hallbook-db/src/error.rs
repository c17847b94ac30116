//! Mapping of sqlx failures onto the application taxonomy

use hallbook_core::AppError;
use tracing::{error, warn};

/// exclusion_violation
const EXCLUSION_VIOLATION: &str = "23P01";
/// unique_violation
const UNIQUE_VIOLATION: &str = "23505";
/// lock_not_available, raised by `lock_timeout`
const LOCK_NOT_AVAILABLE: &str = "55P03";
/// query_canceled, raised by `statement_timeout`
const QUERY_CANCELED: &str = "57014";
/// serialization_failure
const SERIALIZATION_FAILURE: &str = "40001";

/// Constraint guarding per-customer idempotency keys
const IDEMPOTENCY_CONSTRAINT: &str = "bookings_idempotency_key";

/// Convert a sqlx error raised while doing `context`
///
/// Timeouts become retryable `Unavailable`, overlap and key violations become
/// `Conflict` / `AlreadyExists`, everything else is a `Database` error.
pub fn map_sqlx_error(context: &str, err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::PoolTimedOut => {
            warn!("Timed out acquiring connection to {}", context);
            AppError::Unavailable(format!("{}: connection pool exhausted", context))
        }
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some(EXCLUSION_VIOLATION) => {
                AppError::Conflict(format!("{}: overlapping booking exists", context))
            }
            Some(UNIQUE_VIOLATION) if db_err.constraint() == Some(IDEMPOTENCY_CONSTRAINT) => {
                AppError::AlreadyExists(format!("{}: idempotency key already used", context))
            }
            Some(LOCK_NOT_AVAILABLE) | Some(QUERY_CANCELED) | Some(SERIALIZATION_FAILURE) => {
                warn!("Store timeout while trying to {}: {}", context, db_err);
                AppError::Unavailable(format!("{}: store timed out", context))
            }
            _ => {
                error!("Database error while trying to {}: {}", context, err);
                AppError::Database(format!("Failed to {}: {}", context, err))
            }
        },
        _ => {
            error!("Database error while trying to {}: {}", context, err);
            AppError::Database(format!("Failed to {}: {}", context, err))
        }
    }
}
