use thiserror::Error;

/// PostgreSQL SQLSTATE codes that mean "retry the transaction".
const LOCK_NOT_AVAILABLE: &str = "55P03";
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

/// PostgreSQL SQLSTATE codes for violated table constraints.
const UNIQUE_VIOLATION: &str = "23505";
const CHECK_VIOLATION: &str = "23514";

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A row lock could not be acquired in time, or the transaction lost a
    /// serialization race. The whole transaction may be retried.
    #[error("Transaction conflict: {0}")]
    Conflict(String),

    /// The generated order number is already taken.
    #[error("Order number already in use: {0}")]
    DuplicateOrderNumber(String),

    /// A table constraint rejected the write.
    #[error("Constraint violated: {0}")]
    Constraint(String),

    /// A write was attempted on a row this transaction has not locked.
    #[error("Row lock not held: {0}")]
    LockNotHeld(String),

    /// A row could not be turned back into a domain value.
    #[error("Corrupt row: {0}")]
    Decode(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Returns true if retrying the same transaction may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && let Some(code) = db_err.code()
        {
            match code.as_ref() {
                LOCK_NOT_AVAILABLE | SERIALIZATION_FAILURE | DEADLOCK_DETECTED => {
                    return StoreError::Conflict(db_err.message().to_string());
                }
                UNIQUE_VIOLATION | CHECK_VIOLATION => {
                    return StoreError::Constraint(db_err.message().to_string());
                }
                _ => {}
            }
        }
        StoreError::Database(err)
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
