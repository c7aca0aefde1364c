//! Error type shared by the database, store and report layers

use miette::Diagnostic;
use rusqlite::ErrorCode;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::core::identity::IdParseError;
use crate::core::query_cache::Transient;
use crate::core::validation::ValidationErrors;

/// Errors raised by backend operations
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("{entity} not found: '{key}'")]
    #[diagnostic(code(garage::not_found))]
    NotFound { entity: &'static str, key: String },

    #[error("'{key}' matches {count} {entity} records; be more specific")]
    #[diagnostic(code(garage::ambiguous), help("use the full id"))]
    Ambiguous {
        entity: &'static str,
        key: String,
        count: usize,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("cannot move service order from {from} to {to}")]
    #[diagnostic(code(garage::invalid_transition), help("allowed next states: {allowed}"))]
    InvalidTransition {
        from: String,
        to: String,
        allowed: String,
    },

    #[error("service order #{number} is {status} and can no longer be changed")]
    #[diagnostic(code(garage::order_closed))]
    OrderClosed { number: i64, status: String },

    #[error("insufficient stock for part {code}: {available} on hand, {requested} requested")]
    #[diagnostic(code(garage::insufficient_stock))]
    InsufficientStock {
        code: String,
        available: Decimal,
        requested: Decimal,
    },

    #[error("no shop selected")]
    #[diagnostic(
        code(garage::no_shop),
        help("run 'garage shop use <id|name>' or pass --shop")
    )]
    NoShopSelected,

    #[error("constraint violation: {0}")]
    #[diagnostic(code(garage::constraint))]
    Constraint(String),

    #[error("database schema version {found} is newer than supported version {supported}")]
    #[diagnostic(code(garage::schema_version), help("upgrade garage to open this workspace"))]
    SchemaVersion { found: i32, supported: i32 },

    #[error("corrupt value in column '{column}': {message}")]
    Corrupt {
        column: &'static str,
        message: String,
    },

    #[error("database error: {0}")]
    #[diagnostic(code(garage::database))]
    Database(rusqlite::Error),

    #[error(transparent)]
    Id(#[from] IdParseError),

    #[error("IO error: {0}")]
    Io(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, msg)
                if err.code == ErrorCode::ConstraintViolation =>
            {
                StoreError::Constraint(msg.clone().unwrap_or_else(|| err.to_string()))
            }
            _ => StoreError::Database(e),
        }
    }
}

impl Transient for StoreError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Database(rusqlite::Error::SqliteFailure(err, _))
                if matches!(err.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_failure_is_mapped() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (x TEXT NOT NULL UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err: StoreError = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .unwrap_err()
            .into();
        assert!(matches!(err, StoreError::Constraint(ref m) if m.contains("UNIQUE")));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_busy_is_transient() {
        let err = StoreError::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        ));
        assert!(err.is_transient());
    }
}
