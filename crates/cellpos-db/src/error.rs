//! # Database Error Types
//!
//! Error types for the store and its components.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  sqlx::Error ──────────┐                                                │
//! │  CoreError ────────────┼──► DbError (this module) ──► kind() ──► UI    │
//! │  ValidationError ──────┘                                                │
//! │                                                                         │
//! │  Storage failures carry the SQL class (select/insert/...) and the      │
//! │  driver message. Bound parameter values are never included.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use cellpos_core::{CoreError, ErrorKind, ValidationError};
use thiserror::Error;

// =============================================================================
// SQL Class
// =============================================================================

/// Coarse statement class attached to storage failures and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlClass {
    Select,
    Insert,
    Update,
    Delete,
    Ddl,
    Other,
}

impl SqlClass {
    /// Classifies a statement by its leading keyword.
    ///
    /// ## Example
    /// ```rust
    /// use cellpos_db::error::SqlClass;
    ///
    /// assert_eq!(SqlClass::of("  select * from products"), SqlClass::Select);
    /// assert_eq!(SqlClass::of("WITH t AS (SELECT 1) SELECT * FROM t"), SqlClass::Select);
    /// assert_eq!(SqlClass::of("CREATE INDEX i ON t(c)"), SqlClass::Ddl);
    /// ```
    pub fn of(sql: &str) -> Self {
        let keyword: String = sql
            .trim_start()
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect::<String>()
            .to_ascii_uppercase();
        match keyword.as_str() {
            "SELECT" | "WITH" | "PRAGMA" | "EXPLAIN" => SqlClass::Select,
            "INSERT" | "REPLACE" => SqlClass::Insert,
            "UPDATE" => SqlClass::Update,
            "DELETE" => SqlClass::Delete,
            "CREATE" | "DROP" | "ALTER" => SqlClass::Ddl,
            _ => SqlClass::Other,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            SqlClass::Select => "select",
            SqlClass::Insert => "insert",
            SqlClass::Update => "update",
            SqlClass::Delete => "delete",
            SqlClass::Ddl => "ddl",
            SqlClass::Other => "other",
        }
    }
}

impl fmt::Display for SqlClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// DbError
// =============================================================================

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - Id doesn't exist
    /// - Registered customer on a sale was removed
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting duplicate SKU
    /// - Duplicate sale or wallet document number
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// State conflict other than a unique key (refunding a refunded sale).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed ({class}): {message}")]
    QueryFailed { class: SqlClass, message: String },

    /// Transaction begin/commit/rollback failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// CSV reading or writing failed as a whole (not a single bad row).
    #[error("Import/export failed: {0}")]
    Import(String),

    /// A business rule rejected the operation.
    #[error(transparent)]
    Domain(#[from] CoreError),

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

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Converts a driver error raised by a statement of the given class.
    pub fn from_sqlx(class: SqlClass, err: sqlx::Error) -> Self {
        match DbError::from(err) {
            DbError::QueryFailed { message, .. } => DbError::QueryFailed { class, message },
            other => other,
        }
    }

    /// Maps the error to the kind shown to the presentation layer.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::NotFound { .. } => ErrorKind::NotFound,
            DbError::UniqueViolation { .. } | DbError::Conflict(_) => ErrorKind::Conflict,
            DbError::Domain(core) => core.kind(),
            DbError::Config(_) => ErrorKind::Validation,
            DbError::ForeignKeyViolation { .. }
            | DbError::ConnectionFailed(_)
            | DbError::MigrationFailed(_)
            | DbError::QueryFailed { .. }
            | DbError::TransactionFailed(_)
            | DbError::PoolExhausted
            | DbError::Import(_)
            | DbError::Internal(_) => ErrorKind::Storage,
        }
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Domain(CoreError::Validation(err))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
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

                // "UNIQUE constraint failed: products.sku"
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
                } else {
                    DbError::QueryFailed {
                        class: SqlClass::Other,
                        message: msg.to_string(),
                    }
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<csv::Error> for DbError {
    fn from(err: csv::Error) -> Self {
        DbError::Import(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;
    use cellpos_core::status::RepairStatus;

    #[test]
    fn test_sql_class() {
        assert_eq!(SqlClass::of("INSERT INTO t VALUES (1)"), SqlClass::Insert);
        assert_eq!(SqlClass::of("\n update t set a = 1"), SqlClass::Update);
        assert_eq!(SqlClass::of("DELETE FROM t"), SqlClass::Delete);
        assert_eq!(SqlClass::of("VACUUM"), SqlClass::Other);
        assert_eq!(SqlClass::of(""), SqlClass::Other);
    }

    #[test]
    fn test_kinds() {
        assert_eq!(DbError::not_found("Product", "x").kind(), ErrorKind::NotFound);
        assert_eq!(DbError::duplicate("sku", "P1").kind(), ErrorKind::Conflict);
        assert_eq!(DbError::PoolExhausted.kind(), ErrorKind::Storage);

        let err: DbError = CoreError::IllegalTransition {
            from: RepairStatus::Delivered,
            to: RepairStatus::Waiting,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::IllegalTransition);

        let err: DbError = ValidationError::required("name").into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_query_failed_message_has_class() {
        let err = DbError::QueryFailed {
            class: SqlClass::Insert,
            message: "no such table: x".into(),
        };
        assert_eq!(err.to_string(), "Query failed (insert): no such table: x");
    }
}
