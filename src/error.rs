//! Error types for the database access layer.
//!
//! Every public operation returns [`DbResult`]. The failure variants carry the
//! driver's machine-readable code (SQLSTATE or native code) and a human-readable
//! message, and query failures keep the full list of nested driver diagnostics.

use serde::Serialize;
use thiserror::Error;

/// SQLSTATE reported by drivers when the target database does not exist.
pub const MISSING_DATABASE_STATE: &str = "3D000";

/// SQL Server's message for an object that already exists.
const ALREADY_OBJECT_MARKER: &str = "There is already an object";

/// Phrase other drivers use, matched as whole words anywhere in the message.
const ALREADY_EXISTS_PHRASE: &str = "already exists";

/// One nested diagnostic record attached to a driver failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub code: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(code: Option<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} {}", code, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum DbError {
    #[error("{}", with_code(code.as_deref(), message))]
    Connection {
        message: String,
        code: Option<String>,
    },

    #[error("Database '{database}' does not exist: {message}")]
    DatabaseNotFound { database: String, message: String },

    /// Message is the primary driver message followed by every nested
    /// diagnostic on its own line.
    #[error("{}", with_diagnostics(message, diagnostics))]
    Query {
        message: String,
        code: Option<String>,
        diagnostics: Vec<Diagnostic>,
    },

    #[error("Transaction error: {message}")]
    Transaction { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Not implemented: {operation}")]
    NotImplemented { operation: String },

    #[error("Unit of work panicked: {message}")]
    UnitOfWorkPanicked { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn with_code(code: Option<&str>, message: &str) -> String {
    match code {
        Some(code) => format!("{} {}", code, message),
        None => message.to_string(),
    }
}

fn with_diagnostics(message: &str, diagnostics: &[Diagnostic]) -> String {
    let mut msg = message.to_string();
    for diagnostic in diagnostics {
        msg.push_str("\r\n");
        msg.push_str(&diagnostic.to_string());
    }
    msg
}

impl DbError {
    /// Create a connection error.
    pub fn connection(message: impl Into<String>, code: Option<String>) -> Self {
        Self::Connection {
            message: message.into(),
            code,
        }
    }

    /// Create a missing-database error.
    pub fn database_not_found(database: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DatabaseNotFound {
            database: database.into(),
            message: message.into(),
        }
    }

    /// Create a query error with nested diagnostics.
    pub fn query(
        message: impl Into<String>,
        code: Option<String>,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        Self::Query {
            message: message.into(),
            code,
            diagnostics,
        }
    }

    /// Create a transaction error.
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a not-implemented error.
    pub fn not_implemented(operation: impl Into<String>) -> Self {
        Self::NotImplemented {
            operation: operation.into(),
        }
    }

    /// Create an error for a unit of work that panicked.
    pub fn unit_of_work_panicked(message: impl Into<String>) -> Self {
        Self::UnitOfWorkPanicked {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Driver code (SQLSTATE or native), when the driver supplied one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Connection { code, .. } | Self::Query { code, .. } => code.as_deref(),
            Self::DatabaseNotFound { .. } => Some(MISSING_DATABASE_STATE),
            _ => None,
        }
    }

    /// Short stable name of the failure category.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "connection",
            Self::DatabaseNotFound { .. } => "database_not_found",
            Self::Query { .. } => "query",
            Self::Transaction { .. } => "transaction",
            Self::InvalidInput { .. } => "invalid_input",
            Self::NotImplemented { .. } => "not_implemented",
            Self::UnitOfWorkPanicked { .. } => "unit_of_work_panicked",
            Self::Internal { .. } => "internal",
        }
    }

    /// Check if this error means the target database is missing.
    pub fn is_missing_database(&self) -> bool {
        matches!(self, Self::DatabaseNotFound { .. }) || self.code() == Some(MISSING_DATABASE_STATE)
    }

    /// Check if this error reports an object that already exists.
    ///
    /// Idempotent schema statements fail with these on repeat runs.
    pub fn is_already_exists(&self) -> bool {
        let msg = self.to_string();
        msg.contains(ALREADY_OBJECT_MARKER)
            || msg.match_indices(ALREADY_EXISTS_PHRASE).any(|(idx, phrase)| {
                let before = msg[..idx].chars().next_back();
                let after = msg[idx + phrase.len()..].chars().next();
                before.is_some_and(char::is_whitespace)
                    && !after.is_some_and(|c| c.is_alphanumeric() || c == '_')
            })
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(msg.to_string(), None),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::query(db_err.message(), code, Vec::new())
            }
            sqlx::Error::RowNotFound => DbError::query("No rows returned", None, Vec::new()),
            sqlx::Error::PoolTimedOut => {
                DbError::connection("Timed out acquiring a pooled connection", None)
            }
            sqlx::Error::PoolClosed => DbError::connection("Connection pool is closed", None),
            sqlx::Error::Io(io_err) => DbError::connection(format!("I/O error: {}", io_err), None),
            sqlx::Error::Tls(tls_err) => {
                DbError::connection(format!("TLS error: {}", tls_err), None)
            }
            sqlx::Error::Protocol(msg) => {
                DbError::connection(format!("Protocol error: {}", msg), None)
            }
            sqlx::Error::ColumnNotFound(col) => {
                DbError::query(format!("Column not found: {}", col), None, Vec::new())
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => DbError::internal(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_prefixes_code() {
        let err = DbError::connection("Login failed", Some("28000".to_string()));
        assert_eq!(err.to_string(), "28000 Login failed");
        assert_eq!(err.code(), Some("28000"));
    }

    #[test]
    fn test_query_error_concatenates_diagnostics() {
        let err = DbError::query(
            "[odbc] Error executing the sql statement",
            Some("42S02".to_string()),
            vec![
                Diagnostic::new(Some("42S02".to_string()), "Invalid object name 'orderz'."),
                Diagnostic::new(Some("42000".to_string()), "Statement(s) could not be prepared."),
            ],
        );
        assert_eq!(
            err.to_string(),
            "[odbc] Error executing the sql statement\r\n42S02 Invalid object name 'orderz'.\r\n42000 Statement(s) could not be prepared."
        );
    }

    #[test]
    fn test_missing_database_detection() {
        assert!(DbError::database_not_found("app", "cannot open").is_missing_database());
        assert!(
            DbError::connection("database \"app\" does not exist", Some("3D000".into()))
                .is_missing_database()
        );
        assert!(!DbError::connection("refused", Some("08001".into())).is_missing_database());
    }

    #[test]
    fn test_already_exists_detection() {
        let err = DbError::query(
            "There is already an object named 'orders' in the database.",
            Some("42S01".to_string()),
            Vec::new(),
        );
        assert!(err.is_already_exists());

        let err = DbError::query("table orders already exists ", None, Vec::new());
        assert!(err.is_already_exists());

        let err = DbError::query("table orders already exists", Some("1".into()), Vec::new());
        assert!(err.is_already_exists());

        let err = DbError::query("index idx_status already exists.", None, Vec::new());
        assert!(err.is_already_exists());

        let err = DbError::query("row key already existsing", None, Vec::new());
        assert!(!err.is_already_exists());

        let err = DbError::query("no such table: orders", None, Vec::new());
        assert!(!err.is_already_exists());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(DbError::transaction("x").kind(), "transaction");
        assert_eq!(DbError::not_implemented("x").kind(), "not_implemented");
        assert_eq!(DbError::unit_of_work_panicked("x").kind(), "unit_of_work_panicked");
    }

    #[test]
    fn test_sqlx_pool_timeout_maps_to_connection() {
        let err: DbError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, DbError::Connection { .. }));
    }
}
