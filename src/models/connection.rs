//! Connection-related data models.
//!
//! This module defines the per-handle connection configuration supplied by the
//! configuration provider.

use crate::config::PoolOptions;
use serde::{Deserialize, Serialize};

/// Family of driver a configuration targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Embedded SQLite file, served by the built-in connector.
    Sqlite,
    /// Any ODBC driver name (SQL Server in production); needs an external connector.
    Odbc,
}

impl DriverKind {
    /// Classify a driver identifier.
    pub fn from_driver(driver: &str) -> Self {
        let lower = driver.trim().to_lowercase();
        if lower == "sqlite" || lower == "sqlite3" {
            Self::Sqlite
        } else {
            Self::Odbc
        }
    }

    /// Get the display name for this driver family.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Sqlite => "SQLite",
            Self::Odbc => "ODBC",
        }
    }
}

impl std::fmt::Display for DriverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Configuration for one named database handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Driver identifier, e.g. `ODBC Driver 18 for SQL Server` or `sqlite`.
    pub driver: String,
    #[serde(default)]
    pub host: String,
    /// Database name; for SQLite the database file path.
    pub database: String,
    #[serde(default)]
    pub user: String,
    /// Contains sensitive data - never log
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default)]
    pub trusted_connection: bool,
    #[serde(default)]
    pub encrypt: bool,
    /// Connection pool configuration options.
    #[serde(default)]
    pub pool_options: PoolOptions,
}

impl ConnectionConfig {
    /// Create a new connection configuration.
    pub fn new(
        driver: impl Into<String>,
        host: impl Into<String>,
        database: impl Into<String>,
    ) -> Result<Self, ConnectionConfigError> {
        let driver = driver.into();
        let database = database.into();

        if driver.trim().is_empty() {
            return Err(ConnectionConfigError::EmptyDriver);
        }
        if database.trim().is_empty() {
            return Err(ConnectionConfigError::EmptyDatabase);
        }

        Ok(Self {
            driver,
            host: host.into(),
            database,
            user: String::new(),
            password: String::new(),
            trusted_connection: false,
            encrypt: false,
            pool_options: PoolOptions::default(),
        })
    }

    /// Configuration for a SQLite database file.
    pub fn sqlite(path: impl Into<String>) -> Result<Self, ConnectionConfigError> {
        Self::new("sqlite", "", path)
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    pub fn with_flags(mut self, trusted_connection: bool, encrypt: bool) -> Self {
        self.trusted_connection = trusted_connection;
        self.encrypt = encrypt;
        self
    }

    pub fn with_pool_options(mut self, pool_options: PoolOptions) -> Self {
        self.pool_options = pool_options;
        self
    }

    pub fn driver_kind(&self) -> DriverKind {
        DriverKind::from_driver(&self.driver)
    }

    /// Full ODBC connection string (sensitive - not logged).
    pub fn connection_string(&self) -> String {
        format!(
            "Driver={};Server={};Database={};UID={};PWD={};Trusted_Connection={};Encrypt={}",
            self.driver,
            self.host,
            self.database,
            self.user,
            self.password,
            yes_no(self.trusted_connection),
            yes_no(self.encrypt)
        )
    }

    /// Get a display-safe version of the connection string (password masked).
    pub fn masked_connection_string(&self) -> String {
        let password = &self.password;
        let full = self.connection_string();
        if password.is_empty() {
            return full;
        }
        full.replace(&format!("PWD={};", password), "PWD=****;")
    }

    /// Same configuration with another password, used for credential checks.
    pub fn with_password(&self, password: impl Into<String>) -> Self {
        let mut config = self.clone();
        config.password = password.into();
        config
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

/// Errors that can occur when creating a connection configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionConfigError {
    #[error("Driver cannot be empty")]
    EmptyDriver,

    #[error("Database name cannot be empty")]
    EmptyDatabase,
}
