//! Database access layer.
//!
//! This module provides:
//! - The connector contract and the SQLite connector
//! - Pool management with on-demand database provisioning
//! - `$N` placeholder translation and type coercion
//! - Query execution, transactions and generic CRUD
//! - Per-table proxies, identity reseeding and the handle registry

pub mod connector;
pub mod crud;
pub mod database;
pub mod dialect;
pub mod executor;
pub mod params;
pub mod pool;
pub mod registry;
pub mod sequence;
pub mod sqlite;
pub mod table;
pub mod transaction;
pub mod types;

pub use connector::{ConnectionPool, Connector, IsolationLevel, Session, SessionRef};
pub use crud::{Crud, IDENTITY_COLUMN, validate_identifier};
pub use database::Database;
pub use dialect::{Dialect, MarkerStyle};
pub use executor::QueryExecutor;
pub use pool::PoolManager;
pub use registry::DatabaseRegistry;
pub use sequence::{SequenceOutcome, SequenceReconciler};
pub use sqlite::SqliteConnector;
pub use table::{Table, TableSet};
pub use transaction::{TransactionContext, TransactionCoordinator};

use crate::error::{DbError, DbResult};
use crate::models::{ConnectionConfig, DriverKind};
use std::sync::Arc;

/// Connector for the driver named in `config`.
pub fn default_connector(config: &ConnectionConfig) -> DbResult<Arc<dyn Connector>> {
    match config.driver_kind() {
        DriverKind::Sqlite => Ok(Arc::new(SqliteConnector::new())),
        DriverKind::Odbc => Err(DbError::not_implemented(format!(
            "connector for driver '{}'",
            config.driver
        ))),
    }
}
