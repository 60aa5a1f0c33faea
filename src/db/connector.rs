//! Connector contract.
//!
//! A connector turns a [`ConnectionConfig`] into a pool of sessions and runs
//! native-marker SQL on them. Everything above this seam (translation,
//! coercion, pooling policy, transactions, CRUD) is connector-independent.

use crate::db::dialect::Dialect;
use crate::error::{DbError, DbResult};
use crate::models::{ConnectionConfig, RawQueryResult, WireValue};
use async_trait::async_trait;
use std::sync::Arc;

/// Isolation level requested on every freshly acquired session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// The `SET TRANSACTION ISOLATION LEVEL` form of this level.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

impl std::fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A caller-owned session lent to an operation, typically a transaction's.
pub type SessionRef<'a> = &'a mut (dyn Session + 'static);

/// Factory for pools of one backend.
#[async_trait]
pub trait Connector: Send + Sync {
    /// SQL dialect of the backend.
    fn dialect(&self) -> Dialect;

    /// Open a pool for the configured database.
    ///
    /// Implementations may connect lazily; a missing database may surface
    /// either here or on the first [`ConnectionPool::acquire`].
    async fn open_pool(&self, config: &ConnectionConfig) -> DbResult<Arc<dyn ConnectionPool>>;

    /// Create the configured database.
    async fn create_database(&self, _config: &ConnectionConfig) -> DbResult<()> {
        Err(DbError::not_implemented("create database"))
    }
}

/// Pooled source of sessions.
#[async_trait]
pub trait ConnectionPool: Send + Sync {
    async fn acquire(&self) -> DbResult<Box<dyn Session>>;

    async fn close(&self);
}

/// One checked-out connection.
///
/// `query` receives SQL already in the backend's marker syntax and a binding
/// already in wire form. Closing consumes the session, returning it to its
/// pool; a session closed with an open transaction is rolled back.
#[async_trait]
pub trait Session: Send {
    async fn set_isolation_level(&mut self, level: IsolationLevel) -> DbResult<()>;

    async fn query(&mut self, sql: &str, binding: &[WireValue]) -> DbResult<RawQueryResult>;

    async fn begin(&mut self) -> DbResult<()>;

    async fn commit(&mut self) -> DbResult<()>;

    async fn rollback(&mut self) -> DbResult<()>;

    async fn close(self: Box<Self>);
}
