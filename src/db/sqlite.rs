//! SQLite connector built on `sqlx`.
//!
//! The configured database name is the database file path. A missing file is
//! reported as [`DbError::DatabaseNotFound`] on acquire, and
//! [`Connector::create_database`] creates it.

use crate::db::connector::{ConnectionPool, Connector, IsolationLevel, Session};
use crate::db::dialect::Dialect;
use crate::db::types::type_code_for;
use crate::error::{DbError, DbResult};
use crate::models::{ColumnMetadata, ConnectionConfig, RawQueryResult, WireValue};
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions,
    SqliteRow,
};
use sqlx::{Column, ConnectOptions, Connection, Executor, Row, Sqlite, TypeInfo, ValueRef};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteConnector;

impl SqliteConnector {
    pub fn new() -> Self {
        Self
    }

    fn connect_options(config: &ConnectionConfig, create: bool) -> SqliteConnectOptions {
        if is_in_memory(&config.database) {
            return SqliteConnectOptions::new()
                .in_memory(true)
                .foreign_keys(true);
        }
        SqliteConnectOptions::new()
            .filename(&config.database)
            .create_if_missing(create)
            .foreign_keys(true)
    }
}

/// Every connection to an in-memory path opens its own private database.
fn is_in_memory(path: &str) -> bool {
    path == ":memory:" || path.starts_with("file::memory:")
}

#[async_trait]
impl Connector for SqliteConnector {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn open_pool(&self, config: &ConnectionConfig) -> DbResult<Arc<dyn ConnectionPool>> {
        let pool_opts = &config.pool_options;
        pool_opts.validate().map_err(DbError::invalid_input)?;

        let in_memory = is_in_memory(&config.database);
        let options = SqlitePoolOptions::new()
            .acquire_timeout(Duration::from_secs(pool_opts.acquire_timeout_or_default()))
            .test_before_acquire(pool_opts.test_before_acquire_or_default());

        // An in-memory database lives as long as its single connection
        let options = if in_memory {
            if pool_opts.max_connections.is_some_and(|max| max > 1) {
                warn!(
                    path = %config.database,
                    "In-memory SQLite database limited to one connection"
                );
            }
            options
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            options
                .min_connections(pool_opts.min_connections_or_default())
                .max_connections(pool_opts.max_connections_or_default(true))
                .idle_timeout(Some(Duration::from_secs(pool_opts.idle_timeout_or_default())))
        };
        let pool = options.connect_lazy_with(Self::connect_options(config, false));

        debug!(path = %config.database, "Opened SQLite pool");
        Ok(Arc::new(SqliteSessionPool {
            pool,
            path: config.database.clone(),
        }))
    }

    async fn create_database(&self, config: &ConnectionConfig) -> DbResult<()> {
        if is_in_memory(&config.database) {
            return Ok(());
        }
        if let Some(parent) = Path::new(&config.database).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DbError::connection(format!("Cannot create {}: {}", parent.display(), e), None)
                })?;
            }
        }

        let conn = Self::connect_options(config, true).connect().await?;
        conn.close().await?;
        info!(path = %config.database, "Created SQLite database");
        Ok(())
    }
}

struct SqliteSessionPool {
    pool: SqlitePool,
    path: String,
}

impl SqliteSessionPool {
    fn acquire_error(&self, err: sqlx::Error) -> DbError {
        if !is_in_memory(&self.path) && !Path::new(&self.path).exists() {
            return DbError::database_not_found(&self.path, err.to_string());
        }
        match err {
            sqlx::Error::Database(db_err) => {
                DbError::connection(db_err.message(), db_err.code().map(|c| c.to_string()))
            }
            other => DbError::from(other),
        }
    }
}

#[async_trait]
impl ConnectionPool for SqliteSessionPool {
    async fn acquire(&self) -> DbResult<Box<dyn Session>> {
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| self.acquire_error(e))?;
        Ok(Box::new(SqliteSession {
            conn,
            in_transaction: false,
        }))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

struct SqliteSession {
    conn: PoolConnection<Sqlite>,
    in_transaction: bool,
}

impl SqliteSession {
    async fn run(&mut self, statement: &str) -> DbResult<()> {
        let conn: &mut SqliteConnection = &mut self.conn;
        conn.execute(statement).await?;
        Ok(())
    }
}

#[async_trait]
impl Session for SqliteSession {
    /// SQLite serializes writers; only dirty reads are configurable.
    async fn set_isolation_level(&mut self, level: IsolationLevel) -> DbResult<()> {
        let read_uncommitted = u8::from(level == IsolationLevel::ReadUncommitted);
        self.run(&format!("PRAGMA read_uncommitted = {}", read_uncommitted))
            .await
    }

    async fn query(&mut self, sql: &str, binding: &[WireValue]) -> DbResult<RawQueryResult> {
        let conn: &mut SqliteConnection = &mut self.conn;

        // When binding is empty, use raw SQL so multi-statement text runs whole
        let rows = if binding.is_empty() {
            conn.fetch_all(sql).await?
        } else {
            let mut query = sqlx::query(sql);
            for value in binding {
                query = bind_wire(query, value);
            }
            query.fetch_all(conn).await?
        };

        Ok(raw_result(&rows))
    }

    async fn begin(&mut self) -> DbResult<()> {
        self.run("BEGIN").await?;
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> DbResult<()> {
        self.run("COMMIT").await?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> DbResult<()> {
        self.in_transaction = false;
        self.run("ROLLBACK").await
    }

    async fn close(self: Box<Self>) {
        let mut session = self;
        if session.in_transaction {
            warn!("Session closed inside a transaction, rolling back");
            if let Err(e) = session.rollback().await {
                warn!(error = %e, "Rollback on close failed");
            }
        }
    }
}

fn bind_wire<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &'q WireValue,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        WireValue::Null => query.bind(None::<String>),
        WireValue::Int(v) => query.bind(*v),
        WireValue::Float(v) => query.bind(*v),
        WireValue::Text(v) => query.bind(v.as_str()),
        WireValue::Bytes(v) => query.bind(v.as_slice()),
    }
}

fn raw_result(rows: &[SqliteRow]) -> RawQueryResult {
    let Some(first) = rows.first() else {
        return RawQueryResult::empty();
    };

    let columns = first
        .columns()
        .iter()
        .map(|col| ColumnMetadata::new(col.name(), type_code_for(col.type_info().name())))
        .collect::<Vec<_>>();

    let rows = rows
        .iter()
        .map(|row| (0..columns.len()).map(|idx| decode_value(row, idx)).collect())
        .collect();

    RawQueryResult { columns, rows }
}

/// Decode by storage class: integer, real, text, then blob.
fn decode_value(row: &SqliteRow, idx: usize) -> WireValue {
    match row.try_get_raw(idx) {
        Ok(raw) if !raw.is_null() => {}
        _ => return WireValue::Null,
    }
    if let Ok(v) = row.try_get::<i64, _>(idx) {
        return WireValue::Int(v);
    }
    if let Ok(v) = row.try_get::<f64, _>(idx) {
        return WireValue::Float(v);
    }
    if let Ok(v) = row.try_get::<String, _>(idx) {
        return WireValue::Text(v);
    }
    if let Ok(v) = row.try_get::<Vec<u8>, _>(idx) {
        return WireValue::Bytes(v);
    }
    WireValue::Null
}
