//! Database handles.
//!
//! A [`Database`] is the unit callers hold: one named connection
//! configuration, its pool, and the executor, transaction, CRUD and sequence
//! services built on it. Handles are cheap to clone and share one pool.

use crate::db::connector::{Connector, Session, SessionRef};
use crate::db::crud::Crud;
use crate::db::dialect::Dialect;
use crate::db::executor::QueryExecutor;
use crate::db::pool::PoolManager;
use crate::db::sequence::{SequenceOutcome, SequenceReconciler};
use crate::db::table::{Table, TableSet};
use crate::db::transaction::{TransactionContext, TransactionCoordinator};
use crate::error::{DbError, DbResult};
use crate::models::{ConnectionConfig, Filter, RawQueryResult, Record, Value};
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

#[derive(Debug)]
struct DatabaseInner {
    pool: Arc<PoolManager>,
    executor: QueryExecutor,
    transactions: TransactionCoordinator,
    crud: Arc<Crud>,
    sequences: SequenceReconciler,
    tables: HashMap<String, Table>,
}

impl Database {
    /// Assemble a handle. No connection is opened until first use.
    pub fn new(
        name: impl Into<String>,
        config: ConnectionConfig,
        tables: &TableSet,
        connector: Arc<dyn Connector>,
    ) -> DbResult<Self> {
        let pool = Arc::new(PoolManager::new(name, config, connector));
        let executor = QueryExecutor::new(Arc::clone(&pool));
        let crud = Arc::new(Crud::new(executor.clone()));
        let tables = tables.build(&crud)?;

        info!(
            handle = %pool.name(),
            driver = %pool.config().driver_kind(),
            tables = tables.len(),
            "Database handle created"
        );

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                transactions: TransactionCoordinator::new(Arc::clone(&pool)),
                sequences: SequenceReconciler::new(Arc::clone(&crud)),
                pool,
                executor,
                crud,
                tables,
            }),
        })
    }

    pub fn name(&self) -> &str {
        self.inner.pool.name()
    }

    pub fn config(&self) -> &ConnectionConfig {
        self.inner.pool.config()
    }

    pub fn dialect(&self) -> Dialect {
        self.inner.pool.dialect()
    }

    pub fn executor(&self) -> &QueryExecutor {
        &self.inner.executor
    }

    /// Proxy for a configured table.
    pub fn table(&self, name: &str) -> DbResult<&Table> {
        self.inner.tables.get(name).ok_or_else(|| {
            DbError::invalid_input(format!(
                "Table '{}' is not configured on database '{}'",
                name,
                self.name()
            ))
        })
    }

    /// Names of the configured table proxies.
    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.inner.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Check out a session directly. Return it with [`Database::release`].
    pub async fn connect(&self) -> DbResult<Box<dyn Session>> {
        self.inner.pool.connect().await
    }

    pub async fn release(&self, session: Box<dyn Session>) {
        self.inner.pool.release(session).await
    }

    /// Verify `password` against the configured server and user.
    pub async fn check_password(&self, password: &str) -> DbResult<()> {
        self.inner.pool.check_password(password).await
    }

    pub async fn query(
        &self,
        sql: &str,
        binding: &[Value],
        session: Option<SessionRef<'_>>,
    ) -> DbResult<Vec<Record>> {
        self.inner.executor.query(sql, binding, session).await
    }

    pub async fn execute(
        &self,
        sql: &str,
        binding: &[Value],
        session: Option<SessionRef<'_>>,
    ) -> DbResult<RawQueryResult> {
        self.inner.executor.execute(sql, binding, session).await
    }

    pub async fn retrieve(
        &self,
        sql: &str,
        filter: Option<&Filter>,
        session: Option<SessionRef<'_>>,
        limit: Option<u64>,
    ) -> DbResult<Vec<Record>> {
        self.inner.crud.retrieve(sql, filter, session, limit).await
    }

    pub async fn retrieve_single(
        &self,
        sql: &str,
        filter: Option<&Filter>,
        session: Option<SessionRef<'_>>,
    ) -> DbResult<Option<Record>> {
        self.inner.crud.retrieve_single(sql, filter, session).await
    }

    pub async fn insert(
        &self,
        table: &str,
        record: Record,
        session: Option<SessionRef<'_>>,
    ) -> DbResult<Option<Record>> {
        self.inner.crud.insert(table, record, session).await
    }

    pub async fn update(
        &self,
        table: &str,
        record: Record,
        filter: &Filter,
        session: Option<SessionRef<'_>>,
    ) -> DbResult<Option<Record>> {
        self.inner.crud.update(table, record, filter, session).await
    }

    pub async fn delete(
        &self,
        table: &str,
        filter: Option<&Filter>,
        session: Option<SessionRef<'_>>,
    ) -> DbResult<u64> {
        self.inner.crud.delete(table, filter, session).await
    }

    pub async fn begin_transaction(&self) -> DbResult<TransactionContext> {
        self.inner.transactions.begin_transaction().await
    }

    pub async fn commit(&self, tx: TransactionContext) -> DbResult<()> {
        self.inner.transactions.commit(tx).await
    }

    pub async fn rollback(&self, tx: TransactionContext) -> DbResult<()> {
        self.inner.transactions.rollback(tx).await
    }

    /// See [`TransactionCoordinator::run_within_transaction`].
    pub async fn run_within_transaction<T, F>(&self, work: F) -> DbResult<T>
    where
        F: for<'s> FnOnce(SessionRef<'s>) -> BoxFuture<'s, DbResult<T>>,
    {
        self.inner.transactions.run_within_transaction(work).await
    }

    pub async fn update_sequence(
        &self,
        table: &str,
        min: i64,
        max: i64,
    ) -> DbResult<SequenceOutcome> {
        self.inner.sequences.update_sequence(table, min, max).await
    }

    /// Close the pool. Every clone of this handle shares it.
    pub async fn close(&self) {
        self.inner.pool.close().await
    }
}
