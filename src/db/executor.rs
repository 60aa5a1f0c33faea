//! Query execution.
//!
//! The executor translates `$N` placeholders for the connector's dialect,
//! runs the statement on a caller-supplied session or on one it checks out
//! itself, and logs failures. Sessions it checks out are always released
//! before returning; caller-supplied sessions never are.

use crate::db::connector::SessionRef;
use crate::db::params::translate;
use crate::db::pool::PoolManager;
use crate::db::types::normalize_rows;
use crate::error::DbResult;
use crate::models::{QueryRequest, RawQueryResult, Record, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

/// Query executor bound to one database handle.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    pool: Arc<PoolManager>,
}

impl QueryExecutor {
    pub fn new(pool: Arc<PoolManager>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<PoolManager> {
        &self.pool
    }

    /// Execute `sql` and return the rows exactly as the connector produced them.
    pub async fn execute(
        &self,
        sql: &str,
        binding: &[Value],
        session: Option<SessionRef<'_>>,
    ) -> DbResult<RawQueryResult> {
        let start = Instant::now();
        let style = self.pool.dialect().marker_style();
        let translated = translate(sql, binding, style);
        let wire = translated.binding_for(style);

        debug!(
            sql = %translated.sql,
            params = wire.len(),
            pooled = session.is_none(),
            "Executing query"
        );

        let result = match session {
            Some(session) => session.query(&translated.sql, &wire).await,
            None => {
                let mut session = self.pool.connect().await?;
                let result = session.query(&translated.sql, &wire).await;
                self.pool.release(session).await;
                result
            }
        };

        match &result {
            Ok(raw) => debug!(
                rows = raw.row_count(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Query finished"
            ),
            Err(e) if e.is_already_exists() => {
                debug!(error = %e, "Object already exists")
            }
            Err(e) => error!(sql = %translated.sql, error = %e, "Query failed"),
        }

        result
    }

    /// Execute a prepared [`QueryRequest`].
    pub async fn execute_request(
        &self,
        request: &QueryRequest,
        session: Option<SessionRef<'_>>,
    ) -> DbResult<RawQueryResult> {
        self.execute(&request.sql, &request.binding, session).await
    }

    /// Execute `sql` and return coerced rows.
    pub async fn query(
        &self,
        sql: &str,
        binding: &[Value],
        session: Option<SessionRef<'_>>,
    ) -> DbResult<Vec<Record>> {
        let raw = self.execute(sql, binding, session).await?;
        Ok(normalize_rows(raw))
    }
}
