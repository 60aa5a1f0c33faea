//! Transaction coordination.
//!
//! A transaction owns one session from begin until commit or rollback, and
//! the session is released exactly once, inside whichever of the two ends
//! the transaction.

use crate::db::connector::{Session, SessionRef};
use crate::db::pool::PoolManager;
use crate::error::{DbError, DbResult};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// An open transaction and the session it runs on.
pub struct TransactionContext {
    id: String,
    session: Box<dyn Session>,
    started_at: Instant,
}

impl TransactionContext {
    /// Generated id used in log records.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Lend the transaction's session to an operation.
    pub fn session(&mut self) -> SessionRef<'_> {
        &mut *self.session
    }
}

impl std::fmt::Debug for TransactionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionContext")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct TransactionCoordinator {
    pool: Arc<PoolManager>,
}

impl TransactionCoordinator {
    pub fn new(pool: Arc<PoolManager>) -> Self {
        Self { pool }
    }

    /// Check out a session and start a transaction on it.
    ///
    /// If `BEGIN` fails the session is released before the error is returned.
    pub async fn begin_transaction(&self) -> DbResult<TransactionContext> {
        let mut session = self.pool.connect().await?;
        if let Err(e) = session.begin().await {
            self.pool.release(session).await;
            return Err(e);
        }

        let id = format!("tx_{}", uuid::Uuid::new_v4().simple());
        info!(transaction_id = %id, handle = %self.pool.name(), "Transaction started");

        Ok(TransactionContext {
            id,
            session,
            started_at: Instant::now(),
        })
    }

    /// Commit and release the session.
    pub async fn commit(&self, tx: TransactionContext) -> DbResult<()> {
        let TransactionContext {
            id,
            mut session,
            started_at,
        } = tx;
        let result = session.commit().await;
        self.pool.release(session).await;

        match &result {
            Ok(()) => info!(
                transaction_id = %id,
                duration_ms = started_at.elapsed().as_millis() as u64,
                "Transaction committed"
            ),
            Err(e) => warn!(transaction_id = %id, error = %e, "Commit failed"),
        }
        result
    }

    /// Roll back and release the session.
    pub async fn rollback(&self, tx: TransactionContext) -> DbResult<()> {
        let TransactionContext {
            id,
            mut session,
            started_at,
        } = tx;
        let result = session.rollback().await;
        self.pool.release(session).await;

        match &result {
            Ok(()) => warn!(
                transaction_id = %id,
                duration_ms = started_at.elapsed().as_millis() as u64,
                "Transaction rolled back"
            ),
            Err(e) => warn!(transaction_id = %id, error = %e, "Rollback failed"),
        }
        result
    }

    /// Run `work` inside a transaction.
    ///
    /// Commits when `work` returns `Ok`, rolls back when it returns `Err` or
    /// panics. A panic becomes [`DbError::UnitOfWorkPanicked`]. A failing
    /// commit or rollback replaces the result of `work`.
    ///
    /// ```ignore
    /// let id = db
    ///     .run_within_transaction(move |session| {
    ///         Box::pin(async move {
    ///             let row = orders.insert(order, Some(&mut *session)).await?;
    ///             lines.insert(line, Some(session)).await?;
    ///             Ok(row)
    ///         })
    ///     })
    ///     .await?;
    /// ```
    pub async fn run_within_transaction<T, F>(&self, work: F) -> DbResult<T>
    where
        F: for<'s> FnOnce(SessionRef<'s>) -> BoxFuture<'s, DbResult<T>>,
    {
        let mut tx = self.begin_transaction().await?;

        let outcome = {
            let session = tx.session();
            AssertUnwindSafe(async move { work(session).await })
                .catch_unwind()
                .await
        };

        let result = outcome.unwrap_or_else(|panic| {
            let message = panic_message(&*panic);
            warn!(transaction_id = %tx.id(), panic = %message, "Unit of work panicked");
            Err(DbError::unit_of_work_panicked(message))
        });

        match result {
            Ok(value) => {
                self.commit(tx).await?;
                Ok(value)
            }
            Err(err) => {
                debug!(transaction_id = %tx.id(), error = %err, "Unit of work failed");
                self.rollback(tx).await?;
                Err(err)
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
