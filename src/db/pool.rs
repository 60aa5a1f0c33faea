//! Connection pool management.
//!
//! Each database handle owns one [`PoolManager`]. The underlying pool is
//! created on first use and kept for the life of the handle; a missing target
//! database is provisioned once through the connector and the connect retried.

use crate::db::connector::{ConnectionPool, Connector, IsolationLevel, Session};
use crate::db::dialect::Dialect;
use crate::error::DbResult;
use crate::models::ConnectionConfig;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

pub struct PoolManager {
    name: String,
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    pool: OnceCell<Arc<dyn ConnectionPool>>,
}

impl std::fmt::Debug for PoolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolManager")
            .field("name", &self.name)
            .field("connection", &self.config.masked_connection_string())
            .field("initialized", &self.pool.initialized())
            .finish()
    }
}

impl PoolManager {
    pub fn new(
        name: impl Into<String>,
        config: ConnectionConfig,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            connector,
            pool: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn dialect(&self) -> Dialect {
        self.connector.dialect()
    }

    /// Check out a session at read-committed isolation.
    ///
    /// If the target database does not exist it is created and the connect
    /// retried exactly once. When creation fails the original error is
    /// returned.
    pub async fn connect(&self) -> DbResult<Box<dyn Session>> {
        let err = match self.try_connect().await {
            Ok(session) => return Ok(session),
            Err(err) if err.is_missing_database() => err,
            Err(err) => return Err(err),
        };

        warn!(
            handle = %self.name,
            database = %self.config.database,
            "Target database missing, provisioning"
        );

        if let Err(create_err) = self.connector.create_database(&self.config).await {
            warn!(
                handle = %self.name,
                error = %create_err,
                "Database provisioning failed"
            );
            return Err(err);
        }

        info!(handle = %self.name, "Database provisioned, reconnecting");
        self.try_connect().await
    }

    /// Return a session to the pool.
    pub async fn release(&self, session: Box<dyn Session>) {
        session.close().await;
    }

    /// Open a throwaway pool with `password` and check out one session.
    ///
    /// The handle's own pool is not touched.
    pub async fn check_password(&self, password: &str) -> DbResult<()> {
        let config = self.config.with_password(password);
        let pool = self.connector.open_pool(&config).await?;

        let result = match pool.acquire().await {
            Ok(session) => {
                session.close().await;
                Ok(())
            }
            Err(e) => Err(e),
        };
        pool.close().await;

        debug!(handle = %self.name, ok = result.is_ok(), "Password check finished");
        result
    }

    /// Close the pool if it was ever opened.
    pub async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            info!(handle = %self.name, "Closing connection pool");
            pool.close().await;
        }
    }

    async fn pool(&self) -> DbResult<&Arc<dyn ConnectionPool>> {
        self.pool
            .get_or_try_init(|| async {
                info!(
                    handle = %self.name,
                    connection = %self.config.masked_connection_string(),
                    "Creating connection pool"
                );
                self.connector.open_pool(&self.config).await
            })
            .await
    }

    async fn try_connect(&self) -> DbResult<Box<dyn Session>> {
        let mut session = self.pool().await?.acquire().await?;
        if let Err(e) = session
            .set_isolation_level(IsolationLevel::ReadCommitted)
            .await
        {
            session.close().await;
            return Err(e);
        }
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::SqliteConnector;
    use tempfile::TempDir;

    fn manager_for(dir: &TempDir, file: &str) -> PoolManager {
        let path = dir.path().join(file).to_string_lossy().into_owned();
        PoolManager::new(
            "main",
            ConnectionConfig::sqlite(path).unwrap(),
            Arc::new(SqliteConnector),
        )
    }

    #[tokio::test]
    async fn test_connect_provisions_missing_database() {
        let dir = TempDir::new().unwrap();
        let manager = manager_for(&dir, "fresh.db");
        assert!(!dir.path().join("fresh.db").exists());

        let session = manager.connect().await.unwrap();
        manager.release(session).await;

        assert!(dir.path().join("fresh.db").exists());
        manager.close().await;
    }

    #[tokio::test]
    async fn test_check_password_leaves_pool_untouched() {
        let dir = TempDir::new().unwrap();
        let manager = manager_for(&dir, "pw.db");
        let session = manager.connect().await.unwrap();
        manager.release(session).await;

        manager.check_password("anything").await.unwrap();
        assert!(format!("{:?}", manager).contains("initialized: true"));
        manager.close().await;
    }

    #[tokio::test]
    async fn test_check_password_missing_database_fails() {
        let dir = TempDir::new().unwrap();
        let manager = manager_for(&dir, "nothing-here.db");
        let err = manager.check_password("secret").await.unwrap_err();
        assert!(err.is_missing_database());
        assert!(!dir.path().join("nothing-here.db").exists());
    }
}
