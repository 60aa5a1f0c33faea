//! Process-wide registry of named database handles.
//!
//! Handles are created at most once per name and never removed; later
//! lookups return clones sharing the first handle's pool.

use crate::config::DEFAULT_DATABASE_NAME;
use crate::db::database::Database;
use crate::error::DbResult;
use std::collections::HashMap;
use std::sync::OnceLock;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
pub struct DatabaseRegistry {
    handles: RwLock<HashMap<String, Database>>,
}

impl DatabaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by the whole process.
    pub fn global() -> &'static DatabaseRegistry {
        static GLOBAL: OnceLock<DatabaseRegistry> = OnceLock::new();
        GLOBAL.get_or_init(DatabaseRegistry::new)
    }

    /// Look up a handle; `None` selects the default name.
    pub async fn get(&self, name: Option<&str>) -> Option<Database> {
        let name = name.unwrap_or(DEFAULT_DATABASE_NAME);
        self.handles.read().await.get(name).cloned()
    }

    /// Return the handle registered under `name`, building it with `factory`
    /// if there is none yet.
    ///
    /// `factory` runs at most once per name, under the write lock. If it
    /// fails nothing is registered.
    pub async fn get_or_create<F>(&self, name: &str, factory: F) -> DbResult<Database>
    where
        F: FnOnce() -> DbResult<Database>,
    {
        if let Some(db) = self.handles.read().await.get(name) {
            return Ok(db.clone());
        }

        let mut handles = self.handles.write().await;
        // Double-check after acquiring write lock
        if let Some(db) = handles.get(name) {
            return Ok(db.clone());
        }

        let db = factory()?;
        handles.insert(name.to_string(), db.clone());
        debug!(handle = %name, registered = handles.len(), "Database handle registered");
        Ok(db)
    }

    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handles.read().await.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Close every registered pool. Handles stay registered.
    pub async fn close_all(&self) {
        let handles: Vec<Database> = self.handles.read().await.values().cloned().collect();
        for db in handles {
            db.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::SqliteConnector;
    use crate::db::table::TableSet;
    use crate::error::DbError;
    use crate::models::ConnectionConfig;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn handle(name: &str) -> DbResult<Database> {
        Database::new(
            name,
            ConnectionConfig::sqlite(format!("{}.db", name)).unwrap(),
            &TableSet::default(),
            Arc::new(SqliteConnector),
        )
    }

    #[tokio::test]
    async fn test_get_or_create_runs_factory_once() {
        let registry = DatabaseRegistry::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let db = registry
                .get_or_create("main", || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    handle("main")
                })
                .await
                .unwrap();
            assert_eq!(db.name(), "main");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(registry.get(None).await.is_some());
        assert_eq!(registry.names().await, vec!["main".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_get_or_create() {
        let registry = Arc::new(DatabaseRegistry::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    registry
                        .get_or_create("reports", || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            handle("reports")
                        })
                        .await
                        .map(|db| db.name().to_string())
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), "reports");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_factory_registers_nothing() {
        let registry = DatabaseRegistry::new();
        let err = registry
            .get_or_create("broken", || Err(DbError::invalid_input("bad config")))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
        assert!(registry.get(Some("broken")).await.is_none());
    }
}
