//! Transaction, provisioning and SQL-shape tests against a scripted connector.
//!
//! The connector speaks the SQL Server dialect and records every call, so the
//! tests can check exactly which statements ran and how many sessions were
//! handed out and returned.

use async_trait::async_trait;
use sql_access::db::{
    ConnectionPool, Connector, Database, Dialect, IsolationLevel, Session, TableSet,
};
use sql_access::error::{DbError, DbResult};
use sql_access::models::{
    ColumnMetadata, ConnectionConfig, Filter, RawQueryResult, Value, WireValue, record,
    type_codes,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Journal {
    acquired: AtomicUsize,
    released: AtomicUsize,
    creates: AtomicUsize,
    missing: AtomicBool,
    refuse_create: AtomicBool,
    fail_commit: AtomicBool,
    statements: Mutex<Vec<(String, Vec<WireValue>)>>,
}

impl Journal {
    fn log(&self, sql: &str, binding: &[WireValue]) {
        self.statements
            .lock()
            .unwrap()
            .push((sql.to_string(), binding.to_vec()));
    }

    fn sql(&self) -> Vec<String> {
        self.statements
            .lock()
            .unwrap()
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    fn last(&self) -> (String, Vec<WireValue>) {
        self.statements.lock().unwrap().last().cloned().unwrap()
    }

    fn ran(&self, statement: &str) -> bool {
        self.sql().iter().any(|s| s == statement)
    }
}

struct ScriptedConnector {
    journal: Arc<Journal>,
}

#[async_trait]
impl Connector for ScriptedConnector {
    fn dialect(&self) -> Dialect {
        Dialect::SqlServer
    }

    async fn open_pool(&self, _config: &ConnectionConfig) -> DbResult<Arc<dyn ConnectionPool>> {
        Ok(Arc::new(ScriptedPool {
            journal: Arc::clone(&self.journal),
        }))
    }

    async fn create_database(&self, _config: &ConnectionConfig) -> DbResult<()> {
        self.journal.creates.fetch_add(1, Ordering::SeqCst);
        if self.journal.refuse_create.load(Ordering::SeqCst) {
            return Err(DbError::query("CREATE DATABASE permission denied", None, vec![]));
        }
        self.journal.missing.store(false, Ordering::SeqCst);
        Ok(())
    }
}

struct ScriptedPool {
    journal: Arc<Journal>,
}

#[async_trait]
impl ConnectionPool for ScriptedPool {
    async fn acquire(&self) -> DbResult<Box<dyn Session>> {
        if self.journal.missing.load(Ordering::SeqCst) {
            return Err(DbError::database_not_found(
                "automation",
                "Cannot open database \"automation\" requested by the login.",
            ));
        }
        self.journal.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            journal: Arc::clone(&self.journal),
        }))
    }

    async fn close(&self) {}
}

struct ScriptedSession {
    journal: Arc<Journal>,
}

#[async_trait]
impl Session for ScriptedSession {
    async fn set_isolation_level(&mut self, level: IsolationLevel) -> DbResult<()> {
        self.journal.log(
            &format!("SET TRANSACTION ISOLATION LEVEL {}", level),
            &[],
        );
        Ok(())
    }

    async fn query(&mut self, sql: &str, binding: &[WireValue]) -> DbResult<RawQueryResult> {
        self.journal.log(sql, binding);
        if sql.starts_with("DELETE") {
            return Ok(RawQueryResult {
                columns: vec![ColumnMetadata::new("count", type_codes::INTEGER)],
                rows: vec![vec![WireValue::Int(2)]],
            });
        }
        if sql.starts_with("SELECT IDENT_CURRENT") {
            return Ok(RawQueryResult {
                columns: vec![ColumnMetadata::new("current_identity", type_codes::UNKNOWN)],
                rows: vec![vec![WireValue::Text("17".to_string())]],
            });
        }
        Ok(RawQueryResult::empty())
    }

    async fn begin(&mut self) -> DbResult<()> {
        self.journal.log("BEGIN", &[]);
        Ok(())
    }

    async fn commit(&mut self) -> DbResult<()> {
        if self.journal.fail_commit.load(Ordering::SeqCst) {
            return Err(DbError::transaction("commit refused"));
        }
        self.journal.log("COMMIT", &[]);
        Ok(())
    }

    async fn rollback(&mut self) -> DbResult<()> {
        self.journal.log("ROLLBACK", &[]);
        Ok(())
    }

    async fn close(self: Box<Self>) {
        self.journal.released.fetch_add(1, Ordering::SeqCst);
    }
}

fn scripted() -> (Database, Arc<Journal>) {
    let journal = Arc::new(Journal::default());
    let config = ConnectionConfig::new("ODBC Driver 18 for SQL Server", "db01,1433", "automation")
        .unwrap()
        .with_credentials("svc", "secret");
    let db = Database::new(
        "main",
        config,
        &TableSet::new(vec!["orders".to_string()], vec![]),
        Arc::new(ScriptedConnector {
            journal: Arc::clone(&journal),
        }),
    )
    .unwrap();
    (db, journal)
}

fn explode() {
    panic!("unit of work exploded");
}

#[tokio::test]
async fn test_transaction_commits_on_success() {
    let (db, journal) = scripted();

    let value = db
        .run_within_transaction(|session| {
            Box::pin(async move {
                session.query("SELECT 1", &[]).await?;
                Ok(41 + 1)
            })
        })
        .await
        .unwrap();

    assert_eq!(value, 42);
    assert!(journal.ran("BEGIN"));
    assert!(journal.ran("COMMIT"));
    assert!(!journal.ran("ROLLBACK"));
    assert_eq!(journal.acquired.load(Ordering::SeqCst), 1);
    assert_eq!(journal.released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_transaction_rolls_back_on_error() {
    let (db, journal) = scripted();
    let orders = db.table("orders").unwrap().clone();

    let err = db
        .run_within_transaction(move |session| {
            Box::pin(async move {
                orders
                    .insert(record([("status", "open")]), Some(session))
                    .await?;
                Err::<(), _>(DbError::invalid_input("order rejected"))
            })
        })
        .await
        .unwrap_err();

    assert!(err.to_string().contains("order rejected"));
    assert!(journal.ran("ROLLBACK"));
    assert!(!journal.ran("COMMIT"));
    assert!(journal.ran("INSERT INTO orders (status) OUTPUT Inserted.* VALUES (?)"));
    assert_eq!(journal.acquired.load(Ordering::SeqCst), 1);
    assert_eq!(journal.released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_transaction_rolls_back_on_panic() {
    let (db, journal) = scripted();

    let err = db
        .run_within_transaction(|session| {
            Box::pin(async move {
                session.query("SELECT 1", &[]).await?;
                explode();
                Ok(())
            })
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::UnitOfWorkPanicked { .. }));
    assert!(err.to_string().contains("unit of work exploded"));
    assert!(journal.ran("ROLLBACK"));
    assert!(!journal.ran("COMMIT"));
    assert_eq!(journal.released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_commit_replaces_result_and_releases() {
    let (db, journal) = scripted();
    journal.fail_commit.store(true, Ordering::SeqCst);

    let err = db
        .run_within_transaction(|_session| Box::pin(async move { Ok("done") }))
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::Transaction { .. }));
    assert_eq!(journal.acquired.load(Ordering::SeqCst), 1);
    assert_eq!(journal.released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_manual_transaction_releases_once() {
    let (db, journal) = scripted();

    let mut tx = db.begin_transaction().await.unwrap();
    assert!(tx.id().starts_with("tx_"));
    db.query("SELECT * FROM orders", &[], Some(tx.session()))
        .await
        .unwrap();
    db.rollback(tx).await.unwrap();

    assert_eq!(journal.acquired.load(Ordering::SeqCst), 1);
    assert_eq!(journal.released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_pooled_query_releases_session() {
    let (db, journal) = scripted();

    db.query("SELECT * FROM orders", &[], None).await.unwrap();
    db.query("SELECT * FROM orders", &[], None).await.unwrap();

    assert_eq!(journal.acquired.load(Ordering::SeqCst), 2);
    assert_eq!(journal.released.load(Ordering::SeqCst), 2);
    assert!(journal.ran("SET TRANSACTION ISOLATION LEVEL READ COMMITTED"));
}

#[tokio::test]
async fn test_missing_database_is_provisioned_once() {
    let (db, journal) = scripted();
    journal.missing.store(true, Ordering::SeqCst);

    db.query("SELECT 1", &[], None).await.unwrap();

    assert_eq!(journal.creates.load(Ordering::SeqCst), 1);
    assert_eq!(journal.acquired.load(Ordering::SeqCst), 1);
    assert_eq!(journal.released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_provisioning_returns_original_error() {
    let (db, journal) = scripted();
    journal.missing.store(true, Ordering::SeqCst);
    journal.refuse_create.store(true, Ordering::SeqCst);

    let err = db.query("SELECT 1", &[], None).await.unwrap_err();

    assert!(err.is_missing_database());
    assert_eq!(journal.creates.load(Ordering::SeqCst), 1);
    assert_eq!(journal.acquired.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_placeholders_become_anonymous_markers() {
    let (db, journal) = scripted();

    db.query(
        "SELECT * FROM orders WHERE a = $2 AND b = $1 AND c = $2 AND d != null AND e = '$1'",
        &[Value::Int(10), Value::from("x")],
        None,
    )
    .await
    .unwrap();

    let (sql, binding) = journal.last();
    assert_eq!(
        sql,
        "SELECT * FROM orders WHERE a = ? AND b = ? AND c = ? AND d IS NOT NULL AND e = '$1'"
    );
    assert_eq!(
        binding,
        vec![
            WireValue::Text("x".to_string()),
            WireValue::Int(10),
            WireValue::Text("x".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_update_and_delete_statements() {
    let (db, journal) = scripted();

    let updated = db
        .update(
            "orders",
            record([("status", "paid")]),
            &Filter::keyed([("customer_id", 7)]),
            None,
        )
        .await
        .unwrap();
    assert!(updated.is_none());
    let (sql, binding) = journal.last();
    assert_eq!(
        sql,
        "UPDATE orders SET status = ? OUTPUT Inserted.* WHERE customer_id = ?"
    );
    assert_eq!(
        binding,
        vec![WireValue::Text("paid".to_string()), WireValue::Int(7)]
    );

    let count = db
        .delete("orders", Some(&Filter::keyed([("status", "void")])), None)
        .await
        .unwrap();
    assert_eq!(count, 2);
    assert_eq!(
        journal.last().0,
        "DELETE FROM orders WHERE status = ?; SELECT @@ROWCOUNT AS count"
    );
}

#[tokio::test]
async fn test_retrieve_single_uses_offset_fetch() {
    let (db, journal) = scripted();

    let row = db
        .table("orders")
        .unwrap()
        .retrieve_single(Some(&Filter::keyed([("id", 5)])), None)
        .await
        .unwrap();

    assert!(row.is_none());
    assert_eq!(
        journal.last().0,
        "SELECT * FROM orders WHERE id = ? ORDER BY 1 OFFSET 0 ROWS FETCH NEXT 1 ROWS ONLY"
    );
}

#[tokio::test]
async fn test_reseed_moves_identity_to_window_floor() {
    let (db, journal) = scripted();

    let outcome = db.update_sequence("orders", 5000, 5999).await.unwrap();

    assert_eq!(
        outcome,
        sql_access::db::SequenceOutcome::Reseeded {
            from: 17,
            to: 5000
        }
    );
    assert_eq!(journal.last().0, "DBCC CHECKIDENT ('orders', RESEED, 5000)");
}
