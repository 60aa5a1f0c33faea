//! sql-access - Main entry point.
//!
//! Runs one command against a configured database handle and prints the
//! result envelope as JSON on stdout. Logs go to stderr.

use serde::Serialize;
use serde_json::json;
use sql_access::config::{Command, Config, parse_filter, parse_value};
use sql_access::db::{Database, DatabaseRegistry, default_connector};
use sql_access::error::{DbError, DbResult};
use sql_access::models::{Envelope, Filter, Record, Value};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn to_json<T: Serialize>(value: &T) -> DbResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| DbError::internal(e.to_string()))
}

fn filter_from(filters: &[String]) -> DbResult<Option<Filter>> {
    if filters.is_empty() {
        return Ok(None);
    }
    let conditions = filters
        .iter()
        .map(|f| parse_filter(f))
        .collect::<Result<Record, String>>()
        .map_err(DbError::invalid_input)?;
    Ok(Some(Filter::Keyed(conditions)))
}

async fn dispatch(db: &Database, command: &Command) -> DbResult<serde_json::Value> {
    match command {
        Command::Query { sql, params } => {
            let binding: Vec<Value> = params.iter().map(|p| parse_value(p)).collect();
            let rows = db.query(sql, &binding, None).await?;
            to_json(&rows)
        }
        Command::Retrieve {
            table,
            filters,
            limit,
        } => {
            let filter = filter_from(filters)?;
            let table = db.table(table)?;
            let rows = match limit {
                Some(limit) => {
                    table
                        .retrieve_limited(filter.as_ref(), u64::from(*limit), None)
                        .await?
                }
                None => table.retrieve(filter.as_ref(), None).await?,
            };
            to_json(&rows)
        }
        Command::Delete { table, filters } => {
            let filter = filter_from(filters)?;
            let count = db.table(table)?.delete(filter.as_ref(), None).await?;
            Ok(json!({ "count": count }))
        }
        Command::Reseed { table, min, max } => {
            to_json(&db.update_sequence(table, *min, *max).await?)
        }
        Command::CheckPassword { password } => {
            db.check_password(password).await?;
            Ok(json!({ "valid": true }))
        }
    }
}

async fn run(config: &Config) -> DbResult<serde_json::Value> {
    let db_config = config.database_config().map_err(DbError::invalid_input)?;
    let tables = config.table_set();
    let registry = DatabaseRegistry::global();

    let db = registry
        .get_or_create(&db_config.name, || {
            let connector = default_connector(&db_config.connection)?;
            Database::new(
                db_config.name.clone(),
                db_config.connection.clone(),
                &tables,
                connector,
            )
        })
        .await?;

    let result = dispatch(&db, &config.command).await;
    registry.close_all().await;
    result
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse configuration from command line and environment
    let config = Config::parse_args();

    // Initialize logging
    init_tracing(&config);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting sql-access");

    let envelope = Envelope::from(run(&config).await);
    if let Some(msg) = envelope.msg() {
        error!(error = %msg, "Command failed");
    }

    match serde_json::to_string_pretty(&envelope) {
        Ok(out) => println!("{}", out),
        Err(e) => {
            error!(error = %e, "Cannot serialize result");
            return ExitCode::FAILURE;
        }
    }

    if envelope.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
