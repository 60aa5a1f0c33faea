//! Relational database access layer.
//!
//! Named database handles with lazily created, self-provisioning pools,
//! `$N` placeholder translation, bidirectional type coercion, transactions
//! with guaranteed session release, per-table CRUD proxies and identity
//! sequence reconciliation. SQLite is supported through `sqlx`; other
//! backends plug in through [`db::Connector`].

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use config::Config;
pub use db::{Database, DatabaseRegistry};
pub use error::{DbError, DbResult};
pub use models::{Envelope, Filter, Record, Value};
