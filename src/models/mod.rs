//! Data models for the access layer.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod envelope;
pub mod query;
pub mod value;

// Re-export commonly used types
pub use connection::{ConnectionConfig, ConnectionConfigError, DriverKind};
pub use envelope::{Envelope, ErrorCause, RC_FAILURE, RC_SUCCESS};
pub use query::{ColumnMetadata, Filter, QueryRequest, RawQueryResult, type_codes};
pub use value::{Record, TIMESTAMP_FORMAT, Value, WireValue, record};
