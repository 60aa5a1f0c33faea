//! Query-related data models.
//!
//! This module defines the request shape handed to the executor, the raw
//! result a connector returns, and the column metadata that drives inbound
//! coercion.

use crate::models::value::{Record, Value, WireValue};
use serde::Serialize;

/// Column type codes reported by connectors (ODBC SQL data type numbering).
pub mod type_codes {
    pub const UNKNOWN: i16 = 0;
    pub const BIT: i16 = -7;
    pub const BIGINT: i16 = -5;
    pub const LONG_VARBINARY: i16 = -4;
    pub const VARBINARY: i16 = -3;
    pub const LONG_VARCHAR: i16 = -1;
    pub const INTEGER: i16 = 4;
    pub const DOUBLE: i16 = 8;
    pub const VARCHAR: i16 = 12;
    pub const DATE: i16 = 91;
    pub const TIMESTAMP: i16 = 93;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMetadata {
    pub name: String,
    /// See [`type_codes`].
    pub type_code: i16,
}

impl ColumnMetadata {
    /// Create new column metadata.
    pub fn new(name: impl Into<String>, type_code: i16) -> Self {
        Self {
            name: name.into(),
            type_code,
        }
    }
}

/// Rows exactly as a connector produced them, before inbound coercion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawQueryResult {
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<Vec<WireValue>>,
}

impl RawQueryResult {
    /// Create a result with no columns and no rows.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by name (case-insensitive).
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Value of the named column in the given row.
    pub fn value(&self, row: usize, column: &str) -> Option<&WireValue> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }
}

/// Restriction applied by the generic retrieve/update/delete operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Column equality joined with AND; each value binds to its own placeholder.
    Keyed(Record),
    /// Values bound verbatim to the placeholders already present in the SQL.
    Positional(Vec<Value>),
}

impl Filter {
    /// Build a keyed equality filter.
    pub fn keyed<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Keyed(crate::models::value::record(pairs))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Keyed(r) => r.is_empty(),
            Self::Positional(v) => v.is_empty(),
        }
    }

    /// Equality value for a column of a keyed filter.
    pub fn get(&self, column: &str) -> Option<&Value> {
        match self {
            Self::Keyed(r) => r.get(column),
            Self::Positional(_) => None,
        }
    }
}

impl From<Record> for Filter {
    fn from(r: Record) -> Self {
        Self::Keyed(r)
    }
}

impl From<Vec<Value>> for Filter {
    fn from(v: Vec<Value>) -> Self {
        Self::Positional(v)
    }
}

/// SQL with ordinal placeholders plus the values they refer to.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub sql: String,
    pub binding: Vec<Value>,
}

impl QueryRequest {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            binding: Vec::new(),
        }
    }

    /// Add a parameter to this query.
    pub fn with_param(mut self, param: impl Into<Value>) -> Self {
        self.binding.push(param.into());
        self
    }

    /// Next free ordinal placeholder (`$n`).
    pub fn next_placeholder(&self) -> String {
        format!("${}", self.binding.len() + 1)
    }

    /// Bind every entry of `record` and return one `col = $n` clause per entry.
    pub(crate) fn push_equalities(&mut self, record: &Record) -> Vec<String> {
        let mut clauses = Vec::with_capacity(record.len());
        for (col, val) in record {
            clauses.push(format!("{} = {}", col, self.next_placeholder()));
            self.binding.push(val.clone());
        }
        clauses
    }
}
