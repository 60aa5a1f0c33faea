//! Backend-specific SQL text emitted by the generic operations.

use crate::models::{RawQueryResult, WireValue};

/// How native positional markers are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerStyle {
    /// `?`, one bound value per marker in text order.
    Anonymous,
    /// `?N`, N being the 1-based binding index.
    Numbered,
}

/// SQL dialect of a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    SqlServer,
    Sqlite,
}

impl Dialect {
    pub fn marker_style(&self) -> MarkerStyle {
        match self {
            Self::SqlServer => MarkerStyle::Anonymous,
            Self::Sqlite => MarkerStyle::Numbered,
        }
    }

    /// `INSERT` that returns the inserted row.
    pub fn insert_sql(&self, table: &str, columns: &[String], values: &[String]) -> String {
        let columns = columns.join(", ");
        let values = values.join(", ");
        match self {
            Self::SqlServer => format!(
                "INSERT INTO {} ({}) OUTPUT Inserted.* VALUES ({})",
                table, columns, values
            ),
            Self::Sqlite => format!(
                "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
                table, columns, values
            ),
        }
    }

    /// `UPDATE` that returns the updated rows.
    pub fn update_sql(&self, table: &str, set: &[String], conditions: &[String]) -> String {
        let set = set.join(", ");
        let where_clause = where_clause(conditions);
        match self {
            Self::SqlServer => format!(
                "UPDATE {} SET {} OUTPUT Inserted.*{}",
                table, set, where_clause
            ),
            Self::Sqlite => format!("UPDATE {} SET {}{} RETURNING *", table, set, where_clause),
        }
    }

    /// `DELETE` followed by a read-back of the affected row count.
    pub fn delete_sql(&self, table: &str, conditions: &[String]) -> String {
        let where_clause = where_clause(conditions);
        match self {
            Self::SqlServer => format!(
                "DELETE FROM {}{}; SELECT @@ROWCOUNT AS count",
                table, where_clause
            ),
            Self::Sqlite => format!("DELETE FROM {}{} RETURNING 1", table, where_clause),
        }
    }

    /// Affected row count from the result of [`Dialect::delete_sql`].
    pub fn affected_rows(&self, result: &RawQueryResult) -> u64 {
        match self {
            Self::SqlServer => match result.value(0, "count") {
                Some(WireValue::Int(n)) => (*n).max(0) as u64,
                Some(WireValue::Text(s)) => s.trim().parse().unwrap_or(0),
                _ => result.row_count() as u64,
            },
            Self::Sqlite => result.row_count() as u64,
        }
    }

    /// Clause appended to a `SELECT` to cap its row count.
    pub fn limit_clause(&self, limit: u64) -> String {
        match self {
            Self::SqlServer => format!(" ORDER BY 1 OFFSET 0 ROWS FETCH NEXT {} ROWS ONLY", limit),
            Self::Sqlite => format!(" LIMIT {}", limit),
        }
    }

    /// Query yielding one row with column `current_identity`.
    pub fn current_identity_sql(&self, table: &str) -> String {
        match self {
            Self::SqlServer => format!("SELECT IDENT_CURRENT('{}') AS current_identity", table),
            Self::Sqlite => format!(
                "SELECT seq AS current_identity FROM sqlite_sequence WHERE name = '{}'",
                table
            ),
        }
    }

    /// Query yielding one row with column `max_id`, bound to `$1` (min) and `$2` (max).
    pub fn max_id_sql(&self, table: &str, id_column: &str) -> String {
        format!(
            "SELECT MAX({col}) AS max_id FROM {} WHERE {col} >= $1 AND {col} <= $2",
            table,
            col = id_column
        )
    }

    /// Statement moving the identity seed of `table` to `value`.
    pub fn reseed_sql(&self, table: &str, value: i64) -> String {
        match self {
            Self::SqlServer => format!("DBCC CHECKIDENT ('{}', RESEED, {})", table, value),
            Self::Sqlite => format!(
                "DELETE FROM sqlite_sequence WHERE name = '{t}'; \
                 INSERT INTO sqlite_sequence (name, seq) VALUES ('{t}', {v})",
                t = table,
                v = value
            ),
        }
    }
}

fn where_clause(conditions: &[String]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    }
}
