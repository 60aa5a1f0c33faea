//! Generic retrieve/insert/update/delete operations.
//!
//! Statements are built with `$N` placeholders and dialect-specific
//! returning clauses, then run through the [`QueryExecutor`]. Table and column
//! names are checked with [`validate_identifier`] before any SQL is built,
//! since they are interpolated rather than bound.

use crate::db::connector::SessionRef;
use crate::db::dialect::Dialect;
use crate::db::executor::QueryExecutor;
use crate::db::types::normalize_rows;
use crate::error::{DbError, DbResult};
use crate::models::{Filter, QueryRequest, Record, Value};
use tracing::debug;

/// Identity column every managed table carries.
pub const IDENTITY_COLUMN: &str = "id";

/// Check that `name` is a plain or dotted SQL identifier.
pub fn validate_identifier(name: &str) -> DbResult<()> {
    let valid = !name.is_empty()
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        });

    if valid {
        Ok(())
    } else {
        Err(DbError::invalid_input(format!(
            "'{}' is not a valid SQL identifier",
            name
        )))
    }
}

fn validate_columns(record: &Record) -> DbResult<()> {
    record.keys().try_for_each(|col| validate_identifier(col))
}

/// Remove a trailing `LIMIT n` (case-insensitive, outside string literals,
/// followed by nothing but whitespace or `;`) and return its value.
pub(crate) fn strip_limit(sql: &str) -> (String, Option<u64>) {
    let unchanged = || (sql.to_string(), None);
    let bytes = sql.as_bytes();
    let last_non_ws = |end: usize| {
        bytes[..end]
            .iter()
            .rposition(|b| !b.is_ascii_whitespace())
            .map_or(0, |p| p + 1)
    };

    let body_end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace() && *b != b';')
        .map_or(0, |p| p + 1);
    let digits_start = bytes[..body_end]
        .iter()
        .rposition(|b| !b.is_ascii_digit())
        .map_or(0, |p| p + 1);
    if digits_start == body_end {
        return unchanged();
    }

    let keyword_end = last_non_ws(digits_start);
    if keyword_end == digits_start || keyword_end < "limit".len() {
        return unchanged();
    }
    let keyword = keyword_end - "limit".len();
    if !bytes[keyword..keyword_end].eq_ignore_ascii_case(b"limit") {
        return unchanged();
    }

    let lead = last_non_ws(keyword);
    let quotes = bytes[..keyword].iter().filter(|b| **b == b'\'').count();
    if lead == keyword || quotes % 2 == 1 {
        return unchanged();
    }

    let limit = sql[digits_start..body_end].parse().ok();
    (sql[..lead].to_string(), limit)
}

/// Generic operations shared by every table of a database handle.
#[derive(Debug, Clone)]
pub struct Crud {
    executor: QueryExecutor,
}

impl Crud {
    pub fn new(executor: QueryExecutor) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    pub fn dialect(&self) -> Dialect {
        self.executor.pool().dialect()
    }

    /// Run `sql` restricted by `filter` and capped at `limit` rows.
    ///
    /// A `LIMIT n` already in `sql` is removed and used as the cap. Keyed
    /// filters append ` WHERE c1 = $1 AND ...`; positional filters bind their
    /// values to the placeholders already in `sql`.
    pub async fn retrieve(
        &self,
        sql: &str,
        filter: Option<&Filter>,
        session: Option<SessionRef<'_>>,
        limit: Option<u64>,
    ) -> DbResult<Vec<Record>> {
        let (sql, inline_limit) = strip_limit(sql);
        let limit = inline_limit.or(limit).filter(|n| *n > 0);
        let mut request = QueryRequest::new(sql);

        match filter {
            Some(Filter::Keyed(conditions)) if !conditions.is_empty() => {
                validate_columns(conditions)?;
                let clauses = request.push_equalities(conditions);
                request.sql.push_str(" WHERE ");
                request.sql.push_str(&clauses.join(" AND "));
            }
            Some(Filter::Positional(values)) => request.binding.extend(values.iter().cloned()),
            _ => {}
        }

        if let Some(limit) = limit {
            request.sql.push_str(&self.dialect().limit_clause(limit));
        }

        let raw = self.executor.execute_request(&request, session).await?;
        Ok(normalize_rows(raw))
    }

    /// First row of [`Crud::retrieve`] with a limit of one.
    pub async fn retrieve_single(
        &self,
        sql: &str,
        filter: Option<&Filter>,
        session: Option<SessionRef<'_>>,
    ) -> DbResult<Option<Record>> {
        let rows = self.retrieve(sql, filter, session, Some(1)).await?;
        Ok(rows.into_iter().next())
    }

    /// Insert `record` and return the stored row, re-read by its identity.
    ///
    /// Falls back to the row the insert returned when no identity is known.
    pub async fn insert(
        &self,
        table: &str,
        record: Record,
        mut session: Option<SessionRef<'_>>,
    ) -> DbResult<Option<Record>> {
        validate_identifier(table)?;
        validate_columns(&record)?;
        if record.is_empty() {
            return Err(DbError::invalid_input(format!(
                "Insert into '{}' needs at least one column",
                table
            )));
        }

        let mut request = QueryRequest::new(String::new());
        let mut columns = Vec::with_capacity(record.len());
        let mut placeholders = Vec::with_capacity(record.len());
        for (column, value) in &record {
            columns.push(column.clone());
            placeholders.push(request.next_placeholder());
            request.binding.push(value.clone());
        }
        request.sql = self.dialect().insert_sql(table, &columns, &placeholders);

        let raw = self
            .executor
            .execute_request(&request, session.as_deref_mut())
            .await?;
        let returned = normalize_rows(raw);

        let id = returned
            .first()
            .and_then(|row| row.get(IDENTITY_COLUMN))
            .or_else(|| record.get(IDENTITY_COLUMN))
            .filter(|id| !id.is_null())
            .cloned();

        match id {
            Some(id) => self.find_by_id(table, id, session).await,
            None => Ok(returned.into_iter().next()),
        }
    }

    /// Update the rows matching `filter` with `record` (minus its `id`).
    ///
    /// When the filter names an `id` and a row was affected, that row is
    /// re-read; otherwise the first updated row is returned, or `None`.
    pub async fn update(
        &self,
        table: &str,
        mut record: Record,
        filter: &Filter,
        mut session: Option<SessionRef<'_>>,
    ) -> DbResult<Option<Record>> {
        validate_identifier(table)?;
        record.remove(IDENTITY_COLUMN);
        validate_columns(&record)?;
        if record.is_empty() {
            return Err(DbError::invalid_input(format!(
                "Update of '{}' has no columns to set",
                table
            )));
        }

        let conditions = match filter {
            Filter::Keyed(conditions) if !conditions.is_empty() => conditions,
            _ => {
                return Err(DbError::invalid_input(format!(
                    "Update of '{}' needs a non-empty column filter",
                    table
                )));
            }
        };
        validate_columns(conditions)?;

        let mut request = QueryRequest::new(String::new());
        let set = request.push_equalities(&record);
        let where_clauses = request.push_equalities(conditions);
        request.sql = self.dialect().update_sql(table, &set, &where_clauses);

        let raw = self
            .executor
            .execute_request(&request, session.as_deref_mut())
            .await?;
        let affected = raw.row_count();
        let returned = normalize_rows(raw);

        match filter.get(IDENTITY_COLUMN) {
            Some(id) if affected > 0 && !id.is_null() => {
                self.find_by_id(table, id.clone(), session).await
            }
            _ => Ok(returned.into_iter().next()),
        }
    }

    /// Delete the rows matching `filter` (all rows when `None`) and return
    /// the affected count.
    pub async fn delete(
        &self,
        table: &str,
        filter: Option<&Filter>,
        session: Option<SessionRef<'_>>,
    ) -> DbResult<u64> {
        validate_identifier(table)?;

        let mut request = QueryRequest::new(String::new());
        let conditions = match filter {
            None => Vec::new(),
            Some(Filter::Keyed(conditions)) => {
                validate_columns(conditions)?;
                request.push_equalities(conditions)
            }
            Some(Filter::Positional(_)) => {
                return Err(DbError::invalid_input(format!(
                    "Delete from '{}' takes a column filter, not positional values",
                    table
                )));
            }
        };
        let dialect = self.dialect();
        request.sql = dialect.delete_sql(table, &conditions);

        let raw = self.executor.execute_request(&request, session).await?;
        let count = dialect.affected_rows(&raw);
        debug!(table = %table, count, "Rows deleted");
        Ok(count)
    }

    async fn find_by_id(
        &self,
        table: &str,
        id: Value,
        session: Option<SessionRef<'_>>,
    ) -> DbResult<Option<Record>> {
        let sql = format!("SELECT * FROM {} WHERE {} = $1", table, IDENTITY_COLUMN);
        self.retrieve_single(&sql, Some(&Filter::Positional(vec![id])), session)
            .await
    }
}
