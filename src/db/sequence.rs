//! Identity sequence reconciliation.
//!
//! Moves a table's identity seed to the highest id inside a reserved
//! `[min, max]` window, so consecutive inserts continue from the window
//! rather than from ids allocated elsewhere.

use crate::db::crud::{Crud, IDENTITY_COLUMN, validate_identifier};
use crate::error::{DbError, DbResult};
use crate::models::{Filter, Value};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of [`SequenceReconciler::update_sequence`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SequenceOutcome {
    /// The seed already matched, or the table has no identity seed yet.
    Unchanged,
    Reseeded { from: i64, to: i64 },
}

#[derive(Debug, Clone)]
pub struct SequenceReconciler {
    crud: Arc<Crud>,
}

impl SequenceReconciler {
    pub fn new(crud: Arc<Crud>) -> Self {
        Self { crud }
    }

    /// Align the identity seed of `table` with `MAX(id)` inside `[min, max]`.
    ///
    /// An empty window reseeds to `min`. Running it twice without inserts in
    /// between leaves the seed untouched the second time.
    pub async fn update_sequence(
        &self,
        table: &str,
        min: i64,
        max: i64,
    ) -> DbResult<SequenceOutcome> {
        validate_identifier(table)?;
        if min > max {
            return Err(DbError::invalid_input(format!(
                "Sequence window for '{}' is empty: min {} > max {}",
                table, min, max
            )));
        }

        let dialect = self.crud.dialect();

        let Some(current) = self
            .crud
            .retrieve_single(&dialect.current_identity_sql(table), None, None)
            .await?
        else {
            debug!(table = %table, "No identity seed, leaving sequence alone");
            return Ok(SequenceOutcome::Unchanged);
        };
        let current = current
            .get("current_identity")
            .and_then(Value::as_i64)
            .unwrap_or(0);

        let window = Filter::Positional(vec![Value::Int(min), Value::Int(max)]);
        let target = self
            .crud
            .retrieve_single(
                &dialect.max_id_sql(table, IDENTITY_COLUMN),
                Some(&window),
                None,
            )
            .await?
            .and_then(|row| row.get("max_id").and_then(Value::as_i64))
            .unwrap_or(0)
            .max(min);

        if current == target {
            debug!(table = %table, seed = current, "Sequence already aligned");
            return Ok(SequenceOutcome::Unchanged);
        }

        self.crud
            .executor()
            .execute(&dialect.reseed_sql(table, target), &[], None)
            .await?;

        warn!(
            table = %table,
            from = current,
            to = target,
            min,
            max,
            "Identity sequence reseeded"
        );
        Ok(SequenceOutcome::Reseeded {
            from: current,
            to: target,
        })
    }
}
