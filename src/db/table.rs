//! Per-table proxies.

use crate::db::connector::SessionRef;
use crate::db::crud::{Crud, validate_identifier};
use crate::error::DbResult;
use crate::models::{Filter, Record};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// CRUD operations scoped to one table, built on `SELECT * FROM <table>`.
#[derive(Debug, Clone)]
pub struct Table {
    name: Arc<str>,
    crud: Arc<Crud>,
}

impl Table {
    pub fn new(name: &str, crud: Arc<Crud>) -> DbResult<Self> {
        validate_identifier(name)?;
        Ok(Self {
            name: Arc::from(name),
            crud,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn select_all(&self) -> String {
        format!("SELECT * FROM {}", self.name)
    }

    pub async fn retrieve(
        &self,
        filter: Option<&Filter>,
        session: Option<SessionRef<'_>>,
    ) -> DbResult<Vec<Record>> {
        self.crud
            .retrieve(&self.select_all(), filter, session, None)
            .await
    }

    /// Like [`Table::retrieve`], returning at most `limit` rows.
    pub async fn retrieve_limited(
        &self,
        filter: Option<&Filter>,
        limit: u64,
        session: Option<SessionRef<'_>>,
    ) -> DbResult<Vec<Record>> {
        self.crud
            .retrieve(&self.select_all(), filter, session, Some(limit))
            .await
    }

    pub async fn retrieve_single(
        &self,
        filter: Option<&Filter>,
        session: Option<SessionRef<'_>>,
    ) -> DbResult<Option<Record>> {
        self.crud
            .retrieve_single(&self.select_all(), filter, session)
            .await
    }

    pub async fn insert(
        &self,
        record: Record,
        session: Option<SessionRef<'_>>,
    ) -> DbResult<Option<Record>> {
        self.crud.insert(&self.name, record, session).await
    }

    pub async fn update(
        &self,
        record: Record,
        filter: &Filter,
        session: Option<SessionRef<'_>>,
    ) -> DbResult<Option<Record>> {
        self.crud.update(&self.name, record, filter, session).await
    }

    pub async fn delete(
        &self,
        filter: Option<&Filter>,
        session: Option<SessionRef<'_>>,
    ) -> DbResult<u64> {
        self.crud.delete(&self.name, filter, session).await
    }
}

/// Tables a handle exposes as proxies, minus the excluded ones.
///
/// Exclusion is matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct TableSet {
    pub tables: Vec<String>,
    pub excluded: Vec<String>,
}

impl TableSet {
    pub fn new(tables: Vec<String>, excluded: Vec<String>) -> Self {
        Self { tables, excluded }
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded.iter().any(|e| e.eq_ignore_ascii_case(name))
    }

    /// Configured tables that are not excluded, without duplicates.
    pub fn included(&self) -> impl Iterator<Item = &str> {
        let mut seen = Vec::new();
        self.tables.iter().filter_map(move |name| {
            if self.is_excluded(name) || seen.contains(name) {
                None
            } else {
                seen.push(name.clone());
                Some(name.as_str())
            }
        })
    }

    /// Build one proxy per included table.
    pub fn build(&self, crud: &Arc<Crud>) -> DbResult<HashMap<String, Table>> {
        let mut proxies = HashMap::new();
        for name in self.included() {
            proxies.insert(name.to_string(), Table::new(name, Arc::clone(crud))?);
        }
        debug!(
            tables = proxies.len(),
            excluded = self.excluded.len(),
            "Table proxies built"
        );
        Ok(proxies)
    }
}
