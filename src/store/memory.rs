use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use parking_lot::Mutex;
use serde_json::Value;

use crate::model::ModelDescriptor;
use crate::seed::prepare::ColumnValues;
use crate::store::traits::SeedSession;

/// One upsert as received by the store
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertCall {
    pub table: String,
    pub values: ColumnValues,
    pub conflict_columns: Vec<String>,
}

#[derive(Debug, Default)]
struct MemoryState {
    /// table -> primary key values (JSON encoded) -> row
    tables: BTreeMap<String, BTreeMap<Vec<String>, ColumnValues>>,
    calls: Vec<UpsertCall>,
}

/// In-process implementation of the upsert contract, used for dry runs and tests.
///
/// Clones share the same state, so a handle kept by the caller sees every write made
/// through the session.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every upsert received, in order
    pub fn calls(&self) -> Vec<UpsertCall> {
        self.state.lock().calls.clone()
    }

    /// Current rows of `table`, ordered by primary key
    pub fn rows(&self, table: &str) -> Vec<ColumnValues> {
        self.state
            .lock()
            .tables
            .get(table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn row_count(&self) -> usize {
        self.state.lock().tables.values().map(|rows| rows.len()).sum()
    }

    /// Row counts keyed by table name
    pub fn table_counts(&self) -> BTreeMap<String, usize> {
        self.state
            .lock()
            .tables
            .iter()
            .map(|(table, rows)| (table.clone(), rows.len()))
            .collect()
    }
}

#[async_trait::async_trait]
impl SeedSession for MemoryStore {
    async fn upsert(
        &mut self,
        model: &ModelDescriptor,
        values: &ColumnValues,
        conflict_columns: &[&str],
    ) -> Result<()> {
        let table = model.table_name();
        let mut key = Vec::with_capacity(conflict_columns.len());
        for column in conflict_columns {
            match values.get(*column) {
                Some(Value::Null) | None => {
                    bail!("null value in conflict column '{}' of '{}'", column, table)
                }
                Some(value) => key.push(value.to_string()),
            }
        }
        check_not_null(model, values)?;

        let mut state = self.state.lock();
        state.calls.push(UpsertCall {
            table: table.to_string(),
            values: values.clone(),
            conflict_columns: conflict_columns.iter().map(|c| c.to_string()).collect(),
        });

        let rows = state.tables.entry(table.to_string()).or_default();
        match rows.get_mut(&key) {
            None => {
                rows.insert(key, values.clone());
            }
            Some(existing) => {
                for (column, value) in values {
                    if !conflict_columns.contains(&column.as_str()) {
                        existing.insert(column.clone(), value.clone());
                    }
                }
            }
        }

        Ok(())
    }
}

/// NOT NULL holds for the proposed row as a whole, before any conflict is resolved,
/// so a partial row fails even when it would only update an existing one.
fn check_not_null(model: &ModelDescriptor, values: &ColumnValues) -> Result<()> {
    let missing: Vec<&str> = model
        .columns
        .iter()
        .filter(|column| !column.nullable)
        .filter(|column| matches!(values.get(&column.name), None | Some(Value::Null)))
        .map(|column| column.name.as_str())
        .collect();

    if !missing.is_empty() {
        bail!(
            "null value in not-null column(s) {} of '{}'",
            missing.join(", "),
            model.table_name()
        );
    }
    Ok(())
}
