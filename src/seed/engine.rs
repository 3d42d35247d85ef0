use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use itertools::Itertools;
use serde_json::Value;

use crate::model::ModelDescriptor;
use crate::seed::error::{ModelScope, SeedError, SeedResult};
use crate::seed::flatten::{flatten_payload, load_json, Row, SeedRecord};
use crate::seed::keys::{build_key_to_id, deterministic_id, seed_key, KeyToId};
use crate::seed::prepare::{prepare_row, ColumnValues};
use crate::seed::registry::Registry;
use crate::seed::tree::{flatten_tree, split_scalars_and_children};
use crate::seed::CHILDREN_FIELD;
use crate::store::traits::SeedSession;

/// What a seeding run wrote
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub files: usize,
    pub rows: usize,
    pub per_table: BTreeMap<String, usize>,
}

impl SeedSummary {
    fn record(&mut self, table: &str) {
        self.rows += 1;
        *self.per_table.entry(table.to_string()).or_default() += 1;
    }

    fn merge(&mut self, other: SeedSummary) {
        self.files += other.files;
        self.rows += other.rows;
        for (table, count) in other.per_table {
            *self.per_table.entry(table).or_default() += count;
        }
    }
}

impl fmt::Display for SeedSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rows from {} files ({})",
            self.rows,
            self.files,
            self.per_table
                .iter()
                .map(|(table, count)| format!("{}: {}", table, count))
                .join(", ")
        )
    }
}

/// Link from a nested row to the row it was nested under
#[derive(Debug, Clone)]
struct ParentLink {
    /// Column on the child holding the parent's identifier
    fk_column: String,
    parent_key: String,
}

/// A single row scheduled for writing
#[derive(Debug, Clone)]
struct WriteStep {
    model: Arc<ModelDescriptor>,
    row: Row,
    parent: Option<ParentLink>,
}

/// Upsert keyed on the model's primary key (possibly composite)
pub async fn upsert_by_pk<S>(
    session: &mut S,
    model: &ModelDescriptor,
    values: &ColumnValues,
) -> SeedResult<()>
where
    S: SeedSession + ?Sized,
{
    let primary_key = model.primary_key();
    if primary_key.is_empty() {
        return Err(SeedError::MissingPrimaryKey(model.name.clone()));
    }

    log::debug!(
        "Upserting into {} on ({})",
        model.table_name(),
        primary_key.join(", ")
    );

    session
        .upsert(model, values, &primary_key)
        .await
        .map_err(|source| SeedError::Upsert {
            table: model.table_name().to_string(),
            source: source.into(),
        })
}

/// Expand a record and its nested children into write steps, parents first.
///
/// Every nested model and the foreign key pointing back at its parent are resolved
/// here, so a broken fixture fails before anything is written.
fn plan_record(record: &SeedRecord, registry: &Registry) -> SeedResult<Vec<WriteStep>> {
    let nodes = flatten_tree(&record.row)?;
    let mut steps: Vec<WriteStep> = Vec::with_capacity(nodes.len());

    for node in nodes {
        let (model, parent) = match (node.parent, node.model_key) {
            (Some(parent_index), Some(model_key)) => {
                let model = registry
                    .resolve(model_key)
                    .cloned()
                    .ok_or_else(|| SeedError::UnknownModel {
                        name: model_key.to_string(),
                        scope: ModelScope::Nested,
                    })?;

                let parent_step = &steps[parent_index];
                let parent_table = parent_step.model.table_name();
                let fk_column = model
                    .foreign_key_to(parent_table)
                    .ok_or_else(|| SeedError::MissingForeignKey {
                        child: model.name.clone(),
                        parent: parent_step.model.name.clone(),
                        parent_table: parent_table.to_string(),
                    })?
                    .name
                    .clone();

                let link = ParentLink {
                    fk_column,
                    parent_key: seed_key(&parent_step.row)?,
                };
                (model, Some(link))
            }
            _ => (record.model.clone(), None),
        };

        steps.push(WriteStep {
            model,
            row: node.scalars,
            parent,
        });
    }

    Ok(steps)
}

/// Join entities are written flat, after everything they can point at
fn plan_join_record(record: &SeedRecord) -> SeedResult<WriteStep> {
    let (row, children) = split_scalars_and_children(&record.row)?;
    if !children.is_empty() {
        log::warn!(
            "Ignoring {} of join entity '{}' row '{}'",
            CHILDREN_FIELD,
            record.model_key,
            seed_key(&row)?
        );
    }

    Ok(WriteStep {
        model: record.model.clone(),
        row,
        parent: None,
    })
}

fn prepare_step(step: &WriteStep, key_to_id: &KeyToId) -> SeedResult<ColumnValues> {
    let mut values = prepare_row(&step.model, &step.row, key_to_id)?;

    if let Some(link) = &step.parent {
        let parent_id = key_to_id
            .get(&link.parent_key)
            .cloned()
            .unwrap_or_else(|| deterministic_id(&link.parent_key));
        values.insert(link.fk_column.clone(), Value::String(parent_id));
    }

    Ok(values)
}

/// Seed one payload.
///
/// Keys of every row, nested ones included, are resolved up front. Plain entities
/// and their children are then written in document order, join entities last.
pub async fn seed_payload<S>(
    session: &mut S,
    payload: &Value,
    registry: &Registry,
) -> SeedResult<SeedSummary>
where
    S: SeedSession + ?Sized,
{
    let records = flatten_payload(payload, registry)?;
    let key_to_id = build_key_to_id(&records)?;

    let (joins, entities): (Vec<&SeedRecord>, Vec<&SeedRecord>) =
        records.iter().partition(|r| r.model.is_join_entity());

    let mut plan = Vec::with_capacity(key_to_id.len());
    for record in entities {
        plan.extend(plan_record(record, registry)?);
    }
    for record in joins {
        plan.push(plan_join_record(record)?);
    }

    if let Some(step) = plan.iter().find(|s| s.model.primary_key().is_empty()) {
        return Err(SeedError::MissingPrimaryKey(step.model.name.clone()));
    }

    log::debug!(
        "Seeding {} rows ({} keys resolved)",
        plan.len(),
        key_to_id.len()
    );

    let mut summary = SeedSummary::default();
    for step in &plan {
        let values = prepare_step(step, &key_to_id)?;
        upsert_by_pk(session, &step.model, &values).await?;
        summary.record(step.model.table_name());
    }

    Ok(summary)
}

/// Seed each file in order on the same session
pub async fn seed_files<S, P>(
    session: &mut S,
    paths: &[P],
    registry: &Registry,
) -> SeedResult<SeedSummary>
where
    S: SeedSession + ?Sized,
    P: AsRef<Path>,
{
    let mut summary = SeedSummary::default();

    for path in paths {
        let path = path.as_ref();
        log::info!("Seeding {}", path.display());

        let payload = load_json(path).await?;
        let file_summary = seed_payload(session, &payload, registry).await?;
        log::info!("{}: {} rows upserted", path.display(), file_summary.rows);

        summary.merge(file_summary);
        summary.files += 1;
    }

    Ok(summary)
}
