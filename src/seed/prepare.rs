use serde_json::{Map, Value};

use crate::model::ModelDescriptor;
use crate::seed::error::SeedResult;
use crate::seed::flatten::Row;
use crate::seed::keys::{deterministic_id, explicit_id, seed_key, KeyToId};
use crate::seed::{CHILDREN_FIELD, ID_FIELD, KEY_FIELD};

/// Column name -> value, ready to be written
pub type ColumnValues = Map<String, Value>;

/// Convert a JSON row into the column values written for `model`.
///
/// Seed metadata and fields the model does not declare are dropped. A string in a
/// foreign key column that names another row's `__key__` is replaced by that row's
/// identifier. When the model has an `id` column it is always filled: explicit `id`
/// first, then the identifier already resolved for the row's key, then the hash of
/// the key.
pub fn prepare_row(
    model: &ModelDescriptor,
    row: &Row,
    key_to_id: &KeyToId,
) -> SeedResult<ColumnValues> {
    let key = seed_key(row)?;
    let mut prepared = ColumnValues::new();

    for (field, value) in row {
        if field == KEY_FIELD || field == CHILDREN_FIELD {
            continue;
        }

        // informational fields in the JSON are allowed
        let Some(column) = model.get_column(field) else {
            continue;
        };

        let value = match value {
            Value::String(reference) if column.is_foreign_key() => match key_to_id.get(reference) {
                Some(id) => Value::String(id.clone()),
                None => value.clone(),
            },
            _ => value.clone(),
        };

        prepared.insert(field.clone(), value);
    }

    if model.has_column(ID_FIELD) {
        let id = match explicit_id(row)? {
            Some(id) => id.clone(),
            None => Value::String(
                key_to_id
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(|| deterministic_id(&key)),
            ),
        };
        prepared.insert(ID_FIELD.to_string(), id);
    }

    Ok(prepared)
}
