use std::collections::HashMap;

use serde_json::Value;
use uuid::Uuid;

use crate::seed::error::{SeedError, SeedResult};
use crate::seed::flatten::{json_type, Row, SeedRecord};
use crate::seed::tree::flatten_tree;
use crate::seed::{ID_FIELD, KEY_FIELD};

/// Namespace for name-based seed identifiers. Changing it changes every seeded id.
pub const SEED_NAMESPACE: Uuid = Uuid::from_u128(0x2f0b8a7a_5c6a_4b88_9a1a_0f3d5d7b9e11);

/// `__key__` -> row identifier
pub type KeyToId = HashMap<String, String>;

/// Stable identifier for a symbolic key: UUID v5 of the key in [`SEED_NAMESPACE`]
pub fn deterministic_id(key: &str) -> String {
    Uuid::new_v5(&SEED_NAMESPACE, key.as_bytes()).to_string()
}

/// The row's mandatory `__key__`
pub fn seed_key(row: &Row) -> SeedResult<String> {
    match row.get(KEY_FIELD) {
        Some(Value::String(key)) if !key.is_empty() => Ok(key.clone()),
        Some(Value::Number(key)) => Ok(key.to_string()),
        _ => Err(SeedError::MissingKey {
            row: Value::Object(row.clone()).to_string(),
        }),
    }
}

/// The row's explicit `id`, if it carries a usable one
pub fn explicit_id(row: &Row) -> SeedResult<Option<&Value>> {
    match row.get(ID_FIELD) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(id)) if id.is_empty() => Ok(None),
        Some(id @ Value::String(_)) | Some(id @ Value::Number(_)) => Ok(Some(id)),
        Some(other) => Err(SeedError::Schema(format!(
            "'{}' must be a string or a number, got {}",
            ID_FIELD,
            json_type(other)
        ))),
    }
}

/// Identifier a row is known by: its explicit `id`, otherwise the hash of its key
pub fn resolve_row_id(row: &Row, key: &str) -> SeedResult<String> {
    Ok(match explicit_id(row)? {
        Some(id) => id_to_string(id),
        None => deterministic_id(key),
    })
}

pub(crate) fn id_to_string(id: &Value) -> String {
    match id {
        Value::String(id) => id.clone(),
        other => other.to_string(),
    }
}

/// Register every row of every record tree, nested children included, before
/// anything is written. This is what lets any row reference any other row of the
/// payload regardless of document order.
pub fn build_key_to_id(records: &[SeedRecord]) -> SeedResult<KeyToId> {
    let mut key_to_id = KeyToId::new();

    for record in records {
        for node in flatten_tree(&record.row)? {
            let key = seed_key(&node.scalars)?;
            let id = resolve_row_id(&node.scalars, &key)?;
            if key_to_id.insert(key.clone(), id).is_some() {
                return Err(SeedError::Schema(format!(
                    "duplicate {} '{}' in payload",
                    KEY_FIELD, key
                )));
            }
        }
    }

    Ok(key_to_id)
}
