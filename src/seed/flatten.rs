use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::model::ModelDescriptor;
use crate::seed::error::{ModelScope, SeedError, SeedResult};
use crate::seed::registry::Registry;

/// A JSON row object, field order preserved
pub type Row = Map<String, Value>;

/// One top-level row of a seed payload together with its resolved model
#[derive(Debug, Clone)]
pub struct SeedRecord {
    /// The top-level JSON key exactly as written in the payload
    pub model_key: String,
    pub model: Arc<ModelDescriptor>,
    pub row: Row,
}

/// Read and parse one seed file
pub async fn load_json(path: &Path) -> SeedResult<Value> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SeedError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    serde_json::from_str(&text).map_err(|source| SeedError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Turn a payload of `{"<model>": [row, ...], ...}` into records, in document order.
///
/// Only the shape is checked here; relationships are handled by the engine.
pub fn flatten_payload(payload: &Value, registry: &Registry) -> SeedResult<Vec<SeedRecord>> {
    let object = payload.as_object().ok_or_else(|| {
        SeedError::Schema(format!(
            "seed payload must be a JSON object, got {}",
            json_type(payload)
        ))
    })?;

    let mut records = Vec::new();
    for (raw_key, rows) in object {
        let model = registry
            .resolve(raw_key)
            .ok_or_else(|| SeedError::UnknownModel {
                name: raw_key.clone(),
                scope: ModelScope::TopLevel,
            })?;

        let rows = rows.as_array().ok_or_else(|| {
            SeedError::Schema(format!(
                "expected a list of rows for '{}', got {}",
                raw_key,
                json_type(rows)
            ))
        })?;

        for row in rows {
            let row = row.as_object().ok_or_else(|| {
                SeedError::Schema(format!(
                    "expected an object row for '{}', got {}",
                    raw_key,
                    json_type(row)
                ))
            })?;

            records.push(SeedRecord {
                model_key: raw_key.clone(),
                model: model.clone(),
                row: row.clone(),
            });
        }
    }

    Ok(records)
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::declared_models;
    use serde_json::json;

    fn registry() -> Registry {
        Registry::from_models(declared_models()).unwrap()
    }

    #[test]
    fn test_flatten_preserves_document_order() {
        let payload = json!({
            "roles": [
                {"__key__": "role-pm", "code": "pm"},
                {"__key__": "role-dev", "code": "dev"}
            ],
            "ProjectTemplates": [
                {"__key__": "tpl-web", "name": "Website"}
            ]
        });

        let records = flatten_payload(&payload, &registry()).unwrap();
        let keys: Vec<&str> = records
            .iter()
            .map(|r| r.row["__key__"].as_str().unwrap())
            .collect();

        assert_eq!(keys, vec!["role-pm", "role-dev", "tpl-web"]);
        assert_eq!(records[2].model_key, "ProjectTemplates");
        assert_eq!(records[2].model.table_name(), "project_templates");
    }

    #[test]
    fn test_unknown_model_is_rejected() {
        let payload = json!({"Widgets": []});
        let err = flatten_payload(&payload, &registry()).unwrap_err();
        assert!(matches!(
            err,
            SeedError::UnknownModel { ref name, scope: ModelScope::TopLevel } if name == "Widgets"
        ));
    }

    #[test]
    fn test_rows_must_be_a_list_of_objects() {
        let not_a_list = json!({"roles": {"__key__": "r1"}});
        assert!(matches!(
            flatten_payload(&not_a_list, &registry()),
            Err(SeedError::Schema(_))
        ));

        let not_an_object = json!({"roles": [{"__key__": "r1"}, "r2"]});
        assert!(matches!(
            flatten_payload(&not_an_object, &registry()),
            Err(SeedError::Schema(_))
        ));
    }

    #[test]
    fn test_payload_must_be_an_object() {
        let err = flatten_payload(&json!([1, 2]), &registry()).unwrap_err();
        assert!(err.to_string().contains("got array"));
    }

    #[tokio::test]
    async fn test_load_json_reports_path_on_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        match load_json(&path).await {
            Err(SeedError::Json { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected JSON error, got {:?}", other),
        }

        let missing = dir.path().join("missing.json");
        assert!(matches!(
            load_json(&missing).await,
            Err(SeedError::Io { .. })
        ));
    }
}
