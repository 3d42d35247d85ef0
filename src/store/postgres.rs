use anyhow::{anyhow, bail, Context, Result};
use itertools::Itertools;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgConnection, PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::model::{ColumnDef, ColumnType, ModelDescriptor};
use crate::seed::prepare::ColumnValues;
use crate::store::traits::SeedSession;

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Open a transaction; pass `&mut *tx` to the seed engine and commit afterwards
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .context("Failed to begin transaction")
    }
}

#[async_trait::async_trait]
impl SeedSession for PgConnection {
    async fn upsert(
        &mut self,
        model: &ModelDescriptor,
        values: &ColumnValues,
        conflict_columns: &[&str],
    ) -> Result<()> {
        let mut query = build_upsert(model, values, conflict_columns)?;
        query
            .build()
            .execute(&mut *self)
            .await
            .with_context(|| format!("Failed to upsert into {}", model.table_name()))?;

        Ok(())
    }
}

/// Build `INSERT ... ON CONFLICT (...) DO UPDATE SET ...`, or `DO NOTHING` when every
/// column is part of the conflict target
pub fn build_upsert(
    model: &ModelDescriptor,
    values: &ColumnValues,
    conflict_columns: &[&str],
) -> Result<QueryBuilder<'static, Postgres>> {
    if values.is_empty() {
        bail!("Nothing to write for {}", model.table_name());
    }

    let mut query = QueryBuilder::new("INSERT INTO ");
    query.push(quote_ident(model.table_name()));
    query.push(" (");
    query.push(values.keys().map(|c| quote_ident(c)).join(", "));
    query.push(") VALUES (");

    for (i, (name, value)) in values.iter().enumerate() {
        if i > 0 {
            query.push(", ");
        }
        let column = model
            .get_column(name)
            .ok_or_else(|| anyhow!("{} has no column '{}'", model.table_name(), name))?;
        push_value(&mut query, model, column, value)?;
    }

    query.push(") ON CONFLICT (");
    query.push(conflict_columns.iter().map(|c| quote_ident(c)).join(", "));
    query.push(") ");

    let updates = values
        .keys()
        .filter(|c| !conflict_columns.contains(&c.as_str()))
        .map(|c| format!("{0} = EXCLUDED.{0}", quote_ident(c)))
        .collect::<Vec<_>>();

    if updates.is_empty() {
        query.push("DO NOTHING");
    } else {
        query.push("DO UPDATE SET ");
        query.push(updates.join(", "));
    }

    Ok(query)
}

/// Bind one JSON value as the column's SQL type
fn push_value(
    query: &mut QueryBuilder<'static, Postgres>,
    model: &ModelDescriptor,
    column: &ColumnDef,
    value: &Value,
) -> Result<()> {
    let mismatch = || {
        anyhow!(
            "Column {}.{} expects {}, got {}",
            model.table_name(),
            column.name,
            column.column_type,
            value
        )
    };

    match (column.column_type, value) {
        (_, Value::Null) => {
            query.push("NULL");
        }
        (ColumnType::Json, value) => {
            query.push_bind(sqlx::types::Json(value.clone()));
        }
        (ColumnType::Uuid, Value::String(s)) => {
            let id = Uuid::parse_str(s).with_context(|| {
                format!("Column {}.{} expects a uuid", model.table_name(), column.name)
            })?;
            query.push_bind(id);
        }
        (ColumnType::Text, Value::String(s)) => {
            query.push_bind(s.clone());
        }
        (ColumnType::Text, Value::Number(n)) => {
            query.push_bind(n.to_string());
        }
        (ColumnType::Integer, Value::Number(n)) => {
            query.push_bind(n.as_i64().ok_or_else(mismatch)?);
        }
        (ColumnType::Integer, Value::String(s)) => {
            query.push_bind(s.parse::<i64>().map_err(|_| mismatch())?);
        }
        (ColumnType::Float, Value::Number(n)) => {
            query.push_bind(n.as_f64().ok_or_else(mismatch)?);
        }
        (ColumnType::Boolean, Value::Bool(b)) => {
            query.push_bind(*b);
        }
        (ColumnType::Timestamp, Value::String(s)) => {
            query.push_bind(s.clone());
            query.push("::timestamptz");
        }
        _ => return Err(mismatch()),
    }

    Ok(())
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stages() -> ModelDescriptor {
        ModelDescriptor::new("TemplateStages")
            .table("template_stages")
            .column(ColumnDef::uuid("id").primary_key())
            .column(ColumnDef::uuid("template_id").references("project_templates", "id"))
            .column(ColumnDef::text("name"))
            .column(ColumnDef::integer("position"))
            .column(ColumnDef::json("meta"))
            .column(ColumnDef::timestamp("published_at"))
    }

    fn values(value: Value) -> ColumnValues {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_upsert_sql_updates_non_key_columns() {
        let row = values(json!({
            "name": "Design",
            "position": 1,
            "id": "5d2c3b4e-1f0a-5b6c-8d7e-9f0a1b2c3d4e"
        }));

        let query = build_upsert(&stages(), &row, &["id"]).unwrap();
        assert_eq!(
            query.sql(),
            "INSERT INTO \"template_stages\" (\"name\", \"position\", \"id\") VALUES ($1, $2, $3) \
             ON CONFLICT (\"id\") DO UPDATE SET \"name\" = EXCLUDED.\"name\", \"position\" = EXCLUDED.\"position\""
        );
    }

    #[test]
    fn test_key_only_upsert_does_nothing_on_conflict() {
        let model = ModelDescriptor::new("TaskRoles")
            .table("task_roles")
            .column(ColumnDef::uuid("task_id").primary_key())
            .column(ColumnDef::uuid("role_id").primary_key());
        let row = values(json!({
            "task_id": "5d2c3b4e-1f0a-5b6c-8d7e-9f0a1b2c3d4e",
            "role_id": "6e3d4c5f-2a1b-5c7d-9e8f-0a1b2c3d4e5f"
        }));

        let query = build_upsert(&model, &row, &["task_id", "role_id"]).unwrap();
        assert!(query
            .sql()
            .ends_with("ON CONFLICT (\"task_id\", \"role_id\") DO NOTHING"));
    }

    #[test]
    fn test_nulls_and_casts_are_inlined() {
        let row = values(json!({
            "id": "5d2c3b4e-1f0a-5b6c-8d7e-9f0a1b2c3d4e",
            "template_id": null,
            "published_at": "2024-01-01T00:00:00Z"
        }));

        let query = build_upsert(&stages(), &row, &["id"]).unwrap();
        assert!(query.sql().contains("VALUES ($1, NULL, $2::timestamptz)"));
    }

    #[test]
    fn test_type_mismatch_names_the_column() {
        let row = values(json!({
            "id": "5d2c3b4e-1f0a-5b6c-8d7e-9f0a1b2c3d4e",
            "position": "first"
        }));

        let Err(err) = build_upsert(&stages(), &row, &["id"]) else {
            panic!("a text value in an integer column should not bind");
        };
        assert!(err.to_string().contains("template_stages.position"));

        let bad_uuid = values(json!({"id": "cat1"}));
        assert!(build_upsert(&stages(), &bad_uuid, &["id"]).is_err());
    }

    #[test]
    fn test_identifiers_are_quoted() {
        assert_eq!(quote_ident("order"), "\"order\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
