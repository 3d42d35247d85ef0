use std::fmt;

/// Storage type of a column, used when binding JSON values to SQL parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Uuid,
    Text,
    Integer,
    Float,
    Boolean,
    Json,
    Timestamp,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Uuid => "uuid",
            ColumnType::Text => "text",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Boolean => "boolean",
            ColumnType::Json => "json",
            ColumnType::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

/// Target of a foreign key: `table.column`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyRef {
    pub table: String,
    pub column: String,
}

/// A single column of a model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
    pub primary_key: bool,
    pub nullable: bool,
    pub foreign_key: Option<ForeignKeyRef>,
}

impl ColumnDef {
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
            primary_key: false,
            nullable: true,
            foreign_key: None,
        }
    }

    pub fn uuid(name: &str) -> Self {
        Self::new(name, ColumnType::Uuid)
    }

    pub fn text(name: &str) -> Self {
        Self::new(name, ColumnType::Text)
    }

    pub fn integer(name: &str) -> Self {
        Self::new(name, ColumnType::Integer)
    }

    pub fn float(name: &str) -> Self {
        Self::new(name, ColumnType::Float)
    }

    pub fn boolean(name: &str) -> Self {
        Self::new(name, ColumnType::Boolean)
    }

    pub fn json(name: &str) -> Self {
        Self::new(name, ColumnType::Json)
    }

    pub fn timestamp(name: &str) -> Self {
        Self::new(name, ColumnType::Timestamp)
    }

    /// Mark the column as (part of) the primary key. Primary key columns are never nullable.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Declare a foreign key to `table.column`
    pub fn references(mut self, table: &str, column: &str) -> Self {
        self.foreign_key = Some(ForeignKeyRef {
            table: table.to_string(),
            column: column.to_string(),
        });
        self
    }

    pub fn is_foreign_key(&self) -> bool {
        self.foreign_key.is_some()
    }
}

/// Describes one database table: its declared name, physical table name and columns.
///
/// Columns keep their declaration order; foreign key lookups and the primary key
/// column list both follow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    /// Declared model name (e.g. "ProjectTemplates")
    pub name: String,

    /// Physical table name (e.g. "project_templates")
    pub table_name: Option<String>,

    /// Where the model was declared, used in diagnostics
    pub declared_in: String,

    pub columns: Vec<ColumnDef>,
}

impl ModelDescriptor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            table_name: None,
            declared_in: String::new(),
            columns: Vec::new(),
        }
    }

    pub fn table(mut self, table_name: &str) -> Self {
        self.table_name = Some(table_name.to_string());
        self
    }

    pub fn declared_in(mut self, source: &str) -> Self {
        self.declared_in = source.to_string();
        self
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Physical table name, falling back to the declared name
    pub fn table_name(&self) -> &str {
        self.table_name.as_deref().unwrap_or(&self.name)
    }

    pub fn get_column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.get_column(name).is_some()
    }

    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn foreign_key_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| c.is_foreign_key())
    }

    /// A join (junction) entity carries two or more foreign key columns
    pub fn is_join_entity(&self) -> bool {
        self.foreign_key_columns().count() >= 2
    }

    /// First column, in declaration order, whose foreign key targets `table`
    pub fn foreign_key_to(&self, table: &str) -> Option<&ColumnDef> {
        self.foreign_key_columns().find(|c| {
            c.foreign_key
                .as_ref()
                .map(|fk| fk.table == table)
                .unwrap_or(false)
        })
    }
}

impl fmt::Display for ModelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.declared_in.is_empty() {
            write!(f, "{} (table: {})", self.name, self.table_name())
        } else {
            write!(
                f,
                "{}::{} (table: {})",
                self.declared_in,
                self.name,
                self.table_name()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_roles() -> ModelDescriptor {
        ModelDescriptor::new("TaskRoles")
            .table("task_roles")
            .column(ColumnDef::uuid("task_id").primary_key().references("stage_tasks", "id"))
            .column(ColumnDef::uuid("role_id").primary_key().references("roles", "id"))
            .column(ColumnDef::text("note"))
    }

    #[test]
    fn test_join_entity_detection() {
        assert!(task_roles().is_join_entity());

        let stages = ModelDescriptor::new("TemplateStages")
            .column(ColumnDef::uuid("id").primary_key())
            .column(ColumnDef::uuid("template_id").references("project_templates", "id"));
        assert!(!stages.is_join_entity());
    }

    #[test]
    fn test_composite_primary_key_keeps_declaration_order() {
        assert_eq!(task_roles().primary_key(), vec!["task_id", "role_id"]);
    }

    #[test]
    fn test_foreign_key_to_takes_first_match() {
        let model = ModelDescriptor::new("Links")
            .column(ColumnDef::uuid("id").primary_key())
            .column(ColumnDef::uuid("source_id").references("nodes", "id"))
            .column(ColumnDef::uuid("target_id").references("nodes", "id"));

        let column = model.foreign_key_to("nodes").unwrap();
        assert_eq!(column.name, "source_id");
        assert!(model.foreign_key_to("edges").is_none());
    }

    #[test]
    fn test_table_name_falls_back_to_declared_name() {
        assert_eq!(ModelDescriptor::new("Roles").table_name(), "Roles");
        assert_eq!(task_roles().table_name(), "task_roles");
    }
}
