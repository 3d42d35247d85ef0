use crate::model::{ColumnDef, ModelDescriptor};

/// All entity models declared by the service, in declaration order.
///
/// This is the schema the seed registry is built from: project templates are split into
/// stages, stages into tasks, and tasks are linked to roles through `task_roles`.
pub fn declared_models() -> Vec<ModelDescriptor> {
    vec![
        project_templates(),
        template_stages(),
        stage_tasks(),
        roles(),
        task_roles(),
    ]
}

fn project_templates() -> ModelDescriptor {
    ModelDescriptor::new("ProjectTemplates")
        .table("project_templates")
        .declared_in(module_path!())
        .column(ColumnDef::uuid("id").primary_key())
        .column(ColumnDef::text("code").not_null())
        .column(ColumnDef::text("name").not_null())
        .column(ColumnDef::text("description"))
        .column(ColumnDef::boolean("is_active").not_null())
        .column(ColumnDef::json("settings"))
        .column(ColumnDef::timestamp("published_at"))
}

fn template_stages() -> ModelDescriptor {
    ModelDescriptor::new("TemplateStages")
        .table("template_stages")
        .declared_in(module_path!())
        .column(ColumnDef::uuid("id").primary_key())
        .column(
            ColumnDef::uuid("template_id")
                .not_null()
                .references("project_templates", "id"),
        )
        .column(ColumnDef::text("name").not_null())
        .column(ColumnDef::integer("position").not_null())
}

fn stage_tasks() -> ModelDescriptor {
    ModelDescriptor::new("StageTasks")
        .table("stage_tasks")
        .declared_in(module_path!())
        .column(ColumnDef::uuid("id").primary_key())
        .column(
            ColumnDef::uuid("stage_id")
                .not_null()
                .references("template_stages", "id"),
        )
        .column(ColumnDef::text("title").not_null())
        .column(ColumnDef::integer("duration_days"))
        .column(ColumnDef::float("weight"))
        .column(ColumnDef::json("checklist"))
}

fn roles() -> ModelDescriptor {
    ModelDescriptor::new("Roles")
        .table("roles")
        .declared_in(module_path!())
        .column(ColumnDef::uuid("id").primary_key())
        .column(ColumnDef::text("code").not_null())
        .column(ColumnDef::text("name").not_null())
}

fn task_roles() -> ModelDescriptor {
    ModelDescriptor::new("TaskRoles")
        .table("task_roles")
        .declared_in(module_path!())
        .column(
            ColumnDef::uuid("task_id")
                .primary_key()
                .references("stage_tasks", "id"),
        )
        .column(
            ColumnDef::uuid("role_id")
                .primary_key()
                .references("roles", "id"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_task_roles_is_a_join_entity() {
        let joins: Vec<String> = declared_models()
            .into_iter()
            .filter(|m| m.is_join_entity())
            .map(|m| m.name)
            .collect();
        assert_eq!(joins, vec!["TaskRoles".to_string()]);
    }

    #[test]
    fn test_every_model_has_a_primary_key() {
        for model in declared_models() {
            assert!(
                !model.primary_key().is_empty(),
                "{} has no primary key",
                model.name
            );
        }
    }
}
