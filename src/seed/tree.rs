use serde_json::Value;

use crate::seed::error::{SeedError, SeedResult};
use crate::seed::flatten::{json_type, Row};
use crate::seed::CHILDREN_FIELD;

/// Rows nested under one `__children__` entry
#[derive(Debug, Clone)]
pub struct ChildGroup<'a> {
    /// Child model name as written in the payload
    pub model_key: &'a str,
    pub rows: Vec<&'a Row>,
}

/// One row of a record tree, produced in depth-first pre-order
#[derive(Debug, Clone)]
pub struct TreeNode<'a> {
    /// Row fields without `__children__`
    pub scalars: Row,
    /// Index of the parent node in the same traversal
    pub parent: Option<usize>,
    /// Child model name this row was nested under; `None` for the root
    pub model_key: Option<&'a str>,
}

/// Separate the plain fields of a row from its nested children.
///
/// Only `__children__` expresses nesting. Any other array valued field, even a list of
/// objects, stays a plain field value.
pub fn split_scalars_and_children(row: &Row) -> SeedResult<(Row, Vec<ChildGroup<'_>>)> {
    let scalars: Row = row
        .iter()
        .filter(|(field, _)| field.as_str() != CHILDREN_FIELD)
        .map(|(field, value)| (field.clone(), value.clone()))
        .collect();

    let groups = match row.get(CHILDREN_FIELD) {
        None | Some(Value::Null) => Vec::new(),
        Some(raw_children) => child_groups(raw_children)?,
    };

    Ok((scalars, groups))
}

fn child_groups(raw_children: &Value) -> SeedResult<Vec<ChildGroup<'_>>> {
    let Value::Object(children) = raw_children else {
        return Err(SeedError::Schema(format!(
            "'{}' must be an object, got {}",
            CHILDREN_FIELD,
            json_type(raw_children)
        )));
    };

    let mut groups = Vec::with_capacity(children.len());
    for (model_key, items) in children {
        let invalid = || {
            SeedError::Schema(format!(
                "'{}.{}' must be a list of objects",
                CHILDREN_FIELD, model_key
            ))
        };

        let items = items.as_array().ok_or_else(invalid)?;
        let rows = items
            .iter()
            .map(|item| item.as_object().ok_or_else(invalid))
            .collect::<SeedResult<Vec<_>>>()?;

        groups.push(ChildGroup {
            model_key: model_key.as_str(),
            rows,
        });
    }

    Ok(groups)
}

/// Walk a record and all of its nested children with an explicit stack.
///
/// Nodes come out in depth-first pre-order, siblings in document order, so a parent
/// always precedes its children.
pub fn flatten_tree(root: &Row) -> SeedResult<Vec<TreeNode<'_>>> {
    let mut nodes = Vec::new();
    let mut stack: Vec<(&Row, Option<usize>, Option<&str>)> = vec![(root, None, None)];

    while let Some((row, parent, model_key)) = stack.pop() {
        let (scalars, groups) = split_scalars_and_children(row)?;
        let index = nodes.len();
        nodes.push(TreeNode {
            scalars,
            parent,
            model_key,
        });

        for group in groups.iter().rev() {
            for child in group.rows.iter().rev() {
                stack.push((*child, Some(index), Some(group.model_key)));
            }
        }
    }

    Ok(nodes)
}
