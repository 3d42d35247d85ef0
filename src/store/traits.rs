use crate::model::ModelDescriptor;
use crate::seed::prepare::ColumnValues;
use anyhow::Result;

/// An open unit of work the seed engine writes through.
///
/// The engine never opens, commits or rolls back a session; whoever hands it one owns
/// the transaction boundary.
#[async_trait::async_trait]
pub trait SeedSession: Send {
    /// Insert a row, or on a `conflict_columns` match overwrite its non-key columns.
    /// When `values` holds nothing but key columns the conflict is ignored.
    async fn upsert(
        &mut self,
        model: &ModelDescriptor,
        values: &ColumnValues,
        conflict_columns: &[&str],
    ) -> Result<()>;
}
