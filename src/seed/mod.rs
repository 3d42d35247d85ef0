pub mod engine;
pub mod error;
pub mod flatten;
pub mod keys;
pub mod manifest;
pub mod prepare;
pub mod registry;
pub mod tree;

/// Symbolic identity of a row inside a seed payload
pub const KEY_FIELD: &str = "__key__";

/// Nested one-to-many rows, keyed by child model name
pub const CHILDREN_FIELD: &str = "__children__";

pub const ID_FIELD: &str = "id";

pub use engine::{seed_files, seed_payload, upsert_by_pk, SeedSummary};
pub use error::{ModelScope, SeedError, SeedResult};
pub use flatten::{flatten_payload, load_json, Row, SeedRecord};
pub use keys::{build_key_to_id, deterministic_id, KeyToId};
pub use manifest::{resolve_seed_files, SeedFileRequest};
pub use prepare::{prepare_row, ColumnValues};
pub use registry::{collect_models_registry, Registry};
