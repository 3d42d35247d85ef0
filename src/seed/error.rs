use std::fmt;
use std::path::PathBuf;

/// Where an unresolvable model name was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelScope {
    TopLevel,
    Nested,
}

impl fmt::Display for ModelScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelScope::TopLevel => f.write_str("top-level"),
            ModelScope::Nested => f.write_str("nested"),
        }
    }
}

/// Fatal errors raised while seeding. None of them are recovered from locally:
/// they abort the run and the caller's transaction is expected to roll back.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    /// The payload has the wrong JSON type at an expected position
    #[error("schema error: {0}")]
    Schema(String),

    #[error(
        "unknown {scope} model '{name}'; accepted spellings: model name, table name or snake_case model name"
    )]
    UnknownModel { name: String, scope: ModelScope },

    #[error("missing required field __key__ in row: {row}")]
    MissingKey { row: String },

    #[error("no foreign key on '{child}' references parent '{parent}' (table '{parent_table}')")]
    MissingForeignKey {
        child: String,
        parent: String,
        parent_table: String,
    },

    #[error("model '{0}' declares no primary key")]
    MissingPrimaryKey(String),

    /// Two different models normalize to the same registry key
    #[error("model registry collision: {0}")]
    Configuration(String),

    #[error("failed to read seed file {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in seed file {}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("upsert into '{table}' failed")]
    Upsert {
        table: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

pub type SeedResult<T> = std::result::Result<T, SeedError>;
