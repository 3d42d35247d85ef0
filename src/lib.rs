pub mod config;
pub mod logging;
pub mod model;
pub mod seed;
pub mod store;

// Export all model types
pub use model::*;

// Export seed module
pub use seed::*;

// Export store types
pub use store::{MemoryStore, PostgresStore, SeedSession};
