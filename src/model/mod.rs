pub mod catalog;
pub mod descriptor;

pub use catalog::declared_models;
pub use descriptor::*;
