mod redb_registry;
mod traits;

pub use redb_registry::{RedbRegistry, CURRENT_SCHEMA_VERSION};
pub use traits::ModelRegistry;
