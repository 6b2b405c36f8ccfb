pub mod migrations;
pub mod resolution_store;

pub use resolution_store::SqliteResolutionStore;
