//! Fact relations: in-memory (section 4.F) and SQL-backed (section 4.D).
// krelation 2024

pub mod memory;
pub mod sql;

pub use memory::MemoryRelation;
pub use sql::{DataStore, RelationConfig, SqlRelationFactory, SqliteStore};
