//! Schema metadata for pathscope.
//!
//! The catalog holds what the schema loader tells us about entities, their
//! attributes and their relations. It is built once and shared read-only.

mod entity;
mod schema;

pub use entity::{AttributeDef, EntityMetadata, RelationDef, RelationKind, ScalarType};
pub use schema::{FieldMetadata, Schema};
