//! Runtime evaluation of paths and expressions.
//!
//! Relation loads go through a [`RelationLoader`] and are memoized in a
//! caller-owned [`RelationCache`], so each relation edge of an instance is
//! loaded at most once per evaluation.

mod cache;
mod evaluator;
mod loader;

pub use cache::{RelationCache, RelationKey};
pub use evaluator::Evaluator;
pub use loader::{MemoryStore, RelationLoader};
