//! Pathscope Core - path resolution, scope compilation and evaluation.
//!
//! Authorization rules are written as expressions over schema-relative paths
//! such as `**.user.name`. This crate turns them into:
//!
//! - query fragments ([`QueryBuilder`]) that restrict a select to the rows a
//!   caller may see, via [`ScopeCompiler`];
//! - runtime decisions against already-loaded data, via [`Evaluator`].
//!
//! The [`Schema`] and its [`EntityGraph`] are built once and shared read-only;
//! builders and [`RelationCache`]s are per request.

pub mod catalog;
pub mod compare;
pub mod config;
pub mod error;
pub mod evaluate;
pub mod graph;
pub mod policy;
pub mod query;
pub mod scope;

pub use catalog::{
    AttributeDef, EntityMetadata, FieldMetadata, RelationDef, RelationKind, ScalarType, Schema,
};
pub use compare::Comparator;
pub use config::{CompilerConfig, ConfigSource, EnvConfig, LoadBudget, MapConfig};
pub use error::{
    CatalogError, CatalogResult, CompareError, CompileError, CompileResult, EvalError, EvalResult,
    LoadError,
};
pub use evaluate::{Evaluator, MemoryStore, RelationCache, RelationKey, RelationLoader};
pub use graph::{EntityGraph, Vertex};
pub use policy::{Policy, PolicyKind, PolicySet};
pub use query::{
    combine_predicates, combine_queries, CombineOp, CompoundQuery, FilterAtom, JoinKind, JoinSpec,
    Projection, QueryBuilder, SelectQuery, Sql,
};
pub use scope::{safe_value, RuntimeParams, SafeValue, ScopeCompiler};

/// Re-export protocol types.
pub use pathscope_proto as proto;
