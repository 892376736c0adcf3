//! Compiled scopes: joins, filter trees and the queries they render to.
//!
//! Fragments that scope the same row set are merged with
//! [`combine_predicates`]; independently rooted queries are combined with
//! [`combine_queries`], which never share joins between members.

mod builder;
mod select;

pub use builder::{
    combine_predicates, combine_queries, CombineOp, FilterAtom, JoinKind, JoinSpec, QueryBuilder,
};
pub use select::{CompoundQuery, Projection, SelectQuery, Sql};
