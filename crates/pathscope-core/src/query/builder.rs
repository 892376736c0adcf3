//! Scope fragments and the two ways of combining them.

use pathscope_proto::{Operator, Value};

use super::select::{CompoundQuery, SelectQuery};

/// How a join attaches its target to the parent binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    /// Rows without a match are dropped.
    Inner,
    /// Rows without a match are kept with nulls.
    Left,
}

impl JoinKind {
    /// SQL keyword for this join.
    pub fn as_sql(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
        }
    }
}

/// One join of a compiled scope.
///
/// `alias.join_column = parent_alias.parent_column`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JoinSpec {
    /// Join kind.
    pub kind: JoinKind,
    /// Joined entity.
    pub target_entity: String,
    /// Table of the joined entity.
    pub target_table: String,
    /// Binding alias of the joined table.
    pub alias: String,
    /// Column on the joined table.
    pub join_column: String,
    /// Binding the join hangs off.
    pub parent_alias: String,
    /// Column on the parent binding.
    pub parent_column: String,
}

impl JoinSpec {
    /// Check if two joins bind the same table the same way, ignoring kind.
    pub fn same_binding(&self, other: &JoinSpec) -> bool {
        self.target_entity == other.target_entity
            && self.target_table == other.target_table
            && self.alias == other.alias
            && self.join_column == other.join_column
            && self.parent_alias == other.parent_alias
            && self.parent_column == other.parent_column
    }
}

/// Filter tree of a compiled scope.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterAtom {
    /// `alias.column op value`.
    Comparison {
        /// Binding alias.
        alias: String,
        /// Column name.
        column: String,
        /// Operator.
        op: Operator,
        /// Right-hand side; `Null` is a null check, a list is a membership test.
        value: Value,
    },
    /// Always false.
    EmptySet,
    /// Conjunction; empty is always true.
    And(Vec<FilterAtom>),
    /// Disjunction; empty is always false.
    Or(Vec<FilterAtom>),
    /// `alias.column IN (<compound query>)`.
    InSubquery {
        /// Binding alias.
        alias: String,
        /// Column name.
        column: String,
        /// Identities to test against.
        query: Box<CompoundQuery>,
    },
}

impl FilterAtom {
    /// Build a comparison.
    pub fn comparison(
        alias: impl Into<String>,
        column: impl Into<String>,
        op: Operator,
        value: impl Into<Value>,
    ) -> Self {
        FilterAtom::Comparison {
            alias: alias.into(),
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    /// Always-true filter.
    pub fn always() -> Self {
        FilterAtom::And(Vec::new())
    }

    /// Check if this is the always-false marker.
    pub fn is_empty_set(&self) -> bool {
        matches!(self, FilterAtom::EmptySet)
    }
}

/// Combination operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CombineOp {
    /// Intersection: `AND` / `INTERSECT`.
    All,
    /// Union: `OR` / `UNION`.
    Any,
}

impl CombineOp {
    /// Boolean connective.
    pub fn connective(self) -> &'static str {
        match self {
            CombineOp::All => "AND",
            CombineOp::Any => "OR",
        }
    }

    /// Compound select operator.
    pub fn set_operator(self) -> &'static str {
        match self {
            CombineOp::All => "INTERSECT",
            CombineOp::Any => "UNION",
        }
    }
}

/// Joins and filters accumulated while compiling a scope.
///
/// A builder is created per compilation and discarded after [`apply`](Self::apply).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryBuilder {
    joins: Vec<JoinSpec>,
    filters: Vec<FilterAtom>,
}

impl QueryBuilder {
    /// Create an empty builder (matches every row).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder that matches no row.
    pub fn empty_set() -> Self {
        Self {
            joins: Vec::new(),
            filters: vec![FilterAtom::EmptySet],
        }
    }

    /// Recorded joins, in order.
    pub fn joins(&self) -> &[JoinSpec] {
        &self.joins
    }

    /// Recorded filters, in order. They are conjoined.
    pub fn filters(&self) -> &[FilterAtom] {
        &self.filters
    }

    /// Add a join.
    ///
    /// An identical join is a no-op. A join that differs from an existing one
    /// only in kind widens the existing one to a left join.
    pub fn join(&mut self, join: JoinSpec) {
        match self.joins.iter_mut().find(|j| j.same_binding(&join)) {
            Some(existing) => {
                if existing.kind != join.kind {
                    existing.kind = JoinKind::Left;
                }
            }
            None => self.joins.push(join),
        }
    }

    /// Add a filter.
    pub fn filter(&mut self, filter: FilterAtom) {
        self.filters.push(filter);
    }

    /// Check if the builder can only match no row.
    pub fn is_empty_set(&self) -> bool {
        self.filters.iter().any(FilterAtom::is_empty_set)
    }

    /// The filters as a single predicate.
    pub fn predicate(&self) -> FilterAtom {
        match self.filters.as_slice() {
            [single] => single.clone(),
            filters => FilterAtom::And(filters.to_vec()),
        }
    }

    /// Apply joins and predicate to `base`.
    ///
    /// The result is `DISTINCT`, since has-many joins multiply rows.
    pub fn apply(self, mut base: SelectQuery) -> SelectQuery {
        let predicate = self.predicate();
        base.distinct = true;
        for join in self.joins {
            match base.joins.iter_mut().find(|j| j.same_binding(&join)) {
                Some(existing) if existing.kind != join.kind => existing.kind = JoinKind::Left,
                Some(_) => {}
                None => base.joins.push(join),
            }
        }
        base.filter = Some(match base.filter.take() {
            Some(existing) => FilterAtom::And(vec![existing, predicate]),
            None => predicate,
        });
        base
    }

    fn merge(self, other: QueryBuilder, op: CombineOp) -> QueryBuilder {
        let predicates = [self.predicate(), other.predicate()];
        let mut merged = QueryBuilder {
            joins: self.joins,
            filters: Vec::new(),
        };
        for join in other.joins {
            merged.join(join);
        }
        if op == CombineOp::Any {
            // A row admitted by one branch must survive the joins of the others.
            for join in &mut merged.joins {
                join.kind = JoinKind::Left;
            }
        }

        let mut children = Vec::new();
        for predicate in predicates {
            match (op, predicate) {
                (CombineOp::All, FilterAtom::And(inner)) | (CombineOp::Any, FilterAtom::Or(inner)) => {
                    children.extend(inner)
                }
                (_, predicate) => children.push(predicate),
            }
        }
        merged.filters.push(match op {
            CombineOp::All => FilterAtom::And(children),
            CombineOp::Any => FilterAtom::Or(children),
        });
        merged
    }
}

/// Combine fragments that scope the same row set.
///
/// Join lists are merged (deduplicated, order preserved) and the filters are
/// wrapped in one `And`/`Or` node. Absent fragments are skipped; a fragment
/// structurally equal to the accumulator leaves it unchanged. Returns `None`
/// when every fragment is absent.
pub fn combine_predicates<I>(op: CombineOp, fragments: I) -> Option<QueryBuilder>
where
    I: IntoIterator<Item = Option<QueryBuilder>>,
{
    fragments
        .into_iter()
        .flatten()
        .fold(None, |acc: Option<QueryBuilder>, fragment| match acc {
            None => Some(fragment),
            Some(acc) if acc == fragment => Some(acc),
            Some(acc) => Some(acc.merge(fragment, op)),
        })
}

/// Combine independently rooted queries into a `UNION` (`Any`) or
/// `INTERSECT` (`All`) chain of their identities.
///
/// Joins are never shared between the members. Returns `None` for no
/// queries.
pub fn combine_queries(op: CombineOp, queries: Vec<SelectQuery>) -> Option<CompoundQuery> {
    if queries.is_empty() {
        return None;
    }
    Some(CompoundQuery::new(op, queries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn join(alias: &str, kind: JoinKind) -> JoinSpec {
        JoinSpec {
            kind,
            target_entity: "post".to_string(),
            target_table: "post".to_string(),
            alias: alias.to_string(),
            join_column: "id".to_string(),
            parent_alias: "root".to_string(),
            parent_column: "post_id".to_string(),
        }
    }

    fn fragment(alias: &str, value: &str) -> QueryBuilder {
        let mut builder = QueryBuilder::new();
        builder.join(join(alias, JoinKind::Inner));
        builder.filter(FilterAtom::comparison(alias, "title", Operator::Eq, value));
        builder
    }

    #[test]
    fn test_identity_element() {
        let a = fragment("root__post", "x");
        assert_eq!(
            combine_predicates(CombineOp::Any, [Some(a.clone()), None]),
            Some(a.clone())
        );
        assert_eq!(
            combine_predicates(CombineOp::All, [None, Some(a.clone())]),
            Some(a)
        );
        assert_eq!(combine_predicates(CombineOp::All, [None, None]), None);
    }

    #[test]
    fn test_idempotence() {
        let q = fragment("root__post", "x");
        assert_eq!(
            combine_predicates(CombineOp::All, [Some(q.clone()), Some(q.clone())]),
            Some(q.clone())
        );
        assert_eq!(
            combine_predicates(CombineOp::Any, [Some(q.clone()), Some(q.clone())]),
            Some(q)
        );
    }

    #[test]
    fn test_and_merges_joins_and_filters() {
        let a = fragment("root__post", "x");
        let b = fragment("root__post", "y");
        let combined = combine_predicates(CombineOp::All, [Some(a), Some(b)]).unwrap();

        assert_eq!(combined.joins(), &[join("root__post", JoinKind::Inner)]);
        assert_eq!(
            combined.filters(),
            &[FilterAtom::And(vec![
                FilterAtom::comparison("root__post", "title", Operator::Eq, "x"),
                FilterAtom::comparison("root__post", "title", Operator::Eq, "y"),
            ])]
        );
    }

    #[test]
    fn test_or_downgrades_joins_and_flattens() {
        let a = fragment("root__post", "x");
        let b = fragment("root__other", "y");
        let c = fragment("root__post", "z");
        let combined = combine_predicates(CombineOp::Any, [Some(a), Some(b), Some(c)]).unwrap();

        assert_eq!(
            combined.joins(),
            &[join("root__post", JoinKind::Left), join("root__other", JoinKind::Left)]
        );
        match combined.predicate() {
            FilterAtom::Or(children) => assert_eq!(children.len(), 3),
            other => panic!("expected Or, got {:?}", other),
        }
    }

    #[test]
    fn test_join_kind_widening() {
        let mut builder = QueryBuilder::new();
        builder.join(join("root__post", JoinKind::Inner));
        builder.join(join("root__post", JoinKind::Inner));
        assert_eq!(builder.joins().len(), 1);

        builder.join(join("root__post", JoinKind::Left));
        assert_eq!(builder.joins(), &[join("root__post", JoinKind::Left)]);
    }

    #[test]
    fn test_predicate_shapes() {
        assert_eq!(QueryBuilder::new().predicate(), FilterAtom::always());
        assert_eq!(QueryBuilder::empty_set().predicate(), FilterAtom::EmptySet);
        assert!(QueryBuilder::empty_set().is_empty_set());
        assert!(!QueryBuilder::new().is_empty_set());
    }

    #[test]
    fn test_combine_queries_empty() {
        assert!(combine_queries(CombineOp::Any, Vec::new()).is_none());
    }
}
