//! Compilation of authorization expressions into query fragments.

use pathscope_proto::{Expression, Operator, PathStep, Value};
use tracing::{debug, warn};

use super::value::{safe_value, SafeValue};
use crate::catalog::{EntityMetadata, FieldMetadata, Schema};
use crate::config::{CompilerConfig, ConfigSource, LoadBudget};
use crate::error::{CompileError, CompileResult};
use crate::evaluate::{Evaluator, RelationCache, RelationLoader};
use crate::graph::EntityGraph;
use crate::query::{
    combine_predicates, combine_queries, CombineOp, FilterAtom, JoinKind, JoinSpec, QueryBuilder,
    SelectQuery,
};

/// Per-request inputs of a compilation.
///
/// Leaf values may be paths into the actor; they are resolved by evaluation,
/// so the parameters carry what an [`Evaluator`] needs, including the
/// request-scoped relation cache.
pub struct RuntimeParams<'a> {
    /// Authorization context that value paths are evaluated against.
    pub actor: Value,
    loader: Option<&'a dyn RelationLoader>,
    config: Option<&'a dyn ConfigSource>,
    budget: LoadBudget,
    cache: RelationCache,
}

impl<'a> RuntimeParams<'a> {
    /// Create parameters for `actor`.
    pub fn new(actor: impl Into<Value>) -> Self {
        Self {
            actor: actor.into(),
            loader: None,
            config: None,
            budget: LoadBudget::default(),
            cache: RelationCache::new(),
        }
    }

    /// Load actor relations through `loader`.
    pub fn with_loader(mut self, loader: &'a dyn RelationLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Resolve configuration lookups through `config`.
    pub fn with_config(mut self, config: &'a dyn ConfigSource) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the load budget for value resolution.
    pub fn with_budget(mut self, budget: LoadBudget) -> Self {
        self.budget = budget;
        self
    }

    /// The relation cache of this request.
    pub fn cache(&self) -> &RelationCache {
        &self.cache
    }
}

/// Right-hand side of the leaf being compiled.
struct LeafTarget {
    op: Operator,
    value: SafeValue,
}

/// Compiles expressions against a schema into [`QueryBuilder`] fragments.
///
/// Unknown fields compile to an always-false filter instead of failing.
pub struct ScopeCompiler<'a> {
    schema: &'a Schema,
    graph: &'a EntityGraph,
    config: CompilerConfig,
}

impl<'a> ScopeCompiler<'a> {
    /// Create a compiler with the default configuration.
    pub fn new(schema: &'a Schema, graph: &'a EntityGraph) -> Self {
        Self {
            schema,
            graph,
            config: CompilerConfig::default(),
        }
    }

    /// Set the compiler configuration.
    pub fn with_config(mut self, config: CompilerConfig) -> Self {
        self.config = config;
        self
    }

    /// The schema compiled against.
    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    /// The compiler configuration.
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile `expression` for rows of `entity`.
    pub fn compile(
        &self,
        entity: &str,
        expression: &Expression,
        params: &mut RuntimeParams<'_>,
    ) -> CompileResult<QueryBuilder> {
        let meta = self.schema.require(entity)?;
        self.compile_expression(meta, &self.config.root_alias, expression, params)
    }

    /// Compile `expression` and apply it to a select of every `entity` row.
    pub fn scope(
        &self,
        entity: &str,
        expression: &Expression,
        params: &mut RuntimeParams<'_>,
    ) -> CompileResult<SelectQuery> {
        let meta = self.schema.require(entity)?;
        let builder = self.compile_expression(meta, &self.config.root_alias, expression, params)?;
        Ok(builder.apply(SelectQuery::from_entity(meta, self.config.root_alias.clone())))
    }

    fn compile_expression(
        &self,
        entity: &EntityMetadata,
        binding: &str,
        expression: &Expression,
        params: &mut RuntimeParams<'_>,
    ) -> CompileResult<QueryBuilder> {
        match expression {
            Expression::All(children) => self.combine(CombineOp::All, entity, binding, children, params),
            Expression::Any(children) => self.combine(CombineOp::Any, entity, binding, children, params),
            Expression::Not(inner) => {
                let negated = inner.negate()?;
                self.compile_expression(entity, binding, &negated, params)
            }
            Expression::Leaf { op, prop, value } => {
                let resolved = self.resolve_value(value, params)?;
                let value = safe_value(&resolved)?;
                // Ordering is undefined for nil and for lists.
                if op.is_ordering()
                    && matches!(
                        value,
                        SafeValue::Null | SafeValue::Empty | SafeValue::Value(Value::List(_))
                    )
                {
                    return Err(CompileError::UnsupportedFilterValue(format!(
                        "{} against {}",
                        op, resolved
                    )));
                }
                let target = LeafTarget { op: *op, value };
                let mut builder = QueryBuilder::new();
                self.walk(entity, binding, &prop.steps, &target, &mut builder, params)?;
                Ok(builder)
            }
        }
    }

    fn combine(
        &self,
        op: CombineOp,
        entity: &EntityMetadata,
        binding: &str,
        children: &[Expression],
        params: &mut RuntimeParams<'_>,
    ) -> CompileResult<QueryBuilder> {
        let mut fragments = Vec::with_capacity(children.len());
        for child in children {
            fragments.push(Some(self.compile_expression(entity, binding, child, params)?));
        }
        Ok(combine_predicates(op, fragments).unwrap_or_else(|| {
            debug!(entity = %entity.name, "Empty combinator compiles to empty set");
            QueryBuilder::empty_set()
        }))
    }

    fn resolve_value(
        &self,
        value: &pathscope_proto::ValueSpec,
        params: &mut RuntimeParams<'_>,
    ) -> CompileResult<Value> {
        let mut evaluator =
            Evaluator::new(self.schema, self.graph).with_budget(params.budget.clone());
        if let Some(loader) = params.loader {
            evaluator = evaluator.with_loader(loader);
        }
        if let Some(config) = params.config {
            evaluator = evaluator.with_config(config);
        }
        Ok(evaluator.resolve(&params.actor, value, &mut params.cache)?)
    }

    fn walk(
        &self,
        entity: &EntityMetadata,
        binding: &str,
        steps: &[PathStep],
        target: &LeafTarget,
        builder: &mut QueryBuilder,
        params: &mut RuntimeParams<'_>,
    ) -> CompileResult<()> {
        let Some((first, rest)) = steps.split_first() else {
            builder.filter(target.value.filter(binding, &entity.identity, target.op));
            return Ok(());
        };

        match first {
            PathStep::Wildcard => {
                let Some((next, tail)) = rest.split_first() else {
                    builder.filter(target.value.filter(binding, &entity.identity, target.op));
                    return Ok(());
                };
                let Some(ancestor) = next.as_name() else {
                    warn!(entity = %entity.name, step = %next, "Wildcard must be followed by a name");
                    builder.filter(FilterAtom::EmptySet);
                    return Ok(());
                };
                match self.graph.shortest_path(&entity.name, ancestor) {
                    Some(chain) => {
                        let last = chain.len().saturating_sub(1);
                        let mut resolved: Vec<PathStep> = chain
                            .into_iter()
                            .enumerate()
                            .map(|(i, name)| match next.alias() {
                                Some(alias) if i == last && name == ancestor => {
                                    PathStep::aliased(name, alias)
                                }
                                _ => PathStep::name(name),
                            })
                            .collect();
                        resolved.extend_from_slice(tail);
                        self.walk(entity, binding, &resolved, target, builder, params)
                    }
                    None => {
                        debug!(entity = %entity.name, ancestor, "Unresolved ancestor, failing closed");
                        builder.filter(FilterAtom::EmptySet);
                        Ok(())
                    }
                }
            }
            PathStep::SelfRef(name) => {
                if *name == entity.name {
                    self.walk(entity, binding, rest, target, builder, params)
                } else {
                    debug!(entity = %entity.name, self_ref = %name, "Self reference mismatch, failing closed");
                    builder.filter(FilterAtom::EmptySet);
                    Ok(())
                }
            }
            PathStep::Alternatives(paths) => {
                self.alternatives(entity, binding, paths, rest, target, builder, params)
            }
            PathStep::Name { name, alias } => {
                self.named(entity, binding, name, alias.as_deref(), rest, target, builder, params)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn named(
        &self,
        entity: &EntityMetadata,
        binding: &str,
        name: &str,
        alias: Option<&str>,
        rest: &[PathStep],
        target: &LeafTarget,
        builder: &mut QueryBuilder,
        params: &mut RuntimeParams<'_>,
    ) -> CompileResult<()> {
        let child_alias = || {
            alias
                .map(str::to_string)
                .unwrap_or_else(|| self.config.child_alias(binding, name))
        };

        match self.schema.field(entity, name) {
            FieldMetadata::Attribute { column } => {
                if rest.is_empty() {
                    builder.filter(target.value.filter(binding, column, target.op));
                } else {
                    debug!(entity = %entity.name, attribute = name, "Path continues past an attribute, failing closed");
                    builder.filter(FilterAtom::EmptySet);
                }
                Ok(())
            }
            FieldMetadata::BelongsTo {
                column,
                target: parent,
                optional,
            } => {
                if rest.is_empty() {
                    builder.filter(target.value.filter(binding, &column, target.op));
                    return Ok(());
                }
                let parent_alias = child_alias();
                builder.join(JoinSpec {
                    kind: if optional { JoinKind::Left } else { JoinKind::Inner },
                    target_entity: parent.name.clone(),
                    target_table: parent.table().to_string(),
                    alias: parent_alias.clone(),
                    join_column: parent.identity.clone(),
                    parent_alias: binding.to_string(),
                    parent_column: column,
                });
                self.walk(parent, &parent_alias, rest, target, builder, params)
            }
            FieldMetadata::HasMany {
                target: child,
                foreign_key,
                ..
            } => {
                let alias = child_alias();
                builder.join(JoinSpec {
                    kind: JoinKind::Left,
                    target_entity: child.name.clone(),
                    target_table: child.table().to_string(),
                    alias: alias.clone(),
                    join_column: foreign_key,
                    parent_alias: binding.to_string(),
                    parent_column: entity.identity.clone(),
                });
                self.walk(child, &alias, rest, target, builder, params)
            }
            FieldMetadata::Unknown if name == entity.name => {
                self.walk(entity, binding, rest, target, builder, params)
            }
            FieldMetadata::Unknown => {
                debug!(entity = %entity.name, field = name, "Unknown field, failing closed");
                builder.filter(FilterAtom::EmptySet);
                Ok(())
            }
        }
    }

    /// Each alternative becomes an independently rooted select of `entity`
    /// identities; the binding's identity must be in their union.
    #[allow(clippy::too_many_arguments)]
    fn alternatives(
        &self,
        entity: &EntityMetadata,
        binding: &str,
        paths: &[pathscope_proto::Path],
        rest: &[PathStep],
        target: &LeafTarget,
        builder: &mut QueryBuilder,
        params: &mut RuntimeParams<'_>,
    ) -> CompileResult<()> {
        let mut queries = Vec::with_capacity(paths.len());
        for (i, path) in paths.iter().enumerate() {
            let root = self.config.child_alias(binding, &format!("alt{}", i));
            let mut steps = path.steps.clone();
            steps.extend_from_slice(rest);

            let mut fragment = QueryBuilder::new();
            self.walk(entity, &root, &steps, target, &mut fragment, params)?;
            queries.push(fragment.apply(SelectQuery::from_entity(entity, root)));
        }

        match combine_queries(CombineOp::Any, queries) {
            Some(query) => builder.filter(FilterAtom::InSubquery {
                alias: binding.to_string(),
                column: entity.identity.clone(),
                query: Box::new(query),
            }),
            None => builder.filter(FilterAtom::EmptySet),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AttributeDef, RelationDef, ScalarType};
    use crate::graph::tests::blog_schema;
    use pathscope_proto::{Path, Record, ValueSpec};
    use pretty_assertions::assert_eq;

    fn compile(entity: &str, expression: &Expression) -> CompileResult<QueryBuilder> {
        let schema = blog_schema();
        let graph = EntityGraph::build(&schema);
        let compiler = ScopeCompiler::new(&schema, &graph);
        compiler.compile(entity, expression, &mut RuntimeParams::new(Value::Null))
    }

    fn join(kind: JoinKind, entity: &str, alias: &str, column: &str, parent: &str, parent_column: &str) -> JoinSpec {
        JoinSpec {
            kind,
            target_entity: entity.to_string(),
            target_table: entity.to_string(),
            alias: alias.to_string(),
            join_column: column.to_string(),
            parent_alias: parent.to_string(),
            parent_column: parent_column.to_string(),
        }
    }

    #[test]
    fn test_wildcard_ancestor_attribute() {
        let expr = Expression::eq(Path::parse("**.user.name").unwrap(), "A");
        let builder = compile("comment", &expr).unwrap();

        assert_eq!(
            builder.joins(),
            &[
                join(JoinKind::Inner, "post", "root__post", "id", "root", "post_id"),
                join(JoinKind::Inner, "user", "root__post__user", "id", "root__post", "user_id"),
            ]
        );
        assert_eq!(
            builder.filters(),
            &[FilterAtom::comparison("root__post__user", "name", Operator::Eq, "A")]
        );
    }

    #[test]
    fn test_empty_and_lone_wildcard_target_identity() {
        for path in [Path::empty(), Path::new(vec![PathStep::Wildcard])] {
            let builder = compile("post", &Expression::eq(path, 7i64)).unwrap();
            assert!(builder.joins().is_empty());
            assert_eq!(
                builder.filters(),
                &[FilterAtom::comparison("root", "id", Operator::Eq, 7i64)]
            );
        }
    }

    #[test]
    fn test_belongs_to_terminal_filters_foreign_key() {
        let user = Value::Record(Record::new("user").with_field("id", 3i64));
        let expr = Expression::eq(Path::names(["user"]), user);
        let builder = compile("post", &expr).unwrap();

        assert!(builder.joins().is_empty());
        assert_eq!(
            builder.filters(),
            &[FilterAtom::comparison("root", "user_id", Operator::Eq, 3i64)]
        );
    }

    #[test]
    fn test_has_many_terminal_joins_child() {
        let expr = Expression::eq(Path::names(["comments"]), 5i64);
        let builder = compile("post", &expr).unwrap();

        assert_eq!(
            builder.joins(),
            &[join(JoinKind::Left, "comment", "root__comments", "post_id", "root", "id")]
        );
        assert_eq!(
            builder.filters(),
            &[FilterAtom::comparison("root__comments", "id", Operator::Eq, 5i64)]
        );
    }

    #[test]
    fn test_optional_parent_joins_left() {
        let expr = Expression::eq(Path::names(["editor", "name"]), "B");
        let builder = compile("comment", &expr).unwrap();
        assert_eq!(builder.joins()[0].kind, JoinKind::Left);
        assert_eq!(builder.joins()[0].alias, "root__editor");
    }

    #[test]
    fn test_alias_override() {
        let path = Path::new(vec![PathStep::aliased("post", "p"), PathStep::name("title")]);
        let builder = compile("comment", &Expression::eq(path, "t")).unwrap();
        assert_eq!(builder.joins()[0].alias, "p");
        assert_eq!(
            builder.filters(),
            &[FilterAtom::comparison("p", "title", Operator::Eq, "t")]
        );
    }

    #[test]
    fn test_unknown_fields_fail_closed() {
        for path in [
            Path::names(["foo"]),
            Path::names(["foo", "bar"]),
            Path::names(["body", "length"]),
            Path::parse("**.org.name").unwrap(),
            Path::new(vec![PathStep::SelfRef("post".to_string()), PathStep::name("body")]),
        ] {
            let builder = compile("comment", &Expression::eq(path.clone(), "x")).unwrap();
            assert!(builder.is_empty_set(), "{} should fail closed", path);
        }
    }

    #[test]
    fn test_self_name_continues() {
        let via_name = compile("comment", &Expression::eq(Path::names(["comment", "body"]), "x")).unwrap();
        let via_self = compile(
            "comment",
            &Expression::eq(
                Path::new(vec![PathStep::SelfRef("comment".to_string()), PathStep::name("body")]),
                "x",
            ),
        )
        .unwrap();
        let expected = [FilterAtom::comparison("root", "body", Operator::Eq, "x")];
        assert_eq!(via_name.filters(), &expected);
        assert_eq!(via_self.filters(), &expected);
    }

    #[test]
    fn test_empty_combinators_are_empty_set() {
        assert!(compile("comment", &Expression::all(vec![])).unwrap().is_empty_set());
        assert!(compile("comment", &Expression::any(vec![])).unwrap().is_empty_set());
    }

    #[test]
    fn test_not_inverts_operator() {
        let leaf = Expression::leaf(
            Operator::In,
            Path::names(["body"]),
            ValueSpec::literal(vec!["a", "b"]),
        );
        let builder = compile("comment", &Expression::not(leaf)).unwrap();
        assert_eq!(
            builder.filters(),
            &[FilterAtom::comparison("root", "body", Operator::NotIn, vec!["a", "b"])]
        );

        let ordering = Expression::leaf(Operator::Gt, Path::names(["id"]), ValueSpec::literal(1i64));
        assert!(matches!(
            compile("comment", &Expression::not(ordering)),
            Err(CompileError::NotNegatable(_))
        ));
    }

    #[test]
    fn test_mixed_value_is_error() {
        let mixed = Value::List(vec![
            Value::Record(Record::new("user").with_field("id", 1i64)),
            Value::from("x"),
        ]);
        let expr = Expression::eq(Path::names(["editor"]), mixed);
        assert!(matches!(
            compile("comment", &expr),
            Err(CompileError::UnsupportedFilterValue(_))
        ));
    }

    #[test]
    fn test_ordering_against_nil_or_list_is_error() {
        for value in [Value::Null, Value::List(vec![]), Value::from(vec![1i64, 2])] {
            let expr = Expression::leaf(Operator::Gt, Path::names(["body"]), ValueSpec::literal(value));
            assert!(matches!(
                compile("comment", &expr),
                Err(CompileError::UnsupportedFilterValue(_))
            ));
        }

        // Null checks stay available to eq and neq.
        let builder = compile("comment", &Expression::eq(Path::names(["body"]), Value::Null)).unwrap();
        assert_eq!(
            builder.filters(),
            &[FilterAtom::comparison("root", "body", Operator::Eq, Value::Null)]
        );
    }

    #[test]
    fn test_wildcard_reaches_own_attribute_named_like_a_relation() {
        let user = EntityMetadata::new("user")
            .with_attribute(AttributeDef::new("name", ScalarType::String));
        let audit = EntityMetadata::new("audit")
            .with_attribute(AttributeDef::new("user", ScalarType::String));
        let post = EntityMetadata::new("post").with_relation(RelationDef::belongs_to("user", "user"));
        let schema = Schema::new(vec![user, audit, post]).unwrap();
        let graph = EntityGraph::build(&schema);
        let compiler = ScopeCompiler::new(&schema, &graph);

        let expr = Expression::eq(Path::parse("**.user").unwrap(), "bob");
        let builder = compiler
            .compile("audit", &expr, &mut RuntimeParams::new(Value::Null))
            .unwrap();
        assert!(builder.joins().is_empty());
        assert_eq!(
            builder.filters(),
            &[FilterAtom::comparison("root", "user", Operator::Eq, "bob")]
        );
    }

    #[test]
    fn test_or_of_paths_shares_joins() {
        let expr = Expression::any(vec![
            Expression::eq(Path::names(["post", "title"]), "a"),
            Expression::eq(Path::names(["post", "user", "name"]), "b"),
        ]);
        let builder = compile("comment", &expr).unwrap();

        let aliases: Vec<_> = builder.joins().iter().map(|j| j.alias.as_str()).collect();
        assert_eq!(aliases, vec!["root__post", "root__post__user"]);
        assert!(builder.joins().iter().all(|j| j.kind == JoinKind::Left));
    }

    #[test]
    fn test_alternatives_compile_to_union_subquery() {
        let path = Path::new(vec![
            PathStep::Alternatives(vec![Path::names(["post", "user"]), Path::names(["editor"])]),
            PathStep::name("name"),
        ]);
        let builder = compile("comment", &Expression::eq(path, "A")).unwrap();

        assert!(builder.joins().is_empty());
        match builder.filters() {
            [FilterAtom::InSubquery { alias, column, query }] => {
                assert_eq!(alias, "root");
                assert_eq!(column, "id");
                assert_eq!(query.op, CombineOp::Any);
                assert_eq!(query.queries.len(), 2);
                assert_eq!(query.queries[0].alias, "root__alt0");
                assert_eq!(query.queries[1].joins[0].alias, "root__alt1__editor");
            }
            other => panic!("expected subquery filter, got {:?}", other),
        }
    }

    #[test]
    fn test_value_path_resolved_against_actor() {
        let schema = blog_schema();
        let graph = EntityGraph::build(&schema);
        let compiler = ScopeCompiler::new(&schema, &graph);
        let actor = Record::new("user").with_field("id", 9i64);
        let mut params = RuntimeParams::new(actor);

        let expr = Expression::leaf(
            Operator::Eq,
            Path::parse("**.user").unwrap(),
            ValueSpec::Path(Path::empty()),
        );
        let builder = compiler.compile("comment", &expr, &mut params).unwrap();
        assert_eq!(
            builder.filters(),
            &[FilterAtom::comparison("root__post", "user_id", Operator::Eq, 9i64)]
        );
    }

    #[test]
    fn test_unknown_root_entity_is_error() {
        assert!(matches!(
            compile("nope", &Expression::all(vec![])),
            Err(CompileError::Catalog(_))
        ));
    }
}
