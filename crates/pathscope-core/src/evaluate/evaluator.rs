//! Path evaluation against loaded object graphs.

use pathscope_proto::{Expression, Path, PathStep, Record, Value, ValueSpec};
use tracing::{debug, trace};

use super::cache::{RelationCache, RelationKey};
use super::loader::RelationLoader;
use crate::catalog::{EntityMetadata, FieldMetadata, Schema};
use crate::compare::Comparator;
use crate::config::{ConfigSource, LoadBudget};
use crate::error::{EvalError, EvalResult};
use crate::graph::EntityGraph;

/// Interprets path expressions against live values.
///
/// The evaluator itself is stateless and cheap to build; everything that
/// belongs to one evaluation lives in the [`RelationCache`] passed to each
/// call.
pub struct Evaluator<'a> {
    schema: &'a Schema,
    graph: &'a EntityGraph,
    loader: Option<&'a dyn RelationLoader>,
    config: Option<&'a dyn ConfigSource>,
    budget: LoadBudget,
}

impl<'a> Evaluator<'a> {
    /// Create an evaluator that only sees preloaded relations.
    pub fn new(schema: &'a Schema, graph: &'a EntityGraph) -> Self {
        Self {
            schema,
            graph,
            loader: None,
            config: None,
            budget: LoadBudget::default(),
        }
    }

    /// Load missing relations through `loader`.
    pub fn with_loader(mut self, loader: &'a dyn RelationLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Resolve configuration lookups through `config`.
    pub fn with_config(mut self, config: &'a dyn ConfigSource) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the load budget.
    pub fn with_budget(mut self, budget: LoadBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Evaluate `path` starting at `context`.
    ///
    /// Absent data never fails: missing attributes and relations yield `nil`
    /// or an empty list. Only storage failures and budget violations are
    /// errors.
    pub fn evaluate(
        &self,
        context: &Value,
        path: &Path,
        cache: &mut RelationCache,
    ) -> EvalResult<Value> {
        self.walk(context, &path.steps, cache)
    }

    /// Resolve the right-hand side of a leaf against `context`.
    ///
    /// Literals and configuration lookups do not depend on the context.
    pub fn resolve(
        &self,
        context: &Value,
        spec: &ValueSpec,
        cache: &mut RelationCache,
    ) -> EvalResult<Value> {
        match spec {
            ValueSpec::Literal(value) => Ok(value.clone()),
            ValueSpec::ConfigLookup { app, env, key } => self
                .config
                .and_then(|config| config.lookup(app, env, key))
                .ok_or_else(|| EvalError::MissingConfig {
                    app: app.clone(),
                    env: env.clone(),
                    key: key.clone(),
                }),
            ValueSpec::Path(path) => self.evaluate(context, path, cache),
        }
    }

    /// Decide whether `subject` satisfies `expression` for `actor`.
    ///
    /// Leaf paths are evaluated on the subject, value paths on the actor.
    /// Empty `All` and `Any` do not match.
    pub fn matches(
        &self,
        subject: &Value,
        expression: &Expression,
        actor: &Value,
        cache: &mut RelationCache,
    ) -> EvalResult<bool> {
        match expression {
            Expression::All(children) => {
                if children.is_empty() {
                    return Ok(false);
                }
                for child in children {
                    if !self.matches(subject, child, actor, cache)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Expression::Any(children) => {
                for child in children {
                    if self.matches(subject, child, actor, cache)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Expression::Not(inner) => self.matches(subject, &inner.negate()?, actor, cache),
            Expression::Leaf { op, prop, value } => {
                let left = self.evaluate(subject, prop, cache)?;
                let right = self.resolve(actor, value, cache)?;
                let decision = Comparator::compare(&left, &right, *op)?;
                trace!(path = %prop, op = %op, left = %left, right = %right, decision, "Leaf evaluated");
                Ok(decision)
            }
        }
    }

    fn walk(&self, context: &Value, steps: &[PathStep], cache: &mut RelationCache) -> EvalResult<Value> {
        let Some((first, rest)) = steps.split_first() else {
            return Ok(context.clone());
        };

        match context {
            Value::Null => return Ok(Value::Null),
            Value::List(items) => {
                let mut results = Vec::new();
                for item in items {
                    let value = self.walk(item, steps, cache)?;
                    collect_unique(&mut results, value);
                }
                return Ok(Value::List(results));
            }
            _ => {}
        }

        match first {
            PathStep::Wildcard => self.ascend(context, rest, cache),
            PathStep::Alternatives(paths) => {
                let mut results = Vec::new();
                for alternative in paths {
                    let mut combined = alternative.steps.clone();
                    combined.extend_from_slice(rest);
                    let value = self.walk(context, &combined, cache)?;
                    collect_unique(&mut results, value);
                }
                Ok(Value::List(results))
            }
            PathStep::SelfRef(name) => match context.as_record().and_then(Record::entity) {
                Some(entity) if entity == name => self.walk(context, rest, cache),
                _ => Ok(Value::Null),
            },
            PathStep::Name { name, .. } => self.step(context, name, rest, cache),
        }
    }

    /// `**` followed by an ancestor name: follow the shortest relation chain.
    fn ascend(&self, context: &Value, rest: &[PathStep], cache: &mut RelationCache) -> EvalResult<Value> {
        let Some((next, tail)) = rest.split_first() else {
            return Ok(context.clone());
        };
        let Some(ancestor) = next.as_name() else {
            return Ok(Value::Null);
        };
        let Some(entity) = context.as_record().and_then(Record::entity) else {
            return Ok(Value::Null);
        };

        match self.graph.shortest_path(entity, ancestor) {
            Some(chain) => {
                let mut steps: Vec<PathStep> = chain.into_iter().map(PathStep::name).collect();
                steps.extend_from_slice(tail);
                self.walk(context, &steps, cache)
            }
            None => {
                debug!(entity, ancestor, "Ancestor not reachable, evaluating to nil");
                Ok(Value::Null)
            }
        }
    }

    fn step(
        &self,
        context: &Value,
        name: &str,
        rest: &[PathStep],
        cache: &mut RelationCache,
    ) -> EvalResult<Value> {
        let Some(record) = context.as_record() else {
            return Ok(Value::Null);
        };

        let Some(meta) = record.entity().and_then(|e| self.schema.entity(e)) else {
            // Plain map, or an entity the schema does not know.
            let value = record.get(name).cloned().unwrap_or_default();
            return self.walk(&value, rest, cache);
        };

        let field = self.schema.field(meta, name);
        let value = match &field {
            FieldMetadata::Attribute { column } => record
                .get(name)
                .or_else(|| record.get(column))
                .cloned()
                .unwrap_or_default(),
            FieldMetadata::Unknown if name == meta.name => context.clone(),
            FieldMetadata::Unknown => record.get(name).cloned().unwrap_or_default(),
            FieldMetadata::BelongsTo { .. } => self.related(record, meta, name, &field, cache)?,
            FieldMetadata::HasMany { .. } => {
                let children = self.related(record, meta, name, &field, cache)?;
                Value::List(children.into_list().into_iter().filter(|v| !v.is_null()).collect())
            }
        };

        if rest.is_empty() {
            return Ok(value);
        }
        self.walk(&value, rest, cache)
    }

    /// Resolve a relation: preloaded field, then cache, then loader.
    fn related(
        &self,
        record: &Record,
        meta: &EntityMetadata,
        name: &str,
        field: &FieldMetadata<'_>,
        cache: &mut RelationCache,
    ) -> EvalResult<Value> {
        if let Some(preloaded) = record.get(name) {
            return Ok(preloaded.clone());
        }

        let empty = match field {
            FieldMetadata::HasMany { .. } => Value::List(Vec::new()),
            _ => Value::Null,
        };

        if let FieldMetadata::BelongsTo { column, .. } = field {
            if record.get(column).is_some_and(Value::is_null) {
                return Ok(Value::Null);
            }
        }

        let key = record.id().map(|id| RelationKey::new(&meta.name, id, name));
        if let Some(cached) = key.as_ref().and_then(|k| cache.get(k)) {
            return Ok(cached.clone());
        }

        let Some(loader) = self.loader else {
            return Ok(empty);
        };

        cache.charge(&self.budget)?;
        trace!(entity = %meta.name, relation = name, "Loading relation");
        let loaded = loader.load(record, name, field)?;

        if let Some(key) = key {
            cache.insert(key, loaded.clone());
        }
        Ok(loaded)
    }
}

/// Append `value` (flattened) to `results`, dropping nils and duplicates.
fn collect_unique(results: &mut Vec<Value>, value: Value) {
    for item in value.into_list() {
        if item.is_null() {
            continue;
        }
        if !results.iter().any(|existing| same_item(existing, &item)) {
            results.push(item);
        }
    }
}

/// Records are the same item when entity and identity match.
fn same_item(a: &Value, b: &Value) -> bool {
    match (a.as_record(), b.as_record()) {
        (Some(ra), Some(rb)) => match (ra.id(), rb.id()) {
            (Some(ia), Some(ib)) => ra.entity() == rb.entity() && Comparator::equals(ia, ib),
            _ => ra == rb,
        },
        _ => a == b,
    }
}
