//! Authorization policies and their combination.
//!
//! A row is visible when at least one permissive policy admits it and every
//! restrictive policy does. The same rule is applied at query time, by
//! compiling a scope, and at runtime, by evaluating a loaded subject.

use pathscope_proto::{Expression, Value};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CompileResult, EvalResult};
use crate::evaluate::{Evaluator, RelationCache};
use crate::query::{combine_predicates, CombineOp, QueryBuilder, SelectQuery};
use crate::scope::{RuntimeParams, ScopeCompiler};

/// How a policy combines with the others of its entity and action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Rows are admitted if ANY permissive policy matches.
    #[default]
    Permissive,
    /// Rows are admitted only if ALL restrictive policies match.
    Restrictive,
}

/// One authorization rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Policy name.
    pub name: String,
    /// Entity the policy scopes.
    pub entity: String,
    /// Action the policy applies to; `*` applies to every action.
    pub action: String,
    /// Combination kind.
    #[serde(default)]
    pub kind: PolicyKind,
    /// Condition on the subject.
    pub expression: Expression,
}

impl Policy {
    /// Create a permissive policy.
    pub fn new(
        name: impl Into<String>,
        entity: impl Into<String>,
        action: impl Into<String>,
        expression: Expression,
    ) -> Self {
        Self {
            name: name.into(),
            entity: entity.into(),
            action: action.into(),
            kind: PolicyKind::Permissive,
            expression,
        }
    }

    /// Make the policy restrictive.
    pub fn restrictive(mut self) -> Self {
        self.kind = PolicyKind::Restrictive;
        self
    }

    /// Check if the policy applies to `entity` and `action`.
    pub fn applies_to(&self, entity: &str, action: &str) -> bool {
        self.entity == entity && (self.action == "*" || self.action == action)
    }
}

/// The policies registered at initialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicySet {
    policies: Vec<Policy>,
}

impl PolicySet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a policy.
    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policies.push(policy);
        self
    }

    /// All policies, in registration order.
    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    fn applicable<'p>(
        &'p self,
        entity: &'p str,
        action: &'p str,
        kind: PolicyKind,
    ) -> impl Iterator<Item = &'p Policy> + 'p {
        self.policies
            .iter()
            .filter(move |p| p.kind == kind && p.applies_to(entity, action))
    }

    /// Compile the scope of `action` on `entity`.
    ///
    /// Permissive fragments are ORed, restrictive ones ANDed onto the result.
    /// Without an applicable permissive policy nothing is visible.
    pub fn scope(
        &self,
        compiler: &ScopeCompiler<'_>,
        entity: &str,
        action: &str,
        params: &mut RuntimeParams<'_>,
    ) -> CompileResult<QueryBuilder> {
        let mut permissive = Vec::new();
        for policy in self.applicable(entity, action, PolicyKind::Permissive) {
            permissive.push(Some(compiler.compile(entity, &policy.expression, params)?));
        }
        let Some(admitted) = combine_predicates(CombineOp::Any, permissive) else {
            debug!(entity, action, "No permissive policy, denying all rows");
            return Ok(QueryBuilder::empty_set());
        };

        let mut fragments = vec![Some(admitted)];
        for policy in self.applicable(entity, action, PolicyKind::Restrictive) {
            fragments.push(Some(compiler.compile(entity, &policy.expression, params)?));
        }

        Ok(combine_predicates(CombineOp::All, fragments).unwrap_or_else(QueryBuilder::empty_set))
    }

    /// Compile the scope and apply it to a select of every `entity` row.
    pub fn select(
        &self,
        compiler: &ScopeCompiler<'_>,
        entity: &str,
        action: &str,
        params: &mut RuntimeParams<'_>,
    ) -> CompileResult<SelectQuery> {
        let builder = self.scope(compiler, entity, action, params)?;
        let meta = compiler.schema().require(entity)?;
        Ok(builder.apply(SelectQuery::from_entity(
            meta,
            compiler.config().root_alias.clone(),
        )))
    }

    /// Decide whether `actor` may perform `action` on the loaded `subject`.
    pub fn authorize(
        &self,
        evaluator: &Evaluator<'_>,
        subject: &Value,
        action: &str,
        actor: &Value,
        cache: &mut RelationCache,
    ) -> EvalResult<bool> {
        let Some(entity) = subject.as_record().and_then(|r| r.entity()) else {
            return Ok(false);
        };

        let mut admitted = false;
        for policy in self.applicable(entity, action, PolicyKind::Permissive) {
            if evaluator.matches(subject, &policy.expression, actor, cache)? {
                debug!(policy = %policy.name, "Permissive policy matched");
                admitted = true;
                break;
            }
        }
        if !admitted {
            return Ok(false);
        }

        for policy in self.applicable(entity, action, PolicyKind::Restrictive) {
            if !evaluator.matches(subject, &policy.expression, actor, cache)? {
                debug!(policy = %policy.name, "Restrictive policy rejected");
                return Ok(false);
            }
        }
        Ok(true)
    }
}
