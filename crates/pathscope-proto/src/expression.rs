//! Policy expression trees.
//!
//! Expressions are produced by a policy front-end and consumed by the scope
//! compiler (to build queries) and the evaluator (to decide on loaded data).

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::path::Path;
use crate::value::Value;

/// Comparison operator of a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// Equal.
    Eq,
    /// Not equal.
    Neq,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Member of a set.
    In,
    /// Not a member of a set.
    NotIn,
}

impl Operator {
    /// The operator with the opposite meaning, if one is defined.
    ///
    /// Only `eq`/`neq` and `in`/`not_in` invert; ordering operators have no
    /// inverse.
    pub fn invert(self) -> Option<Operator> {
        match self {
            Operator::Eq => Some(Operator::Neq),
            Operator::Neq => Some(Operator::Eq),
            Operator::In => Some(Operator::NotIn),
            Operator::NotIn => Some(Operator::In),
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => None,
        }
    }

    /// Check if this is an ordering operator.
    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte
        )
    }

    /// Short name used in diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Neq => "neq",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::In => "in",
            Operator::NotIn => "not_in",
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The right-hand side of a leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSpec {
    /// A literal value.
    Literal(Value),
    /// A value read from application configuration.
    ConfigLookup {
        /// Application name.
        app: String,
        /// Environment name.
        env: String,
        /// Configuration key.
        key: String,
    },
    /// A path evaluated against the authorization context (the actor).
    Path(Path),
}

impl ValueSpec {
    /// Create a literal value spec.
    pub fn literal(value: impl Into<Value>) -> Self {
        ValueSpec::Literal(value.into())
    }

    /// Create a configuration lookup.
    pub fn config(app: impl Into<String>, env: impl Into<String>, key: impl Into<String>) -> Self {
        ValueSpec::ConfigLookup {
            app: app.into(),
            env: env.into(),
            key: key.into(),
        }
    }
}

/// A policy expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    /// Every child must hold.
    All(Vec<Expression>),
    /// At least one child must hold.
    Any(Vec<Expression>),
    /// The child must not hold.
    Not(Box<Expression>),
    /// Compare the value at `prop` with `value`.
    Leaf {
        /// Comparison operator.
        op: Operator,
        /// Path from the subject entity.
        prop: Path,
        /// Right-hand side.
        value: ValueSpec,
    },
}

impl Expression {
    /// Create a leaf.
    pub fn leaf(op: Operator, prop: Path, value: ValueSpec) -> Self {
        Expression::Leaf { op, prop, value }
    }

    /// Create an equality leaf against a literal.
    pub fn eq(prop: Path, value: impl Into<Value>) -> Self {
        Expression::leaf(Operator::Eq, prop, ValueSpec::literal(value))
    }

    /// Create a conjunction.
    pub fn all(children: Vec<Expression>) -> Self {
        Expression::All(children)
    }

    /// Create a disjunction.
    pub fn any(children: Vec<Expression>) -> Self {
        Expression::Any(children)
    }

    /// Wrap an expression in a negation.
    #[allow(clippy::should_implement_trait)]
    pub fn not(expr: Expression) -> Self {
        Expression::Not(Box::new(expr))
    }

    /// Push a negation into this expression.
    ///
    /// A leaf inverts its operator and a double negation cancels out. Leaves
    /// whose operator has no inverse and combinators cannot be negated.
    pub fn negate(&self) -> Result<Expression, Error> {
        match self {
            Expression::Leaf { op, prop, value } => match op.invert() {
                Some(inverted) => Ok(Expression::Leaf {
                    op: inverted,
                    prop: prop.clone(),
                    value: value.clone(),
                }),
                None => Err(Error::NotNegatable(format!("operator {}", op))),
            },
            Expression::Not(inner) => Ok((**inner).clone()),
            Expression::All(_) => Err(Error::NotNegatable("all".to_string())),
            Expression::Any(_) => Err(Error::NotNegatable("any".to_string())),
        }
    }
}
