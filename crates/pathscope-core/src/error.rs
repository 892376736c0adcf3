//! Core error types.

use thiserror::Error;

use pathscope_proto::{Operator, Value};

/// Schema metadata errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Two entities share a name.
    #[error("duplicate entity: {0}")]
    DuplicateEntity(String),

    /// A relation targets an undeclared entity.
    #[error("relation {entity}.{relation} targets unknown entity {target}")]
    UnknownTarget {
        /// Owning entity.
        entity: String,
        /// Relation name.
        relation: String,
        /// Missing target.
        target: String,
    },

    /// Lookup of an undeclared entity.
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// Schema document could not be decoded.
    #[error("invalid schema document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by ordering comparisons.
#[derive(Debug, Error)]
pub enum CompareError {
    /// Operands cannot be ordered against each other.
    #[error("cannot compare {left} {op} {right}")]
    Incomparable {
        /// Operator.
        op: Operator,
        /// Left operand.
        left: Value,
        /// Right operand.
        right: Value,
    },
}

/// Storage failure surfaced by a relation loader.
#[derive(Debug, Error)]
#[error("failed to load {entity}.{relation}: {message}")]
pub struct LoadError {
    /// Owning entity.
    pub entity: String,
    /// Relation name.
    pub relation: String,
    /// Underlying failure.
    pub message: String,
}

impl LoadError {
    /// Create a load error.
    pub fn new(
        entity: impl Into<String>,
        relation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            entity: entity.into(),
            relation: relation.into(),
            message: message.into(),
        }
    }
}

/// Errors raised while evaluating paths against loaded data.
#[derive(Debug, Error)]
pub enum EvalError {
    /// A relation load failed.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Too many relation loads within one evaluation.
    #[error("relation load budget exceeded: {0} loads")]
    LoadBudgetExceeded(usize),

    /// The evaluation deadline passed before a relation load.
    #[error("evaluation deadline exceeded after {elapsed_ms}ms")]
    DeadlineExceeded {
        /// Time spent so far.
        elapsed_ms: u64,
    },

    /// Ordering comparison on incomparable operands.
    #[error(transparent)]
    Compare(#[from] CompareError),

    /// A configuration lookup could not be resolved.
    #[error("missing configuration {app}/{env}/{key}")]
    MissingConfig {
        /// Application name.
        app: String,
        /// Environment name.
        env: String,
        /// Configuration key.
        key: String,
    },

    /// Negation without a defined inverse.
    #[error(transparent)]
    Expression(#[from] pathscope_proto::Error),
}

/// Errors raised while compiling a scope.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The filter value has a shape that cannot be turned into a predicate.
    #[error("unsupported filter value: {0}")]
    UnsupportedFilterValue(String),

    /// Negation without a defined inverse.
    #[error(transparent)]
    NotNegatable(#[from] pathscope_proto::Error),

    /// The root entity is not part of the schema.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Resolving a value against the authorization context failed.
    #[error("value resolution failed: {0}")]
    Evaluation(#[from] EvalError),
}

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Result type for evaluation.
pub type EvalResult<T> = Result<T, EvalError>;

/// Result type for scope compilation.
pub type CompileResult<T> = Result<T, CompileError>;
