//! pathscope protocol types.
//!
//! This crate defines the contract between policy front-ends and the pathscope
//! core: already-parsed path and expression trees, and the runtime values they
//! compare against.
//!
//! # Modules
//!
//! - [`value`] - Runtime values, including loaded entity records
//! - [`path`] - Path steps and paths
//! - [`expression`] - Operators, value specs and expression trees
//! - [`error`] - Protocol error types
//!
//! # Serialization
//!
//! All types derive `serde` traits. Values use their natural JSON form, with
//! typed records carrying their entity name under `__entity`:
//!
//! ```ignore
//! use pathscope_proto::{Expression, Path};
//!
//! let expr = Expression::eq(Path::parse("**.user.name")?, "A");
//! let json = serde_json::to_string(&expr)?;
//! let decoded: Expression = serde_json::from_str(&json)?;
//! ```

pub mod error;
pub mod expression;
pub mod path;
pub mod value;

pub use error::Error;

// Re-export commonly used types at crate root
pub use expression::{Expression, Operator, ValueSpec};
pub use path::{Path, PathStep, WILDCARD_TOKEN};
pub use value::{Record, Value, IDENTITY_FIELD};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_json_roundtrip() {
        let expr = Expression::any(vec![
            Expression::eq(Path::parse("**.user.name").unwrap(), "A"),
            Expression::not(Expression::leaf(
                Operator::In,
                Path::names(["status"]),
                ValueSpec::literal(vec!["draft", "archived"]),
            )),
            Expression::leaf(
                Operator::Eq,
                Path::names(["org"]),
                ValueSpec::Path(Path::names(["org"])),
            ),
        ]);

        let json = serde_json::to_string(&expr).unwrap();
        let decoded: Expression = serde_json::from_str(&json).unwrap();
        assert_eq!(expr, decoded);
    }
}
