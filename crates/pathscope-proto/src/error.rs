//! Protocol error types.

use thiserror::Error;

/// Errors raised while building or decoding paths and expressions.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Malformed expression document.
    #[error("invalid expression: {0}")]
    InvalidExpression(String),

    /// Negation of an expression without a defined inverse.
    #[error("cannot negate {0}: no inverse defined")]
    NotNegatable(String),

    /// JSON decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotNegatable("operator lt".to_string());
        assert_eq!(err.to_string(), "cannot negate operator lt: no inverse defined");

        let err = Error::InvalidPath("empty segment".to_string());
        assert!(err.to_string().contains("empty segment"));
    }
}
