//! Identity-aware value comparison.
//!
//! The evaluator compares what a path yields on a loaded subject with what the
//! policy expects. Values exposing an `id` compare by identity, lists on the
//! left-hand side of `eq` are existential.

use std::cmp::Ordering;

use pathscope_proto::{Operator, Value};

use crate::error::CompareError;

/// Compares runtime values under policy operators.
pub struct Comparator;

impl Comparator {
    /// Compare `left` with `right` under `op`.
    ///
    /// - `eq`: an empty list on the left is vacuously true, a non-empty list
    ///   holds if any element equals `right`; identity-bearing values compare
    ///   by id (also against a bare id); `nil` only equals `nil`.
    /// - `neq`: the negation of `eq`.
    /// - `in` / `not_in`: both sides are normalized to identity-or-scalar
    ///   lists; `in` holds when they intersect, `not_in` when they do not.
    /// - `gt` / `gte` / `lt` / `lte`: direct ordering; `nil` or mismatched
    ///   operands are an error.
    pub fn compare(left: &Value, right: &Value, op: Operator) -> Result<bool, CompareError> {
        match op {
            Operator::Eq => Ok(Self::equals(left, right)),
            Operator::Neq => Ok(!Self::equals(left, right)),
            Operator::In => Ok(Self::intersects(left, right)),
            Operator::NotIn => Ok(!Self::intersects(left, right)),
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
                let ordering = Self::order(left, right).ok_or_else(|| {
                    CompareError::Incomparable {
                        op,
                        left: left.clone(),
                        right: right.clone(),
                    }
                })?;
                Ok(match op {
                    Operator::Gt => ordering.is_gt(),
                    Operator::Gte => ordering.is_ge(),
                    Operator::Lt => ordering.is_lt(),
                    _ => ordering.is_le(),
                })
            }
        }
    }

    /// Identity-aware equality with existential lists on the left.
    pub fn equals(left: &Value, right: &Value) -> bool {
        if let Value::List(items) = left {
            return items.is_empty() || items.iter().any(|item| Self::equals(item, right));
        }

        if left.identity().is_some() || right.identity().is_some() {
            return Self::values_equal(left.identity_or_self(), right.identity_or_self());
        }

        Self::values_equal(left, right)
    }

    /// Normalize a value to a list of identities or scalars.
    pub fn normalize(value: &Value) -> Vec<&Value> {
        match value {
            Value::List(items) => items.iter().map(Value::identity_or_self).collect(),
            Value::Null => Vec::new(),
            other => vec![other.identity_or_self()],
        }
    }

    fn intersects(left: &Value, right: &Value) -> bool {
        let right = Self::normalize(right);
        Self::normalize(left)
            .into_iter()
            .any(|l| right.iter().any(|r| Self::values_equal(l, r)))
    }

    /// Check if two values are equal.
    fn values_equal(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Int32(a), Value::Int64(b)) => (*a as i64) == *b,
            (Value::Int64(a), Value::Int32(b)) => *a == (*b as i64),
            (Value::Float64(a), Value::Float64(b)) => a == b,
            (Value::Float64(_), Value::Int32(_) | Value::Int64(_))
            | (Value::Int32(_) | Value::Int64(_), Value::Float64(_)) => a.as_f64() == b.as_f64(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Self::equals(x, y))
            }
            (Value::Record(a), Value::Record(b)) => a == b,
            _ => false,
        }
    }

    /// Compare two values, returning their ordering if comparable.
    fn order(a: &Value, b: &Value) -> Option<Ordering> {
        match (a, b) {
            (Value::Int32(a), Value::Int32(b)) => Some(a.cmp(b)),
            (Value::Int64(a), Value::Int64(b)) => Some(a.cmp(b)),
            (Value::Int32(a), Value::Int64(b)) => Some((*a as i64).cmp(b)),
            (Value::Int64(a), Value::Int32(b)) => Some(a.cmp(&(*b as i64))),
            (Value::Float64(a), Value::Float64(b)) => a.partial_cmp(b),
            (Value::Float64(_), Value::Int32(_) | Value::Int64(_))
            | (Value::Int32(_) | Value::Int64(_), Value::Float64(_)) => {
                a.as_f64()?.partial_cmp(&b.as_f64()?)
            }
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            _ => None, // Incompatible types
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathscope_proto::Record;

    fn user(id: impl Into<Value>) -> Value {
        Value::Record(Record::new("user").with_field("id", id))
    }

    fn eq(left: &Value, right: &Value) -> bool {
        Comparator::compare(left, right, Operator::Eq).unwrap()
    }

    #[test]
    fn test_eq_reflexive() {
        for value in [
            Value::from(5i64),
            Value::from("x"),
            Value::from(true),
            user(1i64),
            Value::Null,
        ] {
            assert!(eq(&value, &value), "{} should equal itself", value);
        }
    }

    #[test]
    fn test_nil_equality() {
        assert!(eq(&Value::Null, &Value::Null));
        assert!(!eq(&Value::Null, &Value::from(5i64)));
        assert!(!eq(&Value::from(5i64), &Value::Null));
        assert!(Comparator::compare(&Value::Null, &Value::from(5i64), Operator::Neq).unwrap());
    }

    #[test]
    fn test_identity_against_scalar() {
        assert!(eq(&user("1"), &Value::from("1")));
        assert!(eq(&Value::from("1"), &user("1")));
        assert!(!eq(&user("1"), &Value::from("2")));
        assert!(eq(&user(1i64), &user(1i32)));
    }

    #[test]
    fn test_identity_ignores_other_fields() {
        let a = Value::Record(Record::new("user").with_field("id", 1i64).with_field("name", "A"));
        let b = Value::Record(Record::new("user").with_field("id", 1i64).with_field("name", "B"));
        assert!(eq(&a, &b));
    }

    #[test]
    fn test_eq_list_on_left() {
        assert!(eq(&Value::List(vec![]), &Value::from("anything")));
        assert!(eq(&Value::List(vec![]), &Value::Null));

        let ids = Value::from(vec![1i64, 2, 3]);
        assert!(eq(&ids, &Value::from(2i64)));
        assert!(!eq(&ids, &Value::from(4i64)));

        let users = Value::List(vec![user(1i64), user(2i64)]);
        assert!(eq(&users, &user(2i64)));
    }

    #[test]
    fn test_in_and_not_in() {
        let allowed = Value::from(vec!["a", "b"]);
        assert!(Comparator::compare(&Value::from("a"), &allowed, Operator::In).unwrap());
        assert!(!Comparator::compare(&Value::from("c"), &allowed, Operator::In).unwrap());
        assert!(Comparator::compare(&Value::from("c"), &allowed, Operator::NotIn).unwrap());

        let members = Value::List(vec![user(1i64), user(2i64)]);
        let wanted = Value::from(vec![2i64, 9]);
        assert!(Comparator::compare(&members, &wanted, Operator::In).unwrap());
        assert!(!Comparator::compare(&members, &wanted, Operator::NotIn).unwrap());

        assert!(!Comparator::compare(&Value::List(vec![]), &allowed, Operator::In).unwrap());
        assert!(Comparator::compare(&Value::List(vec![]), &allowed, Operator::NotIn).unwrap());
    }

    #[test]
    fn test_ordering() {
        let five = Value::from(5i64);
        let three = Value::from(3i32);
        assert!(Comparator::compare(&five, &three, Operator::Gt).unwrap());
        assert!(Comparator::compare(&five, &five, Operator::Gte).unwrap());
        assert!(Comparator::compare(&three, &five, Operator::Lt).unwrap());
        assert!(Comparator::compare(&Value::from(2.5), &three, Operator::Lte).unwrap());
        assert!(Comparator::compare(&Value::from("b"), &Value::from("a"), Operator::Gt).unwrap());
    }

    #[test]
    fn test_mixed_numeric_equality_agrees_with_ordering() {
        let float = Value::from(1.0);
        let int = Value::from(1i64);
        assert!(eq(&float, &int));
        assert!(eq(&Value::from(1i32), &float));
        assert!(Comparator::compare(&float, &int, Operator::Gte).unwrap());
        assert!(!Comparator::compare(&float, &int, Operator::Neq).unwrap());
        assert!(!eq(&Value::from(1.5), &int));
        assert!(Comparator::compare(&Value::from(vec![1i64, 2]), &Value::from(2.0), Operator::In).unwrap());
    }

    #[test]
    fn test_ordering_rejects_nil_and_mismatch() {
        let err = Comparator::compare(&Value::Null, &Value::from(5i64), Operator::Gt);
        assert!(matches!(err, Err(CompareError::Incomparable { .. })));

        let err = Comparator::compare(&Value::from("a"), &Value::from(5i64), Operator::Lt);
        assert!(err.is_err());
    }
}
