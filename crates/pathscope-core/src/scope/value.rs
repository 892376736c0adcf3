//! Normalization of filter values before they reach a predicate.

use pathscope_proto::{Operator, Value};

use crate::error::{CompileError, CompileResult};
use crate::query::FilterAtom;

/// A filter value in a shape a predicate can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum SafeValue {
    /// `nil`: compiles to a null check.
    Null,
    /// `[]`: no value can match.
    Empty,
    /// A scalar or a list of scalars.
    Value(Value),
}

impl SafeValue {
    /// Turn `alias.column op self` into a filter.
    ///
    /// An empty list excludes everything under `eq`/`in` and nothing under
    /// `neq`/`not_in`.
    pub fn filter(&self, alias: &str, column: &str, op: Operator) -> FilterAtom {
        match self {
            SafeValue::Null => FilterAtom::comparison(alias, column, op, Value::Null),
            SafeValue::Empty => match op {
                Operator::Neq | Operator::NotIn => FilterAtom::always(),
                _ => FilterAtom::EmptySet,
            },
            SafeValue::Value(value) => FilterAtom::comparison(alias, column, op, value.clone()),
        }
    }
}

/// Normalize a resolved value for use in a filter.
///
/// Identity-bearing values (records with an `id`) are reduced to their id,
/// lists of them to lists of ids. A list mixing identity-bearing and plain
/// items, or holding records without an id, is rejected.
pub fn safe_value(value: &Value) -> CompileResult<SafeValue> {
    match value {
        Value::Null => Ok(SafeValue::Null),
        Value::List(items) if items.is_empty() => Ok(SafeValue::Empty),
        Value::List(items) => {
            let with_identity = items.iter().filter(|v| v.identity().is_some()).count();
            if with_identity == items.len() {
                let ids = items.iter().map(|v| v.identity_or_self().clone()).collect();
                return Ok(SafeValue::Value(Value::List(ids)));
            }
            if with_identity == 0 && items.iter().all(is_scalar) {
                return Ok(SafeValue::Value(value.clone()));
            }
            Err(CompileError::UnsupportedFilterValue(value.to_string()))
        }
        Value::Record(record) => match record.id() {
            Some(id) => Ok(SafeValue::Value(id.clone())),
            None => Err(CompileError::UnsupportedFilterValue(value.to_string())),
        },
        scalar => Ok(SafeValue::Value(scalar.clone())),
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::List(_) | Value::Record(_) | Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathscope_proto::Record;

    fn user(id: i64) -> Value {
        Value::Record(Record::new("user").with_field("id", id))
    }

    #[test]
    fn test_scalars_pass_through() {
        assert_eq!(safe_value(&Value::from("x")).unwrap(), SafeValue::Value(Value::from("x")));
        assert_eq!(safe_value(&Value::Null).unwrap(), SafeValue::Null);
        assert_eq!(safe_value(&Value::List(vec![])).unwrap(), SafeValue::Empty);
        assert_eq!(
            safe_value(&Value::from(vec![1i64, 2])).unwrap(),
            SafeValue::Value(Value::from(vec![1i64, 2]))
        );
    }

    #[test]
    fn test_identities_reduced_to_ids() {
        assert_eq!(safe_value(&user(3)).unwrap(), SafeValue::Value(Value::Int64(3)));
        assert_eq!(
            safe_value(&Value::List(vec![user(1), user(2)])).unwrap(),
            SafeValue::Value(Value::from(vec![1i64, 2]))
        );
    }

    #[test]
    fn test_mixed_list_rejected() {
        let mixed = Value::List(vec![user(1), Value::from("x")]);
        assert!(matches!(
            safe_value(&mixed),
            Err(CompileError::UnsupportedFilterValue(_))
        ));

        let anonymous = Value::Record(Record::map().with_field("name", "x"));
        assert!(safe_value(&anonymous).is_err());
    }

    #[test]
    fn test_empty_list_filters() {
        assert_eq!(
            SafeValue::Empty.filter("root", "id", Operator::Eq),
            FilterAtom::EmptySet
        );
        assert_eq!(
            SafeValue::Empty.filter("root", "id", Operator::In),
            FilterAtom::EmptySet
        );
        assert_eq!(
            SafeValue::Empty.filter("root", "id", Operator::NotIn),
            FilterAtom::always()
        );
    }
}
