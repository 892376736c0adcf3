//! Runtime value types for policy parameters and loaded entities.

use serde::{Deserialize, Serialize};

/// Field name that carries the identity of a record.
pub const IDENTITY_FIELD: &str = "id";

/// JSON key naming the entity of a typed record.
pub const ENTITY_KEY: &str = "__entity";

/// A runtime value handed to the compiler or the evaluator.
///
/// Values cover scalar filter parameters as well as already-loaded object
/// graphs: a [`Record`] is either a typed entity instance (it names its entity)
/// or a plain keyed map.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum Value {
    /// Null value.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit floating point.
    Float64(f64),
    /// UTF-8 string.
    String(String),
    /// Timestamp as microseconds since Unix epoch.
    Timestamp(i64),
    /// Ordered list of values.
    List(Vec<Value>),
    /// Entity instance or plain map.
    Record(Record),
}

/// A keyed collection of field values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    /// Entity name, `None` for plain maps.
    pub entity: Option<String>,
    /// Field values in insertion order.
    pub fields: Vec<(String, Value)>,
}

impl Record {
    /// Create a typed entity instance.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: Some(entity.into()),
            fields: Vec::new(),
        }
    }

    /// Create a plain map without entity type.
    pub fn map() -> Self {
        Self::default()
    }

    /// Add or replace a field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a field, replacing an existing value of the same name.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Get a field value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Check whether the field is present (even if null).
    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n == name)
    }

    /// Entity name, if this is a typed instance.
    pub fn entity(&self) -> Option<&str> {
        self.entity.as_deref()
    }

    /// The identity value, if present and not null.
    pub fn id(&self) -> Option<&Value> {
        self.get(IDENTITY_FIELD).filter(|v| !v.is_null())
    }
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this value is a list.
    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(i) => Some(*i),
            Value::Int32(i) => Some(*i as i64),
            _ => None,
        }
    }

    /// Try to get as f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(f) => Some(*f),
            Value::Int64(i) => Some(*i as f64),
            Value::Int32(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as list slice.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Try to get as record reference.
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    /// The identity of an identity-bearing value (a record exposing `id`).
    pub fn identity(&self) -> Option<&Value> {
        self.as_record().and_then(Record::id)
    }

    /// The identity if this value bears one, otherwise the value itself.
    pub fn identity_or_self(&self) -> &Value {
        self.identity().unwrap_or(self)
    }

    /// Flatten a value into a list: lists are returned as-is, null becomes
    /// empty, anything else becomes a single-element list.
    pub fn into_list(self) -> Vec<Value> {
        match self {
            Value::List(items) => items,
            Value::Null => Vec::new(),
            other => vec![other],
        }
    }
}

// Conversion implementations
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::Record(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int64(i),
                None => Value::Float64(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                let mut record = Record::map();
                for (key, value) in map {
                    if key == ENTITY_KEY {
                        record.entity = value.as_str().map(str::to_string);
                        continue;
                    }
                    record.fields.push((key, Value::from(value)));
                }
                Value::Record(record)
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int32(i) => serde_json::Value::from(i),
            Value::Int64(i) | Value::Timestamp(i) => serde_json::Value::from(i),
            Value::Float64(f) => serde_json::Value::from(f),
            Value::String(s) => serde_json::Value::String(s),
            Value::List(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            Value::Record(record) => {
                let mut map = serde_json::Map::new();
                if let Some(entity) = record.entity {
                    map.insert(ENTITY_KEY.to_string(), serde_json::Value::String(entity));
                }
                for (key, value) in record.fields {
                    map.insert(key, value.into());
                }
                serde_json::Value::Object(map)
            }
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int32(i) => write!(f, "{}", i),
            Value::Int64(i) => write!(f, "{}", i),
            Value::Float64(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Timestamp(t) => write!(f, "@{}", t),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Record(record) => match (record.entity(), record.id()) {
                (Some(entity), Some(id)) => write!(f, "{}({})", entity, id),
                (Some(entity), None) => write!(f, "{}(?)", entity),
                (None, _) => write!(f, "{{{} fields}}", record.fields.len()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_identity() {
        let user = Record::new("user").with_field("id", 1i64).with_field("name", "A");
        assert_eq!(user.id(), Some(&Value::Int64(1)));
        assert_eq!(user.get("name"), Some(&Value::from("A")));
        assert_eq!(user.entity(), Some("user"));

        let anonymous = Record::map().with_field("id", Value::Null);
        assert!(anonymous.id().is_none());
    }

    #[test]
    fn test_identity_or_self() {
        let user = Value::from(Record::new("user").with_field("id", "u1"));
        assert_eq!(user.identity_or_self(), &Value::from("u1"));
        assert_eq!(Value::from(5i64).identity_or_self(), &Value::Int64(5));
    }

    #[test]
    fn test_set_replaces_field() {
        let mut record = Record::new("post").with_field("title", "a");
        record.set("title", "b");
        assert_eq!(record.fields.len(), 1);
        assert_eq!(record.get("title"), Some(&Value::from("b")));
    }

    #[test]
    fn test_json_typed_record() {
        let json = serde_json::json!({"__entity": "user", "id": 7, "tags": ["a", "b"]});
        let value = Value::from(json.clone());

        let record = value.as_record().unwrap();
        assert_eq!(record.entity(), Some("user"));
        assert_eq!(record.id(), Some(&Value::Int64(7)));
        assert_eq!(
            record.get("tags"),
            Some(&Value::List(vec!["a".into(), "b".into()]))
        );
        assert_eq!(serde_json::Value::from(value), json);
    }

    #[test]
    fn test_into_list() {
        assert!(Value::Null.into_list().is_empty());
        assert_eq!(Value::from(1i64).into_list(), vec![Value::Int64(1)]);
        assert_eq!(Value::from(vec![1i64, 2]).into_list().len(), 2);
    }

    #[test]
    fn test_display() {
        let user = Value::from(Record::new("user").with_field("id", 3i64));
        assert_eq!(user.to_string(), "user(3)");
        assert_eq!(Value::from(vec!["x"]).to_string(), "[\"x\"]");
    }
}
