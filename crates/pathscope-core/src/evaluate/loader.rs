//! Relation loading from storage.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use pathscope_proto::{Record, Value};

use crate::catalog::FieldMetadata;
use crate::compare::Comparator;
use crate::error::LoadError;

/// Loads a relation of an already-materialized instance.
///
/// Implementations talk to the storage layer. A belongs-to load returns the
/// parent record or `Value::Null`; a has-many load returns a list of records.
pub trait RelationLoader {
    /// Load relation `name` (described by `field`) of `owner`.
    fn load(
        &self,
        owner: &Record,
        name: &str,
        field: &FieldMetadata<'_>,
    ) -> Result<Value, LoadError>;
}

/// In-memory record store.
///
/// Records are kept per entity and hold their foreign keys under the
/// relation's column name. Every load is counted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: HashMap<String, Vec<Record>>,
    failing: HashSet<(String, String)>,
    loads: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record under its entity.
    ///
    /// Records without an entity name are ignored.
    pub fn insert(&mut self, record: Record) {
        if let Some(entity) = record.entity.clone() {
            self.tables.entry(entity).or_default().push(record);
        }
    }

    /// Insert a record, builder style.
    pub fn with_record(mut self, record: Record) -> Self {
        self.insert(record);
        self
    }

    /// Make loads of `entity.relation` fail, simulating a storage error.
    pub fn fail_on(mut self, entity: impl Into<String>, relation: impl Into<String>) -> Self {
        self.failing.insert((entity.into(), relation.into()));
        self
    }

    /// Records of an entity.
    pub fn records(&self, entity: &str) -> &[Record] {
        self.tables.get(entity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Find a record by identity.
    pub fn find(&self, entity: &str, id: &Value) -> Option<&Record> {
        self.records(entity)
            .iter()
            .find(|r| r.id().is_some_and(|rid| Comparator::equals(rid, id)))
    }

    /// Number of loads served so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

impl RelationLoader for MemoryStore {
    fn load(
        &self,
        owner: &Record,
        name: &str,
        field: &FieldMetadata<'_>,
    ) -> Result<Value, LoadError> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        let entity = owner.entity().unwrap_or_default();

        if self.failing.contains(&(entity.to_string(), name.to_string())) {
            return Err(LoadError::new(entity, name, "simulated storage failure"));
        }

        match field {
            FieldMetadata::BelongsTo { column, target, .. } => {
                let parent = owner
                    .get(column)
                    .filter(|fk| !fk.is_null())
                    .and_then(|fk| self.find(&target.name, fk));
                Ok(parent.cloned().map(Value::Record).unwrap_or(Value::Null))
            }
            FieldMetadata::HasMany {
                target,
                foreign_key,
                ..
            } => {
                let Some(id) = owner.id() else {
                    return Ok(Value::List(Vec::new()));
                };
                let children = self
                    .records(&target.name)
                    .iter()
                    .filter(|child| child.get(foreign_key).is_some_and(|fk| Comparator::equals(fk, id)))
                    .cloned()
                    .map(Value::Record)
                    .collect();
                Ok(Value::List(children))
            }
            FieldMetadata::Attribute { .. } | FieldMetadata::Unknown => Err(LoadError::new(
                entity,
                name,
                "not a relation",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::blog_schema;

    fn store() -> MemoryStore {
        MemoryStore::new()
            .with_record(Record::new("user").with_field("id", 1i64).with_field("name", "A"))
            .with_record(Record::new("post").with_field("id", 10i64).with_field("user_id", 1i64))
            .with_record(Record::new("post").with_field("id", 11i64).with_field("user_id", 1i64))
            .with_record(Record::new("post").with_field("id", 12i64).with_field("user_id", 2i64))
    }

    #[test]
    fn test_load_belongs_to() {
        let schema = blog_schema();
        let store = store();
        let post_meta = schema.entity("post").unwrap();
        let post = store.find("post", &Value::Int64(10)).unwrap().clone();

        let user = store.load(&post, "user", &schema.field(post_meta, "user")).unwrap();
        assert_eq!(user.identity(), Some(&Value::Int64(1)));
        assert_eq!(store.load_count(), 1);
    }

    #[test]
    fn test_load_belongs_to_missing_parent() {
        let schema = blog_schema();
        let store = store();
        let post_meta = schema.entity("post").unwrap();
        let orphan = store.find("post", &Value::Int64(12)).unwrap().clone();

        let user = store.load(&orphan, "user", &schema.field(post_meta, "user")).unwrap();
        assert!(user.is_null());
    }

    #[test]
    fn test_load_has_many() {
        let schema = blog_schema();
        let store = store();
        let user_meta = schema.entity("user").unwrap();
        let user = store.find("user", &Value::Int64(1)).unwrap().clone();

        let posts = store.load(&user, "posts", &schema.field(user_meta, "posts")).unwrap();
        assert_eq!(posts.as_list().map(<[Value]>::len), Some(2));
    }

    #[test]
    fn test_failing_relation() {
        let schema = blog_schema();
        let store = store().fail_on("post", "user");
        let post_meta = schema.entity("post").unwrap();
        let post = store.find("post", &Value::Int64(10)).unwrap().clone();

        let err = store
            .load(&post, "user", &schema.field(post_meta, "user"))
            .unwrap_err();
        assert_eq!(err.relation, "user");
    }
}
