//! Request-scoped memoization of relation loads.

use std::collections::HashMap;
use std::time::Instant;

use pathscope_proto::Value;
use tracing::trace;

use crate::config::LoadBudget;
use crate::error::{EvalError, EvalResult};

/// Key of one relation edge of one instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelationKey {
    /// Owning entity.
    pub entity: String,
    /// Canonical form of the owner's identity.
    pub identity: String,
    /// Relation name.
    pub relation: String,
}

impl RelationKey {
    /// Build a key from an owner's identity value.
    pub fn new(entity: &str, identity: &Value, relation: &str) -> Self {
        Self {
            entity: entity.to_string(),
            identity: canonical_identity(identity),
            relation: relation.to_string(),
        }
    }
}

/// Identities that compare equal map to the same string (`1i32` and `1i64`).
fn canonical_identity(identity: &Value) -> String {
    match identity {
        Value::Int32(_) | Value::Int64(_) => format!("i:{}", identity.as_i64().unwrap_or_default()),
        Value::String(s) => format!("s:{}", s),
        other => format!("v:{:?}", other),
    }
}

/// Caller-owned cache of loaded relations for one evaluation.
///
/// Create one per request and drop it afterwards; it also tracks how many
/// loads were performed and when the evaluation started, which is what the
/// [`LoadBudget`] is checked against.
#[derive(Debug)]
pub struct RelationCache {
    entries: HashMap<RelationKey, Value>,
    loads: usize,
    started: Instant,
}

impl Default for RelationCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RelationCache {
    /// Create an empty cache; the evaluation clock starts now.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            loads: 0,
            started: Instant::now(),
        }
    }

    /// Get a cached relation.
    pub fn get(&self, key: &RelationKey) -> Option<&Value> {
        let hit = self.entries.get(key);
        if hit.is_some() {
            trace!(entity = %key.entity, relation = %key.relation, "Relation cache hit");
        }
        hit
    }

    /// Store a loaded relation.
    pub fn insert(&mut self, key: RelationKey, value: Value) {
        self.entries.insert(key, value);
    }

    /// Number of cached relation edges.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of loads charged so far.
    pub fn loads(&self) -> usize {
        self.loads
    }

    /// Charge one load against the budget.
    pub(crate) fn charge(&mut self, budget: &LoadBudget) -> EvalResult<()> {
        if let Some(max) = budget.max_loads {
            if self.loads >= max {
                return Err(EvalError::LoadBudgetExceeded(max));
            }
        }
        if let Some(deadline) = budget.deadline {
            let elapsed = self.started.elapsed();
            if elapsed > deadline {
                return Err(EvalError::DeadlineExceeded {
                    elapsed_ms: elapsed.as_millis() as u64,
                });
            }
        }
        self.loads += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_key_canonicalizes_integers() {
        let a = RelationKey::new("post", &Value::Int32(1), "user");
        let b = RelationKey::new("post", &Value::Int64(1), "user");
        assert_eq!(a, b);

        let c = RelationKey::new("post", &Value::from("1"), "user");
        assert_ne!(a, c);
    }

    #[test]
    fn test_insert_and_get() {
        let mut cache = RelationCache::new();
        let key = RelationKey::new("post", &Value::Int64(1), "user");
        assert!(cache.get(&key).is_none());

        cache.insert(key.clone(), Value::Null);
        assert_eq!(cache.get(&key), Some(&Value::Null));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_charge_load_limit() {
        let mut cache = RelationCache::new();
        let budget = LoadBudget::unlimited().max_loads(2);

        cache.charge(&budget).unwrap();
        cache.charge(&budget).unwrap();
        assert!(matches!(
            cache.charge(&budget),
            Err(EvalError::LoadBudgetExceeded(2))
        ));
        assert_eq!(cache.loads(), 2);
    }

    #[test]
    fn test_charge_deadline() {
        let mut cache = RelationCache::new();
        let budget = LoadBudget::unlimited().deadline(Duration::ZERO);
        std::thread::sleep(Duration::from_millis(2));
        assert!(matches!(
            cache.charge(&budget),
            Err(EvalError::DeadlineExceeded { .. })
        ));
    }
}
