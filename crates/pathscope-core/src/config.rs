//! Compiler and evaluator configuration.

use std::collections::HashMap;
use std::time::Duration;

use pathscope_proto::Value;

/// Limits on relation loads performed by one evaluation.
///
/// Wildcard and fan-out paths can trigger many sequential loads against
/// storage; the budget bounds both their number and the wall-clock time an
/// evaluation may spend before its next load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadBudget {
    /// Maximum number of loads. None means unlimited.
    pub max_loads: Option<usize>,
    /// Maximum time since the evaluation started. None means no deadline.
    pub deadline: Option<Duration>,
}

impl Default for LoadBudget {
    fn default() -> Self {
        Self {
            max_loads: Some(10_000),
            deadline: None,
        }
    }
}

impl LoadBudget {
    /// Create an unlimited budget (for internal/testing use).
    pub fn unlimited() -> Self {
        Self {
            max_loads: None,
            deadline: None,
        }
    }

    /// Set the maximum number of loads.
    pub fn max_loads(mut self, max: usize) -> Self {
        self.max_loads = Some(max);
        self
    }

    /// Set the deadline.
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Configuration for scope compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Binding alias of the root entity.
    pub root_alias: String,
    /// Separator between relation names in derived binding aliases.
    pub alias_separator: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            root_alias: "root".to_string(),
            alias_separator: "__".to_string(),
        }
    }
}

impl CompilerConfig {
    /// Set the root alias.
    pub fn root_alias(mut self, alias: impl Into<String>) -> Self {
        self.root_alias = alias.into();
        self
    }

    /// Set the alias separator.
    pub fn alias_separator(mut self, separator: impl Into<String>) -> Self {
        self.alias_separator = separator.into();
        self
    }

    /// Derive the binding alias of a relation joined from `parent`.
    pub fn child_alias(&self, parent: &str, relation: &str) -> String {
        format!("{}{}{}", parent, self.alias_separator, relation)
    }
}

/// Source of application configuration values.
pub trait ConfigSource: Send + Sync {
    /// Look up `key` for `app` in environment `env`.
    fn lookup(&self, app: &str, env: &str, key: &str) -> Option<Value>;
}

/// In-memory configuration.
#[derive(Debug, Clone, Default)]
pub struct MapConfig {
    values: HashMap<(String, String, String), Value>,
}

impl MapConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value.
    pub fn with_value(
        mut self,
        app: impl Into<String>,
        env: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.values
            .insert((app.into(), env.into(), key.into()), value.into());
        self
    }
}

impl ConfigSource for MapConfig {
    fn lookup(&self, app: &str, env: &str, key: &str) -> Option<Value> {
        self.values
            .get(&(app.to_string(), env.to_string(), key.to_string()))
            .cloned()
    }
}

/// Configuration read from process environment variables named
/// `APP_ENV_KEY` (upper-cased). Values are decoded as JSON when possible and
/// kept as strings otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvConfig;

impl EnvConfig {
    /// Environment variable name for a lookup.
    pub fn variable(app: &str, env: &str, key: &str) -> String {
        format!("{}_{}_{}", app, env, key)
            .to_uppercase()
            .replace(['-', '.'], "_")
    }
}

impl ConfigSource for EnvConfig {
    fn lookup(&self, app: &str, env: &str, key: &str) -> Option<Value> {
        let raw = std::env::var(Self::variable(app, env, key)).ok()?;
        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(json) => Some(Value::from(json)),
            Err(_) => Some(Value::String(raw)),
        }
    }
}
