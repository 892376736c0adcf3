//! Path expressions over the entity relationship graph.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Surface token for the wildcard ascend step.
pub const WILDCARD_TOKEN: &str = "**";

/// One step of a path expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathStep {
    /// A field name (attribute or relation), with an optional binding alias
    /// override for the join this step introduces.
    Name {
        /// Field name.
        name: String,
        /// Binding alias override.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alias: Option<String>,
    },
    /// Reach a named ancestor via the shortest relation chain (`**`).
    Wildcard,
    /// Assert that the current entity is the named one.
    SelfRef(String),
    /// Alternative sub-paths evaluated independently (fan-out).
    Alternatives(Vec<Path>),
}

impl PathStep {
    /// Create a name step.
    pub fn name(name: impl Into<String>) -> Self {
        PathStep::Name {
            name: name.into(),
            alias: None,
        }
    }

    /// Create a name step with a binding alias override.
    pub fn aliased(name: impl Into<String>, alias: impl Into<String>) -> Self {
        PathStep::Name {
            name: name.into(),
            alias: Some(alias.into()),
        }
    }

    /// The field name, for name steps.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            PathStep::Name { name, .. } => Some(name),
            _ => None,
        }
    }

    /// The binding alias override, for name steps.
    pub fn alias(&self) -> Option<&str> {
        match self {
            PathStep::Name { alias, .. } => alias.as_deref(),
            _ => None,
        }
    }
}

impl std::fmt::Display for PathStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathStep::Name { name, alias: None } => write!(f, "{}", name),
            PathStep::Name {
                name,
                alias: Some(alias),
            } => write!(f, "{} as {}", name, alias),
            PathStep::Wildcard => write!(f, "{}", WILDCARD_TOKEN),
            PathStep::SelfRef(name) => write!(f, "self({})", name),
            PathStep::Alternatives(paths) => {
                write!(f, "(")?;
                for (i, path) in paths.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", path)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// An ordered sequence of path steps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path {
    /// Steps in traversal order.
    pub steps: Vec<PathStep>,
}

impl Path {
    /// Create a path from steps.
    pub fn new(steps: Vec<PathStep>) -> Self {
        Self { steps }
    }

    /// The empty path (addresses the context itself).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a path of plain name steps.
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            steps: names.into_iter().map(PathStep::name).collect(),
        }
    }

    /// Parse a dotted path such as `**.user.name`.
    ///
    /// Only plain names and the wildcard token are recognised; alternatives and
    /// alias overrides have to be built programmatically.
    pub fn parse(dotted: &str) -> Result<Self, Error> {
        if dotted.is_empty() {
            return Ok(Self::empty());
        }
        let mut steps = Vec::new();
        for segment in dotted.split('.') {
            let segment = segment.trim();
            if segment.is_empty() {
                return Err(Error::InvalidPath(format!("empty segment in {:?}", dotted)));
            }
            if segment == WILDCARD_TOKEN {
                steps.push(PathStep::Wildcard);
            } else {
                steps.push(PathStep::name(segment));
            }
        }
        Ok(Self { steps })
    }

    /// Append a step.
    pub fn then(mut self, step: PathStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if the path has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl From<Vec<PathStep>> for Path {
    fn from(steps: Vec<PathStep>) -> Self {
        Self { steps }
    }
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", step)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dotted() {
        let path = Path::parse("**.user.name").unwrap();
        assert_eq!(
            path.steps,
            vec![
                PathStep::Wildcard,
                PathStep::name("user"),
                PathStep::name("name")
            ]
        );
        assert_eq!(path.to_string(), "**.user.name");
    }

    #[test]
    fn test_parse_empty_segment() {
        assert!(Path::parse("post..user").is_err());
        assert!(Path::parse("").unwrap().is_empty());
    }

    #[test]
    fn test_alias_override() {
        let step = PathStep::aliased("post", "p");
        assert_eq!(step.as_name(), Some("post"));
        assert_eq!(step.alias(), Some("p"));
        assert_eq!(step.to_string(), "post as p");
    }

    #[test]
    fn test_json_form() {
        let json = serde_json::json!([
            "wildcard",
            {"name": {"name": "user"}},
            {"self_ref": "user"}
        ]);
        let path: Path = serde_json::from_value(json).unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path.steps[2], PathStep::SelfRef("user".into()));
    }
}
