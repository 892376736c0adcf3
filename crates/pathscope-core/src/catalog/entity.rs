//! Entity metadata definitions.

use serde::{Deserialize, Serialize};

/// Scalar data types of entity attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    /// Boolean value.
    Bool,
    /// Integer value.
    Integer,
    /// Floating point value.
    Float,
    /// UTF-8 string.
    #[default]
    String,
    /// Timestamp (microseconds since Unix epoch).
    Timestamp,
    /// Identifier (integer or opaque string).
    Id,
}

/// An attribute (plain column) of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDef {
    /// Field name.
    pub name: String,
    /// Data type.
    #[serde(default)]
    pub kind: ScalarType,
    /// Storage column, defaults to the field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

impl AttributeDef {
    /// Create an attribute stored in a column of the same name.
    pub fn new(name: impl Into<String>, kind: ScalarType) -> Self {
        Self {
            name: name.into(),
            kind,
            column: None,
        }
    }

    /// Override the storage column.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// The storage column.
    pub fn column(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }
}

/// Kind of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// The owning entity holds a foreign key to a single parent.
    BelongsTo,
    /// Children hold a foreign key back to the owning entity.
    HasMany,
}

/// A relation from one entity to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDef {
    /// Relation name (unique within the owning entity).
    pub name: String,
    /// Relation kind.
    pub kind: RelationKind,
    /// Foreign key column for belongs-to relations, defaults to `<name>_id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    /// Target entity name.
    pub target: String,
    /// Name of the belongs-to relation on the target that points back here
    /// (has-many relations only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inverse: Option<String>,
    /// Whether the foreign key may be null.
    #[serde(default)]
    pub optional: bool,
}

impl RelationDef {
    /// Create a required belongs-to relation.
    pub fn belongs_to(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: RelationKind::BelongsTo,
            column: None,
            target: target.into(),
            inverse: None,
            optional: false,
        }
    }

    /// Create a has-many relation whose children point back via `inverse`.
    pub fn has_many(
        name: impl Into<String>,
        target: impl Into<String>,
        inverse: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: RelationKind::HasMany,
            column: None,
            target: target.into(),
            inverse: Some(inverse.into()),
            optional: true,
        }
    }

    /// Override the foreign key column.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Mark the relation as optional (nullable foreign key).
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// The foreign key column of a belongs-to relation.
    pub fn foreign_key(&self) -> String {
        match &self.column {
            Some(column) => column.clone(),
            None => format!("{}_id", self.name),
        }
    }
}

fn default_identity() -> String {
    pathscope_proto::IDENTITY_FIELD.to_string()
}

/// Metadata of one entity as supplied by the schema loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMetadata {
    /// Entity name (unique within the schema).
    pub name: String,
    /// Storage table, defaults to the entity name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Identity column.
    #[serde(default = "default_identity")]
    pub identity: String,
    /// Attribute definitions.
    #[serde(default)]
    pub attributes: Vec<AttributeDef>,
    /// Relation definitions.
    #[serde(default)]
    pub relations: Vec<RelationDef>,
}

impl EntityMetadata {
    /// Create an entity with an `id` identity and no fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            identity: default_identity(),
            attributes: Vec::new(),
            relations: Vec::new(),
        }
    }

    /// Override the storage table.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, attribute: AttributeDef) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Add a relation.
    pub fn with_relation(mut self, relation: RelationDef) -> Self {
        self.relations.push(relation);
        self
    }

    /// The storage table.
    pub fn table(&self) -> &str {
        self.table.as_deref().unwrap_or(&self.name)
    }

    /// Get an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Get a relation by name.
    pub fn relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Belongs-to relations in declaration order.
    pub fn parents(&self) -> impl Iterator<Item = &RelationDef> {
        self.relations
            .iter()
            .filter(|r| r.kind == RelationKind::BelongsTo)
    }
}
