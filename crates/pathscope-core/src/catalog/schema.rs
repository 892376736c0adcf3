//! Schema - the validated set of entity metadata.

use std::collections::HashMap;

use super::entity::{EntityMetadata, RelationKind};
use crate::error::{CatalogError, CatalogResult};

/// What a field name denotes on a given entity.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldMetadata<'a> {
    /// A plain column.
    Attribute {
        /// Storage column.
        column: &'a str,
    },
    /// A foreign key to a single parent.
    BelongsTo {
        /// Foreign key column on the owning entity.
        column: String,
        /// Parent entity.
        target: &'a EntityMetadata,
        /// Whether the foreign key may be null.
        optional: bool,
    },
    /// Children pointing back to the owning entity.
    HasMany {
        /// Child entity.
        target: &'a EntityMetadata,
        /// Name of the belongs-to relation on the child.
        inverse: &'a str,
        /// Foreign key column on the child.
        foreign_key: String,
    },
    /// The name is not a field of the entity.
    Unknown,
}

impl FieldMetadata<'_> {
    /// Check if the field is a relation.
    pub fn is_relation(&self) -> bool {
        matches!(
            self,
            FieldMetadata::BelongsTo { .. } | FieldMetadata::HasMany { .. }
        )
    }
}

/// Immutable, validated schema metadata.
///
/// Entities keep their declaration order, which is the order the entity graph
/// inserts vertices in.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    entities: Vec<EntityMetadata>,
    index: HashMap<String, usize>,
}

impl Schema {
    /// Build a schema, checking that entity names are unique and every
    /// relation targets a declared entity.
    pub fn new(entities: Vec<EntityMetadata>) -> CatalogResult<Self> {
        let mut index = HashMap::with_capacity(entities.len());
        for (position, entity) in entities.iter().enumerate() {
            if index.insert(entity.name.clone(), position).is_some() {
                return Err(CatalogError::DuplicateEntity(entity.name.clone()));
            }
        }

        for entity in &entities {
            for relation in &entity.relations {
                if !index.contains_key(&relation.target) {
                    return Err(CatalogError::UnknownTarget {
                        entity: entity.name.clone(),
                        relation: relation.name.clone(),
                        target: relation.target.clone(),
                    });
                }
            }
        }

        Ok(Self { entities, index })
    }

    /// Decode a JSON array of entity metadata.
    pub fn from_json(json: &str) -> CatalogResult<Self> {
        let entities: Vec<EntityMetadata> = serde_json::from_str(json)?;
        Self::new(entities)
    }

    /// Get an entity by name.
    pub fn entity(&self, name: &str) -> Option<&EntityMetadata> {
        self.index.get(name).map(|&i| &self.entities[i])
    }

    /// Get an entity by name or fail.
    pub fn require(&self, name: &str) -> CatalogResult<&EntityMetadata> {
        self.entity(name)
            .ok_or_else(|| CatalogError::UnknownEntity(name.to_string()))
    }

    /// All entities in declaration order.
    pub fn entities(&self) -> &[EntityMetadata] {
        &self.entities
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if the schema has no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Classify a field name on an entity.
    ///
    /// Relations are looked up before attributes; names are assumed unique
    /// within an entity.
    pub fn field<'a>(&'a self, entity: &'a EntityMetadata, name: &str) -> FieldMetadata<'a> {
        if let Some(relation) = entity.relation(name) {
            let Some(target) = self.entity(&relation.target) else {
                return FieldMetadata::Unknown;
            };
            return match relation.kind {
                RelationKind::BelongsTo => FieldMetadata::BelongsTo {
                    column: relation.foreign_key(),
                    target,
                    optional: relation.optional,
                },
                RelationKind::HasMany => {
                    let inverse = relation.inverse.as_deref().unwrap_or(&entity.name);
                    let foreign_key = match target.relation(inverse) {
                        Some(back) if back.kind == RelationKind::BelongsTo => back.foreign_key(),
                        _ => format!("{}_id", entity.name),
                    };
                    FieldMetadata::HasMany {
                        target,
                        inverse,
                        foreign_key,
                    }
                }
            };
        }

        match entity.attribute(name) {
            Some(attribute) => FieldMetadata::Attribute {
                column: attribute.column(),
            },
            None if name == entity.identity => FieldMetadata::Attribute {
                column: &entity.identity,
            },
            None => FieldMetadata::Unknown,
        }
    }
}
