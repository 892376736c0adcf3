//! Entity relationship graph.
//!
//! The graph links every entity to its attributes (weight 0) and to its
//! parents through a relation vertex (weight 1 for required, 2 for optional
//! relations), so that shortest-path search prefers direct, required ancestry.
//! It is built once per schema and never mutated afterwards.

mod resolver;

use std::collections::HashMap;

use tracing::debug;

use crate::catalog::Schema;

/// Weight of the edge into a required parent relation.
pub const REQUIRED_PARENT_WEIGHT: u32 = 1;

/// Weight of the edge into an optional parent relation.
pub const OPTIONAL_PARENT_WEIGHT: u32 = 2;

/// Index of a vertex within the graph.
pub type VertexId = usize;

/// A vertex of the entity graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Vertex {
    /// An entity.
    Entity(String),
    /// An attribute owned by an entity.
    Attribute {
        /// Owning entity.
        entity: String,
        /// Attribute name.
        name: String,
    },
    /// A belongs-to relation owned by an entity.
    ParentRelation {
        /// Owning entity.
        entity: String,
        /// Relation name.
        name: String,
    },
}

impl Vertex {
    /// The name a path step uses for this vertex.
    pub fn name(&self) -> &str {
        match self {
            Vertex::Entity(name) => name,
            Vertex::Attribute { name, .. } | Vertex::ParentRelation { name, .. } => name,
        }
    }

    /// Check if this is an entity vertex.
    pub fn is_entity(&self) -> bool {
        matches!(self, Vertex::Entity(_))
    }
}

impl std::fmt::Display for Vertex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Vertex::Entity(name) => write!(f, "{}", name),
            Vertex::Attribute { entity, name } => write!(f, "{}.{}", entity, name),
            Vertex::ParentRelation { entity, name } => write!(f, "{}->{}", entity, name),
        }
    }
}

/// A weighted, directed edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    /// Target vertex.
    pub to: VertexId,
    /// Edge weight.
    pub weight: u32,
}

/// Immutable weighted graph of entities, attributes and parent relations.
#[derive(Debug, Clone, Default)]
pub struct EntityGraph {
    vertices: Vec<Vertex>,
    index: HashMap<Vertex, VertexId>,
    edges: Vec<Vec<Edge>>,
    /// Parent relation vertices by relation name, in insertion order.
    parents_by_name: HashMap<String, Vec<VertexId>>,
    /// Attribute vertices by attribute name, in insertion order.
    attributes_by_name: HashMap<String, Vec<VertexId>>,
}

impl EntityGraph {
    /// Build the graph for a schema.
    ///
    /// Vertices and edges are inserted in schema declaration order; that order
    /// is what breaks ties between equally weighted paths.
    pub fn build(schema: &Schema) -> Self {
        let mut graph = Self::default();

        for entity in schema.entities() {
            graph.add_vertex(Vertex::Entity(entity.name.clone()));
        }

        for entity in schema.entities() {
            let owner = graph.add_vertex(Vertex::Entity(entity.name.clone()));

            let identity_declared = entity.attribute(&entity.identity).is_some();
            let identity = (!identity_declared).then(|| entity.identity.clone());
            let attribute_names = identity
                .into_iter()
                .chain(entity.attributes.iter().map(|a| a.name.clone()));

            for name in attribute_names {
                let vertex = graph.add_vertex(Vertex::Attribute {
                    entity: entity.name.clone(),
                    name: name.clone(),
                });
                graph.add_edge(owner, vertex, 0);
                graph.attributes_by_name.entry(name).or_default().push(vertex);
            }

            for relation in entity.parents() {
                let vertex = graph.add_vertex(Vertex::ParentRelation {
                    entity: entity.name.clone(),
                    name: relation.name.clone(),
                });
                let weight = if relation.optional {
                    OPTIONAL_PARENT_WEIGHT
                } else {
                    REQUIRED_PARENT_WEIGHT
                };
                let target = graph.add_vertex(Vertex::Entity(relation.target.clone()));
                graph.add_edge(owner, vertex, weight);
                graph.add_edge(vertex, target, 0);
                graph
                    .parents_by_name
                    .entry(relation.name.clone())
                    .or_default()
                    .push(vertex);
            }
        }

        debug!(
            vertices = graph.vertex_count(),
            edges = graph.edge_count(),
            "Entity graph built"
        );

        graph
    }

    fn add_vertex(&mut self, vertex: Vertex) -> VertexId {
        if let Some(&id) = self.index.get(&vertex) {
            return id;
        }
        let id = self.vertices.len();
        self.index.insert(vertex.clone(), id);
        self.vertices.push(vertex);
        self.edges.push(Vec::new());
        id
    }

    fn add_edge(&mut self, from: VertexId, to: VertexId, weight: u32) {
        self.edges[from].push(Edge { to, weight });
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.iter().map(Vec::len).sum()
    }

    /// All vertices in insertion order.
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Get a vertex by id.
    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(id)
    }

    /// Outgoing edges of a vertex.
    pub fn edges_from(&self, id: VertexId) -> &[Edge] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The vertex of an entity.
    pub fn entity_vertex(&self, name: &str) -> Option<VertexId> {
        self.index.get(&Vertex::Entity(name.to_string())).copied()
    }

    /// Parent relation vertices called `field_name`.
    pub(crate) fn relation_candidates(&self, field_name: &str) -> &[VertexId] {
        self.parents_by_name
            .get(field_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Attribute vertices called `field_name`.
    pub(crate) fn attribute_candidates(&self, field_name: &str) -> &[VertexId] {
        self.attributes_by_name
            .get(field_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
