//! Path search over the entity graph.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use super::{EntityGraph, VertexId};

impl EntityGraph {
    /// Resolve the cheapest chain of field names from `from_entity` to a field
    /// called `field_name`.
    ///
    /// Returns `Some(vec![])` when `field_name` is the entity's own name and
    /// `None` when no vertex of that name is reachable. The returned names are
    /// the relation (and, last, attribute) vertices on the path; entity
    /// vertices are stripped.
    ///
    /// Equally weighted paths are decided by insertion order, which follows
    /// schema declaration order. That tie-break is not a contract.
    pub fn shortest_path(&self, from_entity: &str, field_name: &str) -> Option<Vec<String>> {
        if from_entity == field_name {
            return Some(Vec::new());
        }

        let source = self.entity_vertex(from_entity)?;
        let (dist, parent) = self.dijkstra(source);

        let cheapest = |candidates: &[VertexId]| {
            candidates
                .iter()
                .copied()
                .filter(|&c| dist[c] != u32::MAX)
                .min_by_key(|&c| dist[c])
        };
        let target = cheapest(self.relation_candidates(field_name))
            .or_else(|| cheapest(self.attribute_candidates(field_name)))?;

        let mut chain = vec![target];
        let mut node = target;
        while let Some(p) = parent[node] {
            chain.push(p);
            node = p;
        }
        chain.reverse();

        Some(self.names_on(&chain))
    }

    /// Enumerate every simple path from `from_entity` to a field called
    /// `field_name`, shortest first.
    pub fn all_paths(&self, from_entity: &str, field_name: &str) -> Vec<Vec<String>> {
        if from_entity == field_name {
            return vec![Vec::new()];
        }

        let Some(source) = self.entity_vertex(from_entity) else {
            return Vec::new();
        };
        let targets: HashSet<VertexId> = self.reachable_targets(source, field_name);
        if targets.is_empty() {
            return Vec::new();
        }

        let mut results = Vec::new();
        let mut current_path = vec![source];
        let mut visited = HashSet::new();
        visited.insert(source);

        self.dfs_all_paths(
            source,
            &targets,
            &mut visited,
            &mut current_path,
            &mut results,
        );

        let mut paths: Vec<Vec<String>> = results.iter().map(|p| self.names_on(p)).collect();
        paths.sort_by_key(Vec::len);
        paths
    }

    /// Vertices a field name resolves to from `source`.
    ///
    /// Parent relations take precedence over attributes, but only among the
    /// vertices `source` can reach.
    fn reachable_targets(&self, source: VertexId, field_name: &str) -> HashSet<VertexId> {
        let (dist, _) = self.dijkstra(source);
        let reachable = |candidates: &[VertexId]| -> HashSet<VertexId> {
            candidates
                .iter()
                .copied()
                .filter(|&c| dist[c] != u32::MAX)
                .collect()
        };
        let relations = reachable(self.relation_candidates(field_name));
        if relations.is_empty() {
            reachable(self.attribute_candidates(field_name))
        } else {
            relations
        }
    }

    fn dfs_all_paths(
        &self,
        current: VertexId,
        targets: &HashSet<VertexId>,
        visited: &mut HashSet<VertexId>,
        current_path: &mut Vec<VertexId>,
        results: &mut Vec<Vec<VertexId>>,
    ) {
        if targets.contains(&current) {
            results.push(current_path.clone());
        }

        for edge in self.edges_from(current) {
            if visited.insert(edge.to) {
                current_path.push(edge.to);
                self.dfs_all_paths(edge.to, targets, visited, current_path, results);
                current_path.pop();
                visited.remove(&edge.to);
            }
        }
    }

    /// Single-source Dijkstra. Unreachable vertices keep `u32::MAX`.
    ///
    /// A parent is only replaced on a strictly cheaper path, so the first path
    /// found at a given cost wins.
    fn dijkstra(&self, source: VertexId) -> (Vec<u32>, Vec<Option<VertexId>>) {
        let n = self.vertex_count();
        let mut dist = vec![u32::MAX; n];
        let mut parent: Vec<Option<VertexId>> = vec![None; n];
        let mut heap = BinaryHeap::new();

        dist[source] = 0;
        heap.push(Reverse((0u32, source)));

        while let Some(Reverse((cost, vertex))) = heap.pop() {
            if cost > dist[vertex] {
                continue;
            }

            for edge in self.edges_from(vertex) {
                let next_cost = cost.saturating_add(edge.weight);
                if next_cost < dist[edge.to] {
                    dist[edge.to] = next_cost;
                    parent[edge.to] = Some(vertex);
                    heap.push(Reverse((next_cost, edge.to)));
                }
            }
        }

        (dist, parent)
    }

    fn names_on(&self, chain: &[VertexId]) -> Vec<String> {
        chain
            .iter()
            .filter_map(|&id| self.vertex(id))
            .filter(|v| !v.is_entity())
            .map(|v| v.name().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::{AttributeDef, EntityMetadata, RelationDef, ScalarType, Schema};
    use crate::graph::tests::blog_schema;
    use crate::graph::EntityGraph;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_own_attribute_is_direct() {
        let schema = blog_schema();
        let graph = EntityGraph::build(&schema);

        for entity in schema.entities() {
            for attribute in &entity.attributes {
                assert_eq!(
                    graph.shortest_path(&entity.name, &attribute.name),
                    Some(vec![attribute.name.clone()])
                );
            }
        }
    }

    #[test]
    fn test_self_reference_is_empty() {
        let graph = EntityGraph::build(&blog_schema());
        assert_eq!(graph.shortest_path("comment", "comment"), Some(vec![]));
    }

    #[test]
    fn test_unresolved_is_none() {
        let graph = EntityGraph::build(&blog_schema());
        assert_eq!(graph.shortest_path("comment", "nope"), None);
        // Reachability is directed: a user has no path to a post's title.
        assert_eq!(graph.shortest_path("user", "title"), None);
        assert_eq!(graph.shortest_path("unknown", "name"), None);
    }

    #[test]
    fn test_ancestor_relation() {
        let graph = EntityGraph::build(&blog_schema());
        assert_eq!(
            graph.shortest_path("comment", "user"),
            Some(names(&["post", "user"]))
        );
    }

    #[test]
    fn test_equal_weight_chains_reach_field() {
        let graph = EntityGraph::build(&blog_schema());
        // comment -> editor -> user costs 2, comment -> post -> user costs 2 as
        // well; the post chain is declared first. Both reach user.name.
        let path = graph.shortest_path("comment", "name").unwrap();
        assert_eq!(path.last().map(String::as_str), Some("name"));
        assert!(path == names(&["post", "user", "name"]) || path == names(&["editor", "name"]));
    }

    #[test]
    fn test_required_beats_optional_at_same_hops() {
        let org = EntityMetadata::new("org")
            .with_attribute(AttributeDef::new("plan", ScalarType::String));
        let team = EntityMetadata::new("team")
            .with_relation(RelationDef::belongs_to("org", "org").optional())
            .with_relation(RelationDef::belongs_to("billing_org", "org"));
        let schema = Schema::new(vec![org, team]).unwrap();
        let graph = EntityGraph::build(&schema);

        assert_eq!(
            graph.shortest_path("team", "plan"),
            Some(names(&["billing_org", "plan"]))
        );
    }

    #[test]
    fn test_own_attribute_shadowed_by_foreign_relation_name() {
        let user = EntityMetadata::new("user")
            .with_attribute(AttributeDef::new("name", ScalarType::String));
        let audit = EntityMetadata::new("audit")
            .with_attribute(AttributeDef::new("user", ScalarType::String));
        let post = EntityMetadata::new("post").with_relation(RelationDef::belongs_to("user", "user"));
        let schema = Schema::new(vec![user, audit, post]).unwrap();
        let graph = EntityGraph::build(&schema);

        assert_eq!(graph.shortest_path("audit", "user"), Some(names(&["user"])));
        assert_eq!(graph.all_paths("audit", "user"), vec![names(&["user"])]);
        // Where the relation is reachable it still wins.
        assert_eq!(graph.shortest_path("post", "user"), Some(names(&["user"])));
        assert_eq!(graph.shortest_path("user", "user"), Some(vec![]));
    }

    #[test]
    fn test_all_paths_sorted_by_length() {
        let graph = EntityGraph::build(&blog_schema());
        let paths = graph.all_paths("comment", "name");

        assert_eq!(
            paths,
            vec![names(&["editor", "name"]), names(&["post", "user", "name"])]
        );
    }

    #[test]
    fn test_all_paths_edge_cases() {
        let graph = EntityGraph::build(&blog_schema());
        assert_eq!(graph.all_paths("post", "post"), vec![Vec::<String>::new()]);
        assert!(graph.all_paths("post", "nope").is_empty());
    }

    #[test]
    fn test_self_referential_parent_terminates() {
        let node = EntityMetadata::new("node")
            .with_attribute(AttributeDef::new("label", ScalarType::String))
            .with_relation(RelationDef::belongs_to("parent", "node").optional());
        let schema = Schema::new(vec![node]).unwrap();
        let graph = EntityGraph::build(&schema);

        assert_eq!(graph.shortest_path("node", "parent"), Some(names(&["parent"])));
        // The cycle back into `node` is not a simple path.
        assert_eq!(graph.all_paths("node", "label"), vec![names(&["label"])]);
    }
}
