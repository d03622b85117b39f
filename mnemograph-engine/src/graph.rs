//! Typed relationship edges and bounded graph traversal

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use uuid::Uuid;

/// Unique identifier for edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub Uuid);

impl EdgeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for EdgeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Relationship type linking consecutive chunks of one record
pub const FOLLOWS_UP: &str = "follows_up";

/// Relationship type linking a new record version to the one it replaces
pub const VERSION_OF: &str = "version_of";

/// A typed, weighted, directed relation between two stored nodes
///
/// Endpoints are raw ids so record-to-record and chunk-to-chunk links share
/// one edge set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEdge {
    pub id: EdgeId,
    pub source_id: Uuid,
    pub target_id: Uuid,
    pub relationship: String,
    pub weight: f32,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl MemoryEdge {
    /// Create an edge with the default weight of 1.0
    pub fn new(source_id: Uuid, target_id: Uuid, relationship: impl Into<String>) -> Self {
        Self {
            id: EdgeId::new(),
            source_id,
            target_id,
            relationship: relationship.into(),
            weight: 1.0,
            attributes: Map::new(),
            created_at: Utc::now(),
        }
    }

    /// Set the edge weight, clamped to [0, 1]
    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight.clamp(0.0, 1.0);
        self
    }

    /// Set the attribute map
    pub fn with_attributes(mut self, attributes: Map<String, Value>) -> Self {
        self.attributes = attributes;
        self
    }

    /// The endpoint opposite to `node`, if `node` touches this edge
    pub fn other_endpoint(&self, node: Uuid) -> Option<Uuid> {
        if self.source_id == node {
            Some(self.target_id)
        } else if self.target_id == node {
            Some(self.source_id)
        } else {
            None
        }
    }
}

/// An edge reached by traversal, tagged with its discovery depth
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraversedEdge {
    pub edge: MemoryEdge,
    /// BFS depth at which the edge was first included (1 = touches the seed)
    pub depth: u32,
}

/// Bounded breadth-first expansion over an edge set
///
/// Edges are followed in either direction. Depth 1 includes the edges
/// directly touching `seed`; each later depth expands from every node a
/// previously included edge touched. An edge is included at most once even
/// when reachable along several paths, and a node is expanded at most once,
/// so traversal terminates on cyclic graphs. `max_depth < 1` yields an
/// empty result; an unknown seed yields an empty result rather than an
/// error. Output is ordered by (depth, edge id) for determinism.
pub fn connected(
    edges: &[MemoryEdge],
    seed: Uuid,
    relationship: Option<&str>,
    max_depth: u32,
) -> Vec<TraversedEdge> {
    if max_depth < 1 {
        return Vec::new();
    }

    // One pass to index incident edges per node, honoring the type filter.
    let mut adjacency: HashMap<Uuid, Vec<&MemoryEdge>> = HashMap::new();
    for edge in edges {
        if let Some(rel) = relationship {
            if edge.relationship != rel {
                continue;
            }
        }
        adjacency.entry(edge.source_id).or_default().push(edge);
        if edge.target_id != edge.source_id {
            adjacency.entry(edge.target_id).or_default().push(edge);
        }
    }

    let mut included: HashSet<EdgeId> = HashSet::new();
    let mut expanded: HashSet<Uuid> = HashSet::new();
    let mut result: Vec<TraversedEdge> = Vec::new();

    let mut frontier: VecDeque<Uuid> = VecDeque::from([seed]);
    let mut depth = 0;

    while !frontier.is_empty() && depth < max_depth {
        depth += 1;
        let mut next_frontier: VecDeque<Uuid> = VecDeque::new();

        for node in frontier.drain(..) {
            if !expanded.insert(node) {
                continue;
            }
            let Some(incident) = adjacency.get(&node) else {
                continue;
            };
            for &edge in incident {
                if included.insert(edge.id) {
                    result.push(TraversedEdge {
                        edge: edge.clone(),
                        depth,
                    });
                }
                if let Some(other) = edge.other_endpoint(node) {
                    if !expanded.contains(&other) {
                        next_frontier.push_back(other);
                    }
                }
            }
        }

        frontier = next_frontier;
    }

    result.sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.edge.id.cmp(&b.edge.id)));
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn test_depth_zero_empty() {
        let nodes = ids(2);
        let edges = vec![MemoryEdge::new(nodes[0], nodes[1], "related_to")];
        assert!(connected(&edges, nodes[0], None, 0).is_empty());
    }

    #[test]
    fn test_depth_one_touching_edges_only() {
        let nodes = ids(4);
        let edges = vec![
            MemoryEdge::new(nodes[0], nodes[1], "related_to"),
            MemoryEdge::new(nodes[2], nodes[0], "related_to"), // incoming counts too
            MemoryEdge::new(nodes[2], nodes[3], "related_to"), // two hops away
        ];
        let reached = connected(&edges, nodes[0], None, 1);
        assert_eq!(reached.len(), 2);
        assert!(reached.iter().all(|t| t.depth == 1));
    }

    #[test]
    fn test_depth_two_expands_from_touched_nodes() {
        let nodes = ids(4);
        let edges = vec![
            MemoryEdge::new(nodes[0], nodes[1], "related_to"),
            MemoryEdge::new(nodes[1], nodes[2], "related_to"),
            MemoryEdge::new(nodes[2], nodes[3], "related_to"),
        ];
        let reached = connected(&edges, nodes[0], None, 2);
        assert_eq!(reached.len(), 2);
        assert_eq!(reached[0].depth, 1);
        assert_eq!(reached[1].depth, 2);
    }

    #[test]
    fn test_cycle_terminates_each_edge_once() {
        let nodes = ids(3);
        let edges = vec![
            MemoryEdge::new(nodes[0], nodes[1], "related_to"),
            MemoryEdge::new(nodes[1], nodes[2], "related_to"),
            MemoryEdge::new(nodes[2], nodes[0], "related_to"),
        ];
        let reached = connected(&edges, nodes[0], None, 5);
        assert_eq!(reached.len(), 3);
        let unique: HashSet<EdgeId> = reached.iter().map(|t| t.edge.id).collect();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn test_relationship_filter() {
        let nodes = ids(3);
        let edges = vec![
            MemoryEdge::new(nodes[0], nodes[1], "related_to"),
            MemoryEdge::new(nodes[0], nodes[2], "version_of"),
        ];
        let reached = connected(&edges, nodes[0], Some("version_of"), 3);
        assert_eq!(reached.len(), 1);
        assert_eq!(reached[0].edge.relationship, "version_of");
    }

    #[test]
    fn test_unknown_seed_empty() {
        let nodes = ids(2);
        let edges = vec![MemoryEdge::new(nodes[0], nodes[1], "related_to")];
        assert!(connected(&edges, Uuid::new_v4(), None, 3).is_empty());
    }

    #[test]
    fn test_parallel_edges_both_reported() {
        let nodes = ids(2);
        let edges = vec![
            MemoryEdge::new(nodes[0], nodes[1], "related_to"),
            MemoryEdge::new(nodes[0], nodes[1], "follows_up"),
        ];
        let reached = connected(&edges, nodes[0], None, 1);
        assert_eq!(reached.len(), 2);
    }

    #[test]
    fn test_diamond_reconvergence_deduplicated() {
        // seed -> a, seed -> b, a -> c, b -> c, c -> d
        let n = ids(5);
        let edges = vec![
            MemoryEdge::new(n[0], n[1], "related_to"),
            MemoryEdge::new(n[0], n[2], "related_to"),
            MemoryEdge::new(n[1], n[3], "related_to"),
            MemoryEdge::new(n[2], n[3], "related_to"),
            MemoryEdge::new(n[3], n[4], "related_to"),
        ];
        let reached = connected(&edges, n[0], None, 10);
        assert_eq!(reached.len(), 5);
        let unique: HashSet<EdgeId> = reached.iter().map(|t| t.edge.id).collect();
        assert_eq!(unique.len(), 5);
    }

    #[test]
    fn test_self_loop_terminates() {
        let nodes = ids(1);
        let edges = vec![MemoryEdge::new(nodes[0], nodes[0], "related_to")];
        let reached = connected(&edges, nodes[0], None, 4);
        assert_eq!(reached.len(), 1);
        assert_eq!(reached[0].depth, 1);
    }

    #[test]
    fn test_weight_clamped() {
        let nodes = ids(2);
        let edge = MemoryEdge::new(nodes[0], nodes[1], "related_to").with_weight(1.5);
        assert_eq!(edge.weight, 1.0);
        let edge = MemoryEdge::new(nodes[0], nodes[1], "related_to").with_weight(-0.5);
        assert_eq!(edge.weight, 0.0);
    }
}
