//! Memory node types
//!
//! A memory node is one stored row: immutable content and its embedding,
//! the (namespace, bucket) pair it was created in, and its outbound edges
//! kept as two parallel arrays.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for memory nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryId(pub Uuid);

impl MemoryId {
    /// Create a new random MemoryId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Lower-case hex of the 16 id bytes, as used in binary predicate literals
    pub fn hex(&self) -> String {
        self.0.simple().to_string()
    }
}

impl Default for MemoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MemoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for MemoryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A directed, labelled edge as seen from its source node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub target: String,
    pub relationship: String,
}

/// One stored row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryNode {
    pub memory_id: MemoryId,
    pub content: String,
    pub bucket: String,
    pub namespace: String,
    /// Document-intent embedding of `content`
    pub vector: Vec<f32>,
    /// Outbound edge targets, stringified ids
    #[serde(default)]
    pub connected_nodes: Vec<String>,
    /// Outbound edge labels, parallel to `connected_nodes`
    #[serde(default)]
    pub relationship_types: Vec<String>,
}

impl MemoryNode {
    /// Iterate outbound edges in stored order
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.connected_nodes
            .iter()
            .zip(self.relationship_types.iter())
            .map(|(target, relationship)| Edge {
                target: target.clone(),
                relationship: relationship.clone(),
            })
    }

    /// Whether the exact (target, label) edge exists
    pub fn has_edge(&self, target: &str, relationship: &str) -> bool {
        self.connected_nodes
            .iter()
            .zip(self.relationship_types.iter())
            .any(|(t, r)| t == target && r == relationship)
    }

    /// Append an edge unless the same (target, label) pair is already present.
    ///
    /// Returns `true` if the arrays changed.
    pub fn add_edge(&mut self, target: &str, relationship: &str) -> bool {
        if self.has_edge(target, relationship) {
            return false;
        }
        self.connected_nodes.push(target.to_string());
        self.relationship_types.push(relationship.to_string());
        true
    }

    /// Remove every edge to `target`, or only those labelled `relationship`
    /// when one is given. Surviving edges keep their relative order.
    ///
    /// Returns the number of removed edges.
    pub fn remove_edges(&mut self, target: &str, relationship: Option<&str>) -> usize {
        let before = self.connected_nodes.len();
        let (nodes, labels): (Vec<String>, Vec<String>) = self
            .connected_nodes
            .drain(..)
            .zip(self.relationship_types.drain(..))
            .filter(|(t, r)| !(t == target && relationship.map_or(true, |rel| rel == r)))
            .unzip();
        self.connected_nodes = nodes;
        self.relationship_types = labels;
        before - self.connected_nodes.len()
    }

    /// Caller-facing view of this row
    pub fn to_record(&self) -> MemoryRecord {
        MemoryRecord {
            memory_id: self.memory_id,
            content: self.content.clone(),
            bucket: self.bucket.clone(),
            connected_nodes: self.connected_nodes.clone(),
            relationship_types: self.relationship_types.clone(),
        }
    }
}

/// A memory node as returned to callers (no vector, no namespace)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub memory_id: MemoryId,
    pub content: String,
    pub bucket: String,
    #[serde(default)]
    pub connected_nodes: Vec<String>,
    #[serde(default)]
    pub relationship_types: Vec<String>,
}

impl From<MemoryNode> for MemoryRecord {
    fn from(node: MemoryNode) -> Self {
        Self {
            memory_id: node.memory_id,
            content: node.content,
            bucket: node.bucket,
            connected_nodes: node.connected_nodes,
            relationship_types: node.relationship_types,
        }
    }
}

/// Search match with its distance to the query (smaller is closer)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub record: MemoryRecord,
    pub distance: f32,
}

/// Node reached by a graph traversal, `depth` hops from the start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraversalHit {
    #[serde(flatten)]
    pub record: MemoryRecord,
    pub depth: u32,
}

/// Input for the add operation
#[derive(Debug, Clone, Default)]
pub struct NewMemory {
    pub content: String,
    /// Falls back to the configured default bucket
    pub bucket: Option<String>,
    pub connected_nodes: Vec<String>,
    pub relationship_types: Vec<String>,
}

impl NewMemory {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// Set the bucket
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Add one initial outbound edge
    pub fn edge(mut self, target: impl ToString, relationship: impl Into<String>) -> Self {
        self.connected_nodes.push(target.to_string());
        self.relationship_types.push(relationship.into());
        self
    }

    /// Set the initial edge arrays as given (lengths are checked on add)
    pub fn edges(mut self, connected_nodes: Vec<String>, relationship_types: Vec<String>) -> Self {
        self.connected_nodes = connected_nodes;
        self.relationship_types = relationship_types;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> MemoryNode {
        MemoryNode {
            memory_id: MemoryId::new(),
            content: "cat".to_string(),
            bucket: "animals".to_string(),
            namespace: "default".to_string(),
            vector: vec![1.0, 0.0],
            connected_nodes: vec![],
            relationship_types: vec![],
        }
    }

    #[test]
    fn test_memory_id_generation() {
        let id1 = MemoryId::new();
        let id2 = MemoryId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_memory_id_parse() {
        let id = MemoryId::new();
        let s = id.to_string();
        assert!(s.contains('-'));
        let parsed: MemoryId = s.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_memory_id_hex() {
        let id: MemoryId = "67e55044-10b1-426f-9247-bb680e5fe0c8".parse().unwrap();
        assert_eq!(id.hex(), "67e5504410b1426f9247bb680e5fe0c8");
    }

    #[test]
    fn test_add_edge_dedups() {
        let mut n = node();
        assert!(n.add_edge("b", "related_to"));
        assert!(!n.add_edge("b", "related_to"));
        assert!(n.add_edge("b", "part_of"));
        assert_eq!(n.connected_nodes, vec!["b", "b"]);
        assert_eq!(n.relationship_types, vec!["related_to", "part_of"]);
    }

    #[test]
    fn test_remove_edges_by_label() {
        let mut n = node();
        n.add_edge("b", "x");
        n.add_edge("c", "x");
        n.add_edge("b", "y");

        assert_eq!(n.remove_edges("b", Some("x")), 1);
        assert_eq!(n.connected_nodes, vec!["c", "b"]);
        assert_eq!(n.relationship_types, vec!["x", "y"]);
    }

    #[test]
    fn test_remove_edges_all_labels() {
        let mut n = node();
        n.add_edge("b", "x");
        n.add_edge("c", "x");
        n.add_edge("b", "y");

        assert_eq!(n.remove_edges("b", None), 2);
        assert_eq!(n.connected_nodes, vec!["c"]);
        assert_eq!(n.relationship_types, vec!["x"]);
        assert_eq!(n.remove_edges("zzz", None), 0);
    }

    #[test]
    fn test_record_serialization() {
        let mut n = node();
        n.add_edge("b", "x");
        let hit = TraversalHit {
            record: n.to_record(),
            depth: 1,
        };

        let json = serde_json::to_value(&hit).unwrap();
        assert_eq!(json["content"], "cat");
        assert_eq!(json["depth"], 1);
        assert_eq!(json["connected_nodes"][0], "b");
        assert!(json.get("vector").is_none());
    }
}
