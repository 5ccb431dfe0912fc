//! Response payloads for front ends
//!
//! Each operation's result paired with its human-readable status line.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use crate::node::{MemoryId, MemoryRecord, SearchHit, TraversalHit};

/// Status line reported alongside an operation result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "Memory added")]
    Added,
    #[serde(rename = "Memory retrieved")]
    Retrieved,
    #[serde(rename = "No memory found")]
    NotFound,
    #[serde(rename = "Memory deleted")]
    Deleted,
    #[serde(rename = "Memories cleared")]
    Cleared,
    #[serde(rename = "Memories connected")]
    Connected,
    #[serde(rename = "Memories disconnected")]
    Disconnected,
    #[serde(rename = "Graph traversed")]
    Traversed,
    #[serde(rename = "No connected nodes found")]
    NoConnectedNodes,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "Memory added",
            Self::Retrieved => "Memory retrieved",
            Self::NotFound => "No memory found",
            Self::Deleted => "Memory deleted",
            Self::Cleared => "Memories cleared",
            Self::Connected => "Memories connected",
            Self::Disconnected => "Memories disconnected",
            Self::Traversed => "Graph traversed",
            Self::NoConnectedNodes => "No connected nodes found",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddResponse {
    pub status: Status,
    pub memory_id: MemoryId,
}

impl AddResponse {
    pub fn new(memory_id: MemoryId) -> Self {
        Self {
            status: Status::Added,
            memory_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub status: Status,
    pub results: Vec<SearchHit>,
}

impl SearchResponse {
    pub fn new(results: Vec<SearchHit>) -> Self {
        let status = if results.is_empty() {
            Status::NotFound
        } else {
            Status::Retrieved
        };
        Self { status, results }
    }
}

/// Single-memory lookup result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetResponse {
    pub status: Status,
    pub memory: Option<MemoryRecord>,
}

impl GetResponse {
    pub fn new(memory: Option<MemoryRecord>) -> Self {
        let status = match memory {
            Some(_) => Status::Retrieved,
            None => Status::NotFound,
        };
        Self { status, memory }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraverseResponse {
    pub status: Status,
    pub results: Vec<TraversalHit>,
}

impl TraverseResponse {
    pub fn new(results: Vec<TraversalHit>) -> Self {
        let status = if results.is_empty() {
            Status::NoConnectedNodes
        } else {
            Status::Traversed
        };
        Self { status, results }
    }
}

/// Status plus an optional count of affected rows or edges
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected: Option<usize>,
}

impl StatusResponse {
    pub fn new(status: Status) -> Self {
        Self {
            status,
            affected: None,
        }
    }

    pub fn with_affected(mut self, affected: usize) -> Self {
        self.affected = Some(affected);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketsResponse {
    pub buckets: Vec<String>,
}

impl From<HashSet<String>> for BucketsResponse {
    fn from(buckets: HashSet<String>) -> Self {
        Self {
            buckets: buckets.into_iter().collect::<BTreeSet<_>>().into_iter().collect(),
        }
    }
}
