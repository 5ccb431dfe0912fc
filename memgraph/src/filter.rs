//! Typed row predicates
//!
//! Every filter handed to a [`Table`](crate::table::Table) is built here.
//! Text clauses can only be created through [`sanitize`], identifier clauses
//! only from [`MemoryId`] values, so a filter never carries an unchecked
//! caller string. `Display` renders the equivalent predicate expression for
//! logging.

use std::fmt;

use crate::error::Result;
use crate::node::{MemoryId, MemoryNode};
use crate::sanitize::sanitize;

/// Filterable columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Namespace,
    Bucket,
}

impl Column {
    fn name(self) -> &'static str {
        match self {
            Self::Namespace => "namespace",
            Self::Bucket => "bucket",
        }
    }

    fn value_of(self, node: &MemoryNode) -> &str {
        match self {
            Self::Namespace => &node.namespace,
            Self::Bucket => &node.bucket,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Clause {
    TextEq(Column, String),
    IdIn(Vec<MemoryId>),
}

impl Clause {
    fn matches(&self, node: &MemoryNode) -> bool {
        match self {
            Self::TextEq(column, value) => column.value_of(node) == value,
            Self::IdIn(ids) => ids.contains(&node.memory_id),
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TextEq(column, value) => write!(f, "{} = '{}'", column.name(), value),
            Self::IdIn(ids) if ids.len() == 1 => write!(f, "memory_id = X'{}'", ids[0].hex()),
            Self::IdIn(ids) => {
                write!(f, "memory_id IN (")?;
                for (i, id) in ids.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "X'{}'", id.hex())?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Conjunction of clauses; an empty filter matches every row
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    /// Filter matching every row
    pub fn all() -> Self {
        Self::default()
    }

    /// Rows in `namespace`
    pub fn namespace(namespace: &str) -> Result<Self> {
        Self::all().and_namespace(namespace)
    }

    /// Narrow to rows in `namespace`
    pub fn and_namespace(self, namespace: &str) -> Result<Self> {
        self.and_text(Column::Namespace, namespace)
    }

    /// Narrow to rows in `bucket`
    pub fn and_bucket(self, bucket: &str) -> Result<Self> {
        self.and_text(Column::Bucket, bucket)
    }

    /// Narrow to the row with `id`
    pub fn and_id(self, id: MemoryId) -> Self {
        self.and_ids(vec![id])
    }

    /// Narrow to rows whose id is one of `ids`
    pub fn and_ids(mut self, ids: Vec<MemoryId>) -> Self {
        self.clauses.push(Clause::IdIn(ids));
        self
    }

    fn and_text(mut self, column: Column, value: &str) -> Result<Self> {
        let value = sanitize(value, column.name())?;
        self.clauses.push(Clause::TextEq(column, value.to_string()));
        Ok(self)
    }

    /// Evaluate against a row
    pub fn matches(&self, node: &MemoryNode) -> bool {
        self.clauses.iter().all(|c| c.matches(node))
    }

    /// Ids the filter is pinned to, if it has any id clause.
    ///
    /// Backends use this to turn a scan into point lookups. With several id
    /// clauses the intersection is returned.
    pub fn pinned_ids(&self) -> Option<Vec<MemoryId>> {
        let mut pinned: Option<Vec<MemoryId>> = None;
        for clause in &self.clauses {
            if let Clause::IdIn(ids) = clause {
                pinned = Some(match pinned {
                    None => ids.clone(),
                    Some(prev) => prev.into_iter().filter(|id| ids.contains(id)).collect(),
                });
            }
        }
        pinned
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.clauses.is_empty() {
            return write!(f, "TRUE");
        }
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                write!(f, " AND ")?;
            }
            write!(f, "{}", clause)?;
        }
        Ok(())
    }
}
