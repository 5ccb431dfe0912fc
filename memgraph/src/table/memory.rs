//! Process-local table

use async_trait::async_trait;
use dashmap::DashMap;

use super::{rank_by_distance, EdgeUpdate, Table, TableSchema};
use crate::error::Result;
use crate::filter::Filter;
use crate::node::{MemoryId, MemoryNode};

/// Table kept entirely in a `DashMap`, with exact linear vector search
pub struct InMemoryTable {
    schema: TableSchema,
    rows: DashMap<MemoryId, MemoryNode>,
}

impl InMemoryTable {
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: DashMap::new(),
        }
    }

    fn matching(&self, filter: &Filter) -> Vec<MemoryNode> {
        match filter.pinned_ids() {
            Some(ids) => ids
                .iter()
                .filter_map(|id| self.rows.get(id).map(|r| r.value().clone()))
                .filter(|row| filter.matches(row))
                .collect(),
            None => self
                .rows
                .iter()
                .filter(|entry| filter.matches(entry.value()))
                .map(|entry| entry.value().clone())
                .collect(),
        }
    }
}

#[async_trait]
impl Table for InMemoryTable {
    fn schema(&self) -> &TableSchema {
        &self.schema
    }

    async fn insert(&self, rows: Vec<MemoryNode>) -> Result<()> {
        for row in &rows {
            self.schema.check_row(row)?;
        }
        for row in rows {
            self.rows.insert(row.memory_id, row);
        }
        Ok(())
    }

    async fn vector_search(
        &self,
        query: &[f32],
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<(MemoryNode, f32)>> {
        Ok(rank_by_distance(query, self.matching(filter), limit))
    }

    async fn scan(&self, filter: &Filter) -> Result<Vec<MemoryNode>> {
        Ok(self.matching(filter))
    }

    async fn update(&self, filter: &Filter, update: EdgeUpdate) -> Result<usize> {
        update.check()?;
        let mut touched = 0;
        match filter.pinned_ids() {
            Some(ids) => {
                for id in &ids {
                    if let Some(mut row) = self.rows.get_mut(id) {
                        if filter.matches(row.value()) {
                            update.apply(row.value_mut());
                            touched += 1;
                        }
                    }
                }
            }
            None => {
                for mut entry in self.rows.iter_mut() {
                    if filter.matches(entry.value()) {
                        update.apply(entry.value_mut());
                        touched += 1;
                    }
                }
            }
        }
        Ok(touched)
    }

    async fn delete(&self, filter: &Filter) -> Result<usize> {
        let before = self.rows.len();
        self.rows.retain(|_, row| !filter.matches(row));
        Ok(before.saturating_sub(self.rows.len()))
    }
}
