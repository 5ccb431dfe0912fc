//! Knowledge-graph engine
//!
//! Edges live on their source row as the parallel `connected_nodes` /
//! `relationship_types` arrays. [`GraphEngine::connect`] and
//! [`GraphEngine::disconnect`] rewrite those arrays; [`GraphEngine::traverse`]
//! walks them breadth-first.
//!
//! Known limitations:
//! - No referential integrity. Deleting a node leaves edges pointing at it
//!   in other rows; traversal skips such orphaned references.
//! - Edge rewrites are serialised per source node inside this process only.
//!   Another process writing the same table could still interleave a
//!   read-modify-write and drop an edge. The RocksDB backend prevents that
//!   by holding an exclusive lock on its directory.

use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use crate::config::MemoryConfig;
use crate::error::{MemoryError, Result};
use crate::filter::Filter;
use crate::manager::TableManager;
use crate::node::{MemoryId, MemoryNode, TraversalHit};
use crate::sanitize::{is_canonical_id, sanitize};
use crate::table::{EdgeUpdate, Table};

type EdgeLockKey = (String, MemoryId);

/// Graph edge mutation and traversal
pub struct GraphEngine {
    tables: Arc<TableManager>,
    config: Arc<MemoryConfig>,
    edge_locks: DashMap<EdgeLockKey, Arc<Mutex<()>>>,
}

impl GraphEngine {
    pub fn new(tables: Arc<TableManager>, config: Arc<MemoryConfig>) -> Self {
        Self {
            tables,
            config,
            edge_locks: DashMap::new(),
        }
    }

    /// Add the edge `source -[relationship]-> target`.
    ///
    /// Connecting an existing (target, relationship) pair again is a no-op;
    /// returns whether the edge was added. Fails with `NotFound` if `source`
    /// does not exist in `namespace`. The target is not checked.
    pub async fn connect(
        &self,
        source: MemoryId,
        target: MemoryId,
        relationship: &str,
        namespace: &str,
    ) -> Result<bool> {
        let filter = Filter::namespace(namespace)?.and_id(source);
        let target = target.to_string();

        self.rewrite_edges(namespace, source, &filter, |row| {
            row.add_edge(&target, relationship)
        })
        .await
        .map(|changed| {
            log::debug!(
                "Connect {} -[{}]-> {}: {}",
                source,
                relationship,
                target,
                if changed { "added" } else { "already present" }
            );
            changed
        })
    }

    /// Remove edges `source -> target`, all of them or only those labelled
    /// `relationship`.
    ///
    /// Returns the number of removed edges; zero is not an error. Fails with
    /// `NotFound` if `source` does not exist in `namespace`.
    pub async fn disconnect(
        &self,
        source: MemoryId,
        target: MemoryId,
        relationship: Option<&str>,
        namespace: &str,
    ) -> Result<usize> {
        let filter = Filter::namespace(namespace)?.and_id(source);
        let target = target.to_string();
        let mut removed = 0;

        self.rewrite_edges(namespace, source, &filter, |row| {
            removed = row.remove_edges(&target, relationship);
            removed > 0
        })
        .await?;

        log::debug!("Disconnect {} -> {} removed {} edges", source, target, removed);
        Ok(removed)
    }

    /// Breadth-first walk from `start`, up to `max_depth` hops.
    ///
    /// Only edges labelled `relationship` are followed when one is given.
    /// Results are ordered by depth, then by discovery order; the start
    /// node itself is never included. A missing start node yields an empty
    /// result, and references to rows that no longer exist are skipped.
    pub async fn traverse(
        &self,
        start: MemoryId,
        relationship: Option<&str>,
        max_depth: u32,
        namespace: &str,
    ) -> Result<Vec<TraversalHit>> {
        if max_depth == 0 || max_depth > self.config.max_traversal_depth {
            return Err(MemoryError::invalid_input(
                "depth",
                format!(
                    "must be between 1 and {}, got {}",
                    self.config.max_traversal_depth, max_depth
                ),
            ));
        }

        let scope = Filter::namespace(namespace)?;
        let table = self.tables.open_table().await?;

        let Some(start_row) = fetch(&*table, scope.clone().and_id(start)).await? else {
            log::debug!("Traverse start {} not found in {}", start, namespace);
            return Ok(Vec::new());
        };

        let mut visited: HashSet<MemoryId> = HashSet::from([start]);
        let mut frontier: Vec<MemoryNode> = vec![start_row];
        let mut results = Vec::new();

        for depth in 1..=max_depth {
            let mut discovered: Vec<MemoryId> = Vec::new();
            for node in &frontier {
                for edge in node.edges() {
                    if relationship.is_some_and(|rel| rel != edge.relationship) {
                        continue;
                    }
                    let Some(target) = parse_target(&edge.target) else {
                        log::warn!(
                            "Skipping malformed edge target {:?} on {}",
                            edge.target,
                            node.memory_id
                        );
                        continue;
                    };
                    if visited.insert(target) {
                        discovered.push(target);
                    }
                }
            }

            if discovered.is_empty() {
                break;
            }

            let mut rows: HashMap<MemoryId, MemoryNode> = table
                .scan(&scope.clone().and_ids(discovered.clone()))
                .await?
                .into_iter()
                .map(|row| (row.memory_id, row))
                .collect();

            let mut next_frontier = Vec::with_capacity(discovered.len());
            for id in discovered {
                match rows.remove(&id) {
                    Some(row) => {
                        results.push(TraversalHit {
                            record: row.to_record(),
                            depth,
                        });
                        next_frontier.push(row);
                    }
                    None => log::warn!("Skipping orphaned reference to {} in {}", id, namespace),
                }
            }

            frontier = next_frontier;
            if frontier.is_empty() {
                break;
            }
        }

        Ok(results)
    }

    /// Read-modify-write of one row's edge arrays under its edge lock.
    ///
    /// `mutate` returns whether it changed the row; unchanged rows are not
    /// written back.
    async fn rewrite_edges<F>(
        &self,
        namespace: &str,
        source: MemoryId,
        filter: &Filter,
        mutate: F,
    ) -> Result<bool>
    where
        F: FnOnce(&mut MemoryNode) -> bool,
    {
        let namespace = sanitize(namespace, "namespace")?;
        let table = self.tables.open_table().await?;

        let lease = EdgeLockLease::acquire(&self.edge_locks, (namespace.to_string(), source));
        let _guard = lease.lock().await;

        let mut row = fetch(&*table, filter.clone())
            .await?
            .ok_or_else(|| MemoryError::not_found(source.to_string()))?;

        if !mutate(&mut row) {
            return Ok(false);
        }

        // The row can vanish between fetch and write if it is deleted meanwhile
        let touched = table.update(filter, EdgeUpdate::from_node(&row)).await?;
        if touched == 0 {
            return Err(MemoryError::not_found(source.to_string()));
        }
        Ok(true)
    }
}

/// Shared handle on one entry of the edge lock map.
///
/// Dropping the lease removes the entry once no other lease holds it, on
/// every exit path including errors and cancellation.
struct EdgeLockLease<'a> {
    locks: &'a DashMap<EdgeLockKey, Arc<Mutex<()>>>,
    key: EdgeLockKey,
    lock: Arc<Mutex<()>>,
}

impl<'a> EdgeLockLease<'a> {
    fn acquire(locks: &'a DashMap<EdgeLockKey, Arc<Mutex<()>>>, key: EdgeLockKey) -> Self {
        let lock = locks.entry(key.clone()).or_default().clone();
        Self { locks, key, lock }
    }

    async fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

impl Drop for EdgeLockLease<'_> {
    fn drop(&mut self) {
        // Release our handle before checking whether anyone else holds one
        drop(std::mem::take(&mut self.lock));
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

async fn fetch(table: &dyn Table, filter: Filter) -> Result<Option<MemoryNode>> {
    Ok(table.scan(&filter).await?.into_iter().next())
}

fn parse_target(target: &str) -> Option<MemoryId> {
    if !is_canonical_id(target) {
        return None;
    }
    target.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{InMemoryTable, TableSchema};
    use std::time::Duration;

    struct Fixture {
        graph: GraphEngine,
        table: Arc<dyn Table>,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_table(Arc::new(InMemoryTable::new(TableSchema::new("memory", 2))))
        }

        fn with_table(table: Arc<dyn Table>) -> Self {
            let tables = Arc::new(TableManager::with_table(table.clone()));
            let graph = GraphEngine::new(tables, Arc::new(MemoryConfig::in_memory(2)));
            Self { graph, table }
        }

        async fn node(&self, content: &str, namespace: &str) -> MemoryId {
            let id = MemoryId::new();
            self.table
                .insert(vec![MemoryNode {
                    memory_id: id,
                    content: content.to_string(),
                    bucket: "default".to_string(),
                    namespace: namespace.to_string(),
                    vector: vec![1.0, 0.0],
                    connected_nodes: vec![],
                    relationship_types: vec![],
                }])
                .await
                .unwrap();
            id
        }

        async fn row(&self, id: MemoryId) -> MemoryNode {
            fetch(&*self.table, Filter::all().and_id(id))
                .await
                .unwrap()
                .unwrap()
        }
    }

    fn ids(hits: &[TraversalHit]) -> Vec<(MemoryId, u32)> {
        hits.iter().map(|h| (h.record.memory_id, h.depth)).collect()
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let f = Fixture::new();
        let a = f.node("a", "default").await;
        let b = f.node("b", "default").await;

        assert!(f.graph.connect(a, b, "rel", "default").await.unwrap());
        assert!(!f.graph.connect(a, b, "rel", "default").await.unwrap());

        let row = f.row(a).await;
        assert_eq!(row.connected_nodes, vec![b.to_string()]);
        assert_eq!(row.relationship_types, vec!["rel"]);
    }

    #[tokio::test]
    async fn test_connect_missing_source() {
        let f = Fixture::new();
        let b = f.node("b", "default").await;
        let err = f
            .graph
            .connect(MemoryId::new(), b, "rel", "default")
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_connect_source_in_other_namespace() {
        let f = Fixture::new();
        let a = f.node("a", "t1").await;
        let b = f.node("b", "t1").await;
        let err = f.graph.connect(a, b, "rel", "t2").await.unwrap_err();
        assert!(matches!(err, MemoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_disconnect_selectivity() {
        let f = Fixture::new();
        let a = f.node("a", "default").await;
        let b = f.node("b", "default").await;
        f.graph.connect(a, b, "x", "default").await.unwrap();
        f.graph.connect(a, b, "y", "default").await.unwrap();

        assert_eq!(f.graph.disconnect(a, b, Some("x"), "default").await.unwrap(), 1);
        let row = f.row(a).await;
        assert_eq!(row.connected_nodes, vec![b.to_string()]);
        assert_eq!(row.relationship_types, vec!["y"]);

        f.graph.connect(a, b, "x", "default").await.unwrap();
        assert_eq!(f.graph.disconnect(a, b, None, "default").await.unwrap(), 2);
        let row = f.row(a).await;
        assert!(row.connected_nodes.is_empty());
        assert!(row.relationship_types.is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_missing_edge_is_noop() {
        let f = Fixture::new();
        let a = f.node("a", "default").await;
        let b = f.node("b", "default").await;
        assert_eq!(f.graph.disconnect(a, b, None, "default").await.unwrap(), 0);

        let err = f
            .graph
            .disconnect(MemoryId::new(), b, None, "default")
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_traverse_depth_bound() {
        let f = Fixture::new();
        let a = f.node("a", "default").await;
        let b = f.node("b", "default").await;
        let c = f.node("c", "default").await;
        let d = f.node("d", "default").await;
        f.graph.connect(a, b, "next", "default").await.unwrap();
        f.graph.connect(b, c, "next", "default").await.unwrap();
        f.graph.connect(c, d, "next", "default").await.unwrap();

        let hits = f.graph.traverse(a, None, 2, "default").await.unwrap();
        assert_eq!(ids(&hits), vec![(b, 1), (c, 2)]);
    }

    #[tokio::test]
    async fn test_traverse_relationship_filter() {
        let f = Fixture::new();
        let a = f.node("a", "default").await;
        let b = f.node("b", "default").await;
        let c = f.node("c", "default").await;
        f.graph.connect(a, b, "x", "default").await.unwrap();
        f.graph.connect(a, c, "y", "default").await.unwrap();

        let hits = f.graph.traverse(a, Some("x"), 1, "default").await.unwrap();
        assert_eq!(ids(&hits), vec![(b, 1)]);
    }

    #[tokio::test]
    async fn test_traverse_discovery_order_and_cycles() {
        let f = Fixture::new();
        let a = f.node("a", "default").await;
        let b = f.node("b", "default").await;
        let c = f.node("c", "default").await;
        let d = f.node("d", "default").await;
        f.graph.connect(a, c, "r", "default").await.unwrap();
        f.graph.connect(a, b, "r", "default").await.unwrap();
        f.graph.connect(b, a, "r", "default").await.unwrap();
        f.graph.connect(c, d, "r", "default").await.unwrap();
        f.graph.connect(b, d, "r", "default").await.unwrap();

        let hits = f.graph.traverse(a, None, 5, "default").await.unwrap();
        assert_eq!(ids(&hits), vec![(c, 1), (b, 1), (d, 2)]);
    }

    #[tokio::test]
    async fn test_traverse_skips_orphans() {
        let f = Fixture::new();
        let a = f.node("a", "default").await;
        let b = f.node("b", "default").await;
        let c = f.node("c", "default").await;
        f.graph.connect(a, b, "r", "default").await.unwrap();
        f.graph.connect(a, c, "r", "default").await.unwrap();
        f.table.delete(&Filter::all().and_id(b)).await.unwrap();

        let hits = f.graph.traverse(a, None, 3, "default").await.unwrap();
        assert_eq!(ids(&hits), vec![(c, 1)]);
    }

    #[tokio::test]
    async fn test_traverse_namespace_isolation() {
        let f = Fixture::new();
        let a = f.node("a", "t1").await;
        let b = f.node("b", "t1").await;
        f.graph.connect(a, b, "r", "t1").await.unwrap();

        assert!(f.graph.traverse(a, None, 1, "t2").await.unwrap().is_empty());
        assert_eq!(f.graph.traverse(a, None, 1, "t1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_traverse_depth_validation() {
        let f = Fixture::new();
        let a = f.node("a", "default").await;
        for depth in [0, 11] {
            let err = f.graph.traverse(a, None, depth, "default").await.unwrap_err();
            assert!(matches!(err, MemoryError::InvalidInput { ref field, .. } if field == "depth"));
        }
    }

    #[tokio::test]
    async fn test_traverse_missing_start() {
        let f = Fixture::new();
        let hits = f.graph.traverse(MemoryId::new(), None, 2, "default").await.unwrap();
        assert!(hits.is_empty());
    }

    /// Suspends after every read and before every write so that concurrent
    /// read-modify-write cycles interleave.
    struct YieldingTable {
        inner: InMemoryTable,
    }

    #[async_trait::async_trait]
    impl Table for YieldingTable {
        fn schema(&self) -> &TableSchema {
            self.inner.schema()
        }

        async fn insert(&self, rows: Vec<MemoryNode>) -> Result<()> {
            self.inner.insert(rows).await
        }

        async fn vector_search(
            &self,
            query: &[f32],
            filter: &Filter,
            limit: usize,
        ) -> Result<Vec<(MemoryNode, f32)>> {
            self.inner.vector_search(query, filter, limit).await
        }

        async fn scan(&self, filter: &Filter) -> Result<Vec<MemoryNode>> {
            let rows = self.inner.scan(filter).await?;
            tokio::task::yield_now().await;
            Ok(rows)
        }

        async fn update(&self, filter: &Filter, update: EdgeUpdate) -> Result<usize> {
            tokio::task::yield_now().await;
            self.inner.update(filter, update).await
        }

        async fn delete(&self, filter: &Filter) -> Result<usize> {
            self.inner.delete(filter).await
        }
    }

    /// Deletes every row it hands out, as if a concurrent delete landed
    /// between fetch and write
    struct VanishingTable {
        inner: InMemoryTable,
    }

    #[async_trait::async_trait]
    impl Table for VanishingTable {
        fn schema(&self) -> &TableSchema {
            self.inner.schema()
        }

        async fn insert(&self, rows: Vec<MemoryNode>) -> Result<()> {
            self.inner.insert(rows).await
        }

        async fn vector_search(
            &self,
            query: &[f32],
            filter: &Filter,
            limit: usize,
        ) -> Result<Vec<(MemoryNode, f32)>> {
            self.inner.vector_search(query, filter, limit).await
        }

        async fn scan(&self, filter: &Filter) -> Result<Vec<MemoryNode>> {
            let rows = self.inner.scan(filter).await?;
            self.inner.delete(filter).await?;
            Ok(rows)
        }

        async fn update(&self, filter: &Filter, update: EdgeUpdate) -> Result<usize> {
            self.inner.update(filter, update).await
        }

        async fn delete(&self, filter: &Filter) -> Result<usize> {
            self.inner.delete(filter).await
        }
    }

    fn yielding_fixture() -> Arc<Fixture> {
        Arc::new(Fixture::with_table(Arc::new(YieldingTable {
            inner: InMemoryTable::new(TableSchema::new("memory", 2)),
        })))
    }

    async fn fan_out(f: &Arc<Fixture>, count: usize) -> (MemoryId, Vec<MemoryId>) {
        let source = f.node("source", "default").await;
        let mut targets = Vec::new();
        for i in 0..count {
            targets.push(f.node(&format!("t{i}"), "default").await);
        }
        (source, targets)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_connects_keep_every_edge() {
        let f = yielding_fixture();
        let (a, targets) = fan_out(&f, 16).await;

        let mut handles = Vec::new();
        for target in targets.clone() {
            let f = f.clone();
            handles.push(tokio::spawn(async move {
                f.graph.connect(a, target, "rel", "default").await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let row = f.row(a).await;
        assert_eq!(row.connected_nodes.len(), targets.len());
        assert_eq!(row.relationship_types.len(), targets.len());
        assert!(f.graph.edge_locks.is_empty());
    }

    #[tokio::test]
    async fn test_unlocked_rewrites_lose_edges() {
        // Same interleaving as above without the edge lock
        let f = yielding_fixture();
        let (a, targets) = fan_out(&f, 16).await;

        let mut handles = Vec::new();
        for target in targets.clone() {
            let table = f.table.clone();
            handles.push(tokio::spawn(async move {
                let filter = Filter::namespace("default").unwrap().and_id(a);
                let mut row = fetch(&*table, filter.clone()).await.unwrap().unwrap();
                row.add_edge(&target.to_string(), "rel");
                table.update(&filter, EdgeUpdate::from_node(&row)).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let row = f.row(a).await;
        assert!(row.connected_nodes.len() < targets.len());
    }

    #[tokio::test]
    async fn test_not_found_releases_edge_locks() {
        let f = Fixture::new();
        let b = f.node("b", "default").await;

        for _ in 0..100 {
            let err = f
                .graph
                .connect(MemoryId::new(), b, "rel", "default")
                .await
                .unwrap_err();
            assert!(matches!(err, MemoryError::NotFound(_)));
            let err = f
                .graph
                .disconnect(MemoryId::new(), b, None, "default")
                .await
                .unwrap_err();
            assert!(matches!(err, MemoryError::NotFound(_)));
        }
        assert!(f.graph.edge_locks.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_waiter_releases_edge_lock() {
        let f = Fixture::new();
        let a = f.node("a", "default").await;
        let b = f.node("b", "default").await;

        let held = EdgeLockLease::acquire(&f.graph.edge_locks, ("default".to_string(), a));
        let guard = held.lock().await;

        let waiting = f.graph.connect(a, b, "rel", "default");
        let timed_out = tokio::time::timeout(Duration::from_millis(20), waiting).await;
        assert!(timed_out.is_err());
        assert_eq!(f.graph.edge_locks.len(), 1);

        drop(guard);
        drop(held);
        assert!(f.graph.edge_locks.is_empty());
        assert!(f.row(a).await.connected_nodes.is_empty());
    }

    #[tokio::test]
    async fn test_source_deleted_before_write() {
        let f = Fixture::with_table(Arc::new(VanishingTable {
            inner: InMemoryTable::new(TableSchema::new("memory", 2)),
        }));
        let a = f.node("a", "default").await;
        let b = f.node("b", "default").await;

        let err = f.graph.connect(a, b, "rel", "default").await.unwrap_err();
        assert!(matches!(err, MemoryError::NotFound(_)));
        assert_eq!(f.table.count(&Filter::all().and_id(a)).await.unwrap(), 0);
        assert!(f.graph.edge_locks.is_empty());
    }
}
