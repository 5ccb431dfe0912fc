//! RocksDB storage with HNSW indexing
//!
//! Rows are persisted with bincode under `<table>/<uuid>` keys, mirrored in
//! a DashMap, and indexed with instant-distance HNSW for semantic search.
//! The index is rebuilt lazily on the first search after a write.

use async_trait::async_trait;
use dashmap::DashMap;
use instant_distance::{Builder, HnswMap, Point, Search};
use parking_lot::{Mutex, RwLock};
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use std::cmp::Ordering as CmpOrdering;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{cosine_distance, rank_by_distance, EdgeUpdate, Table, TableSchema};
use crate::error::{MemoryError, Result};
use crate::filter::Filter;
use crate::node::{MemoryId, MemoryNode};

/// HNSW point wrapper for semantic search
#[derive(Clone)]
struct IndexPoint(Vec<f32>);

impl Point for IndexPoint {
    fn distance(&self, other: &Self) -> f32 {
        // HNSW finds minimum
        cosine_distance(&self.0, &other.0)
    }
}

/// HNSW index over every row in the table
struct HnswIndex {
    hnsw: HnswMap<IndexPoint, MemoryId>,
    len: usize,
}

/// RocksDB-backed table with HNSW indexing
pub struct RocksTable {
    db: DB,
    schema: TableSchema,
    rows: DashMap<MemoryId, MemoryNode>,
    hnsw_index: RwLock<Option<HnswIndex>>,
    index_dirty: AtomicBool,
    /// Serialises writers so that matching, the batch write and the cache
    /// update of one write are never interleaved with another
    write_lock: Mutex<()>,
}

impl RocksTable {
    /// Open the table at `path`, creating database and table if missing.
    ///
    /// Fails with a schema error if the table exists with a different
    /// vector dimension.
    pub fn open(path: impl AsRef<Path>, schema: TableSchema) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_max_background_jobs(2);
        opts.set_bytes_per_sync(1048576); // 1MB
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let db = DB::open(&opts, path)?;

        let schema_key = schema_key(&schema.name);
        match db.get(schema_key.as_bytes())? {
            Some(bytes) => {
                let stored: TableSchema = serde_json::from_slice(&bytes)?;
                if stored.dimension != schema.dimension {
                    return Err(MemoryError::schema(format!(
                        "table {} was created with {} dimensions, configured for {}",
                        schema.name, stored.dimension, schema.dimension
                    )));
                }
                log::info!("Opened table {} at: {}", schema.name, path.display());
            }
            None => {
                db.put(schema_key.as_bytes(), serde_json::to_vec(&schema)?)?;
                db.flush()?;
                log::info!(
                    "Created table {} ({}d) at: {}",
                    schema.name,
                    schema.dimension,
                    path.display()
                );
            }
        }

        let table = Self {
            db,
            schema,
            rows: DashMap::new(),
            hnsw_index: RwLock::new(None),
            index_dirty: AtomicBool::new(true),
            write_lock: Mutex::new(()),
        };

        table.load_rows()?;
        Ok(table)
    }

    /// Load existing rows into the cache on startup
    fn load_rows(&self) -> Result<()> {
        let prefix = row_prefix(&self.schema.name);
        let mut count = 0;
        let mut skipped = 0;

        let iter = self
            .db
            .iterator(IteratorMode::From(prefix.as_bytes(), Direction::Forward));

        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }

            // Gracefully handle deserialization errors
            match bincode::deserialize::<MemoryNode>(&value) {
                Ok(row) => {
                    self.rows.insert(row.memory_id, row);
                    count += 1;
                }
                Err(e) => {
                    log::warn!(
                        "Failed to deserialize row {}: {}. Skipping.",
                        String::from_utf8_lossy(&key),
                        e
                    );
                    skipped += 1;
                }
            }
        }

        if count > 0 {
            log::info!("Loaded {} rows from disk", count);
        }
        if skipped > 0 {
            log::warn!("Skipped {} rows due to deserialization errors", skipped);
        }
        Ok(())
    }

    fn row_key(&self, id: &MemoryId) -> String {
        format!("{}{}", row_prefix(&self.schema.name), id)
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

    /// Rebuild the HNSW index if rows changed since the last build.
    ///
    /// The write guard is taken before the dirty flag is cleared, so a search
    /// that sees the flag clear waits for the rebuilt index instead of
    /// reading the stale one.
    fn ensure_index(&self) {
        if !self.index_dirty.load(Ordering::Acquire) {
            return;
        }

        let mut slot = self.hnsw_index.write();
        if !self.index_dirty.swap(false, Ordering::AcqRel) {
            return;
        }

        let (points, ids): (Vec<IndexPoint>, Vec<MemoryId>) = self
            .rows
            .iter()
            .map(|entry| (IndexPoint(entry.value().vector.clone()), *entry.key()))
            .unzip();

        if points.is_empty() {
            *slot = None;
            return;
        }

        let len = points.len();
        let hnsw = Builder::default().ef_construction(100).build(points, ids);
        *slot = Some(HnswIndex { hnsw, len });
        log::debug!("Rebuilt HNSW index over {} rows", len);
    }

    /// Walk HNSW candidates applying the post-filter.
    ///
    /// Returns `None` when the candidates could not fill `limit` but the
    /// index holds rows that were never examined.
    fn indexed_search(
        &self,
        query: &[f32],
        filter: &Filter,
        limit: usize,
    ) -> Option<Vec<(MemoryNode, f32)>> {
        let guard = self.hnsw_index.read();
        let index = guard.as_ref()?;

        let query_point = IndexPoint(query.to_vec());
        let mut search = Search::default();
        let mut examined = 0;
        let mut hits = Vec::new();

        for candidate in index.hnsw.search(&query_point, &mut search) {
            examined += 1;
            if let Some(row) = self.rows.get(candidate.value) {
                if filter.matches(row.value()) {
                    hits.push((row.value().clone(), candidate.distance));
                    if hits.len() >= limit {
                        break;
                    }
                }
            }
        }

        if hits.len() < limit && examined < index.len {
            return None;
        }

        hits.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(CmpOrdering::Equal));
        Some(hits)
    }
}

#[async_trait]
impl Table for RocksTable {
    fn schema(&self) -> &TableSchema {
        &self.schema
    }

    async fn insert(&self, rows: Vec<MemoryNode>) -> Result<()> {
        let _writer = self.write_lock.lock();
        let mut batch = WriteBatch::default();
        for row in &rows {
            self.schema.check_row(row)?;
            batch.put(self.row_key(&row.memory_id).as_bytes(), bincode::serialize(row)?);
        }
        self.db.write(batch)?;
        self.db.flush()?;

        for row in rows {
            self.rows.insert(row.memory_id, row);
        }
        self.index_dirty.store(true, Ordering::Release);
        Ok(())
    }

    async fn vector_search(
        &self,
        query: &[f32],
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<(MemoryNode, f32)>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        self.ensure_index();
        if let Some(hits) = self.indexed_search(query, filter, limit) {
            return Ok(hits);
        }

        // Filter too selective for the candidate pool: exact search
        log::debug!("HNSW candidates exhausted for {}, using linear search", filter);
        Ok(rank_by_distance(query, self.matching(filter), limit))
    }

    async fn scan(&self, filter: &Filter) -> Result<Vec<MemoryNode>> {
        Ok(self.matching(filter))
    }

    async fn update(&self, filter: &Filter, update: EdgeUpdate) -> Result<usize> {
        update.check()?;

        let _writer = self.write_lock.lock();
        let mut rows = self.matching(filter);
        if rows.is_empty() {
            return Ok(0);
        }

        let mut batch = WriteBatch::default();
        for row in &mut rows {
            update.apply(row);
            batch.put(self.row_key(&row.memory_id).as_bytes(), bincode::serialize(&*row)?);
        }
        self.db.write(batch)?;
        self.db.flush()?;

        let touched = rows.len();
        for row in rows {
            self.rows.insert(row.memory_id, row);
        }
        Ok(touched)
    }

    async fn delete(&self, filter: &Filter) -> Result<usize> {
        let _writer = self.write_lock.lock();
        let ids: Vec<MemoryId> = self.matching(filter).iter().map(|r| r.memory_id).collect();
        if ids.is_empty() {
            return Ok(0);
        }

        let mut batch = WriteBatch::default();
        for id in &ids {
            batch.delete(self.row_key(id).as_bytes());
        }
        self.db.write(batch)?;
        self.db.flush()?;

        for id in &ids {
            self.rows.remove(id);
        }
        self.index_dirty.store(true, Ordering::Release);
        Ok(ids.len())
    }

    async fn count(&self, filter: &Filter) -> Result<usize> {
        Ok(self
            .rows
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .count())
    }
}

fn row_prefix(table: &str) -> String {
    format!("{}/", table)
}

fn schema_key(table: &str) -> String {
    format!("_schema/{}", table)
}
