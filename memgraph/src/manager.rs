//! Table manager
//!
//! Owns the single memory table of the process. The table is provisioned
//! on first use and the same handle is returned afterwards; every engine
//! reaches storage only through [`TableManager::open_table`].

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::{MemoryConfig, StorageBackend};
use crate::error::Result;
use crate::table::{InMemoryTable, RocksTable, Table, TableSchema};

/// Lazily opened, shared table handle
pub struct TableManager {
    table: RwLock<Option<Arc<dyn Table>>>,
    storage: StorageBackend,
    schema: TableSchema,
}

impl TableManager {
    pub fn new(config: &MemoryConfig) -> Self {
        Self {
            table: RwLock::new(None),
            storage: config.storage.clone(),
            schema: TableSchema::new(&config.table_name, config.embedding_dimension),
        }
    }

    /// Wrap an already opened table
    pub fn with_table(table: Arc<dyn Table>) -> Self {
        let schema = table.schema().clone();
        Self {
            table: RwLock::new(Some(table)),
            storage: StorageBackend::InMemory,
            schema,
        }
    }

    /// Open the table, creating it with the fixed schema if absent.
    ///
    /// Idempotent: concurrent and repeated calls share one handle.
    pub async fn open_table(&self) -> Result<Arc<dyn Table>> {
        if let Some(table) = self.table.read().await.as_ref() {
            return Ok(table.clone());
        }

        let mut slot = self.table.write().await;
        // Another caller may have opened it while we waited for the lock
        if let Some(table) = slot.as_ref() {
            return Ok(table.clone());
        }

        let table: Arc<dyn Table> = match &self.storage {
            StorageBackend::RocksDb { path } => {
                log::info!("Opening RocksDB table {} at {}", self.schema.name, path.display());
                let path = path.clone();
                let schema = self.schema.clone();
                let table = tokio::task::spawn_blocking(move || RocksTable::open(path, schema))
                    .await
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))??;
                Arc::new(table)
            }
            StorageBackend::InMemory => {
                log::info!("Using in-memory table {}", self.schema.name);
                Arc::new(InMemoryTable::new(self.schema.clone()))
            }
        };

        *slot = Some(table.clone());
        Ok(table)
    }

    /// Check if the table has been opened
    pub async fn is_open(&self) -> bool {
        self.table.read().await.is_some()
    }
}
