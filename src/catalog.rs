use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use crate::{
    error::SmallError,
    storage::{schema::Schema, HeapFile},
    types::SmallResult,
    utils::HandyRwLock,
};

/// Registry of the open tables, the buffer pool resolves the heap file
/// of a page through the table id embedded in the page id.
pub struct Catalog {
    tables: RwLock<HashMap<u32, Arc<HeapFile>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Register the table, replacing any table with the same id.
    pub fn add_table(&self, table: Arc<HeapFile>) {
        self.tables.wl().insert(table.get_id(), table);
    }

    /// Register the table unless a table with the same id is already
    /// there. Returns the registered table either way.
    pub fn add_table_if_absent(&self, table: Arc<HeapFile>) -> Arc<HeapFile> {
        let mut tables = self.tables.wl();
        Arc::clone(tables.entry(table.get_id()).or_insert(table))
    }

    pub fn get_table(&self, table_id: u32) -> SmallResult<Arc<HeapFile>> {
        self.tables
            .rl()
            .get(&table_id)
            .cloned()
            .ok_or(SmallError::TableNotFound(table_id))
    }

    pub fn get_schema(&self, table_id: u32) -> SmallResult<Arc<Schema>> {
        self.get_table(table_id)
            .map(|table| Arc::clone(table.get_schema()))
    }

    pub fn table_ids(&self) -> Vec<u32> {
        self.tables.rl().keys().cloned().collect()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
