use std::{path::Path, sync::Arc};

use log::info;

use crate::{
    buffer_pool::BufferPool,
    catalog::Catalog,
    config::Config,
    error::SmallError,
    storage::{schema::Schema, HeapFile},
    types::SmallResult,
};

/// The storage context of the process: configuration, catalog and the
/// buffer pool (which owns the lock manager).
///
/// Build it once at startup and share it by reference (or `Arc`) with
/// every thread.
pub struct Database {
    config: Config,
    catalog: Arc<Catalog>,
    buffer_pool: BufferPool,
}

impl Database {
    pub fn new(config: Config) -> SmallResult<Self> {
        config.validate()?;

        let catalog = Arc::new(Catalog::new());
        let buffer_pool = BufferPool::new(config.pool_pages, Arc::clone(&catalog));
        info!(
            "database started, page size: {}, pool pages: {}",
            config.page_size, config.pool_pages
        );

        Ok(Self {
            config,
            catalog,
            buffer_pool,
        })
    }

    /// Open (or create) the heap file at the given path and register it in
    /// the catalog. Opening the same file twice returns the registered
    /// table, which has to have the same schema.
    pub fn open_table<P: AsRef<Path>>(
        &self,
        file_path: P,
        schema: &Arc<Schema>,
    ) -> SmallResult<Arc<HeapFile>> {
        let table = Arc::new(HeapFile::new(file_path, schema, self.config.page_size)?);
        let registered = self.catalog.add_table_if_absent(Arc::clone(&table));

        if !Arc::ptr_eq(&registered, &table) {
            if **registered.get_schema() != **schema {
                return Err(SmallError::SchemaMismatch(format!(
                    "table {} has schema {}, not {}",
                    registered,
                    registered.get_schema(),
                    schema
                )));
            }
            return Ok(registered);
        }

        info!("open table {}, schema: {}", table, schema);
        Ok(table)
    }

    pub fn buffer_pool(&self) -> &BufferPool {
        &self.buffer_pool
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
