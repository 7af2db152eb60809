use std::sync::Arc;

use small_heap::{utils, Config, Database, HeapFile, Schema};
use tempfile::TempDir;

/// # Conduct the initialization
///
/// - Setting up log configurations.
pub fn setup() {
    utils::init_log();
}

/// A database living in its own scratch directory, the directory is
/// removed when the context is dropped.
pub struct TestContext {
    pub dir: TempDir,
    pub db: Arc<Database>,
}

impl TestContext {
    pub fn new(config: Config) -> Self {
        setup();

        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::new(config).unwrap());
        Self { dir, db }
    }

    /// Open (or create) a table of `columns` int columns in the scratch
    /// directory.
    pub fn int_table(&self, name: &str, columns: usize) -> Arc<HeapFile> {
        self.open_int_table(&self.db, name, columns)
    }

    pub fn open_int_table(&self, db: &Database, name: &str, columns: usize) -> Arc<HeapFile> {
        let schema = Arc::new(Schema::small_int_schema(columns));
        db.open_table(self.dir.path().join(name), &schema).unwrap()
    }

    /// A fresh database (fresh buffer pool and catalog) over the same
    /// files, as if the process restarted.
    pub fn restart(&self, config: Config) -> Database {
        Database::new(config).unwrap()
    }
}

/// A config with small pages so tables spread over several pages with a
/// few tuples.
pub fn small_page_config(pool_pages: usize) -> Config {
    Config::default()
        .with_page_size(256)
        .with_pool_pages(pool_pages)
}
