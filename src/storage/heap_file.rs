use core::fmt;
use std::{
    collections::hash_map::DefaultHasher,
    fs,
    hash::{Hash, Hasher},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use log::debug;

use crate::{
    buffer_pool::BufferPool,
    error::SmallError,
    io::SmallFile,
    storage::{schema::Schema, tuple::Tuple, HeapPage, PageID},
    transaction::{Permission, Transaction},
    types::{Pod, SmallResult},
    utils::{ceil_div, HandyMutex, HandyRwLock},
};

/// An unordered collection of tuples stored as a flat sequence of
/// fixed-size pages, page `n` lives at byte offset `n * page_size`.
pub struct HeapFile {
    file_path: PathBuf,

    table_id: u32,

    // the schema of tuples in the file
    schema: Arc<Schema>,

    page_size: usize,

    // appends are serialized by this mutex
    file: Mutex<SmallFile>,
}

impl fmt::Display for HeapFile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "<HeapFile, file: {:?}, id: {}>",
            self.file_path, self.table_id
        )
    }
}

impl fmt::Debug for HeapFile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl HeapFile {
    /// Open the heap file at the given path, creating it if it doesn't
    /// exist. Existing pages are kept.
    ///
    /// The table id is derived from the canonical path, so reopening the
    /// same file yields the same id.
    pub fn new<P: AsRef<Path>>(
        file_path: P,
        schema: &Arc<Schema>,
        page_size: usize,
    ) -> SmallResult<Self> {
        if HeapPage::calculate_slots_count(schema, page_size) == 0 {
            return Err(SmallError::InvalidConfig(format!(
                "tuple of {} bytes doesn't fit in a page of {} bytes",
                schema.get_size(),
                page_size
            )));
        }

        let file = SmallFile::new(file_path.as_ref())?;
        let file_path = fs::canonicalize(file_path.as_ref())?;

        let mut hasher = DefaultHasher::new();
        file_path.hash(&mut hasher);
        let table_id = hasher.finish() as u32;

        Ok(Self {
            file_path,
            table_id,
            schema: Arc::clone(schema),
            page_size,
            file: Mutex::new(file),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_table_id(mut self, table_id: u32) -> Self {
        self.table_id = table_id;
        self
    }

    pub fn get_id(&self) -> u32 {
        self.table_id
    }

    pub fn get_schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn get_page_size(&self) -> usize {
        self.page_size
    }

    pub fn get_file_path(&self) -> &Path {
        &self.file_path
    }

    /// Number of pages in the file, a trailing partial page counts as one.
    pub fn num_pages(&self) -> SmallResult<usize> {
        let file_size = self.file.ml().get_size()?;
        Ok(ceil_div(file_size, self.page_size as u64) as usize)
    }

    fn offset(&self, pid: &PageID) -> u64 {
        pid.page_index as u64 * self.page_size as u64
    }

    fn check_pid(&self, pid: &PageID) -> SmallResult {
        if pid.get_table_id() != self.table_id {
            return Err(SmallError::NoSuchPage(format!(
                "page {} doesn't belong to table {}",
                pid, self.table_id
            )));
        }
        Ok(())
    }

    /// Read the page from disk. This bypasses the buffer pool, which is
    /// the only caller in normal operation.
    pub fn read_page(&self, pid: &PageID) -> SmallResult<HeapPage> {
        self.check_pid(pid)?;

        let bytes = {
            let mut file = self.file.ml();
            let pages_count = ceil_div(file.get_size()?, self.page_size as u64);
            if pid.page_index as u64 >= pages_count {
                return Err(SmallError::NoSuchPage(format!(
                    "page {} is out of range, table {} has {} pages",
                    pid, self.table_id, pages_count
                )));
            }
            file.read_at(self.offset(pid), self.page_size)?
        };

        HeapPage::new(pid, &bytes, &self.schema)
    }

    /// Write the page to its offset and sync it to disk.
    pub fn write_page(&self, page: &HeapPage) -> SmallResult {
        let pid = page.get_pid();
        self.check_pid(&pid)?;

        let data = page.get_page_data()?;
        self.file.ml().write_at(self.offset(&pid), &data)
    }

    /// Append an empty page if the file still has `expected_pages` pages.
    ///
    /// Returns false if another transaction extended the file in the
    /// meantime.
    fn append_empty_page(&self, expected_pages: usize) -> SmallResult<bool> {
        let mut file = self.file.ml();
        let pages_count = ceil_div(file.get_size()?, self.page_size as u64) as usize;
        if pages_count != expected_pages {
            return Ok(false);
        }

        let pid = PageID::new(self.table_id, pages_count as u32);
        file.write_at(self.offset(&pid), &HeapPage::empty_page_data(self.page_size))?;
        debug!("append empty page {} to {}", pid, self);
        Ok(true)
    }

    /// Insert the tuple into the lowest-numbered page that has a free slot,
    /// appending a new page if there is none.
    ///
    /// The tuple gets the record id of its slot. Returns the pages dirtied
    /// by the insertion, they are already marked dirty by `tx`.
    pub fn insert_tuple(
        &self,
        buffer_pool: &BufferPool,
        tx: &Transaction,
        tuple: &mut Tuple,
    ) -> SmallResult<Vec<Pod<HeapPage>>> {
        if **tuple.get_schema() != *self.schema {
            return Err(SmallError::SchemaMismatch(format!(
                "tuple schema {} differs from table schema {}",
                tuple.get_schema(),
                self.schema
            )));
        }

        loop {
            let pages_count = self.num_pages()?;

            for page_index in 0..pages_count {
                let pid = PageID::new(self.table_id, page_index as u32);
                if let Some(page_pod) = self.try_insert(buffer_pool, tx, &pid, tuple)? {
                    return Ok(vec![page_pod]);
                }
            }

            if !self.append_empty_page(pages_count)? {
                continue;
            }

            let pid = PageID::new(self.table_id, pages_count as u32);
            if let Some(page_pod) = self.try_insert(buffer_pool, tx, &pid, tuple)? {
                return Ok(vec![page_pod]);
            }

            // the new page was filled up by other transactions, start over
        }
    }

    // Look at the page with a shared lock first, only upgrade when it
    // has room. The shared lock on a full page is kept until the
    // transaction completes.
    fn try_insert(
        &self,
        buffer_pool: &BufferPool,
        tx: &Transaction,
        pid: &PageID,
        tuple: &mut Tuple,
    ) -> SmallResult<Option<Pod<HeapPage>>> {
        let page_pod = buffer_pool.get_page(tx, Permission::ReadOnly, pid)?;
        let has_room = page_pod.rl().empty_slots_count() > 0;
        if !has_room {
            return Ok(None);
        }

        let page_pod = buffer_pool.get_page(tx, Permission::ReadWrite, pid)?;
        {
            let mut page = page_pod.wl();
            if page.empty_slots_count() == 0 {
                return Ok(None);
            }
            page.insert_tuple(tuple)?;
            page.mark_dirty(tx);
        }
        Ok(Some(page_pod))
    }

    /// Delete the tuple from the page its record id points to. Returns the
    /// dirtied page.
    pub fn delete_tuple(
        &self,
        buffer_pool: &BufferPool,
        tx: &Transaction,
        tuple: &Tuple,
    ) -> SmallResult<Vec<Pod<HeapPage>>> {
        let rid = tuple.get_record_id().ok_or_else(|| {
            SmallError::NoSuchPage(format!("tuple {:?} has no record id", tuple))
        })?;
        self.check_pid(&rid.pid)?;

        let page_pod = buffer_pool.get_page(tx, Permission::ReadWrite, &rid.pid)?;
        {
            let mut page = page_pod.wl();
            page.delete_tuple(tuple)?;
            page.mark_dirty(tx);
        }
        Ok(vec![page_pod])
    }

    /// Scan the tuples of all pages in page order, pages are fetched
    /// read-only through the buffer pool as the scan reaches them.
    pub fn iter<'a>(
        &'a self,
        buffer_pool: &'a BufferPool,
        tx: &'a Transaction,
    ) -> HeapFileIterator<'a> {
        HeapFileIterator::new(self, buffer_pool, tx)
    }
}

pub struct HeapFileIterator<'a> {
    heap_file: &'a HeapFile,
    buffer_pool: &'a BufferPool,
    tx: &'a Transaction,

    // index of the next page to fetch
    page_index: usize,

    // tuples of the current page not yet returned, in reverse order
    buffered: Vec<Tuple>,

    // set after an error, the scan doesn't continue past it
    failed: bool,
}

impl<'a> HeapFileIterator<'a> {
    pub fn new(heap_file: &'a HeapFile, buffer_pool: &'a BufferPool, tx: &'a Transaction) -> Self {
        Self {
            heap_file,
            buffer_pool,
            tx,
            page_index: 0,
            buffered: Vec::new(),
            failed: false,
        }
    }

    /// Restart the scan from the first page.
    pub fn rewind(&mut self) {
        self.page_index = 0;
        self.buffered.clear();
        self.failed = false;
    }

    // Returns false once all pages are consumed.
    fn load_next_page(&mut self) -> SmallResult<bool> {
        if self.page_index >= self.heap_file.num_pages()? {
            return Ok(false);
        }

        let pid = PageID::new(self.heap_file.get_id(), self.page_index as u32);
        let page_pod = self
            .buffer_pool
            .get_page(self.tx, Permission::ReadOnly, &pid)?;
        self.buffered = page_pod.rl().iter().cloned().collect();
        self.buffered.reverse();
        self.page_index += 1;
        Ok(true)
    }
}

impl Iterator for HeapFileIterator<'_> {
    type Item = SmallResult<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            if let Some(tuple) = self.buffered.pop() {
                return Some(Ok(tuple));
            }

            match self.load_next_page() {
                Ok(true) => continue,
                Ok(false) => return None,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
