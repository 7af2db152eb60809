use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, RwLock},
};

use log::{debug, error, info};
use rand::seq::SliceRandom;

use crate::{
    catalog::Catalog,
    error::SmallError,
    storage::{tuple::Tuple, HeapPage, PageID},
    transaction::{LockManager, Permission, Transaction, TransactionID},
    types::{Pod, ResultPod, SmallResult},
    utils::{HandyMutex, HandyRwLock},
};

/// The single point of access to pages.
///
/// Caches at most `capacity` pages, takes the page locks on behalf of the
/// transactions and enforces NO-STEAL (dirty pages are never evicted) and
/// FORCE (dirtied pages are written at commit).
///
/// Mutex order: `pages` -> page `RwLock` (only `try_read` while
/// evicting). `pages` is never acquired while holding a page guard.
pub struct BufferPool {
    capacity: usize,

    catalog: Arc<Catalog>,

    lock_manager: LockManager,

    pages: Mutex<HashMap<PageID, Pod<HeapPage>>>,

    // pages dirtied by each running transaction
    dirty_pages: Mutex<HashMap<TransactionID, HashSet<PageID>>>,
}

impl BufferPool {
    pub fn new(capacity: usize, catalog: Arc<Catalog>) -> Self {
        Self {
            capacity,
            catalog,
            lock_manager: LockManager::new(),
            pages: Mutex::new(HashMap::new()),
            dirty_pages: Mutex::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn cached_pages_count(&self) -> usize {
        self.pages.ml().len()
    }

    pub fn is_cached(&self, pid: &PageID) -> bool {
        self.pages.ml().contains_key(pid)
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.lock_manager
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }
}

impl BufferPool {
    /// Retrieve the specified page with the associated permissions.
    /// Will acquire a lock and may block if that lock is held by
    /// another transaction.
    ///
    /// The page is looked up in the cache first. If it's not there, it's
    /// read from its heap file, evicting a clean page beforehand if the
    /// cache is full.
    pub fn get_page(&self, tx: &Transaction, perm: Permission, pid: &PageID) -> ResultPod<HeapPage> {
        self.lock_manager.request_lock(tx, perm.to_lock(), pid)?;

        let mut pages = self.pages.ml();
        if let Some(page_pod) = pages.get(pid) {
            return Ok(Arc::clone(page_pod));
        }

        let table = self.catalog.get_table(pid.get_table_id())?;
        if pages.len() >= self.capacity {
            self.evict_page(&mut pages)?;
        }

        let page = table.read_page(pid)?;
        debug!("load page {} for {}", pid, tx);

        let page_pod = Arc::new(RwLock::new(page));
        pages.insert(*pid, Arc::clone(&page_pod));
        Ok(page_pod)
    }

    /// Add a tuple to the specified table on behalf of the transaction.
    /// The tuple gets the record id of the slot it's stored in.
    ///
    /// Takes a write lock on every page it modifies, the pages are marked
    /// dirty and stay in the cache until the transaction completes.
    pub fn insert_tuple(&self, tx: &Transaction, table_id: u32, tuple: &mut Tuple) -> SmallResult {
        let table = self.catalog.get_table(table_id)?;
        let dirty_pages = table.insert_tuple(self, tx, tuple)?;
        for page_pod in dirty_pages {
            self.admit_dirty_page(tx, page_pod)?;
        }
        Ok(())
    }

    /// Remove the tuple from the page its record id points to.
    pub fn delete_tuple(&self, tx: &Transaction, tuple: &Tuple) -> SmallResult {
        let rid = tuple.get_record_id().ok_or_else(|| {
            SmallError::NoSuchPage(format!("tuple {:?} has no record id", tuple))
        })?;

        let table = self.catalog.get_table(rid.pid.get_table_id())?;
        let dirty_pages = table.delete_tuple(self, tx, tuple)?;
        for page_pod in dirty_pages {
            self.admit_dirty_page(tx, page_pod)?;
        }
        Ok(())
    }

    // Make sure the page dirtied by the transaction is the cached instance
    // and record it in the transaction's dirty set.
    fn admit_dirty_page(&self, tx: &Transaction, page_pod: Pod<HeapPage>) -> SmallResult {
        let pid = page_pod.rl().get_pid();

        {
            let mut pages = self.pages.ml();
            let cached = pages
                .get(&pid)
                .map_or(false, |cached| Arc::ptr_eq(cached, &page_pod));
            if !cached {
                if !pages.contains_key(&pid) && pages.len() >= self.capacity {
                    self.evict_page(&mut pages)?;
                }
                pages.insert(pid, Arc::clone(&page_pod));
            }
        }

        page_pod.wl().mark_dirty(tx);
        self.dirty_pages
            .ml()
            .entry(tx.get_id())
            .or_insert_with(HashSet::new)
            .insert(pid);
        Ok(())
    }

    /// Commit or abort the transaction, then release all its locks.
    ///
    /// On commit every page the transaction dirtied is written to disk.
    /// On abort those pages are read back from disk, dropping the
    /// in-memory changes.
    pub fn transaction_complete(&self, tx: &Transaction, commit: bool) -> SmallResult {
        let pids = self
            .dirty_pages
            .ml()
            .remove(&tx.get_id())
            .unwrap_or_default();

        let result = if commit {
            self.flush_pages(&pids)
        } else {
            self.restore_pages(&pids)
        };

        // locks are released even if the I/O failed, otherwise the
        // transaction would block every other one forever
        self.lock_manager.release_all(tx);

        info!(
            "{} {}, dirty pages: {}",
            tx,
            if commit { "committed" } else { "aborted" },
            pids.len()
        );
        result
    }

    // Every page is handled even if an earlier one failed, the first
    // error is returned. A page that couldn't be written or restored is
    // dropped from the cache, its next access reads it from disk.
    fn flush_pages(&self, pids: &HashSet<PageID>) -> SmallResult {
        let mut result = Ok(());
        for pid in pids {
            if let Err(e) = self.flush_page(pid) {
                error!("flush page {} failed: {}", pid, e);
                self.discard_page(pid);
                result = result.and(Err(e));
            }
        }
        result
    }

    fn restore_pages(&self, pids: &HashSet<PageID>) -> SmallResult {
        let mut result = Ok(());
        for pid in pids {
            if let Err(e) = self.restore_page(pid) {
                error!("restore page {} failed: {}", pid, e);
                self.discard_page(pid);
                result = result.and(Err(e));
            }
        }
        result
    }

    fn restore_page(&self, pid: &PageID) -> SmallResult {
        let page_pod = match self.pages.ml().get(pid) {
            Some(page_pod) => Arc::clone(page_pod),
            None => return Ok(()),
        };

        let table = self.catalog.get_table(pid.get_table_id())?;
        let page = table.read_page(pid)?;
        *page_pod.wl() = page;
        debug!("restore page {} from disk", pid);
        Ok(())
    }

    /// Write the page to disk if it's dirty, it stays in the cache as a
    /// clean page.
    pub fn flush_page(&self, pid: &PageID) -> SmallResult {
        let page_pod = match self.pages.ml().get(pid) {
            Some(page_pod) => Arc::clone(page_pod),
            None => return Ok(()),
        };

        let mut page = page_pod.wl();
        if page.is_dirty().is_none() {
            return Ok(());
        }

        let table = self.catalog.get_table(pid.get_table_id())?;
        table.write_page(&page)?;
        page.mark_clean();
        page.set_before_image()?;
        debug!("flush page {}", pid);
        Ok(())
    }

    /// Write every dirty page to disk.
    ///
    /// NB: this writes uncommitted changes, so it breaks NO-STEAL if any
    /// transaction is running.
    pub fn flush_all_pages(&self) -> SmallResult {
        let pids: Vec<PageID> = self.pages.ml().keys().cloned().collect();
        for pid in pids {
            self.flush_page(&pid)?;
        }
        Ok(())
    }

    /// Remove the page from the cache without writing it.
    pub fn discard_page(&self, pid: &PageID) {
        self.pages.ml().remove(pid);
    }

    /// Release the lock the transaction holds on the page before the
    /// transaction ends. Only safe if the page wasn't modified.
    pub fn release_page(&self, tx: &Transaction, pid: &PageID) {
        self.lock_manager.release_lock(tx, pid);
    }

    pub fn holds_lock(&self, tx: &Transaction, pid: &PageID) -> bool {
        self.lock_manager.holds_lock(tx, pid)
    }

    /// Remove a random clean page from the cache. Pages borrowed for
    /// writing at the moment are skipped, since they may be about to
    /// become dirty.
    fn evict_page(&self, pages: &mut HashMap<PageID, Pod<HeapPage>>) -> SmallResult {
        let candidates: Vec<PageID> = pages
            .iter()
            .filter(|(_, page_pod)| match page_pod.try_read() {
                Ok(page) => page.is_dirty().is_none(),
                Err(_) => false,
            })
            .map(|(pid, _)| *pid)
            .collect();

        let victim = candidates
            .choose(&mut rand::thread_rng())
            .ok_or(SmallError::PoolExhausted {
                capacity: self.capacity,
            })?;

        // a clean page has nothing to flush
        pages.remove(victim);
        debug!("evict page {}", victim);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{
        schema::Schema,
        tuple::{Cell, Tuple},
        HeapFile,
    };

    /// One of the two dirtied tables can't be written anymore, the commit
    /// still writes the other one and leaves no dirty page behind.
    #[test]
    #[cfg(target_os = "linux")]
    fn test_commit_after_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let schema = Arc::new(Schema::small_int_schema(1));
        let catalog = Arc::new(Catalog::new());
        let good = Arc::new(HeapFile::new(dir.path().join("good.db"), &schema, 256).unwrap());
        let bad = Arc::new(HeapFile::new(dir.path().join("bad.db"), &schema, 256).unwrap());
        catalog.add_table(Arc::clone(&good));
        catalog.add_table(Arc::clone(&bad));
        let pool = BufferPool::new(10, Arc::clone(&catalog));

        let tx = Transaction::new();
        for table in vec![&good, &bad] {
            let mut tuple = Tuple::new(&schema, vec![Cell::Int32(7)]).unwrap();
            pool.insert_tuple(&tx, table.get_id(), &mut tuple).unwrap();
        }

        // every write to /dev/full fails with ENOSPC
        let full = HeapFile::new("/dev/full", &schema, 256)
            .unwrap()
            .with_table_id(bad.get_id());
        catalog.add_table(Arc::new(full));

        assert!(matches!(
            pool.transaction_complete(&tx, true),
            Err(SmallError::StorageUnavailable(_))
        ));

        let good_pid = PageID::new(good.get_id(), 0);
        let bad_pid = PageID::new(bad.get_id(), 0);
        assert_eq!(good.read_page(&good_pid).unwrap().tuples_count(), 1);
        assert!(pool.is_cached(&good_pid));
        assert!(pool.pages.ml()[&good_pid].rl().is_dirty().is_none());
        assert!(!pool.is_cached(&bad_pid));

        assert!(!pool.holds_lock(&tx, &good_pid));
        assert!(!pool.holds_lock(&tx, &bad_pid));
        assert!(pool.dirty_pages.ml().is_empty());
    }
}
