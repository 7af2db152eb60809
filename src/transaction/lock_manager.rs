use core::fmt;
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Condvar, Mutex},
};

use log::debug;

use super::{wait_for_graph::WaitForGraph, Transaction, TransactionID};
use crate::{error::SmallError, storage::PageID, types::SmallResult, utils::HandyMutex};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Lock {
    XLock,
    SLock,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

impl Permission {
    pub fn to_lock(&self) -> Lock {
        match self {
            Permission::ReadOnly => Lock::SLock,
            Permission::ReadWrite => Lock::XLock,
        }
    }
}

#[derive(Default)]
struct LockState {
    s_holders: HashSet<TransactionID>,
    x_holder: Option<TransactionID>,
}

impl LockState {
    /// An exclusive lock also satisfies a shared request.
    fn is_sufficient(&self, tid: TransactionID, lock: Lock) -> bool {
        match lock {
            Lock::SLock => self.x_holder == Some(tid) || self.s_holders.contains(&tid),
            Lock::XLock => self.x_holder == Some(tid),
        }
    }

    /// The other transactions whose locks are incompatible with the
    /// request.
    fn blockers(&self, tid: TransactionID, lock: Lock) -> HashSet<TransactionID> {
        let mut blockers = HashSet::new();

        // everyone has to wait for the holder of the X-Lock
        if let Some(x_holder) = self.x_holder {
            if x_holder != tid {
                blockers.insert(x_holder);
            }
        }

        // only X-Lock requests wait for the S-Lock holders
        if lock == Lock::XLock {
            for &s_holder in &self.s_holders {
                if s_holder != tid {
                    blockers.insert(s_holder);
                }
            }
        }

        blockers
    }

    fn grant(&mut self, tid: TransactionID, lock: Lock) {
        match lock {
            Lock::SLock => {
                self.s_holders.insert(tid);
            }
            Lock::XLock => {
                // upgrade
                self.s_holders.remove(&tid);
                self.x_holder = Some(tid);
            }
        }
    }

    /// Returns true if the transaction held any lock.
    fn release(&mut self, tid: TransactionID) -> bool {
        let mut released = self.s_holders.remove(&tid);
        if self.x_holder == Some(tid) {
            self.x_holder = None;
            released = true;
        }
        released
    }

    fn is_free(&self) -> bool {
        self.x_holder.is_none() && self.s_holders.is_empty()
    }
}

struct PageLock {
    state: Mutex<LockState>,

    // notified every time a holder leaves
    cvar: Condvar,
}

impl PageLock {
    fn new() -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            cvar: Condvar::new(),
        }
    }
}

/// Page level two-phase locking.
///
/// Mutex order: `lock_table` -> page state -> (`wait_for_graph` |
/// `hold_pages`). The last two are never held together.
pub struct LockManager {
    lock_table: Mutex<HashMap<PageID, Arc<PageLock>>>,

    wait_for_graph: Mutex<WaitForGraph>,

    hold_pages: Mutex<HashMap<TransactionID, HashSet<PageID>>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            lock_table: Mutex::new(HashMap::new()),
            wait_for_graph: Mutex::new(WaitForGraph::new()),
            hold_pages: Mutex::new(HashMap::new()),
        }
    }
}

impl LockManager {
    fn page_lock(&self, pid: &PageID) -> Arc<PageLock> {
        let mut table = self.lock_table.ml();
        Arc::clone(
            table
                .entry(*pid)
                .or_insert_with(|| Arc::new(PageLock::new())),
        )
    }

    /// Request a lock on the given page. This api is blocking.
    ///
    /// Returns immediately if the transaction already holds a sufficient
    /// lock. Fails with `DeadlockDetected` if waiting would close a cycle
    /// in the wait-for graph, in which case the transaction has to abort.
    pub fn request_lock(&self, tx: &Transaction, lock: Lock, pid: &PageID) -> SmallResult {
        let tid = tx.get_id();
        let page_lock = self.page_lock(pid);

        let mut state = page_lock.state.ml();
        loop {
            if state.is_sufficient(tid, lock) {
                return Ok(());
            }

            let blockers = state.blockers(tid, lock);
            if blockers.is_empty() {
                state.grant(tid, lock);
                self.wait_for_graph.ml().remove_waiter(tid);
                self.hold_pages
                    .ml()
                    .entry(tid)
                    .or_insert_with(HashSet::new)
                    .insert(*pid);
                return Ok(());
            }

            {
                let mut graph = self.wait_for_graph.ml();
                if graph.set_waiting(tid, &blockers) {
                    if let Some(cycle) = graph.find_cycle(tid) {
                        graph.remove_waiter(tid);

                        let err = SmallError::DeadlockDetected {
                            tx: tid,
                            page: *pid,
                            cycle,
                        };
                        err.show_backtrace();
                        return Err(err);
                    }
                }
            }

            debug!("{} waits for {:?} on {}", tx, blockers, pid);
            state = page_lock.cvar.wait(state).unwrap();
        }
    }

    /// Release the lock the transaction holds on the page, if any.
    pub fn release_lock(&self, tx: &Transaction, pid: &PageID) {
        let tid = tx.get_id();
        self.release_page(tid, pid);

        let mut hold_pages = self.hold_pages.ml();
        if let Some(pages) = hold_pages.get_mut(&tid) {
            pages.remove(pid);
            if pages.is_empty() {
                hold_pages.remove(&tid);
            }
        }
        drop(hold_pages);

        // Waiters of the page are woken up and recompute their edges, so
        // only the edges going out of the transaction are dropped here.
        self.wait_for_graph.ml().remove_waiter(tid);
    }

    /// Release every lock the transaction holds. Calling it again is a
    /// no-op.
    pub fn release_all(&self, tx: &Transaction) {
        let tid = tx.get_id();
        let pages = self.hold_pages.ml().remove(&tid).unwrap_or_default();
        for pid in &pages {
            self.release_page(tid, pid);
        }

        self.wait_for_graph.ml().remove_transaction(tid);
    }

    fn release_page(&self, tid: TransactionID, pid: &PageID) {
        let mut table = self.lock_table.ml();
        let page_lock = match table.get(pid) {
            Some(page_lock) => Arc::clone(page_lock),
            None => return,
        };

        let mut state = page_lock.state.ml();
        if state.release(tid) {
            page_lock.cvar.notify_all();
        }

        // No one else refers to the entry (besides the table and the local
        // clone), so nobody is waiting on it.
        if state.is_free() && Arc::strong_count(&page_lock) == 2 {
            table.remove(pid);
        }
    }

    pub fn holds_lock(&self, tx: &Transaction, pid: &PageID) -> bool {
        self.hold_pages
            .ml()
            .get(&tx.get_id())
            .map_or(false, |pages| pages.contains(pid))
    }

    /// Pages the transaction holds a lock on.
    pub fn hold_pages(&self, tx: &Transaction) -> HashSet<PageID> {
        self.hold_pages
            .ml()
            .get(&tx.get_id())
            .cloned()
            .unwrap_or_default()
    }

    /// The lock the transaction holds on the page, None if it holds none.
    pub fn lock_held(&self, tx: &Transaction, pid: &PageID) -> Option<Lock> {
        let page_lock = self.lock_table.ml().get(pid).map(Arc::clone)?;
        let state = page_lock.state.ml();
        if state.x_holder == Some(tx.get_id()) {
            Some(Lock::XLock)
        } else if state.s_holders.contains(&tx.get_id()) {
            Some(Lock::SLock)
        } else {
            None
        }
    }

    /// Returns true if any transaction is blocked.
    pub fn has_waiters(&self) -> bool {
        !self.wait_for_graph.ml().is_empty()
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LockManager {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut depiction = "\n".to_string();

        let table = self.lock_table.ml();

        depiction.push_str("s_lock_map: {");
        for (pid, page_lock) in table.iter() {
            let state = page_lock.state.ml();
            if state.s_holders.is_empty() {
                continue;
            }
            depiction.push_str(&format!("\n\t{} -> [", pid));
            for tid in &state.s_holders {
                depiction.push_str(&format!("\n\t\ttx_{}, ", tid));
            }
            depiction.push_str("\n\t]");
        }
        depiction.push_str("\n}\n");

        depiction.push_str("x_lock_map: {");
        for (pid, page_lock) in table.iter() {
            if let Some(tid) = page_lock.state.ml().x_holder {
                depiction.push_str(&format!("\n\t{} -> tx_{}, ", pid, tid));
            }
        }
        depiction.push_str("\n}\n");
        drop(table);

        depiction.push_str("hold_pages: {");
        for (tid, pages) in self.hold_pages.ml().iter() {
            depiction.push_str(&format!("\n\ttx_{} -> [", tid));
            for pid in pages {
                depiction.push_str(&format!("\n\t\t{}, ", pid.get_short_repr()));
            }
            depiction.push_str("\n\t]");
        }
        depiction.push_str("\n}\n");

        write!(f, "{}", depiction)
    }
}

impl fmt::Debug for LockManager {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

#[cfg(test)]
mod tests {
    use std::{thread, time::Duration};

    use super::*;

    #[test]
    fn test_shared_then_upgrade() {
        let manager = LockManager::new();
        let pid = PageID::new(1, 0);
        let t1 = Transaction::new();
        let t2 = Transaction::new();

        manager.request_lock(&t1, Lock::SLock, &pid).unwrap();
        manager.request_lock(&t2, Lock::SLock, &pid).unwrap();
        assert_eq!(manager.lock_held(&t1, &pid), Some(Lock::SLock));
        assert!(manager.holds_lock(&t2, &pid));

        manager.release_lock(&t2, &pid);
        assert!(!manager.holds_lock(&t2, &pid));

        manager.request_lock(&t1, Lock::XLock, &pid).unwrap();
        assert_eq!(manager.lock_held(&t1, &pid), Some(Lock::XLock));

        // the exclusive lock already covers a shared request
        manager.request_lock(&t1, Lock::SLock, &pid).unwrap();
        assert_eq!(manager.lock_held(&t1, &pid), Some(Lock::XLock));

        manager.release_all(&t1);
        manager.release_all(&t1);
        assert!(manager.hold_pages(&t1).is_empty());
        assert!(manager.lock_held(&t1, &pid).is_none());
    }

    #[test]
    fn test_exclusive_blocks_until_release() {
        let manager = Arc::new(LockManager::new());
        let pid = PageID::new(1, 0);
        let t1 = Transaction::new();
        let t2 = Transaction::new();

        manager.request_lock(&t1, Lock::XLock, &pid).unwrap();

        let handle = {
            let manager = Arc::clone(&manager);
            let t2 = t2.clone();
            thread::spawn(move || manager.request_lock(&t2, Lock::SLock, &pid))
        };

        while !manager.has_waiters() {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(!manager.holds_lock(&t2, &pid));

        manager.release_all(&t1);
        handle.join().unwrap().unwrap();
        assert_eq!(manager.lock_held(&t2, &pid), Some(Lock::SLock));
        assert!(!manager.has_waiters());
    }

    #[test]
    fn test_upgrade_deadlock() {
        let manager = Arc::new(LockManager::new());
        let pid = PageID::new(1, 0);
        let t1 = Transaction::new();
        let t2 = Transaction::new();

        manager.request_lock(&t1, Lock::SLock, &pid).unwrap();
        manager.request_lock(&t2, Lock::SLock, &pid).unwrap();

        let handle = {
            let manager = Arc::clone(&manager);
            let t1 = t1.clone();
            thread::spawn(move || manager.request_lock(&t1, Lock::XLock, &pid))
        };

        while !manager.has_waiters() {
            thread::sleep(Duration::from_millis(1));
        }

        // both want to upgrade, the second one closes the cycle
        let err = manager.request_lock(&t2, Lock::XLock, &pid).unwrap_err();
        assert!(err.is_deadlock());

        manager.release_all(&t2);
        handle.join().unwrap().unwrap();
        assert_eq!(manager.lock_held(&t1, &pid), Some(Lock::XLock));
    }
}
