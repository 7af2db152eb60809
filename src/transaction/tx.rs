use core::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::{buffer_pool::BufferPool, types::SmallResult};

pub type TransactionID = u32;

static TRANSACTION_ID: AtomicU32 = AtomicU32::new(1);

/// A transaction is only a process-unique id, all of its state (locks,
/// dirtied pages) is kept by the buffer pool and the lock manager.
///
/// A transaction is meant to be driven by a single thread.
#[derive(Eq, PartialEq, Clone)]
pub struct Transaction {
    // increase monotonically by 1
    id: TransactionID,
}

impl Transaction {
    pub fn new() -> Self {
        Self {
            id: TRANSACTION_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Force every page dirtied by the transaction to disk, then release
    /// its locks.
    pub fn commit(&self, buffer_pool: &BufferPool) -> SmallResult {
        buffer_pool.transaction_complete(self, true)
    }

    /// Restore every page dirtied by the transaction from disk, then
    /// release its locks.
    pub fn abort(&self, buffer_pool: &BufferPool) -> SmallResult {
        buffer_pool.transaction_complete(self, false)
    }

    pub fn get_id(&self) -> TransactionID {
        self.id
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl std::hash::Hash for Transaction {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "tx_{}", self.id)
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}
