use std::io;

use backtrace::Backtrace;
use log::{debug, log_enabled, Level};
use thiserror::Error;

use crate::{storage::PageID, transaction::TransactionID};

#[derive(Debug, Error)]
pub enum SmallError {
    /// Admitting the lock request would close a cycle in the wait-for
    /// graph. The transaction has to abort.
    #[error("deadlock detected: tx_{tx} waiting on {page}, cycle: {cycle:?}")]
    DeadlockDetected {
        tx: TransactionID,
        page: PageID,
        cycle: Vec<TransactionID>,
    },

    #[error("buffer pool exhausted: all {capacity} cached pages are dirty")]
    PoolExhausted { capacity: usize },

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("tuple not found: {0}")]
    TupleNotFound(String),

    #[error("page {0} is full")]
    PageFull(PageID),

    #[error("no such page: {0}")]
    NoSuchPage(String),

    #[error("table {0} not found")]
    TableNotFound(u32),

    #[error("corrupted data: {0}")]
    Corrupted(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] io::Error),
}

impl SmallError {
    pub fn is_deadlock(&self) -> bool {
        matches!(self, SmallError::DeadlockDetected { .. })
    }

    /// Log the error together with the current call stack. Capturing a
    /// backtrace is expensive, so nothing happens unless debug logging is
    /// on.
    pub fn show_backtrace(&self) {
        if log_enabled!(Level::Debug) {
            let bt = Backtrace::new();
            debug!("error: [{}], backtrace: {:?}", self, bt);
        }
    }
}
