pub mod buffer_pool;
pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod io;
pub mod storage;
pub mod transaction;
pub mod types;
pub mod utils;

mod log;

pub use buffer_pool::BufferPool;
pub use catalog::Catalog;
pub use config::Config;
pub use database::Database;
pub use error::SmallError;
pub use storage::{
    schema::{Field, Schema, Type},
    tuple::{Cell, Tuple},
    HeapFile, HeapPage, PageID, RecordID,
};
pub use transaction::{Lock, LockManager, Permission, Transaction, TransactionID};
pub use types::SmallResult;
