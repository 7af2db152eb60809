mod lock_manager;
mod tx;
mod wait_for_graph;

pub use lock_manager::{Lock, LockManager, Permission};
pub use tx::{Transaction, TransactionID};
