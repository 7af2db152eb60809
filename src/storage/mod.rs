pub mod heap_file;
pub mod page;
mod page_id;
pub mod schema;
pub mod tuple;

pub use heap_file::{HeapFile, HeapFileIterator};
pub use page::HeapPage;
pub use page_id::{PageID, RecordID};
