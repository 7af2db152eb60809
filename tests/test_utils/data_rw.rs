use std::sync::Arc;

use small_heap::{
    storage::schema::Schema, Cell, Database, HeapFile, PageID, Permission, SmallError, Transaction,
    Tuple,
};

/// A tuple whose cells all hold `value`.
pub fn new_int_tuple(schema: &Arc<Schema>, value: i32) -> Tuple {
    let cells = (0..schema.fields_count())
        .map(|_| Cell::Int32(value))
        .collect();
    Tuple::new(schema, cells).unwrap()
}

pub fn insert_row(db: &Database, table: &HeapFile, tx: &Transaction, value: i32) -> Tuple {
    let mut tuple = new_int_tuple(table.get_schema(), value);
    db.buffer_pool()
        .insert_tuple(tx, table.get_id(), &mut tuple)
        .unwrap();
    tuple
}

/// Insert values `0..count` in a committed transaction.
pub fn insert_tuples(db: &Database, table: &HeapFile, count: usize) -> Vec<Tuple> {
    let tx = Transaction::new();
    let tuples = (0..count)
        .map(|value| insert_row(db, table, &tx, value as i32))
        .collect();
    tx.commit(db.buffer_pool()).unwrap();
    tuples
}

/// The first cell of every tuple of the table, in scan order, read by a
/// committed transaction.
pub fn scan_values(db: &Database, table: &HeapFile) -> Vec<i32> {
    let tx = Transaction::new();
    let values = table
        .iter(db.buffer_pool(), &tx)
        .map(|tuple| match tuple.unwrap().get_cell(0) {
            Cell::Int32(v) => *v,
            other => panic!("unexpected cell: {:?}", other),
        })
        .collect();
    tx.commit(db.buffer_pool()).unwrap();
    values
}

/// Serialized content of the page as seen through the buffer pool.
pub fn page_bytes(db: &Database, pid: &PageID) -> Vec<u8> {
    let tx = Transaction::new();
    let page_pod = db
        .buffer_pool()
        .get_page(&tx, Permission::ReadOnly, pid)
        .unwrap();
    let bytes = page_pod.read().unwrap().get_page_data().unwrap();
    tx.commit(db.buffer_pool()).unwrap();
    bytes
}

/// Insert one tuple, retrying the whole transaction when it's chosen as a
/// deadlock victim.
pub fn insert_with_retry(db: &Database, table: &HeapFile, value: i32) {
    loop {
        let tx = Transaction::new();
        let mut tuple = new_int_tuple(table.get_schema(), value);
        match db
            .buffer_pool()
            .insert_tuple(&tx, table.get_id(), &mut tuple)
        {
            Ok(()) => {
                tx.commit(db.buffer_pool()).unwrap();
                return;
            }
            Err(e @ SmallError::DeadlockDetected { .. }) => {
                log::debug!("retry after {}", e);
                tx.abort(db.buffer_pool()).unwrap();
            }
            Err(e) => panic!("insert failed: {}", e),
        }
    }
}
