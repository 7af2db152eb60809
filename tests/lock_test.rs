mod test_utils;

use std::{
    sync::Arc,
    thread,
    time::Duration,
};

use small_heap::{Config, Lock, PageID, Permission, SmallError, Transaction};
use test_utils::{insert_tuples, small_page_config, TestContext};

/// Two shared holders can coexist, the writer waits until both are gone.
#[test]
fn test_lock_exclusivity() {
    let ctx = TestContext::new(Config::default());
    let table = ctx.int_table("heap.db", 2);
    insert_tuples(&ctx.db, &table, 1);
    let pid = PageID::new(table.get_id(), 0);

    let pool = ctx.db.buffer_pool();
    let reader_1 = Transaction::new();
    let reader_2 = Transaction::new();
    pool.get_page(&reader_1, Permission::ReadOnly, &pid).unwrap();
    pool.get_page(&reader_2, Permission::ReadOnly, &pid).unwrap();
    assert!(pool.holds_lock(&reader_1, &pid));
    assert!(pool.holds_lock(&reader_2, &pid));

    let (sender, receiver) = crossbeam::channel::unbounded();
    let writer = Transaction::new();
    let handle = {
        let db = Arc::clone(&ctx.db);
        let writer = writer.clone();
        thread::spawn(move || {
            let pool = db.buffer_pool();
            pool.get_page(&writer, Permission::ReadWrite, &pid).unwrap();
            sender.send(()).unwrap();
        })
    };

    assert!(receiver.recv_timeout(Duration::from_millis(200)).is_err());

    reader_1.commit(pool).unwrap();
    assert!(receiver.recv_timeout(Duration::from_millis(200)).is_err());

    reader_2.commit(pool).unwrap();
    receiver.recv().unwrap();
    handle.join().unwrap();

    assert_eq!(
        pool.lock_manager().lock_held(&writer, &pid),
        Some(Lock::XLock)
    );
    assert!(!pool.holds_lock(&reader_1, &pid));

    // nobody can read while the writer holds the page
    let reader_3 = Transaction::new();
    let handle = {
        let db = Arc::clone(&ctx.db);
        let reader_3 = reader_3.clone();
        thread::spawn(move || {
            db.buffer_pool()
                .get_page(&reader_3, Permission::ReadOnly, &pid)
                .map(|_| ())
        })
    };
    thread::sleep(Duration::from_millis(100));
    assert!(!pool.holds_lock(&reader_3, &pid));

    writer.commit(pool).unwrap();
    handle.join().unwrap().unwrap();
    assert!(pool.holds_lock(&reader_3, &pid));
    reader_3.commit(pool).unwrap();
}

#[test]
fn test_upgrade_and_release() {
    let ctx = TestContext::new(Config::default());
    let table = ctx.int_table("heap.db", 2);
    insert_tuples(&ctx.db, &table, 1);
    let pid = PageID::new(table.get_id(), 0);

    let pool = ctx.db.buffer_pool();
    let tx = Transaction::new();
    pool.get_page(&tx, Permission::ReadOnly, &pid).unwrap();
    assert_eq!(pool.lock_manager().lock_held(&tx, &pid), Some(Lock::SLock));

    pool.get_page(&tx, Permission::ReadWrite, &pid).unwrap();
    assert_eq!(pool.lock_manager().lock_held(&tx, &pid), Some(Lock::XLock));

    // read after write keeps the exclusive lock
    pool.get_page(&tx, Permission::ReadOnly, &pid).unwrap();
    assert_eq!(pool.lock_manager().lock_held(&tx, &pid), Some(Lock::XLock));

    pool.release_page(&tx, &pid);
    assert!(!pool.holds_lock(&tx, &pid));

    let other = Transaction::new();
    pool.get_page(&other, Permission::ReadWrite, &pid).unwrap();
    other.commit(pool).unwrap();
    tx.commit(pool).unwrap();
}

/// T1 holds A and wants B, T2 holds B and wants A. Exactly one of them
/// is told to abort, the other goes on once the victim releases its locks.
#[test]
fn test_deadlock() {
    let ctx = TestContext::new(small_page_config(50));
    let table = ctx.int_table("heap.db", 1);
    insert_tuples(&ctx.db, &table, 100);
    assert_eq!(table.num_pages().unwrap(), 2);

    let page_a = PageID::new(table.get_id(), 0);
    let page_b = PageID::new(table.get_id(), 1);

    let t1 = Transaction::new();
    let t2 = Transaction::new();
    let pool = ctx.db.buffer_pool();
    pool.get_page(&t1, Permission::ReadWrite, &page_a).unwrap();
    pool.get_page(&t2, Permission::ReadWrite, &page_b).unwrap();

    let (sender, receiver) = crossbeam::channel::unbounded();
    let mut handles = vec![];
    for (tx, wanted) in vec![(t1, page_b), (t2, page_a)] {
        let db = Arc::clone(&ctx.db);
        let sender = sender.clone();
        handles.push(thread::spawn(move || {
            let pool = db.buffer_pool();
            match pool.get_page(&tx, Permission::ReadWrite, &wanted) {
                Ok(_) => {
                    tx.commit(pool).unwrap();
                    sender.send(false).unwrap();
                }
                Err(e) => {
                    assert!(e.is_deadlock(), "unexpected error: {}", e);
                    tx.abort(pool).unwrap();
                    sender.send(true).unwrap();
                }
            }
        }));
    }
    drop(sender);

    for handle in handles {
        handle.join().unwrap();
    }
    let deadlocks = receiver.iter().filter(|failed| *failed).count();
    assert_eq!(deadlocks, 1);
    assert!(!pool.lock_manager().has_waiters());
}

#[test]
fn test_deadlock_error_names_the_cycle() {
    let ctx = TestContext::new(small_page_config(50));
    let table = ctx.int_table("heap.db", 1);
    insert_tuples(&ctx.db, &table, 100);

    let page_a = PageID::new(table.get_id(), 0);
    let page_b = PageID::new(table.get_id(), 1);

    let pool = ctx.db.buffer_pool();
    let t1 = Transaction::new();
    let t2 = Transaction::new();
    pool.get_page(&t1, Permission::ReadWrite, &page_a).unwrap();
    pool.get_page(&t2, Permission::ReadWrite, &page_b).unwrap();

    let handle = {
        let db = Arc::clone(&ctx.db);
        let t1 = t1.clone();
        thread::spawn(move || {
            db.buffer_pool()
                .get_page(&t1, Permission::ReadWrite, &page_b)
                .map(|_| ())
        })
    };
    while !pool.lock_manager().has_waiters() {
        thread::sleep(Duration::from_millis(1));
    }

    match pool.get_page(&t2, Permission::ReadWrite, &page_a) {
        Err(SmallError::DeadlockDetected { tx, page, cycle }) => {
            assert_eq!(tx, t2.get_id());
            assert_eq!(page, page_a);
            assert_eq!(cycle, vec![t2.get_id(), t1.get_id()]);
        }
        other => panic!("expect deadlock, got {:?}", other.map(|_| ())),
    }

    t2.abort(pool).unwrap();
    handle.join().unwrap().unwrap();
    t1.commit(pool).unwrap();
}
