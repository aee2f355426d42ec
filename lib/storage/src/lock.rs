//! Per-table reader/writer locks.
//!
//! Every statement names the tables it writes and the tables it only reads. The
//! locks of all of them are taken together, in sorted `(database, table)` order,
//! which rules out lock-order inversions between concurrent statements. A table
//! requested both ways is locked once, exclusively.

use dashmap::DashMap;
use parking_lot::{
    lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard},
    RawRwLock, RwLock,
};
use std::{collections::BTreeMap, fmt, sync::Arc};
use tracing::trace;

type TableKey = (String, String);

enum TableGuard {
    Shared(ArcRwLockReadGuard<RawRwLock, ()>),
    Exclusive(ArcRwLockWriteGuard<RawRwLock, ()>),
}

/// Locks held for the duration of one statement. Released on drop.
///
/// Operations that expect their caller to hold the right locks take a
/// `&LockSet` to make that requirement visible at the call site.
pub struct LockSet {
    guards: Vec<(TableKey, TableGuard)>,
}

impl LockSet {
    pub fn holds_exclusive(&self, database: &str, table: &str) -> bool {
        self.guards.iter().any(|((db, t), guard)| {
            db == database && t == table && matches!(guard, TableGuard::Exclusive(_))
        })
    }

    pub fn holds(&self, database: &str, table: &str) -> bool {
        self.guards
            .iter()
            .any(|((db, t), _)| db == database && t == table)
    }

    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }
}

impl fmt::Debug for LockSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.guards.iter().map(|((db, table), guard)| {
                let mode = match guard {
                    TableGuard::Shared(_) => "shared",
                    TableGuard::Exclusive(_) => "exclusive",
                };
                format!("{}.{} ({})", db, table, mode)
            }))
            .finish()
    }
}

/// One lock per table name, kept for the lifetime of the map. Dropping and
/// recreating a table reuses its lock, so a statement still waiting on the old
/// table never runs alongside one holding the new.
#[derive(Debug, Default)]
pub struct TableLocks {
    locks: DashMap<TableKey, Arc<RwLock<()>>>,
}

impl TableLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, key: &TableKey) -> Arc<RwLock<()>> {
        Arc::clone(&self.locks.entry(key.clone()).or_default())
    }

    /// Blocks until every requested lock is held.
    pub fn acquire<W, R>(&self, database: &str, writes: W, reads: R) -> LockSet
    where
        W: IntoIterator,
        W::Item: AsRef<str>,
        R: IntoIterator,
        R::Item: AsRef<str>,
    {
        let mut wanted: BTreeMap<TableKey, bool> = BTreeMap::new();
        for table in reads {
            wanted
                .entry((database.to_string(), table.as_ref().to_string()))
                .or_insert(false);
        }
        for table in writes {
            wanted.insert((database.to_string(), table.as_ref().to_string()), true);
        }

        let mut guards = Vec::with_capacity(wanted.len());
        for (key, exclusive) in wanted {
            let lock = self.handle(&key);
            let guard = if exclusive {
                TableGuard::Exclusive(lock.write_arc())
            } else {
                TableGuard::Shared(lock.read_arc())
            };
            guards.push((key, guard));
        }

        let set = LockSet { guards };
        trace!("Acquired table locks {:?}", set);
        set
    }

    pub fn read(&self, database: &str, table: &str) -> LockSet {
        self.acquire(database, std::iter::empty::<&str>(), [table])
    }

    pub fn write(&self, database: &str, table: &str) -> LockSet {
        self.acquire(database, [table], std::iter::empty::<&str>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::atomic::{AtomicBool, Ordering},
        thread,
        time::Duration,
    };

    #[test]
    fn test_write_wins_over_read_for_same_table() {
        let locks = TableLocks::new();
        let set = locks.acquire("d1", ["t1"], ["t1", "t2"]);

        assert_eq!(set.len(), 2);
        assert!(set.holds_exclusive("d1", "t1"));
        assert!(set.holds("d1", "t2"));
        assert!(!set.holds_exclusive("d1", "t2"));
    }

    #[test]
    fn test_shared_locks_coexist() {
        let locks = TableLocks::new();
        let _a = locks.read("d1", "t1");
        let _b = locks.read("d1", "t1");
    }

    #[test]
    fn test_table_name_keeps_its_lock() {
        let locks = TableLocks::new();
        let key = ("d1".to_string(), "t1".to_string());
        let first = locks.handle(&key);
        drop(locks.write("d1", "t1"));

        assert!(Arc::ptr_eq(&first, &locks.handle(&key)));
    }

    #[test]
    fn test_waiter_excludes_later_writers_of_same_name() {
        let locks = Arc::new(TableLocks::new());
        let inside = Arc::new(AtomicBool::new(false));

        let writer = locks.write("d1", "t1");
        let waiter = {
            let locks = Arc::clone(&locks);
            let inside = Arc::clone(&inside);
            thread::spawn(move || {
                let _guard = locks.write("d1", "t1");
                inside.store(true, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(50));
                inside.store(false, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        drop(writer);
        thread::sleep(Duration::from_millis(10));
        let again = locks.write("d1", "t1");
        assert!(!inside.load(Ordering::SeqCst));
        drop(again);

        waiter.join().unwrap();
    }

    #[test]
    fn test_exclusive_lock_blocks_readers() {
        let locks = Arc::new(TableLocks::new());
        let released = Arc::new(AtomicBool::new(false));

        let writer = locks.write("d1", "t1");
        let handle = {
            let locks = Arc::clone(&locks);
            let released = Arc::clone(&released);
            thread::spawn(move || {
                let _reader = locks.read("d1", "t1");
                released.load(Ordering::SeqCst)
            })
        };

        thread::sleep(Duration::from_millis(50));
        released.store(true, Ordering::SeqCst);
        drop(writer);

        assert!(handle.join().unwrap());
    }
}
