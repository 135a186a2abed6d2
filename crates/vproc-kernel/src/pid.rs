use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use vproc_store::{DynKvStore, KvStoreExt};

use crate::error::KernelError;

/// Store key holding the next PID counter.
pub const NEXT_PID_KEY: &str = "NEXT_PID";

/// Identity reserved for the privileged bootstrap process.
pub const PRIVILEGED_PID: Pid = Pid(1);

/// Process identifier. Unique for the lifetime of a process table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pid(pub u64);

impl Pid {
    pub fn get(self) -> u64 {
        self.0
    }

    pub fn is_privileged(self) -> bool {
        self == PRIVILEGED_PID
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Pid {
    fn from(value: u64) -> Self {
        Pid(value)
    }
}

/// Monotonic PID source backed by the `NEXT_PID` store key.
///
/// The counter is read, handed out, and persisted as `counter + 1` under one
/// lock, so two allocations can never observe the same value.
pub struct PidAllocator {
    store: DynKvStore,
    reserved: Pid,
    lock: Mutex<()>,
}

impl PidAllocator {
    pub fn new(store: DynKvStore) -> Self {
        Self::with_reserved(store, PRIVILEGED_PID)
    }

    pub fn with_reserved(store: DynKvStore, reserved: Pid) -> Self {
        Self {
            store,
            reserved,
            lock: Mutex::new(()),
        }
    }

    pub fn reserved(&self) -> Pid {
        self.reserved
    }

    pub fn allocate(&self) -> Result<Pid, KernelError> {
        let _guard = self.lock.lock().unwrap();
        let mut next = self.current_counter();
        if next == self.reserved.0 {
            log::debug!("pid allocator skipping reserved pid {}", self.reserved);
            next += 1;
        }
        self.store.put_json(NEXT_PID_KEY, &(next + 1))?;
        Ok(Pid(next))
    }

    /// Advance the counter past `pid` if it is not already beyond it.
    ///
    /// Used after reloading a table whose records may be newer than the
    /// persisted counter.
    pub fn ensure_above(&self, pid: Pid) -> Result<(), KernelError> {
        let _guard = self.lock.lock().unwrap();
        let next = self.current_counter();
        if next <= pid.0 {
            self.store.put_json(NEXT_PID_KEY, &(pid.0 + 1))?;
        }
        Ok(())
    }

    /// Value the next allocation will start from.
    pub fn peek(&self) -> Pid {
        let _guard = self.lock.lock().unwrap();
        Pid(self.current_counter())
    }

    fn current_counter(&self) -> u64 {
        let seed = self.reserved.0 + 1;
        match self.store.get_json::<u64>(NEXT_PID_KEY) {
            Ok(Some(value)) if value > self.reserved.0 => value,
            Ok(Some(value)) => {
                log::warn!("stored pid counter {value} is not above reserved pid; reseeding");
                seed
            }
            Ok(None) => seed,
            Err(err) => {
                log::warn!("unreadable pid counter ({err}); reseeding");
                seed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use vproc_store::{KvStore, MemKvStore};

    fn allocator() -> (Arc<MemKvStore>, PidAllocator) {
        let store = Arc::new(MemKvStore::new());
        let alloc = PidAllocator::new(store.clone());
        (store, alloc)
    }

    #[test]
    fn seeds_above_reserved_pid() {
        let (store, alloc) = allocator();
        assert_eq!(alloc.allocate().unwrap(), Pid(2));
        assert_eq!(alloc.allocate().unwrap(), Pid(3));
        assert_eq!(store.get_json::<u64>(NEXT_PID_KEY).unwrap(), Some(4));
    }

    #[test]
    fn never_returns_reserved_or_duplicates() {
        let (_store, alloc) = allocator();
        let mut seen = HashSet::new();
        for _ in 0..200 {
            let pid = alloc.allocate().unwrap();
            assert_ne!(pid, PRIVILEGED_PID);
            assert!(seen.insert(pid), "duplicate pid {pid}");
        }
    }

    #[test]
    fn reseeds_invalid_counter() {
        let (store, alloc) = allocator();
        store.put_json(NEXT_PID_KEY, &1u64).unwrap();
        assert_eq!(alloc.allocate().unwrap(), Pid(2));

        store.put(NEXT_PID_KEY, b"garbage").unwrap();
        assert_eq!(alloc.allocate().unwrap(), Pid(2));
    }

    #[test]
    fn counter_survives_new_allocator() {
        let (store, alloc) = allocator();
        alloc.allocate().unwrap();
        alloc.allocate().unwrap();
        let again = PidAllocator::new(store);
        assert_eq!(again.allocate().unwrap(), Pid(4));
    }

    #[test]
    fn ensure_above_only_moves_forward() {
        let (_store, alloc) = allocator();
        alloc.ensure_above(Pid(10)).unwrap();
        assert_eq!(alloc.peek(), Pid(11));
        alloc.ensure_above(Pid(3)).unwrap();
        assert_eq!(alloc.allocate().unwrap(), Pid(11));
    }
}
