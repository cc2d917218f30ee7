//! Native handle table
//!
//! A shell never stores a native address. It stores a [`NativeHandle`], a
//! non-zero integer that this table maps back to the attached object. The
//! table holds only weak references: the attached object's own
//! self-reference is what keeps it alive.

use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use ahash::AHashMap;
use parking_lot::RwLock;
use serde::Serialize;

use super::Bridged;

/// Opaque value published in a shell's `ptr` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NativeHandle(NonZeroU64);

impl NativeHandle {
    /// Decode a field value; 0 means "not attached".
    pub fn from_raw(raw: i64) -> Option<Self> {
        NonZeroU64::new(raw as u64).map(Self)
    }

    pub fn to_raw(self) -> i64 {
        self.0.get() as i64
    }
}

impl fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "native#{}", self.0)
    }
}

pub struct HandleTable {
    next: AtomicU64,
    entries: RwLock<AHashMap<NativeHandle, Weak<dyn Bridged>>>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            entries: RwLock::new(AHashMap::new()),
        }
    }

    /// Publish `object` under a fresh handle. Handles are never reused.
    pub fn insert(&self, object: Weak<dyn Bridged>) -> NativeHandle {
        // Starts at 1 and stops at u64::MAX instead of wrapping.
        let next = self
            .next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |next| next.checked_add(1))
            .ok()
            .and_then(NonZeroU64::new);
        let Some(raw) = next else {
            panic!("native handle space exhausted");
        };

        let handle = NativeHandle(raw);
        self.entries.write().insert(handle, object);
        handle
    }

    /// Whether `handle` was ever handed out by this table, live or not.
    pub fn was_issued(&self, handle: NativeHandle) -> bool {
        handle.0.get() < self.next.load(Ordering::Relaxed)
    }

    pub fn resolve(&self, handle: NativeHandle) -> Option<Arc<dyn Bridged>> {
        self.entries.read().get(&handle).and_then(Weak::upgrade)
    }

    pub fn remove(&self, handle: NativeHandle) -> bool {
        self.entries.write().remove(&handle).is_some()
    }

    pub fn contains(&self, handle: NativeHandle) -> bool {
        self.entries.read().contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HandleTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleTable")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::ObjectBase;

    struct Plain {
        base: ObjectBase,
    }

    crate::bridge_class!(Plain, base, "test/Plain");

    #[test]
    fn zero_is_not_a_handle() {
        assert!(NativeHandle::from_raw(0).is_none());
        let handle = NativeHandle::from_raw(9).unwrap();
        assert_eq!(handle.to_raw(), 9);
    }

    #[test]
    fn resolve_follows_object_liveness() {
        let table = HandleTable::new();
        let object: Arc<dyn Bridged> = Arc::new(Plain {
            base: ObjectBase::new(),
        });

        let handle = table.insert(Arc::downgrade(&object));
        assert!(table.resolve(handle).is_some());

        drop(object);
        assert!(table.resolve(handle).is_none());
        assert!(table.contains(handle));

        assert!(table.remove(handle));
        assert!(table.is_empty());
    }

    #[test]
    fn handles_are_unique() {
        let table = HandleTable::new();
        let object: Arc<dyn Bridged> = Arc::new(Plain {
            base: ObjectBase::new(),
        });
        let first = table.insert(Arc::downgrade(&object));
        table.remove(first);
        let second = table.insert(Arc::downgrade(&object));
        assert_ne!(first, second);
        assert_eq!(first.to_raw(), 1);
        assert_eq!(second.to_raw(), 2);
    }

    #[test]
    fn retired_handles_stay_issued() {
        let table = HandleTable::new();
        let object: Arc<dyn Bridged> = Arc::new(Plain {
            base: ObjectBase::new(),
        });
        let handle = table.insert(Arc::downgrade(&object));
        assert!(table.remove(handle));

        assert!(table.was_issued(handle));
        assert!(!table.was_issued(NativeHandle::from_raw(2).unwrap()));
        assert!(!table.was_issued(NativeHandle::from_raw(-1).unwrap()));
    }

    #[test]
    #[should_panic(expected = "exhausted")]
    fn exhausted_table_refuses_new_handles() {
        let table = HandleTable::new();
        table.next.store(u64::MAX, Ordering::Relaxed);
        let object: Arc<dyn Bridged> = Arc::new(Plain {
            base: ObjectBase::new(),
        });
        table.insert(Arc::downgrade(&object));
    }
}
