//! Strong and weak handles to runtime objects
//!
//! A [`StrongRef`] is a counted GC root: the object stays reachable for as
//! long as the handle (or any clone of it) exists. A [`WeakRef`] observes an
//! object without keeping it alive and resolves to a new `StrongRef` only
//! while the object has not been collected.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use super::{ClassDescriptor, ManagedRuntime, RuntimeError};

/// Identity of a runtime object. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ObjectId(u64);

impl ObjectId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj#{}", self.0)
    }
}

/// Owning handle to a runtime object
pub struct StrongRef {
    id: ObjectId,
    runtime: Arc<dyn ManagedRuntime>,
}

impl StrongRef {
    /// Take ownership of a strong reference the runtime already counted.
    pub fn adopt(runtime: Arc<dyn ManagedRuntime>, id: ObjectId) -> Self {
        Self { id, runtime }
    }

    /// Create an additional strong reference to `id`.
    pub fn retain(runtime: Arc<dyn ManagedRuntime>, id: ObjectId) -> Self {
        runtime.retain(id);
        Self::adopt(runtime, id)
    }

    /// Allocate a fresh instance of `class`.
    pub fn allocate(
        runtime: Arc<dyn ManagedRuntime>,
        class: &ClassDescriptor,
    ) -> Result<Self, RuntimeError> {
        let id = runtime.allocate(class)?;
        Ok(Self::adopt(runtime, id))
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn runtime(&self) -> &Arc<dyn ManagedRuntime> {
        &self.runtime
    }

    pub fn class_name(&self) -> Option<&'static str> {
        self.runtime.class_of(self.id)
    }

    pub fn downgrade(&self) -> WeakRef {
        WeakRef {
            id: self.id,
            runtime: Arc::clone(&self.runtime),
        }
    }

    /// Identity comparison, the equivalent of `IsSameObject`.
    pub fn same_object(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Clone for StrongRef {
    fn clone(&self) -> Self {
        Self::retain(Arc::clone(&self.runtime), self.id)
    }
}

impl Drop for StrongRef {
    fn drop(&mut self) {
        self.runtime.release(self.id);
    }
}

impl PartialEq for StrongRef {
    fn eq(&self, other: &Self) -> bool {
        self.same_object(other)
    }
}

impl Eq for StrongRef {}

impl fmt::Debug for StrongRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StrongRef").field(&self.id).finish()
    }
}

/// Non-owning handle to a runtime object
#[derive(Clone)]
pub struct WeakRef {
    id: ObjectId,
    runtime: Arc<dyn ManagedRuntime>,
}

impl WeakRef {
    /// Resolve to a strong reference, or `None` once the object is collected.
    pub fn upgrade(&self) -> Option<StrongRef> {
        if self.runtime.upgrade(self.id) {
            Some(StrongRef::adopt(Arc::clone(&self.runtime), self.id))
        } else {
            None
        }
    }

    /// Id of the observed object, valid even after it was collected.
    pub fn id(&self) -> ObjectId {
        self.id
    }
}

impl fmt::Debug for WeakRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WeakRef").field(&self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ManagedHeap;

    const HOLDER: ClassDescriptor = ClassDescriptor::plain("test/Holder");

    fn heap() -> Arc<ManagedHeap> {
        let heap = Arc::new(ManagedHeap::default());
        heap.define_class(&HOLDER);
        heap
    }

    #[test]
    fn clone_and_drop_adjust_strong_count() {
        let heap = heap();
        let first = StrongRef::allocate(heap.clone(), &HOLDER).unwrap();
        assert_eq!(heap.strong_count(first.id()), Some(1));

        let second = first.clone();
        assert_eq!(heap.strong_count(first.id()), Some(2));
        assert_eq!(first, second);

        drop(second);
        assert_eq!(heap.strong_count(first.id()), Some(1));
    }

    #[test]
    fn weak_ref_stops_resolving_after_collection() {
        let heap = heap();
        let strong = StrongRef::allocate(heap.clone(), &HOLDER).unwrap();
        let weak = strong.downgrade();

        let resolved = weak.upgrade().expect("object is still rooted");
        assert!(resolved.same_object(&strong));
        drop(resolved);
        drop(strong);

        heap.collect();
        assert!(weak.upgrade().is_none());
    }
}
