//! Managed runtime boundary
//!
//! Everything the bridge needs from a garbage-collected runtime goes through
//! [`ManagedRuntime`]: allocating objects of a class, reading and writing a
//! pointer-sized integer field, counting strong references, resolving weak
//! ones, and a single finalizer hook the runtime calls for every collected
//! object of a finalizable class.
//!
//! [`ManagedHeap`] is the in-process implementation used by the CLI and the
//! tests.

pub mod class;
pub mod heap;
pub mod refs;

use std::sync::Arc;

pub use class::{ClassDescriptor, PTR_FIELD};
pub use heap::{CollectionStats, HeapConfig, HeapStats, ManagedHeap};
pub use refs::{ObjectId, StrongRef, WeakRef};

/// Callback invoked by the runtime for every collected finalizable object.
///
/// Arguments are the collected object and the value of its class's handle
/// field at collection time (0 if it was never written).
pub type FinalizerHook = Arc<dyn Fn(ObjectId, i64) + Send + Sync>;

/// Errors reported by the managed runtime
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    #[error("class `{0}` not found")]
    ClassNotFound(String),

    #[error("out of memory allocating `{class}` (limit of {limit} live objects)")]
    OutOfMemory { class: String, limit: usize },

    #[error("invalid object reference {0}")]
    InvalidObject(ObjectId),

    #[error("class `{class}` has no field `{field}`")]
    NoSuchField { class: String, field: String },
}

/// Contract between the bridge and a garbage-collected runtime
pub trait ManagedRuntime: Send + Sync {
    /// Make a class known to the runtime. Defining a class twice is a no-op.
    fn define_class(&self, class: &ClassDescriptor);

    /// Name of the class `object` was allocated with, if it is still live.
    fn class_of(&self, object: ObjectId) -> Option<&'static str>;

    /// Allocate a new instance of `class` with every field zeroed.
    ///
    /// The returned object carries one strong reference owned by the caller.
    fn allocate(&self, class: &ClassDescriptor) -> Result<ObjectId, RuntimeError>;

    /// Add a strong reference.
    fn retain(&self, object: ObjectId);

    /// Drop a strong reference.
    fn release(&self, object: ObjectId);

    /// Resolve a weak reference, retaining the object on success.
    fn upgrade(&self, object: ObjectId) -> bool;

    fn get_int_field(&self, object: ObjectId, field: &str) -> Result<i64, RuntimeError>;

    fn set_int_field(&self, object: ObjectId, field: &str, value: i64)
    -> Result<(), RuntimeError>;

    /// Install the finalizer entry point, replacing any previous one.
    fn set_finalizer(&self, hook: FinalizerHook);
}
