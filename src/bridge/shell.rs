//! Proxy shell
//!
//! The runtime-side half of a bridged object: an instance of the object's
//! registered class whose only state is the integer `ptr` field.

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use super::handles::NativeHandle;
use crate::runtime::{
    ClassDescriptor, ManagedRuntime, ObjectId, PTR_FIELD, RuntimeError, StrongRef, WeakRef,
};

#[derive(Clone, PartialEq, Eq)]
pub struct ProxyShell {
    object: StrongRef,
}

impl ProxyShell {
    /// Allocate an unattached shell of `class`; its `ptr` field is 0.
    pub fn create(
        runtime: &Arc<dyn ManagedRuntime>,
        class: &ClassDescriptor,
    ) -> Result<Self, RuntimeError> {
        let object = StrongRef::allocate(Arc::clone(runtime), class)?;
        trace!(shell = %object.id(), class = class.name, "created proxy shell");
        Ok(Self { object })
    }

    /// Treat an arbitrary runtime reference as a shell.
    pub fn from_ref(object: StrongRef) -> Self {
        Self { object }
    }

    /// Read the `ptr` field of `object` without taking a new reference.
    pub fn ptr_of(object: &StrongRef) -> Result<Option<NativeHandle>, RuntimeError> {
        let raw = object.runtime().get_int_field(object.id(), PTR_FIELD)?;
        Ok(NativeHandle::from_raw(raw))
    }

    pub fn set_ptr(&self, handle: NativeHandle) -> Result<(), RuntimeError> {
        self.object
            .runtime()
            .set_int_field(self.object.id(), PTR_FIELD, handle.to_raw())
    }

    /// The published handle, `None` before attachment.
    pub fn get_ptr(&self) -> Result<Option<NativeHandle>, RuntimeError> {
        Self::ptr_of(&self.object)
    }

    pub fn id(&self) -> ObjectId {
        self.object.id()
    }

    pub fn downgrade(&self) -> WeakRef {
        self.object.downgrade()
    }

    pub fn reference(&self) -> &StrongRef {
        &self.object
    }

    pub fn into_ref(self) -> StrongRef {
        self.object
    }
}

impl fmt::Debug for ProxyShell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProxyShell").field(&self.object.id()).finish()
    }
}
