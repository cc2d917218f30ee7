//! Native object base
//!
//! Every bridgeable native type embeds an [`ObjectBase`] and implements
//! [`Bridged`] (usually through [`bridge_class!`](crate::bridge_class)). The
//! base ties the native object's lifetime to its proxy shell:
//!
//! ```text
//!  native owners ──Arc──▶ T { base: ObjectBase } ◀──Arc── base.self (while attached)
//!                                 │
//!                           weak  ▼
//!                            proxy shell { ptr = native handle }
//! ```
//!
//! While a shell is attached, the base holds a strong reference to its own
//! object, so dropping every native owner cannot destroy an object the
//! runtime can still reach. When the runtime finalizes the shell the base
//! lets go of that reference, which may destroy the object on the spot.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use super::handles::NativeHandle;
use super::shell::ProxyShell;
use super::Bridge;
use crate::error::{BridgeError, Result};
use crate::runtime::{ClassDescriptor, ObjectId, WeakRef};

/// A native type that can cross into the managed runtime
pub trait Bridged: Send + Sync + 'static {
    fn object_base(&self) -> &ObjectBase;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// A bridged type together with the runtime class of its shells
pub trait BridgeClass: Bridged + Sized {
    const CLASS: ClassDescriptor;
}

/// Implement [`Bridged`] and [`BridgeClass`] for a struct embedding an
/// [`ObjectBase`].
///
/// ```ignore
/// struct Counter {
///     base: ObjectBase,
///     value: AtomicI64,
/// }
///
/// shellbridge::bridge_class!(Counter, base, "demo/Counter");
/// ```
#[macro_export]
macro_rules! bridge_class {
    ($ty:ty, $field:ident, $class:expr) => {
        impl $crate::bridge::Bridged for $ty {
            fn object_base(&self) -> &$crate::bridge::ObjectBase {
                &self.$field
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn into_any(
                self: ::std::sync::Arc<Self>,
            ) -> ::std::sync::Arc<dyn ::std::any::Any + ::std::marker::Send + ::std::marker::Sync>
            {
                self
            }
        }

        impl $crate::bridge::BridgeClass for $ty {
            const CLASS: $crate::runtime::ClassDescriptor =
                $crate::runtime::ClassDescriptor::bridged($class);
        }
    };
}

/// Lifecycle of an [`ObjectBase`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Phase {
    /// Never crossed into the runtime
    #[default]
    Unattached,
    /// A shell carries this object's handle
    Attached,
    /// The shell was finalized; terminal
    Finalized,
}

/// Result of a finalize notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FinalizeOutcome {
    /// Self-reference released
    Released,
    /// The notification named a shell this object is no longer bound to
    Stale,
}

#[derive(Default)]
struct BaseState {
    wrapper: Option<WeakRef>,
    this: Option<Arc<dyn Bridged>>,
    handle: Option<NativeHandle>,
    phase: Phase,
}

/// Lifetime state shared between a native object and its proxy shell
#[derive(Default)]
pub struct ObjectBase {
    state: Mutex<BaseState>,
}

impl ObjectBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    pub fn is_attached(&self) -> bool {
        self.phase() == Phase::Attached
    }

    /// Handle published to the runtime, while attached.
    pub fn handle(&self) -> Option<NativeHandle> {
        self.state.lock().handle
    }

    /// Id of the shell this object is currently bound to.
    pub fn shell_id(&self) -> Option<ObjectId> {
        self.state.lock().wrapper.as_ref().map(WeakRef::id)
    }

    /// A new strong reference to the object from its self-reference.
    ///
    /// # Panics
    ///
    /// Panics if the object is not attached: it never crossed into the
    /// runtime, or its shell was already finalized.
    pub fn shared(&self) -> Arc<dyn Bridged> {
        let state = self.state.lock();
        match &state.this {
            Some(this) => Arc::clone(this),
            None => panic!(
                "shared() on a native object in phase {:?}; it has no self-reference",
                state.phase
            ),
        }
    }

    /// Bind `shell` to this object and take `this` as the self-reference.
    ///
    /// # Panics
    ///
    /// Panics if the object was attached before.
    pub(crate) fn attach(
        &self,
        bridge: &Bridge,
        shell: &ProxyShell,
        this: Arc<dyn Bridged>,
    ) -> Result<()> {
        let mut state = self.state.lock();
        Self::attach_locked(&mut state, bridge, shell, this)
    }

    fn attach_locked(
        state: &mut BaseState,
        bridge: &Bridge,
        shell: &ProxyShell,
        this: Arc<dyn Bridged>,
    ) -> Result<()> {
        assert!(
            state.phase == Phase::Unattached && state.wrapper.is_none() && state.this.is_none(),
            "native object attached twice (phase {:?})",
            state.phase
        );

        if shell.get_ptr()?.is_some() {
            return Err(BridgeError::AlreadyAttached(shell.id()));
        }

        let handle = bridge.handles().insert(Arc::downgrade(&this));
        // Writing the field publishes the handle to the runtime.
        if let Err(err) = shell.set_ptr(handle) {
            bridge.handles().remove(handle);
            return Err(err.into());
        }

        state.wrapper = Some(shell.downgrade());
        state.this = Some(this);
        state.handle = Some(handle);
        state.phase = Phase::Attached;

        bridge.metrics().record_attach();
        debug!(shell = %shell.id(), handle = %handle, "attached native object");
        Ok(())
    }

    /// The attached shell, creating and attaching one of class `class` if
    /// there is none or it was collected.
    ///
    /// # Panics
    ///
    /// Panics if the object was already finalized.
    pub(crate) fn get_ref(
        &self,
        bridge: &Bridge,
        class: &ClassDescriptor,
        this: Arc<dyn Bridged>,
    ) -> Result<ProxyShell> {
        let mut state = self.state.lock();

        if let Some(shell) = state.wrapper.as_ref().and_then(WeakRef::upgrade) {
            return Ok(ProxyShell::from_ref(shell));
        }

        match state.phase {
            Phase::Unattached => {
                let shell = ProxyShell::create(bridge.runtime(), class)?;
                bridge.metrics().record_shell_created();
                Self::attach_locked(&mut state, bridge, &shell, this)?;
                Ok(shell)
            }
            Phase::Attached => {
                // The old shell was swept but its finalization has not been
                // delivered yet; the self-reference is still held.
                let Some(handle) = state.handle else {
                    unreachable!("attached native object without a handle");
                };
                let shell = ProxyShell::create(bridge.runtime(), class)?;
                bridge.metrics().record_shell_created();
                shell.set_ptr(handle)?;

                let previous = state.wrapper.replace(shell.downgrade());
                bridge.metrics().record_rebind();
                debug!(
                    shell = %shell.id(),
                    previous = ?previous.as_ref().map(WeakRef::id),
                    handle = %handle,
                    "rebound native object to a new shell"
                );
                Ok(shell)
            }
            Phase::Finalized => panic!("get_ref() on a finalized native object"),
        }
    }

    /// Release the self-reference if `shell` is the shell this object is
    /// bound to.
    ///
    /// Dropping the self-reference may destroy the object; it happens after
    /// the state lock is released.
    pub(crate) fn finalize(&self, bridge: &Bridge, shell: ObjectId) -> FinalizeOutcome {
        let released = {
            let mut state = self.state.lock();
            let current = state.wrapper.as_ref().map(WeakRef::id);
            if state.phase != Phase::Attached || current != Some(shell) {
                debug!(
                    shell = %shell,
                    current = ?current,
                    phase = ?state.phase,
                    "ignoring stale finalization"
                );
                return FinalizeOutcome::Stale;
            }

            state.wrapper = None;
            if let Some(handle) = state.handle.take() {
                bridge.handles().remove(handle);
            }
            state.phase = Phase::Finalized;
            state.this.take()
        };

        debug!(shell = %shell, "finalized native object");
        drop(released); // might destroy this object
        FinalizeOutcome::Released
    }
}

/// Typed form of [`ObjectBase::shared`].
///
/// # Panics
///
/// Panics if `native` is not attached.
pub fn shared<T: BridgeClass>(native: &T) -> Arc<T> {
    match native.object_base().shared().into_any().downcast::<T>() {
        Ok(shared) => shared,
        Err(_) => unreachable!("self-reference of a different type"),
    }
}

/// Copies start out unattached; a shell belongs to exactly one object.
impl Clone for ObjectBase {
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl fmt::Debug for ObjectBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ObjectBase")
            .field("phase", &state.phase)
            .field("handle", &state.handle)
            .field("shell", &state.wrapper.as_ref().map(WeakRef::id))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct Node {
        base: ObjectBase,
        label: &'static str,
    }

    crate::bridge_class!(Node, base, "test/Node");

    #[test]
    fn new_base_is_unattached() {
        let base = ObjectBase::new();
        assert_eq!(base.phase(), Phase::Unattached);
        assert!(base.handle().is_none());
        assert!(base.shell_id().is_none());
    }

    #[test]
    #[should_panic(expected = "no self-reference")]
    fn shared_before_attach_panics() {
        let node = Node {
            base: ObjectBase::new(),
            label: "a",
        };
        let _ = node.base.shared();
    }

    #[test]
    fn clone_does_not_copy_attachment() {
        let node = Node {
            base: ObjectBase::new(),
            label: "a",
        };
        let copy = node.clone();
        assert_eq!(copy.label, "a");
        assert_eq!(copy.base.phase(), Phase::Unattached);
    }

    fn bridge() -> Bridge {
        let heap = Arc::new(crate::runtime::ManagedHeap::default());
        let bridge = Bridge::install(heap, crate::bridge::BridgeConfig::default());
        bridge.register::<Node>();
        bridge
    }

    #[test]
    #[should_panic(expected = "attached twice")]
    fn attaching_twice_panics() {
        let bridge = bridge();
        let node = Arc::new(Node {
            base: ObjectBase::new(),
            label: "a",
        });
        let shell = bridge.get_ref(&node).unwrap();

        let this: Arc<dyn Bridged> = node.clone();
        let _ = node.base.attach(&bridge, &shell, this);
    }

    #[test]
    fn finalize_for_other_shell_is_stale() {
        let bridge = bridge();
        let node = Arc::new(Node {
            base: ObjectBase::new(),
            label: "a",
        });
        let shell = bridge.get_ref(&node).unwrap();

        let other = ObjectId::new(shell.id().get() + 100);
        assert_eq!(node.base.finalize(&bridge, other), FinalizeOutcome::Stale);
        assert!(node.base.is_attached());

        assert_eq!(
            node.base.finalize(&bridge, shell.id()),
            FinalizeOutcome::Released
        );
        assert_eq!(node.base.phase(), Phase::Finalized);
        assert_eq!(Arc::strong_count(&node), 1);
    }

    #[test]
    fn class_descriptor_comes_from_macro() {
        assert_eq!(<Node as BridgeClass>::CLASS.name, "test/Node");
        let node: Arc<dyn Bridged> = Arc::new(Node {
            base: ObjectBase::new(),
            label: "b",
        });
        assert!(node.as_any().downcast_ref::<Node>().is_some());
        assert!(node.into_any().downcast::<Node>().is_ok());
    }
}
