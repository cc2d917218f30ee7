//! Conversions at the runtime boundary
//!
//! Two families:
//!
//! - runtime reference to a borrowed native object ([`with_native`]), used
//!   for `this` in calls coming from the runtime; no ownership moves;
//! - runtime reference to and from shared native ownership ([`to_shared`],
//!   [`to_runtime`], [`RuntimeConvert`]); a null reference and an empty
//!   `Option` map onto each other.

use std::any::type_name;
use std::sync::Arc;

use super::shell::ProxyShell;
use super::{Bridge, BridgeClass, Bridged};
use crate::error::{BridgeError, Result};
use crate::runtime::StrongRef;

fn resolve(bridge: &Bridge, reference: &StrongRef) -> Result<Arc<dyn Bridged>> {
    let handle =
        ProxyShell::ptr_of(reference)?.ok_or(BridgeError::NotAttached(reference.id()))?;
    bridge
        .handles()
        .resolve(handle)
        .ok_or(BridgeError::StaleHandle(handle))
}

/// Run `f` with the native object behind `reference`.
pub fn with_native<T, R, F>(bridge: &Bridge, reference: &StrongRef, f: F) -> Result<R>
where
    T: BridgeClass,
    F: FnOnce(&T) -> R,
{
    let object = resolve(bridge, reference)?;
    let native = object
        .as_any()
        .downcast_ref::<T>()
        .ok_or(BridgeError::TypeMismatch {
            expected: type_name::<T>(),
        })?;
    Ok(f(native))
}

/// Shared ownership of the native object behind `reference`; `None` for a
/// null reference.
pub fn to_shared<T: BridgeClass>(
    bridge: &Bridge,
    reference: Option<&StrongRef>,
) -> Result<Option<Arc<T>>> {
    let Some(reference) = reference else {
        return Ok(None);
    };

    let object = resolve(bridge, reference)?;
    let shared = object.object_base().shared();
    shared
        .into_any()
        .downcast::<T>()
        .map(Some)
        .map_err(|_| BridgeError::TypeMismatch {
            expected: type_name::<T>(),
        })
}

/// Runtime reference for `native`, creating its shell if needed; `None` for
/// an empty value.
pub fn to_runtime<T: BridgeClass>(
    bridge: &Bridge,
    native: Option<&Arc<T>>,
) -> Result<Option<StrongRef>> {
    native
        .map(|native| bridge.get_ref(native).map(ProxyShell::into_ref))
        .transpose()
}

/// Shared-ownership conversion in both directions
pub trait RuntimeConvert: Sized {
    fn from_runtime(bridge: &Bridge, reference: Option<&StrongRef>) -> Result<Self>;

    fn to_runtime(&self, bridge: &Bridge) -> Result<Option<StrongRef>>;
}

impl<T: BridgeClass> RuntimeConvert for Option<Arc<T>> {
    fn from_runtime(bridge: &Bridge, reference: Option<&StrongRef>) -> Result<Self> {
        to_shared(bridge, reference)
    }

    fn to_runtime(&self, bridge: &Bridge) -> Result<Option<StrongRef>> {
        to_runtime(bridge, self.as_ref())
    }
}

impl<T: BridgeClass> RuntimeConvert for Arc<T> {
    /// A null reference cannot become an `Arc<T>` and is reported as not
    /// attached.
    fn from_runtime(bridge: &Bridge, reference: Option<&StrongRef>) -> Result<Self> {
        match reference {
            Some(reference) => to_shared(bridge, Some(reference))?
                .ok_or(BridgeError::NotAttached(reference.id())),
            None => Err(BridgeError::TypeMismatch {
                expected: type_name::<T>(),
            }),
        }
    }

    fn to_runtime(&self, bridge: &Bridge) -> Result<Option<StrongRef>> {
        to_runtime(bridge, Some(self))
    }
}
