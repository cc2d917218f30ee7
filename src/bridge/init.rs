//! Construction adapter
//!
//! When the runtime constructs an object whose implementation is native, it
//! has already allocated the runtime half and passes it in before any native
//! state exists. [`Init`] holds that reference until the native constructor
//! has run, then attaches the two halves.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::debug;

use super::shell::ProxyShell;
use super::{Bridge, BridgeClass, Bridged};
use crate::error::{BridgeError, Result};
use crate::runtime::StrongRef;

/// A runtime-allocated object waiting for its native half
pub struct Init<T> {
    object: StrongRef,
    _native: PhantomData<fn() -> T>,
}

impl<T: BridgeClass> Init<T> {
    pub fn new(object: StrongRef) -> Self {
        Self {
            object,
            _native: PhantomData,
        }
    }

    /// The runtime object that will become the shell.
    pub fn object(&self) -> &StrongRef {
        &self.object
    }

    /// Run `ctor` and attach the result to the runtime object.
    pub fn create<F>(self, bridge: &Bridge, ctor: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> T,
    {
        self.try_create(bridge, || Ok::<T, std::convert::Infallible>(ctor()))
    }

    /// Like [`Init::create`] with a fallible constructor. On failure nothing
    /// is attached and the runtime object is released unattached.
    pub fn try_create<F, E>(self, bridge: &Bridge, ctor: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T, E>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        if bridge.config().check_construct_class {
            let found = self.object.class_name();
            if found != Some(T::CLASS.name) {
                return Err(BridgeError::ClassMismatch {
                    object: self.object.id(),
                    expected: T::CLASS.name,
                    found: found.unwrap_or("<collected>").to_string(),
                });
            }
        }

        let native = Arc::new(ctor().map_err(|err| BridgeError::Construct(err.into()))?);
        let this: Arc<dyn Bridged> = Arc::clone(&native) as Arc<dyn Bridged>;
        let shell = ProxyShell::from_ref(self.object);
        native.object_base().attach(bridge, &shell, this)?;

        bridge.metrics().record_construct();
        debug!(shell = %shell.id(), class = T::CLASS.name, "constructed native object for runtime");
        Ok(native)
    }
}

impl<T> fmt::Debug for Init<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Init")
            .field("object", &self.object)
            .field("native", &std::any::type_name::<T>())
            .finish()
    }
}
