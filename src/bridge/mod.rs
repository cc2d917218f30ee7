//! Lifetime bridge between native objects and runtime proxy shells
//!
//! A [`Bridge`] owns everything the protocol shares across objects: the
//! runtime it talks to, the handle table, the class registry, metrics and
//! configuration. It is cheap to clone.
//!
//! The runtime reports collected shells through
//! [`Bridge::notify_collected`], the only entry point that is not driven by
//! native callers.

pub mod config;
pub mod convert;
pub mod handles;
pub mod init;
pub mod metrics;
pub mod object;
pub mod registry;
pub mod shell;

use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;
use tracing::{debug, info, trace, warn};

pub use config::BridgeConfig;
pub use convert::{RuntimeConvert, to_runtime, to_shared, with_native};
pub use handles::{HandleTable, NativeHandle};
pub use init::Init;
pub use metrics::{BridgeMetrics, BridgeMetricsSnapshot};
pub use object::{BridgeClass, Bridged, ObjectBase, Phase, shared};
pub use registry::{ClassProvider, ClassRegistry};
pub use shell::ProxyShell;

use crate::error::{BridgeError, Result};
use crate::runtime::{ManagedRuntime, ObjectId, StrongRef};
use object::FinalizeOutcome;

struct BridgeInner {
    runtime: Arc<dyn ManagedRuntime>,
    handles: HandleTable,
    registry: ClassRegistry,
    metrics: BridgeMetrics,
    config: BridgeConfig,
}

#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

static GLOBAL_BRIDGE: OnceCell<Bridge> = OnceCell::new();

impl Bridge {
    /// Set up a bridge over `runtime`: load every registered
    /// [`ClassProvider`], define the collected classes and take over the
    /// runtime's finalizer hook.
    pub fn install(runtime: Arc<dyn ManagedRuntime>, config: BridgeConfig) -> Self {
        let inner = Arc::new(BridgeInner {
            runtime,
            handles: HandleTable::new(),
            registry: ClassRegistry::new(),
            metrics: BridgeMetrics::new(),
            config,
        });

        inner.registry.load_providers();
        let classes = inner.registry.all();
        for class in &classes {
            inner.runtime.define_class(class);
        }

        // The hook must not keep the bridge alive; the runtime owns it.
        let weak: Weak<BridgeInner> = Arc::downgrade(&inner);
        inner.runtime.set_finalizer(Arc::new(move |shell, raw| {
            if let Some(inner) = weak.upgrade() {
                Bridge { inner }.notify_collected(shell, raw);
            }
        }));

        info!(classes = classes.len(), "bridge installed");
        Self { inner }
    }

    /// Register and define a class that was not submitted through
    /// `inventory`.
    pub fn register<T: BridgeClass>(&self) {
        self.inner.registry.register_type::<T>();
        self.inner.runtime.define_class(&T::CLASS);
        debug!(class = T::CLASS.name, "registered bridged class");
    }

    pub fn runtime(&self) -> &Arc<dyn ManagedRuntime> {
        &self.inner.runtime
    }

    pub fn handles(&self) -> &HandleTable {
        &self.inner.handles
    }

    pub fn registry(&self) -> &ClassRegistry {
        &self.inner.registry
    }

    pub fn metrics(&self) -> &BridgeMetrics {
        &self.inner.metrics
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    /// The shell attached to `native`, materializing one on first use.
    ///
    /// Concurrent first calls for the same object produce a single shell.
    ///
    /// # Panics
    ///
    /// Panics if the object's shell was already finalized.
    pub fn get_ref<T: BridgeClass>(&self, native: &Arc<T>) -> Result<ProxyShell> {
        let this: Arc<dyn Bridged> = Arc::clone(native) as Arc<dyn Bridged>;
        native.object_base().get_ref(self, &T::CLASS, this)
    }

    /// Wrap a runtime-allocated object for native construction.
    pub fn construct<T: BridgeClass>(&self, object: StrongRef) -> Init<T> {
        Init::new(object)
    }

    /// Finalizer entry point: the runtime collected `shell`, whose `ptr`
    /// field held `raw`.
    ///
    /// # Panics
    ///
    /// With `strict_notifications` set, panics when `raw` is a handle that was
    /// never issued.
    pub fn notify_collected(&self, shell: ObjectId, raw: i64) {
        let Some(handle) = NativeHandle::from_raw(raw) else {
            self.metrics().record_unattached_collection();
            trace!(shell = %shell, "collected shell was never attached");
            return;
        };

        let Some(object) = self.handles().resolve(handle) else {
            // A retired handle is a late notification for an object that was
            // already finalized through a newer shell.
            if self.handles().was_issued(handle) {
                self.metrics().record_stale();
                debug!(shell = %shell, handle = %handle, "finalize notification for retired handle");
                return;
            }
            if self.config().strict_notifications {
                panic!("finalize notification for {shell} names unknown {handle}");
            }
            self.metrics().record_stale();
            warn!(shell = %shell, handle = %handle, "finalize notification for unknown handle");
            return;
        };

        match object.object_base().finalize(self, shell) {
            FinalizeOutcome::Released => self.metrics().record_finalize(),
            FinalizeOutcome::Stale => self.metrics().record_stale(),
        }
        // `object` may be the last owner; the native object is destroyed here.
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("handles", &self.inner.handles)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// Make `bridge` the process-wide bridge.
pub fn install_global(bridge: Bridge) -> Result<&'static Bridge> {
    GLOBAL_BRIDGE
        .set(bridge)
        .map_err(|_| BridgeError::AlreadyInstalled)?;
    GLOBAL_BRIDGE.get().ok_or(BridgeError::AlreadyInstalled)
}

pub fn global() -> Option<&'static Bridge> {
    GLOBAL_BRIDGE.get()
}
