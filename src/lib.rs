//! Lifetime bridging between reference-counted native objects and the proxy
//! shells that represent them in a garbage-collected runtime.
//!
//! A native type embeds an [`ObjectBase`](bridge::ObjectBase) and declares
//! its runtime class with [`bridge_class!`]. The first time the object is
//! handed to the runtime, a proxy shell is allocated and attached; from then
//! on the object keeps itself alive until the runtime finalizes the shell.

pub mod bridge;
pub mod cli;
pub mod demo;
pub mod error;
pub mod runtime;
pub mod utils;

pub use bridge::{Bridge, BridgeClass, BridgeConfig, Bridged, ObjectBase, ProxyShell};
pub use error::{BridgeError, Result};
pub use runtime::{ManagedHeap, ManagedRuntime, StrongRef, WeakRef};
