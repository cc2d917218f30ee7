#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use shellbridge::bridge::{Bridge, BridgeConfig, ObjectBase};
use shellbridge::runtime::{ClassDescriptor, HeapConfig, ManagedHeap, ManagedRuntime};

pub const HOLDER: ClassDescriptor = ClassDescriptor::plain("test/Holder");

/// Native type that counts its destructions
#[derive(Debug)]
pub struct Tracked {
    base: ObjectBase,
    pub value: AtomicI64,
    drops: Arc<AtomicUsize>,
}

shellbridge::bridge_class!(Tracked, base, "test/Tracked");

impl Tracked {
    pub fn new(drops: &Arc<AtomicUsize>) -> Arc<Self> {
        Arc::new(Self::unshared(drops))
    }

    pub fn unshared(drops: &Arc<AtomicUsize>) -> Self {
        Self {
            base: ObjectBase::new(),
            value: AtomicI64::new(0),
            drops: Arc::clone(drops),
        }
    }

    pub fn base(&self) -> &ObjectBase {
        &self.base
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
pub struct Other {
    base: ObjectBase,
}

shellbridge::bridge_class!(Other, base, "test/Other");

impl Other {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            base: ObjectBase::new(),
        })
    }
}

pub fn setup(heap_config: HeapConfig) -> (Arc<ManagedHeap>, Bridge) {
    setup_with(heap_config, BridgeConfig::default())
}

pub fn setup_with(heap_config: HeapConfig, config: BridgeConfig) -> (Arc<ManagedHeap>, Bridge) {
    let heap = Arc::new(ManagedHeap::new(heap_config));
    heap.define_class(&HOLDER);
    let bridge = Bridge::install(heap.clone(), config);
    bridge.register::<Tracked>();
    bridge.register::<Other>();
    (heap, bridge)
}

pub fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

pub fn drops(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}
