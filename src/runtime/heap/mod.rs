//! In-process managed heap
//!
//! A small garbage-collected object store implementing [`ManagedRuntime`].
//! Objects are rooted while they have strong references and stay reachable
//! through edges added with [`ManagedHeap::link`]. A collection sweeps every
//! unreachable object at once: weak references to it stop resolving
//! immediately, and objects of finalizable classes are queued so the
//! finalizer hook can be told about them, either right after the collection
//! or on the next [`ManagedHeap::run_finalizers`] call.
//!
//! Finalizer hooks are always invoked with no heap lock held, so they may
//! allocate, retain and release freely.

mod collector;
mod config;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use ahash::AHashMap;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, trace, warn};

pub use collector::CollectionStats;
pub use config::HeapConfig;

use super::{ClassDescriptor, FinalizerHook, ManagedRuntime, ObjectId, RuntimeError};

#[derive(Debug)]
struct HeapObject {
    class: ClassDescriptor,
    fields: AHashMap<&'static str, i64>,
    strong: usize,
    edges: Vec<ObjectId>,
}

#[derive(Debug, Clone, Copy)]
struct PendingFinalization {
    object: ObjectId,
    handle: i64,
}

#[derive(Debug, Default)]
struct HeapState {
    classes: AHashMap<&'static str, ClassDescriptor>,
    objects: AHashMap<ObjectId, HeapObject>,
    pending: Vec<PendingFinalization>,
    allocations: u64,
    collections: u64,
    objects_collected: u64,
    objects_finalized: u64,
}

/// Heap-wide counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HeapStats {
    pub live_objects: usize,
    pub pending_finalization: usize,
    pub allocations: u64,
    pub collections: u64,
    pub objects_collected: u64,
    pub objects_finalized: u64,
}

/// Garbage-collected object store
pub struct ManagedHeap {
    state: Mutex<HeapState>,
    finalizer: RwLock<Option<FinalizerHook>>,
    next_id: AtomicU64,
    config: HeapConfig,
}

impl ManagedHeap {
    pub fn new(config: HeapConfig) -> Self {
        Self {
            state: Mutex::new(HeapState::default()),
            finalizer: RwLock::new(None),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    /// Record a reference from `from` to `to`; `to` stays reachable while
    /// `from` is.
    pub fn link(&self, from: ObjectId, to: ObjectId) -> Result<(), RuntimeError> {
        let mut state = self.state.lock();
        if !state.objects.contains_key(&to) {
            return Err(RuntimeError::InvalidObject(to));
        }
        let object = state
            .objects
            .get_mut(&from)
            .ok_or(RuntimeError::InvalidObject(from))?;
        object.edges.push(to);
        Ok(())
    }

    /// Remove one reference from `from` to `to`.
    pub fn unlink(&self, from: ObjectId, to: ObjectId) -> Result<(), RuntimeError> {
        let mut state = self.state.lock();
        let object = state
            .objects
            .get_mut(&from)
            .ok_or(RuntimeError::InvalidObject(from))?;
        if let Some(pos) = object.edges.iter().position(|edge| *edge == to) {
            object.edges.swap_remove(pos);
        }
        Ok(())
    }

    /// Run a full mark-sweep collection.
    pub fn collect(&self) -> CollectionStats {
        let start = Instant::now();

        let mut stats = {
            let mut state = self.state.lock();
            let marked = collector::mark(&state.objects);
            let swept = collector::sweep(&mut state.objects, &marked);

            let mut queued = 0;
            for (id, object) in &swept {
                if let Some(field) = object.class.handle_field {
                    let handle = object.fields.get(field).copied().unwrap_or(0);
                    state.pending.push(PendingFinalization {
                        object: *id,
                        handle,
                    });
                    queued += 1;
                }
            }

            state.collections += 1;
            state.objects_collected += swept.len() as u64;

            CollectionStats {
                objects_collected: swept.len(),
                queued_for_finalization: queued,
                live_objects: state.objects.len(),
                duration_us: 0,
            }
        };

        stats.duration_us = start.elapsed().as_micros() as u64;
        debug!(
            collected = stats.objects_collected,
            queued = stats.queued_for_finalization,
            live = stats.live_objects,
            "heap collection finished"
        );

        if self.config.finalize_on_collect {
            self.run_finalizers();
        }

        stats
    }

    /// Deliver every queued finalization to the hook. Returns how many were
    /// delivered.
    pub fn run_finalizers(&self) -> usize {
        let pending = std::mem::take(&mut self.state.lock().pending);
        if pending.is_empty() {
            return 0;
        }

        let hook = self.finalizer.read().clone();
        let Some(hook) = hook else {
            warn!(
                dropped = pending.len(),
                "no finalizer installed, dropping queued finalizations"
            );
            return 0;
        };

        for entry in &pending {
            trace!(object = %entry.object, handle = entry.handle, "finalizing");
            hook(entry.object, entry.handle);
        }

        self.state.lock().objects_finalized += pending.len() as u64;
        pending.len()
    }

    pub fn is_live(&self, object: ObjectId) -> bool {
        self.state.lock().objects.contains_key(&object)
    }

    pub fn strong_count(&self, object: ObjectId) -> Option<usize> {
        self.state.lock().objects.get(&object).map(|o| o.strong)
    }

    pub fn pending_finalization(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn stats(&self) -> HeapStats {
        let state = self.state.lock();
        HeapStats {
            live_objects: state.objects.len(),
            pending_finalization: state.pending.len(),
            allocations: state.allocations,
            collections: state.collections,
            objects_collected: state.objects_collected,
            objects_finalized: state.objects_finalized,
        }
    }
}

impl Default for ManagedHeap {
    fn default() -> Self {
        Self::new(HeapConfig::default())
    }
}

impl ManagedRuntime for ManagedHeap {
    fn define_class(&self, class: &ClassDescriptor) {
        self.state.lock().classes.entry(class.name).or_insert(*class);
    }

    fn class_of(&self, object: ObjectId) -> Option<&'static str> {
        self.state.lock().objects.get(&object).map(|o| o.class.name)
    }

    fn allocate(&self, class: &ClassDescriptor) -> Result<ObjectId, RuntimeError> {
        let mut state = self.state.lock();
        let class = *state
            .classes
            .get(class.name)
            .ok_or_else(|| RuntimeError::ClassNotFound(class.name.to_string()))?;

        if self.config.is_bounded() && state.objects.len() >= self.config.max_objects {
            return Err(RuntimeError::OutOfMemory {
                class: class.name.to_string(),
                limit: self.config.max_objects,
            });
        }

        let id = ObjectId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let fields = class.fields.iter().map(|field| (*field, 0)).collect();
        state.objects.insert(
            id,
            HeapObject {
                class,
                fields,
                strong: 1,
                edges: Vec::new(),
            },
        );
        state.allocations += 1;
        trace!(object = %id, class = class.name, "allocated");
        Ok(id)
    }

    fn retain(&self, object: ObjectId) {
        match self.state.lock().objects.get_mut(&object) {
            Some(entry) => entry.strong += 1,
            None => warn!(object = %object, "retain on a collected object"),
        }
    }

    fn release(&self, object: ObjectId) {
        if let Some(entry) = self.state.lock().objects.get_mut(&object) {
            entry.strong = entry.strong.saturating_sub(1);
        }
    }

    fn upgrade(&self, object: ObjectId) -> bool {
        match self.state.lock().objects.get_mut(&object) {
            Some(entry) => {
                entry.strong += 1;
                true
            }
            None => false,
        }
    }

    fn get_int_field(&self, object: ObjectId, field: &str) -> Result<i64, RuntimeError> {
        let state = self.state.lock();
        let entry = state
            .objects
            .get(&object)
            .ok_or(RuntimeError::InvalidObject(object))?;
        entry
            .fields
            .get(field)
            .copied()
            .ok_or_else(|| RuntimeError::NoSuchField {
                class: entry.class.name.to_string(),
                field: field.to_string(),
            })
    }

    fn set_int_field(
        &self,
        object: ObjectId,
        field: &str,
        value: i64,
    ) -> Result<(), RuntimeError> {
        let mut state = self.state.lock();
        let entry = state
            .objects
            .get_mut(&object)
            .ok_or(RuntimeError::InvalidObject(object))?;
        let class = entry.class.name;
        let slot = entry
            .fields
            .get_mut(field)
            .ok_or_else(|| RuntimeError::NoSuchField {
                class: class.to_string(),
                field: field.to_string(),
            })?;
        *slot = value;
        Ok(())
    }

    fn set_finalizer(&self, hook: FinalizerHook) {
        *self.finalizer.write() = Some(hook);
    }
}
