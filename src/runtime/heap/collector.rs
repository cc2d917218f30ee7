//! Mark-sweep collection over the managed heap

use ahash::{AHashMap, AHashSet};
use serde::Serialize;

use super::HeapObject;
use crate::runtime::ObjectId;

/// Statistics from a single collection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    /// Number of objects swept
    pub objects_collected: usize,
    /// Swept objects queued for finalization
    pub queued_for_finalization: usize,
    /// Objects still live after the sweep
    pub live_objects: usize,
    /// Duration of the collection in microseconds
    pub duration_us: u64,
}

/// Mark phase: every object reachable from a strongly referenced root.
pub(super) fn mark(objects: &AHashMap<ObjectId, HeapObject>) -> AHashSet<ObjectId> {
    let mut marked = AHashSet::with_capacity(objects.len());
    let mut stack: Vec<ObjectId> = objects
        .iter()
        .filter(|(_, object)| object.strong > 0)
        .map(|(id, _)| *id)
        .collect();

    while let Some(id) = stack.pop() {
        if !marked.insert(id) {
            continue;
        }

        if let Some(object) = objects.get(&id) {
            for edge in &object.edges {
                if !marked.contains(edge) {
                    stack.push(*edge);
                }
            }
        }
    }

    marked
}

/// Sweep phase: remove and return every unmarked object.
pub(super) fn sweep(
    objects: &mut AHashMap<ObjectId, HeapObject>,
    marked: &AHashSet<ObjectId>,
) -> Vec<(ObjectId, HeapObject)> {
    let unmarked: Vec<ObjectId> = objects
        .keys()
        .filter(|id| !marked.contains(id))
        .copied()
        .collect();

    let mut swept = Vec::with_capacity(unmarked.len());
    for id in unmarked {
        if let Some(object) = objects.remove(&id) {
            swept.push((id, object));
        }
    }
    swept.sort_by_key(|(id, _)| *id);
    swept
}
