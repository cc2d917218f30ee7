//! Bridge counters

use std::cmp::max;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
pub struct BridgeMetrics {
    shells_created: AtomicU64,
    attached: AtomicU64,
    constructed: AtomicU64,
    rebound: AtomicU64,
    finalized: AtomicU64,
    stale_notifications: AtomicU64,
    unattached_collections: AtomicU64,
    live: AtomicI64,
}

impl BridgeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_shell_created(&self) {
        self.shells_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_attach(&self) {
        self.attached.fetch_add(1, Ordering::Relaxed);
        self.live.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_construct(&self) {
        self.constructed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rebind(&self) {
        self.rebound.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_finalize(&self) {
        self.finalized.fetch_add(1, Ordering::Relaxed);
        self.live.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_stale(&self) {
        self.stale_notifications.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unattached_collection(&self) {
        self.unattached_collections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BridgeMetricsSnapshot {
        BridgeMetricsSnapshot {
            shells_created: self.shells_created.load(Ordering::Relaxed),
            attached: self.attached.load(Ordering::Relaxed),
            constructed: self.constructed.load(Ordering::Relaxed),
            rebound: self.rebound.load(Ordering::Relaxed),
            finalized: self.finalized.load(Ordering::Relaxed),
            stale_notifications: self.stale_notifications.load(Ordering::Relaxed),
            unattached_collections: self.unattached_collections.load(Ordering::Relaxed),
            live_objects: max(self.live.load(Ordering::Relaxed), 0) as u64,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeMetricsSnapshot {
    /// Shells allocated by `get_ref`
    pub shells_created: u64,
    /// Successful attaches, including runtime-initiated construction
    pub attached: u64,
    /// Objects built through the construction adapter
    pub constructed: u64,
    /// Expired shells replaced before their finalization arrived
    pub rebound: u64,
    /// Self-references released by finalization
    pub finalized: u64,
    /// Notifications for shells no longer bound to their object
    pub stale_notifications: u64,
    /// Collected shells that were never attached
    pub unattached_collections: u64,
    /// Objects currently attached
    pub live_objects: u64,
}
