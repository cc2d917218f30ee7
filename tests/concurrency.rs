mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use common::{Tracked, counter, drops, setup};
use rayon::prelude::*;
use shellbridge::bridge::{to_runtime, to_shared};
use shellbridge::runtime::HeapConfig;

#[test]
fn concurrent_first_get_ref_creates_one_shell() {
    let (heap, bridge) = setup(HeapConfig::default());
    let native = Tracked::new(&counter());

    let ids: Vec<_> = (0..64)
        .into_par_iter()
        .map(|_| bridge.get_ref(&native).unwrap().id())
        .collect();

    assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(heap.stats().allocations, 1);
    assert_eq!(bridge.metrics().snapshot().shells_created, 1);
    assert_eq!(bridge.handles().len(), 1);
}

#[test]
fn collections_race_with_round_trips() {
    let (heap, bridge) = setup(HeapConfig::default());
    let count = counter();
    let stop = Arc::new(AtomicBool::new(false));

    let collector = {
        let heap = Arc::clone(&heap);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                heap.collect();
                thread::yield_now();
            }
        })
    };

    (0..256).into_par_iter().for_each(|i| {
        let native = Tracked::new(&count);
        native.value.store(i, Ordering::Relaxed);

        let reference = to_runtime(&bridge, Some(&native)).unwrap().unwrap();
        let back = to_shared::<Tracked>(&bridge, Some(&reference))
            .unwrap()
            .unwrap();
        assert!(Arc::ptr_eq(&back, &native));
        assert_eq!(back.value.load(Ordering::Relaxed), i);
    });

    stop.store(true, Ordering::Relaxed);
    collector.join().unwrap();

    heap.collect();
    assert_eq!(drops(&count), 256);
    assert!(bridge.handles().is_empty());

    let metrics = bridge.metrics().snapshot();
    assert_eq!(metrics.attached, 256);
    assert_eq!(metrics.finalized, 256);
    assert_eq!(metrics.live_objects, 0);
}

#[test]
fn finalizer_thread_races_with_native_release() {
    let (heap, bridge) = setup(HeapConfig::deferred_finalization());
    let count = counter();

    let natives: Vec<_> = (0..128).map(|_| Tracked::new(&count)).collect();
    for native in &natives {
        drop(bridge.get_ref(native).unwrap());
    }
    heap.collect();
    assert_eq!(heap.pending_finalization(), 128);

    let finalizer = {
        let heap = Arc::clone(&heap);
        thread::spawn(move || heap.run_finalizers())
    };
    natives.into_par_iter().for_each(drop);

    assert_eq!(finalizer.join().unwrap(), 128);
    assert_eq!(drops(&count), 128);
}
