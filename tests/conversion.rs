mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use common::{Other, Tracked, counter, setup};
use shellbridge::BridgeClass;
use shellbridge::bridge::{NativeHandle, ProxyShell, RuntimeConvert, to_runtime, to_shared, with_native};
use shellbridge::error::BridgeError;
use shellbridge::runtime::{HeapConfig, StrongRef};

#[test]
fn borrowed_access_reaches_native_state() {
    let (_heap, bridge) = setup(HeapConfig::default());
    let native = Tracked::new(&counter());
    let shell = bridge.get_ref(&native).unwrap();

    with_native(&bridge, shell.reference(), |tracked: &Tracked| {
        tracked.value.fetch_add(3, Ordering::Relaxed);
    })
    .unwrap();

    assert_eq!(native.value.load(Ordering::Relaxed), 3);
    assert_eq!(Arc::strong_count(&native), 2, "borrow took no ownership");
}

#[test]
fn unattached_reference_is_rejected() {
    let (heap, bridge) = setup(HeapConfig::default());
    let object = StrongRef::allocate(heap.clone(), &Tracked::CLASS).unwrap();

    let err = with_native(&bridge, &object, |_: &Tracked| ()).unwrap_err();
    assert!(matches!(err, BridgeError::NotAttached(id) if id == object.id()));
}

#[test]
fn unknown_handle_is_stale() {
    let (heap, bridge) = setup(HeapConfig::default());
    let object = StrongRef::allocate(heap.clone(), &Tracked::CLASS).unwrap();
    let bogus = NativeHandle::from_raw(9_999).unwrap();
    ProxyShell::from_ref(object.clone()).set_ptr(bogus).unwrap();

    let err = to_shared::<Tracked>(&bridge, Some(&object)).unwrap_err();
    assert!(matches!(err, BridgeError::StaleHandle(handle) if handle == bogus));
}

#[test]
fn wrong_native_type_is_rejected() {
    let (_heap, bridge) = setup(HeapConfig::default());
    let other = Other::new();
    let shell = bridge.get_ref(&other).unwrap();

    let err = with_native(&bridge, shell.reference(), |_: &Tracked| ()).unwrap_err();
    assert!(matches!(err, BridgeError::TypeMismatch { expected } if expected.ends_with("Tracked")));

    let err = to_shared::<Tracked>(&bridge, Some(shell.reference())).unwrap_err();
    assert!(matches!(err, BridgeError::TypeMismatch { .. }));
}

#[test]
fn shared_round_trip_preserves_identity() {
    let (_heap, bridge) = setup(HeapConfig::default());
    let native = Tracked::new(&counter());

    let reference = to_runtime(&bridge, Some(&native)).unwrap().unwrap();
    let back = to_shared::<Tracked>(&bridge, Some(&reference)).unwrap().unwrap();
    assert!(Arc::ptr_eq(&back, &native));

    let again = to_runtime(&bridge, Some(&back)).unwrap().unwrap();
    assert!(again.same_object(&reference));
}

#[test]
fn null_maps_to_none_both_ways() {
    let (heap, bridge) = setup(HeapConfig::default());

    assert!(to_runtime::<Tracked>(&bridge, None).unwrap().is_none());
    assert!(to_shared::<Tracked>(&bridge, None).unwrap().is_none());
    assert_eq!(heap.stats().allocations, 0);
}

#[test]
fn runtime_convert_for_optional_arc() {
    let (_heap, bridge) = setup(HeapConfig::default());
    let native = Some(Tracked::new(&counter()));

    let reference = native.to_runtime(&bridge).unwrap();
    let back = Option::<Arc<Tracked>>::from_runtime(&bridge, reference.as_ref()).unwrap();
    assert!(Arc::ptr_eq(back.as_ref().unwrap(), native.as_ref().unwrap()));

    let empty: Option<Arc<Tracked>> = None;
    assert!(empty.to_runtime(&bridge).unwrap().is_none());
    assert!(
        Option::<Arc<Tracked>>::from_runtime(&bridge, None)
            .unwrap()
            .is_none()
    );
}

#[test]
fn runtime_convert_for_arc_requires_a_reference() {
    let (_heap, bridge) = setup(HeapConfig::default());
    let native = Tracked::new(&counter());

    let reference = native.to_runtime(&bridge).unwrap();
    let back = Arc::<Tracked>::from_runtime(&bridge, reference.as_ref()).unwrap();
    assert!(Arc::ptr_eq(&back, &native));

    assert!(matches!(
        Arc::<Tracked>::from_runtime(&bridge, None),
        Err(BridgeError::TypeMismatch { .. })
    ));
}

#[test]
fn conversion_after_finalization_reports_stale_handle() {
    let (heap, bridge) = setup(HeapConfig::deferred_finalization());
    let native = Tracked::new(&counter());
    let shell = bridge.get_ref(&native).unwrap();
    let reference = shell.reference().clone();
    let handle = native.base().handle().unwrap();

    // Deliver a finalization while a reference to the shell is still held.
    bridge.notify_collected(shell.id(), handle.to_raw());
    let err = to_shared::<Tracked>(&bridge, Some(&reference)).unwrap_err();
    assert!(matches!(err, BridgeError::StaleHandle(stale) if stale == handle));
}
