use std::sync::Arc;

use espalier_core::{
    ArrayId, ArrayStore, MemoryBackend, PrimitiveBuilder, PrimitiveType, Scalar, StoreError,
};

fn base_store() -> ArrayStore {
    let mut backend = MemoryBackend::new();
    backend.insert("x", vec![1.5f64, 2.5, 3.5]);
    backend.insert("n", vec![10i32, 20]);
    ArrayStore::from(backend)
}

#[test]
fn memory_backend_serves_len_dtype_and_reads() {
    let store = base_store();
    let x = ArrayId::from("x");

    assert_eq!(store.len(&x).unwrap(), 3);
    assert_eq!(store.dtype(&x).unwrap(), PrimitiveType::F64);
    assert_eq!(store.read(&x, 1).unwrap(), Scalar::F64(2.5));
}

#[test]
fn unknown_array_is_reported_by_name() {
    let store = base_store();
    match store.read(&ArrayId::from("missing"), 0) {
        Err(StoreError::UnknownArray { id }) => assert_eq!(id.as_str(), "missing"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn out_of_bounds_reads_fail_without_clamping() {
    let store = base_store();
    match store.read(&ArrayId::from("n"), 2) {
        Err(StoreError::OutOfBounds { index, len, .. }) => {
            assert_eq!(index, 2);
            assert_eq!(len, 2);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn overlay_shadows_older_layers_and_keeps_them_valid() {
    let store = base_store();

    let mut layer = MemoryBackend::new();
    layer.insert("x", vec![9.0f64]);
    layer.insert("y", vec![true, false]);
    let layered = store.with_overlay(Arc::new(layer));

    assert_eq!(layered.depth(), 2);
    assert_eq!(layered.read(&ArrayId::from("x"), 0).unwrap(), Scalar::F64(9.0));
    assert_eq!(layered.len(&ArrayId::from("x")).unwrap(), 1);
    assert_eq!(
        layered.read(&ArrayId::from("y"), 1).unwrap(),
        Scalar::Bool(false)
    );
    // Older arrays stay reachable through the overlay.
    assert_eq!(layered.read(&ArrayId::from("n"), 0).unwrap(), Scalar::I32(10));
    // The original store is untouched by the derivation.
    assert_eq!(store.depth(), 1);
    assert_eq!(store.read(&ArrayId::from("x"), 0).unwrap(), Scalar::F64(1.5));
    assert!(!store.contains(&ArrayId::from("y")));
}

#[test]
fn read_range_resolves_start_stop_windows() {
    let mut backend = MemoryBackend::new();
    backend.insert("m#starts", vec![0i64, 2, 2]);
    backend.insert("m#stops", vec![2i64, 2, 3]);
    let store = ArrayStore::from(backend);

    let starts = ArrayId::from("m#starts");
    let stops = ArrayId::from("m#stops");
    assert_eq!(store.read_range(&starts, &stops, 0).unwrap(), (0, 2));
    assert_eq!(store.read_range(&starts, &stops, 1).unwrap(), (2, 2));
    assert_eq!(store.read_range(&starts, &stops, 2).unwrap(), (2, 3));
}

#[test]
fn inverted_ranges_are_rejected() {
    let mut backend = MemoryBackend::new();
    backend.insert("m#starts", vec![2i64]);
    backend.insert("m#stops", vec![1i64]);
    let store = ArrayStore::from(backend);

    match store.read_range(&ArrayId::from("m#starts"), &ArrayId::from("m#stops"), 0) {
        Err(StoreError::InvalidRange { start, stop, .. }) => {
            assert_eq!((start, stop), (2, 1));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn negative_index_values_are_rejected() {
    let mut backend = MemoryBackend::new();
    backend.insert("sel#positions", vec![-1i64]);
    let store = ArrayStore::from(backend);

    match store.read_index(&ArrayId::from("sel#positions"), 0) {
        Err(StoreError::BadIndexValue { value, .. }) => assert_eq!(value, -1),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn builder_enforces_a_uniform_element_type() {
    let mut builder = PrimitiveBuilder::new(PrimitiveType::F64);
    builder.push(Scalar::F64(1.0)).unwrap();
    assert!(builder.push(Scalar::I64(2)).is_err());
    builder.push(Scalar::F64(3.0)).unwrap();

    let array = builder.finish();
    assert_eq!(array.len(), 2);
    assert_eq!(array.dtype(), PrimitiveType::F64);
    assert_eq!(array.get(1), Some(Scalar::F64(3.0)));
    assert_eq!(array.get(2), None);
}

#[test]
fn scalar_conversions_follow_the_widening_rules() {
    assert_eq!(Scalar::I32(7).to_f64_lossy().unwrap(), 7.0);
    assert_eq!(Scalar::U16(9).to_i64_exact().unwrap(), 9);
    assert!(Scalar::Bool(true).to_f64_lossy().is_err());
    assert!(Scalar::F64(1.0).to_i64_exact().is_err());
    assert!(Scalar::U64(u64::MAX).to_i64_exact().is_err());

    let err = Scalar::I64(1).try_f64().unwrap_err();
    assert_eq!(err.expected, "F64");
    assert_eq!(err.found, "I64");
}
