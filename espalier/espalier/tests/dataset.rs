use espalier::core::{
    ArrayId, ArrayStore, MemoryBackend, PrimitiveType, Scalar, SchemaError, SchemaNode, TypeDecl,
    Value,
};
use espalier::{AccessError, Dataset, DatasetBuilder, DatasetError};

fn event_entry() -> TypeDecl {
    TypeDecl::record([
        ("run", TypeDecl::primitive(PrimitiveType::I64)),
        (
            "Muon",
            TypeDecl::list(TypeDecl::record([
                ("pt", TypeDecl::primitive(PrimitiveType::F64)),
                ("eta", TypeDecl::primitive(PrimitiveType::F64)),
            ])),
        ),
    ])
}

fn event(run: i64, muons: &[(f64, f64)]) -> Value {
    Value::record([
        Value::from(run),
        Value::list(
            muons
                .iter()
                .map(|&(pt, eta)| Value::record([Value::from(pt), Value::from(eta)])),
        ),
    ])
}

fn events() -> Dataset {
    let mut builder = DatasetBuilder::new(&event_entry()).unwrap();
    builder
        .append(&event(1, &[(1.0, 0.5), (2.0, -0.3)]))
        .unwrap();
    builder.append(&event(2, &[])).unwrap();
    builder.append(&event(3, &[(3.0, 1.2)])).unwrap();
    builder.build().unwrap()
}

#[test]
fn builder_shreds_entries_into_flat_arrays() {
    let events = events();
    assert_eq!(events.len(), 3);

    let store = events.store();
    assert_eq!(store.len(&ArrayId::from("run")).unwrap(), 3);
    assert_eq!(store.len(&ArrayId::from("Muon.pt")).unwrap(), 3);
    assert_eq!(
        store.read(&ArrayId::from("Muon#starts"), 1).unwrap(),
        Scalar::I64(2)
    );
    assert_eq!(
        store.read(&ArrayId::from("Muon#stops"), 1).unwrap(),
        Scalar::I64(2)
    );
    assert_eq!(
        store.read(&ArrayId::from("Muon.pt"), 2).unwrap(),
        Scalar::F64(3.0)
    );
}

#[test]
fn proxies_materialize_fields_on_demand() {
    let events = events();

    let entry = events.get(0).unwrap();
    let record = entry.try_record().unwrap();
    assert_eq!(
        record.get("run").unwrap().try_scalar().unwrap(),
        Scalar::I64(1)
    );

    let muons = record.get("Muon").unwrap();
    let muons = muons.try_list().unwrap();
    assert_eq!(muons.len(), 2);
    let first = muons.get(0).unwrap();
    let first = first.try_record().unwrap();
    assert_eq!(
        first.get("pt").unwrap().try_scalar().unwrap(),
        Scalar::F64(1.0)
    );

    let empty = events.get(1).unwrap();
    let empty = empty.try_record().unwrap().get("Muon").unwrap();
    assert!(empty.try_list().unwrap().is_empty());
}

#[test]
fn entry_index_past_end_fails() {
    let events = events();
    match events.get(3) {
        Err(AccessError::IndexOutOfBounds { index, len }) => {
            assert_eq!(index, 3);
            assert_eq!(len, 3);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn list_indexing_distinguishes_negative_from_past_end() {
    let events = events();
    let entry = events.get(0).unwrap();
    let muons = entry.try_record().unwrap().get("Muon").unwrap();
    let muons = muons.try_list().unwrap();

    match muons.get(5) {
        Err(AccessError::IndexOutOfBounds { index: 5, len: 2 }) => {}
        other => panic!("unexpected result: {other:?}"),
    }
    match muons.get_signed(-1) {
        Err(AccessError::NegativeIndex { index: -1 }) => {}
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn unknown_field_is_a_schema_error() {
    let events = events();
    let entry = events.get(0).unwrap();
    let record = entry.try_record().unwrap();
    match record.get("mass") {
        Err(AccessError::Schema(SchemaError::UnknownPath { path })) => assert_eq!(path, "mass"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn views_compare_by_identity() {
    let events = events();
    let a = events.get(0).unwrap();
    let b = events.get(0).unwrap();
    assert_eq!(a.try_record().unwrap(), b.try_record().unwrap());

    let c = events.get(1).unwrap();
    assert_ne!(a.try_record().unwrap(), c.try_record().unwrap());
}

#[test]
fn union_tags_select_the_variant() {
    let entry = TypeDecl::record([
        ("id", TypeDecl::primitive(PrimitiveType::I64)),
        (
            "shape",
            TypeDecl::union([
                TypeDecl::primitive(PrimitiveType::I64),
                TypeDecl::list(TypeDecl::primitive(PrimitiveType::F64)),
            ]),
        ),
    ]);
    let mut builder = DatasetBuilder::new(&entry).unwrap();
    builder
        .append(&Value::record([
            Value::from(1i64),
            Value::union(0, Value::from(7i64)),
        ]))
        .unwrap();
    builder
        .append(&Value::record([
            Value::from(2i64),
            Value::union(1, Value::list([Value::from(1.5f64), Value::from(2.5f64)])),
        ]))
        .unwrap();
    let shapes = builder.build().unwrap();

    let first = shapes.get(0).unwrap();
    let first = first.try_record().unwrap().get("shape").unwrap();
    assert_eq!(first.try_scalar().unwrap(), Scalar::I64(7));

    let second = shapes.get(1).unwrap();
    let second = second.try_record().unwrap().get("shape").unwrap();
    let items = second.try_list().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(
        items.get(1).unwrap().try_scalar().unwrap(),
        Scalar::F64(2.5)
    );
}

#[test]
fn nullable_pointer_materializes_target_or_null() {
    let entry = TypeDecl::record([
        (
            "Muon",
            TypeDecl::list(TypeDecl::record([(
                "pt",
                TypeDecl::primitive(PrimitiveType::F64),
            )])),
        ),
        ("best", TypeDecl::pointer("Muon", true)),
    ]);
    let mut builder = DatasetBuilder::new(&entry).unwrap();
    builder
        .append(&Value::record([
            Value::list([
                Value::record([Value::from(1.0f64)]),
                Value::record([Value::from(2.0f64)]),
            ]),
            Value::Ref(1),
        ]))
        .unwrap();
    builder
        .append(&Value::record([
            Value::list([Value::record([Value::from(3.0f64)])]),
            Value::Null,
        ]))
        .unwrap();
    let events = builder.build().unwrap();

    let best = events.get(0).unwrap();
    let best = best.try_record().unwrap().get("best").unwrap();
    let best = best.try_record().unwrap();
    assert_eq!(
        best.get("pt").unwrap().try_scalar().unwrap(),
        Scalar::F64(2.0)
    );

    let absent = events.get(1).unwrap();
    let absent = absent.try_record().unwrap().get("best").unwrap();
    assert!(absent.is_null());
}

#[test]
fn append_rejects_mismatched_values_and_poisons_the_builder() {
    let mut builder = DatasetBuilder::new(&event_entry()).unwrap();
    match builder.append(&Value::from(1i64)) {
        Err(DatasetError::Schema(SchemaError::KindMismatch {
            expected, found, ..
        })) => {
            assert_eq!(expected, "record");
            assert_eq!(found, "scalar");
        }
        other => panic!("unexpected result: {other:?}"),
    }
    match builder.build() {
        Err(DatasetError::Corrupt { .. }) => {}
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn record_arity_must_match_declaration() {
    let mut builder = DatasetBuilder::new(&event_entry()).unwrap();
    match builder.append(&Value::record([Value::from(1i64)])) {
        Err(DatasetError::Corrupt { detail }) => assert!(detail.contains("declares 2 fields")),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn from_parts_rejects_window_past_domain() {
    let root = SchemaNode::from_decl(&TypeDecl::list(TypeDecl::record([(
        "x",
        TypeDecl::primitive(PrimitiveType::I64),
    )])))
    .unwrap();
    let mut backend = MemoryBackend::new();
    backend.insert("#starts", vec![0i64]);
    backend.insert("#stops", vec![5i64]);
    backend.insert("x", vec![1i64, 2]);
    match Dataset::from_parts(root, ArrayStore::from(backend)) {
        Err(DatasetError::Corrupt { .. }) => {}
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn check_offsets_rejects_overrunning_nested_list() {
    let root = SchemaNode::from_decl(&TypeDecl::list(TypeDecl::record([(
        "Muon",
        TypeDecl::list(TypeDecl::record([(
            "pt",
            TypeDecl::primitive(PrimitiveType::F64),
        )])),
    )])))
    .unwrap();
    let mut backend = MemoryBackend::new();
    backend.insert("#starts", vec![0i64]);
    backend.insert("#stops", vec![1i64]);
    backend.insert("Muon#starts", vec![0i64]);
    backend.insert("Muon#stops", vec![9i64]);
    backend.insert("Muon.pt", vec![1.0f64, 2.0]);
    let dataset = Dataset::from_parts(root, ArrayStore::from(backend)).unwrap();
    match dataset.check_offsets() {
        Err(DatasetError::Corrupt { .. }) => {}
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn from_parts_rejects_mistyped_arrays() {
    let root = SchemaNode::from_decl(&TypeDecl::list(TypeDecl::record([(
        "x",
        TypeDecl::primitive(PrimitiveType::I64),
    )])))
    .unwrap();
    let mut backend = MemoryBackend::new();
    backend.insert("#starts", vec![0i64]);
    backend.insert("#stops", vec![1i64]);
    backend.insert("x", vec![1.5f64]);
    match Dataset::from_parts(root, ArrayStore::from(backend)) {
        Err(DatasetError::Store(_)) => {}
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn record_batches_chunk_by_batch_size() {
    let events = events();
    let mut sizes = Vec::new();
    events
        .for_each_record_batch(2, |batch| {
            sizes.push(batch.num_rows());
            Ok(())
        })
        .unwrap();
    assert_eq!(sizes, vec![2, 1]);
}

#[test]
fn entries_iterate_in_order() {
    let events = events();
    let runs: Vec<i64> = events
        .entries()
        .map(|entry| {
            entry
                .unwrap()
                .try_record()
                .unwrap()
                .get("run")
                .unwrap()
                .try_scalar()
                .unwrap()
                .try_i64()
                .unwrap()
        })
        .collect();
    assert_eq!(runs, vec![1, 2, 3]);
}

#[test]
fn shared_pointer_targets_use_one_set_of_arrays() {
    let entry = TypeDecl::record([
        (
            "Muon",
            TypeDecl::list(TypeDecl::record([(
                "pt",
                TypeDecl::primitive(PrimitiveType::F64),
            )])),
        ),
        ("best", TypeDecl::pointer("Muon", false)),
    ]);
    let root = SchemaNode::from_decl(&TypeDecl::list(entry)).unwrap();
    let arrays = root.arrays();
    assert!(arrays.contains_key(&ArrayId::from("best#positions")));
    assert!(!arrays.contains_key(&ArrayId::from("best#mask")));
    // The pointer reads the same item arrays the Muon field owns.
    assert_eq!(
        arrays.keys().filter(|id| id.as_str() == "Muon.pt").count(),
        1
    );
}
