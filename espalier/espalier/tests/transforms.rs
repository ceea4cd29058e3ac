use std::sync::Arc;

use espalier::core::{
    ArrayId, PrimitiveType, Scalar, SchemaError, SchemaNode, TypeDecl, Value, resolve,
};
use espalier::{AccessError, Dataset, DatasetBuilder, TransformError};

fn event_entry() -> TypeDecl {
    TypeDecl::record([
        ("run", TypeDecl::primitive(PrimitiveType::I64)),
        (
            "Muon",
            TypeDecl::list(TypeDecl::record([(
                "pt",
                TypeDecl::primitive(PrimitiveType::F64),
            )])),
        ),
    ])
}

fn event(run: i64, pts: &[f64]) -> Value {
    Value::record([
        Value::from(run),
        Value::list(pts.iter().map(|&pt| Value::record([Value::from(pt)]))),
    ])
}

fn dataset(rows: &[(i64, &[f64])]) -> Dataset {
    let mut builder = DatasetBuilder::new(&event_entry()).unwrap();
    for &(run, pts) in rows {
        builder.append(&event(run, pts)).unwrap();
    }
    builder.build().unwrap()
}

fn nano() -> Dataset {
    dataset(&[(1, &[1.0, 2.0]), (2, &[]), (3, &[3.0])])
}

fn runs_of(dataset: &Dataset) -> Vec<i64> {
    dataset
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
        .collect()
}

fn pts_of(dataset: &Dataset, index: usize) -> Vec<f64> {
    let entry = dataset.get(index).unwrap();
    let muons = entry.try_record().unwrap().get("Muon").unwrap();
    let muons = muons.try_list().unwrap();
    muons
        .iter()
        .map(|muon| {
            muon.unwrap()
                .try_record()
                .unwrap()
                .get("pt")
                .unwrap()
                .try_scalar()
                .unwrap()
                .try_f64()
                .unwrap()
        })
        .collect()
}

fn scalar_f64_entries(dataset: &Dataset) -> Vec<f64> {
    dataset
        .entries()
        .map(|entry| entry.unwrap().try_scalar().unwrap().try_f64().unwrap())
        .collect()
}

#[test]
fn define_appends_a_parallel_column() {
    let events = nano();
    let derived = events
        .define("nmuon", |e| {
            Ok(Scalar::I64(e.try_record()?.get("Muon")?.try_list()?.len() as i64))
        })
        .unwrap();

    assert_eq!(derived.len(), 3);
    assert_eq!(derived.store().depth(), events.store().depth() + 1);

    let counts: Vec<i64> = derived
        .project("nmuon")
        .unwrap()
        .entries()
        .map(|entry| entry.unwrap().try_scalar().unwrap().try_i64().unwrap())
        .collect();
    assert_eq!(counts, vec![2, 0, 1]);

    let (before, after) = match (&**events.entry(), &**derived.entry()) {
        (SchemaNode::Record { fields: a }, SchemaNode::Record { fields: b }) => (a, b),
        other => panic!("unexpected entry nodes: {other:?}"),
    };
    assert_eq!(after.len(), before.len() + 1);
    assert!(Arc::ptr_eq(&before[0].node, &after[0].node));
    assert!(Arc::ptr_eq(&before[1].node, &after[1].node));
    assert_eq!(after[2].name.as_ref(), "nmuon");
}

#[test]
fn define_replaces_an_existing_field_in_place() {
    let events = nano();
    let scaled = events
        .define("run", |e| {
            let run = e.try_record()?.get("run")?.try_scalar()?.try_i64()?;
            Ok(Scalar::I64(run * 10))
        })
        .unwrap();

    assert_eq!(runs_of(&scaled), vec![10, 20, 30]);
    match &**scaled.entry() {
        SchemaNode::Record { fields } => {
            assert_eq!(fields.len(), 2);
            assert_eq!(fields[0].name.as_ref(), "run");
        }
        other => panic!("unexpected entry node: {}", other.kind_name()),
    }
}

#[test]
fn define_on_an_empty_domain_yields_an_empty_f64_column() {
    let events = dataset(&[]);
    let derived = events.define("x", |_| Ok(Scalar::I64(1))).unwrap();
    assert_eq!(derived.len(), 0);
    assert_eq!(
        derived.store().dtype(&ArrayId::from("x@1")).unwrap(),
        PrimitiveType::F64
    );
}

#[test]
fn define_at_computes_per_item_and_survives_the_chain() {
    let events = nano();
    let derived = events
        .define_at("Muon", "pt2", |m| {
            let pt = m.try_record()?.get("pt")?.try_scalar()?.try_f64()?;
            Ok(Scalar::F64(pt * 2.0))
        })
        .unwrap();

    let flat = derived.project("Muon").unwrap().flatten().unwrap();
    let pt2 = flat.project("pt2").unwrap();
    assert_eq!(scalar_f64_entries(&pt2), vec![2.0, 4.0, 6.0]);
}

#[test]
fn filter_keeps_matching_entries_in_order() {
    let events = nano();
    let selected = events
        .filter(|e| Ok(!e.try_record()?.get("Muon")?.try_list()?.is_empty()))
        .unwrap();

    assert_eq!(selected.len(), 2);
    assert_eq!(runs_of(&selected), vec![1, 3]);
    assert_eq!(pts_of(&selected, 0), vec![1.0, 2.0]);
    assert_eq!(pts_of(&selected, 1), vec![3.0]);

    assert_eq!(selected.store().depth(), events.store().depth() + 1);
    match &**selected.entry() {
        SchemaNode::Pointer { target, mask, .. } => {
            assert!(mask.is_none());
            assert!(Arc::ptr_eq(target, events.entry()));
        }
        other => panic!("unexpected entry node: {}", other.kind_name()),
    }
}

#[test]
fn filter_can_reject_everything() {
    let events = nano();
    let none = events.filter(|_| Ok(false)).unwrap();
    assert!(none.is_empty());
    match none.get(0) {
        Err(AccessError::IndexOutOfBounds { .. }) => {}
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn filters_compose() {
    let events = dataset(&[(1, &[1.0]), (2, &[2.0]), (3, &[]), (4, &[4.0])]);
    let selected = events
        .filter(|e| Ok(e.try_record()?.get("run")?.try_scalar()?.try_i64()? >= 2))
        .unwrap();
    let narrowed = selected
        .filter(|e| Ok(e.try_record()?.get("run")?.try_scalar()?.try_i64()? != 3))
        .unwrap();

    assert_eq!(runs_of(&narrowed), vec![2, 4]);
    assert_eq!(narrowed.store().depth(), events.store().depth() + 2);
}

#[test]
fn flatten_windows_contiguous_items_without_an_index_layer() {
    let events = nano();
    let muons = events.project("Muon").unwrap().flatten().unwrap();

    assert_eq!(muons.len(), 3);
    let muon_list = resolve(events.root(), "Muon").unwrap();
    let item = match &*muon_list {
        SchemaNode::List { item, .. } => Arc::clone(item),
        other => panic!("unexpected node kind: {}", other.kind_name()),
    };
    assert!(Arc::ptr_eq(&item, muons.entry()));

    let pts: Vec<f64> = muons
        .entries()
        .map(|muon| {
            muon.unwrap()
                .try_record()
                .unwrap()
                .get("pt")
                .unwrap()
                .try_scalar()
                .unwrap()
                .try_f64()
                .unwrap()
        })
        .collect();
    assert_eq!(pts, vec![1.0, 2.0, 3.0]);
}

#[test]
fn flatten_follows_selection_through_an_index_layer() {
    let events = dataset(&[(1, &[1.0, 2.0]), (2, &[9.0]), (3, &[]), (4, &[3.0])]);
    let selected = events
        .filter(|e| Ok(e.try_record()?.get("run")?.try_scalar()?.try_i64()? != 2))
        .unwrap();
    let muons = selected.project("Muon").unwrap().flatten().unwrap();

    assert_eq!(muons.len(), 3);
    match &**muons.entry() {
        SchemaNode::Pointer { .. } => {}
        other => panic!("unexpected entry node: {}", other.kind_name()),
    }
    let pts: Vec<f64> = muons
        .entries()
        .map(|muon| {
            muon.unwrap()
                .try_record()
                .unwrap()
                .get("pt")
                .unwrap()
                .try_scalar()
                .unwrap()
                .try_f64()
                .unwrap()
        })
        .collect();
    assert_eq!(pts, vec![1.0, 2.0, 3.0]);
}

#[test]
fn flatten_requires_list_entries() {
    let events = nano();
    match events.flatten() {
        Err(TransformError::Schema(SchemaError::KindMismatch {
            expected, found, ..
        })) => {
            assert_eq!(expected, "list");
            assert_eq!(found, "record");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn project_reuses_the_entry_window() {
    let events = nano();
    let runs = events.project("run").unwrap();
    assert_eq!(runs.len(), 3);
    assert_eq!(runs.store().depth(), events.store().depth());

    let values: Vec<i64> = runs
        .entries()
        .map(|entry| entry.unwrap().try_scalar().unwrap().try_i64().unwrap())
        .collect();
    assert_eq!(values, vec![1, 2, 3]);

    match events.project("nope") {
        Err(TransformError::Schema(SchemaError::UnknownPath { path })) => {
            assert_eq!(path, "nope");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn define_after_filter_stays_aligned_with_source_arrays() {
    let events = nano();
    let selected = events
        .filter(|e| Ok(e.try_record()?.get("run")?.try_scalar()?.try_i64()? != 2))
        .unwrap();
    let derived = selected
        .define("tag", |e| {
            let run = e.try_record()?.get("run")?.try_scalar()?.try_i64()?;
            Ok(Scalar::I64(run * 100))
        })
        .unwrap();

    let tags: Vec<i64> = derived
        .project("tag")
        .unwrap()
        .entries()
        .map(|entry| entry.unwrap().try_scalar().unwrap().try_i64().unwrap())
        .collect();
    assert_eq!(tags, vec![100, 300]);
}

#[test]
fn define_propagates_closure_errors() {
    let events = nano();
    match events.define("bad", |_| Err("boom".into())) {
        Err(TransformError::User(err)) => assert_eq!(err.to_string(), "boom"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn define_rejects_mixed_output_types() {
    let events = nano();
    let result = events.define("mix", |e| {
        let run = e.try_record()?.get("run")?.try_scalar()?.try_i64()?;
        if run == 1 {
            Ok(Scalar::I64(run))
        } else {
            Ok(Scalar::F64(run as f64))
        }
    });
    match result {
        Err(TransformError::OutputTypeMismatch {
            name,
            expected,
            found,
        }) => {
            assert_eq!(name, "mix");
            assert_eq!(expected, "i64");
            assert_eq!(found, "f64");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn define_rejects_reserved_field_names() {
    let events = nano();
    for name in ["", "a.b", "a#b", "a@b", "a/b"] {
        match events.define(name, |_| Ok(Scalar::I64(0))) {
            Err(TransformError::Schema(SchemaError::InvalidFieldName { name: reported })) => {
                assert_eq!(reported, name);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}

#[test]
fn map_materializes_entries_lazily_in_order() {
    let events = nano();
    assert_eq!(events.map(|_| 0).len(), 3);

    let runs: Vec<i64> = events
        .map(|e| {
            e.try_record()
                .unwrap()
                .get("run")
                .unwrap()
                .try_scalar()
                .unwrap()
                .try_i64()
                .unwrap()
        })
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(runs, vec![1, 2, 3]);
}
