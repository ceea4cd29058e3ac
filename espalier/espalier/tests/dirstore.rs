use std::fs;
use std::sync::Arc;

use espalier::core::{ArrayId, ArrayStore, PrimitiveType, Scalar, StoreError, TypeDecl, Value};
use espalier::{Dataset, DatasetBuilder, DatasetError, MmapBackend};

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

fn events() -> Dataset {
    let mut builder = DatasetBuilder::new(&event_entry()).unwrap();
    for (run, pts) in [(1i64, &[1.0, 2.0][..]), (2, &[]), (3, &[3.0])] {
        builder
            .append(&Value::record([
                Value::from(run),
                Value::list(pts.iter().map(|&pt| Value::record([Value::from(pt)]))),
            ]))
            .unwrap();
    }
    builder.build().unwrap()
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

#[test]
fn save_and_open_round_trip() {
    let events = events();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events");
    events.save(&path).unwrap();

    let opened = Dataset::open(&path).unwrap();
    assert_eq!(opened.len(), 3);
    assert_eq!(opened.root(), events.root());
    assert_eq!(runs_of(&opened), vec![1, 2, 3]);
    assert_eq!(pts_of(&opened, 0), vec![1.0, 2.0]);
    assert_eq!(pts_of(&opened, 1), Vec::<f64>::new());
    assert_eq!(pts_of(&opened, 2), vec![3.0]);
}

#[test]
fn save_refuses_an_existing_path() {
    let events = events();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events");
    events.save(&path).unwrap();

    match events.save(&path) {
        Err(DatasetError::AlreadyExists { path: reported }) => {
            assert!(reported.contains("events"), "unexpected path: {reported}");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn transform_results_round_trip() {
    let events = events();
    let selected = events
        .filter(|e| Ok(e.try_record()?.get("run")?.try_scalar()?.try_i64()? != 2))
        .unwrap()
        .define("tag", |e| {
            let run = e.try_record()?.get("run")?.try_scalar()?.try_i64()?;
            Ok(Scalar::I64(run * 100))
        })
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("selected");
    selected.save(&path).unwrap();

    let opened = Dataset::open(&path).unwrap();
    assert_eq!(opened.len(), 2);
    assert_eq!(runs_of(&opened), vec![1, 3]);
    let tags: Vec<i64> = opened
        .project("tag")
        .unwrap()
        .entries()
        .map(|entry| entry.unwrap().try_scalar().unwrap().try_i64().unwrap())
        .collect();
    assert_eq!(tags, vec![100, 300]);
}

#[test]
fn open_detects_a_truncated_array() {
    let events = events();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events");
    events.save(&path).unwrap();

    fs::write(path.join("arrays").join("run.bin"), 1i64.to_le_bytes()).unwrap();
    match Dataset::open(&path) {
        Err(DatasetError::LengthMismatch {
            id,
            expected,
            found,
        }) => {
            assert_eq!(id.as_str(), "run");
            assert_eq!(expected, 24);
            assert_eq!(found, 8);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn open_detects_a_missing_array() {
    let events = events();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events");
    events.save(&path).unwrap();

    fs::remove_file(path.join("arrays").join("run.bin")).unwrap();
    match Dataset::open(&path) {
        Err(DatasetError::MissingArray { id }) => assert_eq!(id.as_str(), "run"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn open_rejects_overrunning_offsets() {
    let events = events();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events");
    events.save(&path).unwrap();

    let mut bytes = Vec::new();
    for stop in [2i64, 2, 9] {
        bytes.extend_from_slice(&stop.to_le_bytes());
    }
    fs::write(path.join("arrays").join("Muon#stops.bin"), &bytes).unwrap();

    match Dataset::open(&path) {
        Err(DatasetError::Corrupt { detail }) => {
            assert!(detail.contains("Muon"), "unexpected detail: {detail}");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn open_requires_a_manifest() {
    let dir = tempfile::tempdir().unwrap();
    match Dataset::open(dir.path().join("nothing")) {
        Err(DatasetError::Io(_)) => {}
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn mmap_backend_serves_raw_arrays() {
    let events = events();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events");
    events.save(&path).unwrap();

    let backend = MmapBackend::open(&path).unwrap();
    let store = ArrayStore::new(Arc::new(backend));
    assert_eq!(
        store.read(&ArrayId::from("run"), 2).unwrap(),
        Scalar::I64(3)
    );
    assert_eq!(
        store.read(&ArrayId::from("Muon.pt"), 0).unwrap(),
        Scalar::F64(1.0)
    );
    match store.read(&ArrayId::from("run"), 3) {
        Err(StoreError::OutOfBounds { index: 3, len: 3, .. }) => {}
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn save_writes_only_reachable_arrays() {
    let runs = events().project("run").unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("runs");
    runs.save(&path).unwrap();

    let mut names: Vec<String> = fs::read_dir(path.join("arrays"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    assert_eq!(names, vec!["#starts.bin", "#stops.bin", "run.bin"]);

    let opened = Dataset::open(&path).unwrap();
    let values: Vec<i64> = opened
        .entries()
        .map(|entry| entry.unwrap().try_scalar().unwrap().try_i64().unwrap())
        .collect();
    assert_eq!(values, vec![1, 2, 3]);
}

#[test]
fn union_and_pointer_arrays_round_trip() {
    let entry_decl = TypeDecl::record([
        (
            "Muon",
            TypeDecl::list(TypeDecl::record([(
                "pt",
                TypeDecl::primitive(PrimitiveType::F64),
            )])),
        ),
        ("best", TypeDecl::pointer("Muon", true)),
        (
            "shape",
            TypeDecl::union([
                TypeDecl::primitive(PrimitiveType::I64),
                TypeDecl::primitive(PrimitiveType::F64),
            ]),
        ),
    ]);
    let mut builder = DatasetBuilder::new(&entry_decl).unwrap();
    builder
        .append(&Value::record([
            Value::list([
                Value::record([Value::from(1.5)]),
                Value::record([Value::from(2.5)]),
            ]),
            Value::Ref(1),
            Value::union(0, Value::from(7i64)),
        ]))
        .unwrap();
    builder
        .append(&Value::record([
            Value::list([]),
            Value::Null,
            Value::union(1, Value::from(0.25)),
        ]))
        .unwrap();
    let dataset = builder.build().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mixed");
    dataset.save(&path).unwrap();
    let opened = Dataset::open(&path).unwrap();

    let first = opened.get(0).unwrap();
    let first = first.try_record().unwrap();
    let best = first.get("best").unwrap();
    assert_eq!(
        best.try_record().unwrap().get("pt").unwrap().as_scalar(),
        Some(Scalar::F64(2.5))
    );
    assert_eq!(first.get("shape").unwrap().as_scalar(), Some(Scalar::I64(7)));

    let second = opened.get(1).unwrap();
    let second = second.try_record().unwrap();
    assert!(second.get("best").unwrap().is_null());
    assert_eq!(
        second.get("shape").unwrap().as_scalar(),
        Some(Scalar::F64(0.25))
    );
}
