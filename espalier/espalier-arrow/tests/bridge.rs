use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, ListArray, StringArray, StructArray};
use arrow::datatypes::{DataType, Field, Fields, Schema};
use arrow::record_batch::RecordBatch;
use espalier_arrow::{
    ArrowBridgeError, ExportPlan, FlattenPolicy, ListPolicy, StructPolicy, entry_to_arrow_schema,
    flatten_record_batch, record_batch_to_parts,
};
use espalier_core::{
    ArrayId, ArrayStore, MemoryBackend, PrimitiveType, Scalar, SchemaNode, TypeDecl,
};

fn muon_decl() -> TypeDecl {
    TypeDecl::list(TypeDecl::record([
        ("run", TypeDecl::primitive(PrimitiveType::I64)),
        (
            "Muon",
            TypeDecl::list(TypeDecl::record([(
                "pt",
                TypeDecl::primitive(PrimitiveType::F64),
            )])),
        ),
    ]))
}

fn muon_parts() -> (Arc<SchemaNode>, ArrayStore) {
    let root = SchemaNode::from_decl(&muon_decl()).unwrap();
    let entry = match &*root {
        SchemaNode::List { item, .. } => Arc::clone(item),
        other => panic!("unexpected root kind: {}", other.kind_name()),
    };

    let mut backend = MemoryBackend::new();
    backend.insert("run", vec![10i64, 20, 30]);
    backend.insert("Muon#starts", vec![0i64, 2, 2]);
    backend.insert("Muon#stops", vec![2i64, 2, 3]);
    backend.insert("Muon.pt", vec![1.0f64, 2.0, 3.0]);
    (entry, ArrayStore::from(backend))
}

#[test]
fn entry_schema_renders_records_and_lists() {
    let (entry, _) = muon_parts();
    let (schema, dropped) = entry_to_arrow_schema(&entry);

    assert!(dropped.is_empty());
    assert_eq!(schema.field(0).name(), "run");
    assert_eq!(schema.field(0).data_type(), &DataType::Int64);
    assert_eq!(schema.field(1).name(), "Muon");
    match schema.field(1).data_type() {
        DataType::List(item) => match item.data_type() {
            DataType::Struct(fields) => {
                assert_eq!(fields.len(), 1);
                assert_eq!(fields[0].name(), "pt");
                assert_eq!(fields[0].data_type(), &DataType::Float64);
            }
            other => panic!("unexpected item type: {other:?}"),
        },
        other => panic!("unexpected column type: {other:?}"),
    }
}

#[test]
fn union_fields_are_dropped_with_a_report() {
    let decl = TypeDecl::list(TypeDecl::record([
        ("x", TypeDecl::primitive(PrimitiveType::F64)),
        (
            "shape",
            TypeDecl::union([
                TypeDecl::primitive(PrimitiveType::I64),
                TypeDecl::primitive(PrimitiveType::F64),
            ]),
        ),
    ]));
    let root = SchemaNode::from_decl(&decl).unwrap();
    let entry = match &*root {
        SchemaNode::List { item, .. } => Arc::clone(item),
        other => panic!("unexpected root kind: {}", other.kind_name()),
    };

    let (schema, dropped) = entry_to_arrow_schema(&entry);
    assert_eq!(schema.fields().len(), 1);
    assert_eq!(schema.field(0).name(), "x");
    assert_eq!(dropped, vec!["shape".to_owned()]);
}

#[test]
fn export_plan_builds_nested_batches() {
    let (entry, store) = muon_parts();
    let plan = ExportPlan::new(&entry);
    assert!(plan.dropped().is_empty());

    let batch = plan.build_batch(&store, 0..3).unwrap();
    assert_eq!(batch.num_rows(), 3);

    let run = batch
        .column(0)
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap();
    assert_eq!(run.values(), &[10, 20, 30]);

    let muons = batch
        .column(1)
        .as_any()
        .downcast_ref::<ListArray>()
        .unwrap();
    assert_eq!(muons.value_offsets(), &[0, 2, 2, 3]);
    let items = muons
        .values()
        .as_any()
        .downcast_ref::<StructArray>()
        .unwrap();
    let pt = items
        .column(0)
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap();
    assert_eq!(pt.values(), &[1.0, 2.0, 3.0]);
}

#[test]
fn exported_batches_import_back_without_copying() {
    let (entry, store) = muon_parts();
    let batch = ExportPlan::new(&entry).build_batch(&store, 0..3).unwrap();

    let (decl, backend, skipped) = record_batch_to_parts(&batch).unwrap();
    assert!(skipped.is_empty());
    assert_eq!(decl, muon_decl());

    let imported = ArrayStore::new(Arc::new(backend));
    assert_eq!(
        imported.read(&ArrayId::from("#stops"), 0).unwrap(),
        Scalar::I64(3)
    );
    assert_eq!(
        imported
            .read_range(&ArrayId::from("Muon#starts"), &ArrayId::from("Muon#stops"), 0)
            .unwrap(),
        (0, 2)
    );
    assert_eq!(
        imported.read(&ArrayId::from("Muon.pt"), 2).unwrap(),
        Scalar::F64(3.0)
    );
    assert_eq!(imported.len(&ArrayId::from("run")).unwrap(), 3);
}

#[test]
fn import_skips_unsupported_columns() {
    let schema = Schema::new(vec![
        Field::new("n", DataType::Int64, false),
        Field::new("name", DataType::Utf8, false),
    ]);
    let batch = RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(Int64Array::from(vec![1, 2])) as ArrayRef,
            Arc::new(StringArray::from(vec!["a", "b"])) as ArrayRef,
        ],
    )
    .unwrap();

    let (decl, _, skipped) = record_batch_to_parts(&batch).unwrap();
    assert_eq!(skipped, vec!["name".to_owned()]);
    match decl {
        TypeDecl::List(entry) => match *entry {
            TypeDecl::Record(fields) => {
                assert_eq!(fields.len(), 1);
                assert_eq!(fields[0].name, "n");
            }
            other => panic!("unexpected entry decl: {other:?}"),
        },
        other => panic!("unexpected root decl: {other:?}"),
    }
}

#[test]
fn import_rejects_null_values() {
    let schema = Schema::new(vec![Field::new("n", DataType::Int64, true)]);
    let batch = RecordBatch::try_new(
        Arc::new(schema),
        vec![Arc::new(Int64Array::from(vec![Some(1), None])) as ArrayRef],
    )
    .unwrap();

    match record_batch_to_parts(&batch) {
        Err(ArrowBridgeError::NullValues { column, nulls }) => {
            assert_eq!(column, "n");
            assert_eq!(nulls, 1);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

fn nested_batch() -> RecordBatch {
    let (entry, store) = muon_parts();
    ExportPlan::new(&entry).build_batch(&store, 0..3).unwrap()
}

// CSV policy: records expand, variable-length lists are dropped.
#[test]
fn flatten_for_csv_drops_lists() {
    let (flat, dropped) = flatten_record_batch(&nested_batch(), None, &FlattenPolicy::for_csv())
        .unwrap();

    assert_eq!(flat.num_columns(), 1);
    assert_eq!(flat.schema().field(0).name(), "run");
    assert_eq!(dropped, vec!["Muon".to_owned()]);
}

// Parquet policy: everything passes through unchanged.
#[test]
fn flatten_for_parquet_is_identity() {
    let batch = nested_batch();
    let (flat, dropped) =
        flatten_record_batch(&batch, None, &FlattenPolicy::for_parquet()).unwrap();

    assert_eq!(flat.num_columns(), 2);
    assert_eq!(flat.schema(), batch.schema());
    assert!(dropped.is_empty());
}

// Fixed expansion pads short lists with nulls and truncates long ones.
#[test]
fn flatten_fixed_expands_list_columns() {
    let policy = FlattenPolicy {
        structs: StructPolicy::Flatten,
        lists: ListPolicy::FlattenFixed(2),
    };
    let (flat, dropped) = flatten_record_batch(&nested_batch(), None, &policy).unwrap();

    assert!(dropped.is_empty());
    let schema = flat.schema();
    let names: Vec<&str> = schema
        .fields()
        .iter()
        .map(|f| f.name().as_str())
        .collect();
    assert_eq!(names, vec!["run", "Muon.0.pt", "Muon.1.pt"]);

    let first = flat
        .column(1)
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap();
    assert_eq!(first.value(0), 1.0);
    assert!(first.is_null(1));
    assert_eq!(first.value(2), 3.0);

    let second = flat
        .column(2)
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap();
    assert_eq!(second.value(0), 2.0);
    assert!(second.is_null(1));
    assert!(second.is_null(2));
}

// Separator choice feeds through to expanded column names.
#[test]
fn flatten_uses_custom_separator() {
    let fields = Fields::from(vec![Field::new("x", DataType::Int64, false)]);
    let inner = StructArray::from(vec![(
        Arc::new(Field::new("x", DataType::Int64, false)),
        Arc::new(Int64Array::from(vec![1, 2])) as ArrayRef,
    )]);
    let batch = RecordBatch::try_new(
        Arc::new(Schema::new(vec![Field::new(
            "pos",
            DataType::Struct(fields),
            false,
        )])),
        vec![Arc::new(inner) as ArrayRef],
    )
    .unwrap();

    let policy = FlattenPolicy {
        structs: StructPolicy::Flatten,
        lists: ListPolicy::Keep,
    };
    let (flat, _) = flatten_record_batch(&batch, Some('/'), &policy).unwrap();
    assert_eq!(flat.schema().field(0).name(), "pos/x");
}
