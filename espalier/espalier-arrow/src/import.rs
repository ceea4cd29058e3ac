//! Arrow record batches as dataset storage.
//!
//! Import binds a batch's columns behind the [`ArrayBackend`] contract
//! instead of copying them: leaf value buffers are shared, and list
//! offsets are viewed as starts/stops without materializing either
//! array. Only the two one-element root window arrays are synthesized.

use std::collections::HashMap;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::buffer::OffsetBuffer;
use arrow::datatypes::{
    DataType, Float32Type, Float64Type, Int8Type, Int16Type, Int32Type, Int64Type, UInt8Type,
    UInt16Type, UInt32Type, UInt64Type,
};
use arrow::record_batch::RecordBatch;
use espalier_core::{ArrayBackend, ArrayId, PrimitiveType, Scalar, SchemaNode, StoreError, TypeDecl};

use crate::error::ArrowBridgeError;
use crate::schema_convert::{arrow_schema_to_decl, arrow_to_primitive};

/// Convert one record batch into dataset parts: the root list
/// declaration, a backend serving every array the schema names, and the
/// paths of skipped columns.
///
/// # Errors
///
/// [`ArrowBridgeError::NoImportableColumns`] when nothing converts, and
/// [`ArrowBridgeError::NullValues`] when a surviving column holds nulls.
pub fn record_batch_to_parts(
    batch: &RecordBatch,
) -> Result<(TypeDecl, ArrowBackend, Vec<String>), ArrowBridgeError> {
    let (entry_decl, skipped) = arrow_schema_to_decl(batch.schema().as_ref())?;
    let root_decl = TypeDecl::list(entry_decl);
    let root = SchemaNode::from_decl(&root_decl)?;

    let mut backend = ArrowBackend {
        columns: HashMap::new(),
    };
    match &*root {
        SchemaNode::List {
            starts,
            stops,
            item,
        } => {
            let rows = batch.num_rows() as i64;
            backend.bind_affine(starts, 0, 0, 1);
            backend.bind_affine(stops, 0, rows, 1);
            match &**item {
                SchemaNode::Record { fields } => {
                    for field in fields {
                        let column = batch
                            .column_by_name(&field.name)
                            .ok_or_else(|| ArrowBridgeError::UnsupportedType {
                                column: field.name.to_string(),
                                dtype: "missing".to_owned(),
                            })?;
                        backend.bind_node(&field.node, column.clone(), &field.name)?;
                    }
                }
                other => unreachable!("import always yields a record entry: {other:?}"),
            }
        }
        other => unreachable!("import always yields a root list: {other:?}"),
    }
    Ok((root_decl, backend, skipped))
}

/// Backend reading directly from imported arrow arrays.
#[derive(Debug)]
pub struct ArrowBackend {
    columns: HashMap<ArrayId, ColumnSource>,
}

#[derive(Debug)]
enum ColumnSource {
    /// Leaf values, read per index.
    Values(ArrayRef),
    /// List window starts: `offsets[i]`.
    Starts(Offsets),
    /// List window stops: `offsets[i + 1]`.
    Stops(Offsets),
    /// Synthesized index array: `factor * i + offset`, `len` elements.
    Affine { factor: i64, offset: i64, len: usize },
}

#[derive(Debug, Clone)]
enum Offsets {
    Small(OffsetBuffer<i32>),
    Large(OffsetBuffer<i64>),
}

impl Offsets {
    fn window_count(&self) -> usize {
        match self {
            Offsets::Small(o) => o.len().saturating_sub(1),
            Offsets::Large(o) => o.len().saturating_sub(1),
        }
    }

    fn get(&self, index: usize) -> i64 {
        match self {
            Offsets::Small(o) => i64::from(o[index]),
            Offsets::Large(o) => o[index],
        }
    }
}

impl ArrowBackend {
    fn bind_affine(&mut self, id: &ArrayId, factor: i64, offset: i64, len: usize) {
        self.columns
            .insert(id.clone(), ColumnSource::Affine { factor, offset, len });
    }

    fn bind_node(
        &mut self,
        node: &SchemaNode,
        array: ArrayRef,
        path: &str,
    ) -> Result<(), ArrowBridgeError> {
        if array.null_count() > 0 {
            return Err(ArrowBridgeError::NullValues {
                column: path.to_owned(),
                nulls: array.null_count(),
            });
        }
        match node {
            SchemaNode::Primitive { dtype, data } => {
                match arrow_to_primitive(array.data_type()) {
                    Some(found) if found == *dtype => {}
                    _ => {
                        return Err(ArrowBridgeError::UnsupportedType {
                            column: path.to_owned(),
                            dtype: array.data_type().to_string(),
                        });
                    }
                }
                self.columns.insert(data.clone(), ColumnSource::Values(array));
            }
            SchemaNode::List {
                starts,
                stops,
                item,
            } => match array.data_type() {
                DataType::List(_) => {
                    let list = array.as_list::<i32>();
                    let offsets = Offsets::Small(list.offsets().clone());
                    self.columns
                        .insert(starts.clone(), ColumnSource::Starts(offsets.clone()));
                    self.columns
                        .insert(stops.clone(), ColumnSource::Stops(offsets));
                    self.bind_node(item, list.values().clone(), path)?;
                }
                DataType::LargeList(_) => {
                    let list = array.as_list::<i64>();
                    let offsets = Offsets::Large(list.offsets().clone());
                    self.columns
                        .insert(starts.clone(), ColumnSource::Starts(offsets.clone()));
                    self.columns
                        .insert(stops.clone(), ColumnSource::Stops(offsets));
                    self.bind_node(item, list.values().clone(), path)?;
                }
                DataType::FixedSizeList(_, _) => {
                    let list = array.as_fixed_size_list();
                    let size = i64::from(list.value_length());
                    self.bind_affine(starts, size, 0, list.len());
                    self.bind_affine(stops, size, size, list.len());
                    self.bind_node(item, list.values().clone(), path)?;
                }
                other => {
                    return Err(ArrowBridgeError::UnsupportedType {
                        column: path.to_owned(),
                        dtype: other.to_string(),
                    });
                }
            },
            SchemaNode::Record { fields } => {
                let strukt = array.as_struct();
                for field in fields {
                    let child = strukt.column_by_name(&field.name).ok_or_else(|| {
                        ArrowBridgeError::UnsupportedType {
                            column: format!("{path}.{}", field.name),
                            dtype: "missing".to_owned(),
                        }
                    })?;
                    self.bind_node(&field.node, child.clone(), &format!("{path}.{}", field.name))?;
                }
            }
            other => unreachable!("import never declares {} nodes", other.kind_name()),
        }
        Ok(())
    }

    fn source(&self, id: &ArrayId) -> Result<&ColumnSource, StoreError> {
        self.columns
            .get(id)
            .ok_or_else(|| StoreError::UnknownArray { id: id.clone() })
    }
}

impl ArrayBackend for ArrowBackend {
    fn len(&self, id: &ArrayId) -> Result<usize, StoreError> {
        Ok(match self.source(id)? {
            ColumnSource::Values(a) => a.len(),
            ColumnSource::Starts(o) | ColumnSource::Stops(o) => o.window_count(),
            ColumnSource::Affine { len, .. } => *len,
        })
    }

    fn dtype(&self, id: &ArrayId) -> Result<PrimitiveType, StoreError> {
        match self.source(id)? {
            ColumnSource::Values(a) => {
                arrow_to_primitive(a.data_type()).ok_or_else(|| StoreError::Backend {
                    id: id.clone(),
                    source: format!("unsupported arrow type {}", a.data_type()).into(),
                })
            }
            _ => Ok(PrimitiveType::I64),
        }
    }

    fn read(&self, id: &ArrayId, index: usize) -> Result<Scalar, StoreError> {
        let len = self.len(id)?;
        if index >= len {
            return Err(StoreError::OutOfBounds {
                id: id.clone(),
                index,
                len,
            });
        }
        Ok(match self.source(id)? {
            ColumnSource::Values(a) => read_arrow_scalar(a, index),
            ColumnSource::Starts(o) => Scalar::I64(o.get(index)),
            ColumnSource::Stops(o) => Scalar::I64(o.get(index + 1)),
            ColumnSource::Affine { factor, offset, .. } => {
                Scalar::I64(factor * index as i64 + offset)
            }
        })
    }

    fn contains(&self, id: &ArrayId) -> bool {
        self.columns.contains_key(id)
    }
}

/// Read one element of a validated leaf array.
///
/// # Panics
///
/// Panics if the array's type was not vetted by
/// [`arrow_to_primitive`] at bind time.
fn read_arrow_scalar(array: &ArrayRef, index: usize) -> Scalar {
    match array.data_type() {
        DataType::Boolean => Scalar::Bool(array.as_boolean().value(index)),
        DataType::Int8 => Scalar::I8(array.as_primitive::<Int8Type>().value(index)),
        DataType::Int16 => Scalar::I16(array.as_primitive::<Int16Type>().value(index)),
        DataType::Int32 => Scalar::I32(array.as_primitive::<Int32Type>().value(index)),
        DataType::Int64 => Scalar::I64(array.as_primitive::<Int64Type>().value(index)),
        DataType::UInt8 => Scalar::U8(array.as_primitive::<UInt8Type>().value(index)),
        DataType::UInt16 => Scalar::U16(array.as_primitive::<UInt16Type>().value(index)),
        DataType::UInt32 => Scalar::U32(array.as_primitive::<UInt32Type>().value(index)),
        DataType::UInt64 => Scalar::U64(array.as_primitive::<UInt64Type>().value(index)),
        DataType::Float32 => Scalar::F32(array.as_primitive::<Float32Type>().value(index)),
        DataType::Float64 => Scalar::F64(array.as_primitive::<Float64Type>().value(index)),
        other => panic!("unvetted arrow type {other:?} in import backend"),
    }
}
