use arrow::array::{
    ArrayBuilder, BooleanBuilder, Float32Builder, Float64Builder, Int8Builder, Int16Builder,
    Int32Builder, Int64Builder, ListBuilder, StructBuilder, UInt8Builder, UInt16Builder,
    UInt32Builder, UInt64Builder,
};
use espalier_core::{ArrayStore, Scalar, SchemaNode, StoreError};

use crate::error::ArrowBridgeError;
use crate::schema_convert::is_exportable;

macro_rules! cast_builder {
    ($b:expr, $T:ty) => {
        $b.as_any_mut()
            .downcast_mut::<$T>()
            .expect(concat!("expected builder type: ", stringify!($T)))
    };
}

/// Append the instance of `node` at `index` to `builder`.
///
/// The builder must have been created for the arrow type this node
/// converts to; union children never reach this point because they are
/// dropped at schema conversion.
pub(super) fn append_instance(
    builder: &mut Box<dyn ArrayBuilder>,
    node: &SchemaNode,
    store: &ArrayStore,
    index: usize,
) -> Result<(), ArrowBridgeError> {
    match node {
        SchemaNode::Primitive { dtype, data } => {
            let scalar = store.read(data, index)?;
            if scalar.dtype() != *dtype {
                return Err(StoreError::TypeMismatch {
                    id: data.clone(),
                    expected: *dtype,
                    found: scalar.dtype(),
                }
                .into());
            }
            append_scalar(builder, scalar);
        }
        SchemaNode::List {
            starts,
            stops,
            item,
        } => {
            let (start, stop) = store.read_range(starts, stops, index)?;
            let b = cast_builder!(builder, ListBuilder<Box<dyn ArrayBuilder>>);
            for child in start..stop {
                append_instance(b.values(), item, store, child)?;
            }
            b.append(true);
        }
        SchemaNode::Record { fields } => {
            let b = cast_builder!(builder, StructBuilder);
            let mut slot = 0;
            for field in fields.iter().filter(|f| is_exportable(&f.node)) {
                append_instance(&mut b.field_builders_mut()[slot], &field.node, store, index)?;
                slot += 1;
            }
            b.append(true);
        }
        SchemaNode::Union { .. } => {
            unreachable!("union fields are dropped before export")
        }
        SchemaNode::Pointer {
            positions,
            mask,
            target,
        } => {
            if let Some(mask_id) = mask {
                let present = store.read(mask_id, index)?.try_bool()?;
                if !present {
                    append_null(builder, target);
                    return Ok(());
                }
            }
            let child = store.read_index(positions, index)?;
            append_instance(builder, target, store, child)?;
        }
    }
    Ok(())
}

fn append_scalar(builder: &mut Box<dyn ArrayBuilder>, scalar: Scalar) {
    match scalar {
        Scalar::Bool(v) => cast_builder!(builder, BooleanBuilder).append_value(v),
        Scalar::I8(v) => cast_builder!(builder, Int8Builder).append_value(v),
        Scalar::I16(v) => cast_builder!(builder, Int16Builder).append_value(v),
        Scalar::I32(v) => cast_builder!(builder, Int32Builder).append_value(v),
        Scalar::I64(v) => cast_builder!(builder, Int64Builder).append_value(v),
        Scalar::U8(v) => cast_builder!(builder, UInt8Builder).append_value(v),
        Scalar::U16(v) => cast_builder!(builder, UInt16Builder).append_value(v),
        Scalar::U32(v) => cast_builder!(builder, UInt32Builder).append_value(v),
        Scalar::U64(v) => cast_builder!(builder, UInt64Builder).append_value(v),
        Scalar::F32(v) => cast_builder!(builder, Float32Builder).append_value(v),
        Scalar::F64(v) => cast_builder!(builder, Float64Builder).append_value(v),
    }
}

/// Append a null shaped like `node`. Struct children receive nulls too,
/// keeping every child builder at the same length.
fn append_null(builder: &mut Box<dyn ArrayBuilder>, node: &SchemaNode) {
    match node {
        SchemaNode::Primitive { dtype, .. } => append_null_scalar(builder, *dtype),
        SchemaNode::List { .. } => {
            cast_builder!(builder, ListBuilder<Box<dyn ArrayBuilder>>).append(false);
        }
        SchemaNode::Record { fields } => {
            let b = cast_builder!(builder, StructBuilder);
            let mut slot = 0;
            for field in fields.iter().filter(|f| is_exportable(&f.node)) {
                append_null(&mut b.field_builders_mut()[slot], &field.node);
                slot += 1;
            }
            b.append(false);
        }
        SchemaNode::Union { .. } => {
            unreachable!("union fields are dropped before export")
        }
        SchemaNode::Pointer { target, .. } => append_null(builder, target),
    }
}

fn append_null_scalar(builder: &mut Box<dyn ArrayBuilder>, dtype: espalier_core::PrimitiveType) {
    use espalier_core::PrimitiveType;
    match dtype {
        PrimitiveType::Bool => cast_builder!(builder, BooleanBuilder).append_null(),
        PrimitiveType::I8 => cast_builder!(builder, Int8Builder).append_null(),
        PrimitiveType::I16 => cast_builder!(builder, Int16Builder).append_null(),
        PrimitiveType::I32 => cast_builder!(builder, Int32Builder).append_null(),
        PrimitiveType::I64 => cast_builder!(builder, Int64Builder).append_null(),
        PrimitiveType::U8 => cast_builder!(builder, UInt8Builder).append_null(),
        PrimitiveType::U16 => cast_builder!(builder, UInt16Builder).append_null(),
        PrimitiveType::U32 => cast_builder!(builder, UInt32Builder).append_null(),
        PrimitiveType::U64 => cast_builder!(builder, UInt64Builder).append_null(),
        PrimitiveType::F32 => cast_builder!(builder, Float32Builder).append_null(),
        PrimitiveType::F64 => cast_builder!(builder, Float64Builder).append_null(),
    }
}
