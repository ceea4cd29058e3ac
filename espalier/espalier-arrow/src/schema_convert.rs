//! Two-way mapping between engine schemas and Arrow schemas.
//!
//! Export is lossy by policy: union fields have no stable arrow
//! rendering here and are dropped, with their paths reported so callers
//! can surface the loss. Pointers are resolved inline; a masked pointer
//! becomes a nullable field. Import is the mirror image: columns with no
//! engine rendering (strings, timestamps, maps) are skipped and
//! reported.

use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema};
use espalier_core::{PrimitiveType, SchemaNode, TypeDecl};

use crate::error::ArrowBridgeError;

// ---------------------------------------------------------------------------
// Engine schema to Arrow schema
// ---------------------------------------------------------------------------

/// Convert a dataset entry node into an Arrow `Schema`.
///
/// A record entry becomes one column per surviving field; any other
/// entry kind becomes a single column named `value`. The second return
/// is the paths of dropped fields, empty when the conversion was exact.
pub fn entry_to_arrow_schema(entry: &SchemaNode) -> (Schema, Vec<String>) {
    let mut dropped = Vec::new();
    let fields = entry_fields(entry, &mut dropped);
    (Schema::new(fields), dropped)
}

fn entry_fields(entry: &SchemaNode, dropped: &mut Vec<String>) -> Vec<Field> {
    match entry {
        SchemaNode::Record { fields } => fields
            .iter()
            .filter_map(|f| node_to_field(&f.name, &f.node, &f.name, dropped))
            .collect(),
        SchemaNode::Pointer { mask: None, target, .. } => entry_fields(target, dropped),
        other => node_to_field("value", other, "value", dropped)
            .into_iter()
            .collect(),
    }
}

pub(crate) fn node_to_field(
    name: &str,
    node: &SchemaNode,
    path: &str,
    dropped: &mut Vec<String>,
) -> Option<Field> {
    let (data_type, nullable) = node_to_type(node, path, dropped)?;
    Some(Field::new(name, data_type, nullable))
}

fn node_to_type(
    node: &SchemaNode,
    path: &str,
    dropped: &mut Vec<String>,
) -> Option<(DataType, bool)> {
    match node {
        SchemaNode::Primitive { dtype, .. } => Some((primitive_to_arrow(*dtype), false)),
        SchemaNode::List { item, .. } => {
            let field = node_to_field("item", item, path, dropped)?;
            Some((DataType::List(Arc::new(field)), false))
        }
        SchemaNode::Record { fields } => {
            let arrow_fields: Vec<Field> = fields
                .iter()
                .filter_map(|f| {
                    node_to_field(&f.name, &f.node, &join(path, &f.name), dropped)
                })
                .collect();
            if arrow_fields.is_empty() && !fields.is_empty() {
                dropped.push(path.to_owned());
                return None;
            }
            Some((DataType::Struct(arrow_fields.into()), false))
        }
        SchemaNode::Union { .. } => {
            dropped.push(path.to_owned());
            None
        }
        SchemaNode::Pointer { mask, target, .. } => {
            let (data_type, _) = node_to_type(target, path, dropped)?;
            Some((data_type, mask.is_some()))
        }
    }
}

/// Whether a node survives export. Mirrors [`node_to_field`] without
/// allocating; the two must agree so appenders can skip exactly the
/// fields the schema dropped.
pub(crate) fn is_exportable(node: &SchemaNode) -> bool {
    match node {
        SchemaNode::Primitive { .. } => true,
        SchemaNode::List { item, .. } => is_exportable(item),
        SchemaNode::Record { fields } => {
            fields.is_empty() || fields.iter().any(|f| is_exportable(&f.node))
        }
        SchemaNode::Union { .. } => false,
        SchemaNode::Pointer { target, .. } => is_exportable(target),
    }
}

fn primitive_to_arrow(dtype: PrimitiveType) -> DataType {
    match dtype {
        PrimitiveType::Bool => DataType::Boolean,
        PrimitiveType::I8 => DataType::Int8,
        PrimitiveType::I16 => DataType::Int16,
        PrimitiveType::I32 => DataType::Int32,
        PrimitiveType::I64 => DataType::Int64,
        PrimitiveType::U8 => DataType::UInt8,
        PrimitiveType::U16 => DataType::UInt16,
        PrimitiveType::U32 => DataType::UInt32,
        PrimitiveType::U64 => DataType::UInt64,
        PrimitiveType::F32 => DataType::Float32,
        PrimitiveType::F64 => DataType::Float64,
    }
}

// ---------------------------------------------------------------------------
// Arrow schema to engine declaration
// ---------------------------------------------------------------------------

/// Convert an Arrow `Schema` into an entry record declaration.
///
/// Nullability flags are ignored at this stage; actual null values are
/// rejected later when column data is bound. The second return lists
/// skipped columns.
///
/// # Errors
///
/// [`ArrowBridgeError::NoImportableColumns`] when nothing survives.
pub fn arrow_schema_to_decl(schema: &Schema) -> Result<(TypeDecl, Vec<String>), ArrowBridgeError> {
    let mut skipped = Vec::new();
    let mut fields = Vec::new();
    for field in schema.fields() {
        if let Some(decl) = arrow_field_to_decl(field, field.name(), &mut skipped) {
            fields.push(espalier_core::FieldDecl::new(field.name(), decl));
        }
    }
    if fields.is_empty() {
        return Err(ArrowBridgeError::NoImportableColumns);
    }
    Ok((TypeDecl::Record(fields), skipped))
}

fn arrow_field_to_decl(field: &Field, path: &str, skipped: &mut Vec<String>) -> Option<TypeDecl> {
    match field.data_type() {
        DataType::List(item) | DataType::LargeList(item) | DataType::FixedSizeList(item, _) => {
            let item_decl = arrow_field_to_decl(item, path, skipped)?;
            Some(TypeDecl::list(item_decl))
        }
        DataType::Struct(children) => {
            let mut fields = Vec::new();
            for child in children {
                let child_path = join(path, child.name());
                if let Some(decl) = arrow_field_to_decl(child, &child_path, skipped) {
                    fields.push(espalier_core::FieldDecl::new(child.name(), decl));
                }
            }
            if fields.is_empty() {
                skipped.push(path.to_owned());
                return None;
            }
            Some(TypeDecl::Record(fields))
        }
        other => match arrow_to_primitive(other) {
            Some(dtype) => Some(TypeDecl::primitive(dtype)),
            None => {
                skipped.push(path.to_owned());
                None
            }
        },
    }
}

pub(crate) fn arrow_to_primitive(dt: &DataType) -> Option<PrimitiveType> {
    match dt {
        DataType::Boolean => Some(PrimitiveType::Bool),
        DataType::Int8 => Some(PrimitiveType::I8),
        DataType::Int16 => Some(PrimitiveType::I16),
        DataType::Int32 => Some(PrimitiveType::I32),
        DataType::Int64 => Some(PrimitiveType::I64),
        DataType::UInt8 => Some(PrimitiveType::U8),
        DataType::UInt16 => Some(PrimitiveType::U16),
        DataType::UInt32 => Some(PrimitiveType::U32),
        DataType::UInt64 => Some(PrimitiveType::U64),
        DataType::Float32 => Some(PrimitiveType::F32),
        DataType::Float64 => Some(PrimitiveType::F64),
        _ => None,
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_owned()
    } else {
        format!("{prefix}.{name}")
    }
}
