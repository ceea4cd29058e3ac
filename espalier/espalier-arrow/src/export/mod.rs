//! Dataset entries to Arrow `RecordBatch`.

mod append;
mod builder;

use std::ops::Range;
use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::datatypes::{Schema, SchemaRef};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use espalier_core::{ArrayStore, SchemaNode};

use crate::error::ArrowBridgeError;
use crate::schema_convert::node_to_field;

/// Reusable export plan for one entry shape.
///
/// The arrow schema and the per-column access nodes are derived once;
/// [`ExportPlan::build_batch`] can then be called for successive entry
/// spans of any dataset sharing that shape.
pub struct ExportPlan {
    schema: SchemaRef,
    columns: Vec<Arc<SchemaNode>>,
    dropped: Vec<String>,
}

impl ExportPlan {
    pub fn new(entry: &Arc<SchemaNode>) -> Self {
        let mut dropped = Vec::new();
        let named = column_nodes(entry);
        let mut fields = Vec::new();
        let mut columns = Vec::new();
        for (name, node) in named {
            if let Some(field) = node_to_field(&name, &node, &name, &mut dropped) {
                fields.push(field);
                columns.push(node);
            }
        }
        Self {
            schema: Arc::new(Schema::new(fields)),
            columns,
            dropped,
        }
    }

    pub fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    /// Paths that could not be exported and were left out of the schema.
    pub fn dropped(&self) -> &[String] {
        &self.dropped
    }

    /// Materialize one batch for the entry indices in `span`.
    pub fn build_batch(
        &self,
        store: &ArrayStore,
        span: Range<usize>,
    ) -> Result<RecordBatch, ArrowBridgeError> {
        let rows = span.len();
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(self.columns.len());
        for (field, node) in self.schema.fields().iter().zip(&self.columns) {
            let mut column = builder::make_builder(field.data_type(), rows);
            for index in span.clone() {
                append::append_instance(&mut column, node, store, index)?;
            }
            arrays.push(column.finish());
        }
        let options = RecordBatchOptions::new().with_row_count(Some(rows));
        Ok(RecordBatch::try_new_with_options(
            self.schema(),
            arrays,
            &options,
        )?)
    }
}

/// One access node per output column.
///
/// A record entry contributes its fields directly. When the entry is a
/// pointer (a filtered dataset), each target field is re-wrapped in the
/// same pointer so per-entry indices still pass through the selection.
fn column_nodes(entry: &Arc<SchemaNode>) -> Vec<(String, Arc<SchemaNode>)> {
    match &**entry {
        SchemaNode::Record { fields } => fields
            .iter()
            .map(|f| (f.name.to_string(), Arc::clone(&f.node)))
            .collect(),
        SchemaNode::Pointer {
            positions,
            mask: None,
            target,
        } => column_nodes(target)
            .into_iter()
            .map(|(name, node)| {
                let wrapped = SchemaNode::Pointer {
                    positions: positions.clone(),
                    mask: None,
                    target: node,
                };
                (name, Arc::new(wrapped))
            })
            .collect(),
        _ => vec![("value".to_owned(), Arc::clone(entry))],
    }
}
