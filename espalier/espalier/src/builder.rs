//! Ingestion: shred nested values into flat arrays.

use std::collections::BTreeMap;
use std::sync::Arc;

use espalier_core::{
    ArrayId, ArrayStore, MemoryBackend, PrimitiveBuilder, Scalar, SchemaError, SchemaNode,
    TypeDecl, Value,
};

use crate::dataset::Dataset;
use crate::error::DatasetError;

/// Accumulates entry values and produces an in-memory [`Dataset`].
///
/// One append scatters one entry across every array of the schema:
/// scalars land in data arrays, list items extend their content arrays
/// with the covered range recorded in `starts`/`stops`, union values
/// extend the chosen variant, and pointer values write only their
/// position (the target is populated by whichever field owns it).
#[derive(Debug)]
pub struct DatasetBuilder {
    root: Arc<SchemaNode>,
    builders: BTreeMap<ArrayId, PrimitiveBuilder>,
    rows: usize,
    poisoned: bool,
}

impl DatasetBuilder {
    /// Start a builder for datasets whose entries follow `entry`.
    ///
    /// # Errors
    ///
    /// Any [`SchemaError`] raised while resolving the declaration, such
    /// as duplicate or reserved field names.
    pub fn new(entry: &TypeDecl) -> Result<Self, SchemaError> {
        let root = SchemaNode::from_decl(&TypeDecl::list(entry.clone()))?;
        let builders = root
            .arrays()
            .into_iter()
            .map(|(id, dtype)| (id, PrimitiveBuilder::new(dtype)))
            .collect();
        Ok(Self {
            root,
            builders,
            rows: 0,
            poisoned: false,
        })
    }

    /// Entries appended so far.
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Append one entry. The value tree must match the entry declaration
    /// shape for shape, with scalars of the declared types.
    ///
    /// # Errors
    ///
    /// Shape mismatches surface as [`SchemaError::KindMismatch`] wrapped
    /// in [`DatasetError::Schema`]; scalar type mismatches as
    /// [`DatasetError::Scalar`]. After an error the builder holds a torn
    /// row and refuses to [`build`](Self::build).
    pub fn append(&mut self, value: &Value) -> Result<(), DatasetError> {
        let entry = match &*self.root {
            SchemaNode::List { item, .. } => Arc::clone(item),
            other => unreachable!("builder root is a {} node", other.kind_name()),
        };
        match push_node(&mut self.builders, &entry, value, "") {
            Ok(()) => {
                self.rows += 1;
                Ok(())
            }
            Err(err) => {
                self.poisoned = true;
                Err(err)
            }
        }
    }

    /// Seal the arrays and assemble the dataset, then verify every
    /// recorded offset (pointer positions come from the caller and are
    /// only checkable once all domains are complete).
    pub fn build(mut self) -> Result<Dataset, DatasetError> {
        if self.poisoned {
            return Err(DatasetError::Corrupt {
                detail: "an earlier append failed and left partial data".to_owned(),
            });
        }
        let (starts, stops) = match &*self.root {
            SchemaNode::List { starts, stops, .. } => (starts.clone(), stops.clone()),
            other => unreachable!("builder root is a {} node", other.kind_name()),
        };
        builder_mut(&mut self.builders, &starts).push(Scalar::I64(0))?;
        builder_mut(&mut self.builders, &stops).push(Scalar::I64(self.rows as i64))?;

        let mut backend = MemoryBackend::new();
        for (id, builder) in self.builders {
            backend.insert(id, builder.finish());
        }
        let dataset = Dataset::from_parts(self.root, ArrayStore::from(backend))?;
        dataset.check_offsets()?;
        Ok(dataset)
    }
}

fn builder_mut<'a>(
    builders: &'a mut BTreeMap<ArrayId, PrimitiveBuilder>,
    id: &ArrayId,
) -> &'a mut PrimitiveBuilder {
    match builders.get_mut(id) {
        Some(builder) => builder,
        None => unreachable!("no builder for array '{id}'"),
    }
}

pub(crate) fn join_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_owned()
    } else {
        format!("{path}.{name}")
    }
}

fn push_node(
    builders: &mut BTreeMap<ArrayId, PrimitiveBuilder>,
    node: &SchemaNode,
    value: &Value,
    path: &str,
) -> Result<(), DatasetError> {
    match (node, value) {
        (SchemaNode::Primitive { data, .. }, Value::Scalar(scalar)) => {
            builder_mut(builders, data).push(*scalar)?;
            Ok(())
        }
        (
            SchemaNode::List {
                starts,
                stops,
                item,
            },
            Value::List(items),
        ) => {
            let (start, stop) = match item.length_array() {
                Some(id) => {
                    let start = builder_mut(builders, id).len();
                    for item_value in items {
                        push_node(builders, item, item_value, path)?;
                    }
                    (start, builder_mut(builders, id).len())
                }
                None => {
                    if !items.is_empty() {
                        return Err(DatasetError::Corrupt {
                            detail: format!(
                                "list at '{path}' holds items with no measurable domain"
                            ),
                        });
                    }
                    (0, 0)
                }
            };
            builder_mut(builders, starts).push(Scalar::I64(start as i64))?;
            builder_mut(builders, stops).push(Scalar::I64(stop as i64))?;
            Ok(())
        }
        (SchemaNode::Record { fields }, Value::Record(values)) => {
            if fields.len() != values.len() {
                return Err(DatasetError::Corrupt {
                    detail: format!(
                        "record at '{path}' declares {} fields but the value carries {}",
                        fields.len(),
                        values.len()
                    ),
                });
            }
            for (field, field_value) in fields.iter().zip(values) {
                push_node(builders, &field.node, field_value, &join_path(path, &field.name))?;
            }
            Ok(())
        }
        (
            SchemaNode::Union {
                tags,
                offsets,
                variants,
            },
            Value::Union { tag, value },
        ) => {
            let variant = variants.get(*tag).ok_or_else(|| DatasetError::Corrupt {
                detail: format!(
                    "union at '{path}' has {} variants but tag {tag} was given",
                    variants.len()
                ),
            })?;
            let tag_i8 = i8::try_from(*tag).map_err(|_| DatasetError::Corrupt {
                detail: format!("union tag {tag} does not fit the tag array at '{path}'"),
            })?;
            let offset = match variant.length_array() {
                Some(id) => builder_mut(builders, id).len(),
                None => 0,
            };
            builder_mut(builders, tags).push(Scalar::I8(tag_i8))?;
            builder_mut(builders, offsets).push(Scalar::I64(offset as i64))?;
            push_node(builders, variant, value, path)
        }
        (
            SchemaNode::Pointer {
                positions, mask, ..
            },
            Value::Ref(position),
        ) => {
            builder_mut(builders, positions).push(Scalar::I64(*position))?;
            if let Some(mask) = mask {
                builder_mut(builders, mask).push(Scalar::Bool(true))?;
            }
            Ok(())
        }
        (
            SchemaNode::Pointer {
                positions,
                mask: Some(mask),
                ..
            },
            Value::Null,
        ) => {
            // Placeholder position; readers consult the mask first.
            builder_mut(builders, positions).push(Scalar::I64(0))?;
            builder_mut(builders, mask).push(Scalar::Bool(false))?;
            Ok(())
        }
        (node, value) => Err(DatasetError::Schema(SchemaError::KindMismatch {
            path: path.to_owned(),
            expected: node.kind_name(),
            found: value.kind_name(),
        })),
    }
}
