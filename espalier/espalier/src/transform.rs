//! Dataset transforms with structural sharing.
//!
//! Every transform returns a new [`Dataset`] whose schema tree and
//! store layers share all untouched parts with the input. `define`
//! materializes exactly one new array, `filter` and the general form
//! of `flatten` materialize index arrays, and `project` materializes
//! nothing at all. Input datasets are never modified.

use std::sync::Arc;

use rayon::prelude::*;

use espalier_core::{
    ArrayId, ArrayStore, MemoryBackend, PrimitiveBuilder, PrimitiveType, Scalar, SchemaError,
    SchemaNode, StoreError, resolve, with_field,
};

use crate::builder::join_path;
use crate::dataset::Dataset;
use crate::error::{AccessError, TransformError, UserError};
use crate::proxy::{Instance, ListIter, materialize, read_bool};

impl Dataset {
    /// Add a computed field to the entry record.
    ///
    /// `f` runs once per record occurrence, in parallel, and its
    /// outputs become a new array parallel to the record's existing
    /// ones. The element type is taken from the first output; every
    /// later output must match it. An empty domain yields an empty
    /// `F64` array.
    ///
    /// # Errors
    ///
    /// [`SchemaError::InvalidFieldName`] for reserved names,
    /// [`TransformError::OutputTypeMismatch`] when outputs disagree on
    /// type, and [`TransformError::User`] wrapping the first closure
    /// error.
    pub fn define<F>(&self, name: &str, f: F) -> Result<Dataset, TransformError>
    where
        F: Fn(&Instance) -> Result<Scalar, UserError> + Sync,
    {
        self.define_at("", name, f)
    }

    /// Like [`define`](Self::define), but against the record at `at`
    /// instead of the entry record. List and pointer nesting along the
    /// path is transparent, so `define_at("Muon", ...)` computes one
    /// value per muon, not one per entry.
    ///
    /// The closure runs over the record's whole index domain. Rows no
    /// entry reaches (after a `filter`, say) are still computed, which
    /// keeps the new array aligned with its siblings.
    pub fn define_at<F>(&self, at: &str, name: &str, f: F) -> Result<Dataset, TransformError>
    where
        F: Fn(&Instance) -> Result<Scalar, UserError> + Sync,
    {
        if name.is_empty() || name.contains(['.', '#', '@', '/', '\\']) {
            return Err(TransformError::Schema(SchemaError::InvalidFieldName {
                name: name.to_owned(),
            }));
        }
        let node = resolve(&self.root, at)?;
        let record = descend_to_record(&node, at)?;
        let domain = match record.length_array() {
            Some(id) => self.store.len(id)?,
            None => {
                return Err(TransformError::Schema(SchemaError::KindMismatch {
                    path: at.to_owned(),
                    expected: "record with a measurable domain",
                    found: "empty record",
                }));
            }
        };

        let values: Vec<Scalar> = (0..domain)
            .into_par_iter()
            .map(|index| {
                let instance = materialize(record, &self.store, index)?;
                f(&instance).map_err(TransformError::User)
            })
            .collect::<Result<_, _>>()?;

        let dtype = match values.first() {
            Some(first) => first.dtype(),
            None => PrimitiveType::F64,
        };
        let mut builder = PrimitiveBuilder::new(dtype);
        for value in &values {
            builder
                .push(*value)
                .map_err(|_| TransformError::OutputTypeMismatch {
                    name: name.to_owned(),
                    expected: dtype.type_name().to_owned(),
                    found: value.dtype().type_name().to_owned(),
                })?;
        }

        let field_path = join_path(at, name);
        let id = ArrayId::from(format!("{field_path}@{}", self.store.depth()));
        let mut backend = MemoryBackend::new();
        backend.insert(id.clone(), builder.finish());

        let field_node = Arc::new(SchemaNode::Primitive { dtype, data: id });
        let root = with_field(&self.root, &field_path, field_node)?;
        let store = self.store.with_overlay(Arc::new(backend));
        Ok(Dataset::derived(root, store, self.start, self.len))
    }

    /// Keep the entries `predicate` accepts, preserving order.
    ///
    /// The result's entries are an index layer over the input's, so no
    /// content array is rewritten; only the list of surviving entry
    /// positions is materialized.
    pub fn filter<F>(&self, predicate: F) -> Result<Dataset, TransformError>
    where
        F: Fn(&Instance) -> Result<bool, UserError> + Sync,
    {
        let entry = Arc::clone(self.entry());
        let (from, to) = self.window();
        let keep: Vec<bool> = (from..to)
            .into_par_iter()
            .map(|index| {
                let instance = materialize(&entry, &self.store, index)?;
                predicate(&instance).map_err(TransformError::User)
            })
            .collect::<Result<_, _>>()?;

        let positions: Vec<i64> = keep
            .iter()
            .enumerate()
            .filter(|(_, kept)| **kept)
            .map(|(offset, _)| (from + offset) as i64)
            .collect();
        let count = positions.len();

        let depth = self.store.depth();
        let positions_id = ArrayId::from(format!("#positions@{depth}"));
        let starts_id = ArrayId::from(format!("#starts@{depth}"));
        let stops_id = ArrayId::from(format!("#stops@{depth}"));
        let mut backend = MemoryBackend::new();
        backend.insert(positions_id.clone(), positions);
        backend.insert(starts_id.clone(), vec![0i64]);
        backend.insert(stops_id.clone(), vec![count as i64]);

        let root = Arc::new(SchemaNode::List {
            starts: starts_id,
            stops: stops_id,
            item: Arc::new(SchemaNode::Pointer {
                positions: positions_id,
                mask: None,
                target: entry,
            }),
        });
        let store = self.store.with_overlay(Arc::new(backend));
        Ok(Dataset::derived(root, store, 0, count))
    }

    /// Narrow every entry to one field of the entry record.
    ///
    /// Materializes nothing: the result reuses the entry window and
    /// reads the field's existing arrays, re-wrapping any pointer
    /// indirection so it still applies per entry.
    pub fn project(&self, name: &str) -> Result<Dataset, TransformError> {
        let item = project_node(self.entry(), name)?;
        let (starts, stops) = match &*self.root {
            SchemaNode::List { starts, stops, .. } => (starts.clone(), stops.clone()),
            other => unreachable!("dataset root is a {} node", other.kind_name()),
        };
        let root = Arc::new(SchemaNode::List {
            starts,
            stops,
            item,
        });
        Ok(Dataset::derived(root, self.store.clone(), self.start, self.len))
    }

    /// Concatenate list entries into a dataset of their items, in
    /// entry order. Masked-out entries contribute nothing.
    ///
    /// When the entries are stored back to back, the result is just a
    /// wider window over the item arrays; otherwise an index layer maps
    /// result entries to item positions.
    pub fn flatten(&self) -> Result<Dataset, TransformError> {
        let entry = Arc::clone(self.entry());
        let list_node = peel_to_list(&entry)?;
        let item = match &**list_node {
            SchemaNode::List { item, .. } => Arc::clone(item),
            other => unreachable!("peeled to a {} node", other.kind_name()),
        };
        let (from, to) = self.window();
        let depth = self.store.depth();

        if let SchemaNode::List { starts, stops, .. } = &*entry {
            if let Some((span_start, span_stop)) =
                contiguous_span(&self.store, starts, stops, from, to)?
            {
                let starts_id = ArrayId::from(format!("#starts@{depth}"));
                let stops_id = ArrayId::from(format!("#stops@{depth}"));
                let mut backend = MemoryBackend::new();
                backend.insert(starts_id.clone(), vec![span_start as i64]);
                backend.insert(stops_id.clone(), vec![span_stop as i64]);
                let root = Arc::new(SchemaNode::List {
                    starts: starts_id,
                    stops: stops_id,
                    item,
                });
                let store = self.store.with_overlay(Arc::new(backend));
                return Ok(Dataset::derived(root, store, span_start, span_stop - span_start));
            }
        }

        let mut positions: Vec<i64> = Vec::new();
        for index in from..to {
            if let Some((start, stop)) = entry_range(&entry, &self.store, index)? {
                positions.extend((start..stop).map(|position| position as i64));
            }
        }
        let count = positions.len();

        let positions_id = ArrayId::from(format!("#positions@{depth}"));
        let starts_id = ArrayId::from(format!("#starts@{depth}"));
        let stops_id = ArrayId::from(format!("#stops@{depth}"));
        let mut backend = MemoryBackend::new();
        backend.insert(positions_id.clone(), positions);
        backend.insert(starts_id.clone(), vec![0i64]);
        backend.insert(stops_id.clone(), vec![count as i64]);

        let root = Arc::new(SchemaNode::List {
            starts: starts_id,
            stops: stops_id,
            item: Arc::new(SchemaNode::Pointer {
                positions: positions_id,
                mask: None,
                target: item,
            }),
        });
        let store = self.store.with_overlay(Arc::new(backend));
        Ok(Dataset::derived(root, store, 0, count))
    }

    /// Lazily apply `f` to each entry instance.
    pub fn map<F, T>(&self, f: F) -> MapEntries<F>
    where
        F: FnMut(Instance) -> T,
    {
        MapEntries {
            entries: self.entries(),
            f,
        }
    }
}

/// Iterator adapter returned by [`Dataset::map`]. Entries materialize
/// one at a time as the iterator advances.
#[derive(Clone)]
pub struct MapEntries<F> {
    entries: ListIter,
    f: F,
}

impl<F, T> Iterator for MapEntries<F>
where
    F: FnMut(Instance) -> T,
{
    type Item = Result<T, AccessError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.entries.next()? {
            Ok(instance) => Some(Ok((self.f)(instance))),
            Err(err) => Some(Err(err)),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl<F, T> ExactSizeIterator for MapEntries<F> where F: FnMut(Instance) -> T {}

/// Peel transparent list and pointer wrappers down to the record whose
/// domain a defined field must parallel.
fn descend_to_record<'a>(
    node: &'a Arc<SchemaNode>,
    path: &str,
) -> Result<&'a Arc<SchemaNode>, SchemaError> {
    match &**node {
        SchemaNode::Record { .. } => Ok(node),
        SchemaNode::List { item, .. } => descend_to_record(item, path),
        SchemaNode::Pointer { target, .. } => descend_to_record(target, path),
        other => Err(SchemaError::KindMismatch {
            path: path.to_owned(),
            expected: "record",
            found: other.kind_name(),
        }),
    }
}

fn project_node(node: &Arc<SchemaNode>, name: &str) -> Result<Arc<SchemaNode>, SchemaError> {
    match &**node {
        SchemaNode::Record { fields } => fields
            .iter()
            .find(|f| f.name.as_ref() == name)
            .map(|f| Arc::clone(&f.node))
            .ok_or_else(|| SchemaError::UnknownPath {
                path: name.to_owned(),
            }),
        SchemaNode::Pointer {
            positions,
            mask,
            target,
        } => Ok(Arc::new(SchemaNode::Pointer {
            positions: positions.clone(),
            mask: mask.clone(),
            target: project_node(target, name)?,
        })),
        other => Err(SchemaError::KindMismatch {
            path: name.to_owned(),
            expected: "record",
            found: other.kind_name(),
        }),
    }
}

fn peel_to_list(node: &Arc<SchemaNode>) -> Result<&Arc<SchemaNode>, SchemaError> {
    match &**node {
        SchemaNode::List { .. } => Ok(node),
        SchemaNode::Pointer { target, .. } => peel_to_list(target),
        other => Err(SchemaError::KindMismatch {
            path: String::new(),
            expected: "list",
            found: other.kind_name(),
        }),
    }
}

/// The single span covered when every windowed range starts where the
/// previous one stopped. `None` means the ranges do not chain.
fn contiguous_span(
    store: &ArrayStore,
    starts: &ArrayId,
    stops: &ArrayId,
    from: usize,
    to: usize,
) -> Result<Option<(usize, usize)>, StoreError> {
    let mut span: Option<(usize, usize)> = None;
    for index in from..to {
        let (start, stop) = store.read_range(starts, stops, index)?;
        span = match span {
            None => Some((start, stop)),
            Some((first, previous)) => {
                if start != previous {
                    return Ok(None);
                }
                Some((first, stop))
            }
        };
    }
    Ok(Some(span.unwrap_or((0, 0))))
}

/// The item range of the list entry at `index`, following pointer
/// indirection. `None` for a masked-out entry.
fn entry_range(
    node: &SchemaNode,
    store: &ArrayStore,
    index: usize,
) -> Result<Option<(usize, usize)>, TransformError> {
    match node {
        SchemaNode::List { starts, stops, .. } => Ok(Some(store.read_range(starts, stops, index)?)),
        SchemaNode::Pointer {
            positions,
            mask,
            target,
        } => {
            if let Some(mask) = mask {
                if !read_bool(store, mask, index)? {
                    return Ok(None);
                }
            }
            let position = store.read_index(positions, index)?;
            entry_range(target, store, position)
        }
        other => Err(TransformError::Schema(SchemaError::KindMismatch {
            path: String::new(),
            expected: "list",
            found: other.kind_name(),
        })),
    }
}
