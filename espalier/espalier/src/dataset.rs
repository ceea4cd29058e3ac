//! The dataset: a root list schema over an array store.

use std::fmt;
use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use espalier_arrow::ExportPlan;
use espalier_core::{ArrayStore, SchemaError, SchemaNode, StoreError};

use crate::error::{AccessError, DatasetError, UserError};
use crate::proxy::{materialize, read_bool, Instance, ListIter, ListProxy};

/// An immutable collection of entries laid out in columnar arrays.
///
/// The schema root is a `List` node whose one-element `starts`/`stops`
/// arrays span the entry domain. Datasets are cheap to clone and never
/// mutated; transforms return new datasets sharing every untouched
/// array and schema subtree.
#[derive(Clone)]
pub struct Dataset {
    pub(crate) root: Arc<SchemaNode>,
    pub(crate) store: ArrayStore,
    pub(crate) start: usize,
    pub(crate) len: usize,
}

impl Dataset {
    /// Assemble a dataset from a schema tree and a store, validating
    /// structurally: the root must be a list, every referenced array
    /// must exist with the role-appropriate element type, and the
    /// entry window must fit the entry domain.
    ///
    /// Offsets inside the tree are not walked here; call
    /// [`check_offsets`](Self::check_offsets) for the deep check.
    pub fn from_parts(root: Arc<SchemaNode>, store: ArrayStore) -> Result<Self, DatasetError> {
        let (starts, stops, entry) = match &*root {
            SchemaNode::List {
                starts,
                stops,
                item,
            } => (starts.clone(), stops.clone(), Arc::clone(item)),
            other => {
                return Err(DatasetError::Schema(SchemaError::KindMismatch {
                    path: String::new(),
                    expected: "list",
                    found: other.kind_name(),
                }));
            }
        };

        for (id, expected) in root.arrays() {
            let found = store.dtype(&id)?;
            if found != expected {
                return Err(DatasetError::Store(StoreError::TypeMismatch {
                    id,
                    expected,
                    found,
                }));
            }
        }

        if store.len(&starts)? != 1 || store.len(&stops)? != 1 {
            return Err(DatasetError::Corrupt {
                detail: format!("root window arrays '{starts}'/'{stops}' must hold one element"),
            });
        }
        let (start, stop) = store.read_range(&starts, &stops, 0)?;
        match entry.length_array() {
            Some(id) => {
                let domain = store.len(id)?;
                if stop > domain {
                    return Err(DatasetError::Corrupt {
                        detail: format!(
                            "entry window [{start}, {stop}) exceeds domain of length {domain}"
                        ),
                    });
                }
            }
            None => {
                if stop != start {
                    return Err(DatasetError::Corrupt {
                        detail: "entry node references no arrays but the window is non-empty"
                            .to_owned(),
                    });
                }
            }
        }

        Ok(Self {
            root,
            store,
            start,
            len: stop - start,
        })
    }

    /// Construct without re-validating. For transform outputs, whose
    /// window and arrays are consistent by construction.
    pub(crate) fn derived(
        root: Arc<SchemaNode>,
        store: ArrayStore,
        start: usize,
        len: usize,
    ) -> Self {
        Self {
            root,
            store,
            start,
            len,
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The root list node.
    pub fn root(&self) -> &Arc<SchemaNode> {
        &self.root
    }

    /// The per-entry schema node (the root list's item).
    pub fn entry(&self) -> &Arc<SchemaNode> {
        match &*self.root {
            SchemaNode::List { item, .. } => item,
            other => unreachable!("dataset root is a {} node", other.kind_name()),
        }
    }

    pub fn store(&self) -> &ArrayStore {
        &self.store
    }

    /// Content-index span of the entry window.
    pub(crate) fn window(&self) -> (usize, usize) {
        (self.start, self.start + self.len)
    }

    /// Materialize entry `index`.
    ///
    /// # Errors
    ///
    /// [`AccessError::IndexOutOfBounds`] when `index >= len()`.
    pub fn get(&self, index: usize) -> Result<Instance, AccessError> {
        if index >= self.len {
            return Err(AccessError::IndexOutOfBounds {
                index,
                len: self.len,
            });
        }
        materialize(self.entry(), &self.store, self.start + index)
    }

    /// The dataset viewed as one list instance.
    pub fn as_list(&self) -> ListProxy {
        let (start, stop) = self.window();
        ListProxy::new(Arc::clone(self.entry()), self.store.clone(), start, stop)
    }

    /// Lazy, restartable iterator over entry instances.
    pub fn entries(&self) -> ListIter {
        self.as_list().iter()
    }

    /// Walk the whole tree and verify every index array against the
    /// domain it points into: list ranges, union tags and offsets, and
    /// pointer positions. Run by the persistence loader; in-memory
    /// datasets built through the engine are consistent by construction.
    pub fn check_offsets(&self) -> Result<(), DatasetError> {
        check_node(&self.root, &self.store)
    }

    /// The Arrow export plan for this dataset's entries.
    pub fn export_plan(&self) -> ExportPlan {
        ExportPlan::new(self.entry())
    }

    /// Export entries as Arrow record batches of at most `batch_size`
    /// rows, feeding each to `callback` in entry order.
    ///
    /// Fields that cannot cross into Arrow (unions) are dropped from
    /// the batches; inspect [`export_plan`](Self::export_plan) for the
    /// dropped paths.
    ///
    /// # Errors
    ///
    /// Callback errors are wrapped verbatim in
    /// [`DatasetError::Callback`].
    pub fn for_each_record_batch(
        &self,
        batch_size: usize,
        mut callback: impl FnMut(RecordBatch) -> Result<(), UserError>,
    ) -> Result<(), DatasetError> {
        let plan = self.export_plan();
        let step = batch_size.max(1);
        let (start, stop) = self.window();
        let mut at = start;
        while at < stop {
            let end = stop.min(at + step);
            let batch = plan.build_batch(&self.store, at..end)?;
            callback(batch).map_err(DatasetError::Callback)?;
            at = end;
        }
        Ok(())
    }
}

impl fmt::Debug for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("entries", &self.len)
            .field("layers", &self.store.depth())
            .finish()
    }
}

fn domain_len(node: &SchemaNode, store: &ArrayStore) -> Result<Option<usize>, DatasetError> {
    match node.length_array() {
        Some(id) => Ok(Some(store.len(id)?)),
        None => Ok(None),
    }
}

fn check_node(node: &SchemaNode, store: &ArrayStore) -> Result<(), DatasetError> {
    match node {
        SchemaNode::Primitive { .. } => Ok(()),
        SchemaNode::List {
            starts,
            stops,
            item,
        } => {
            let n = store.len(starts)?;
            if store.len(stops)? != n {
                return Err(DatasetError::Corrupt {
                    detail: format!("arrays '{starts}' and '{stops}' differ in length"),
                });
            }
            let content = domain_len(item, store)?;
            for index in 0..n {
                let (_, stop) = store.read_range(starts, stops, index)?;
                if let Some(content) = content {
                    if stop > content {
                        return Err(DatasetError::Corrupt {
                            detail: format!(
                                "list range from '{starts}'/'{stops}' at {index} ends at {stop}, \
                                 past content length {content}"
                            ),
                        });
                    }
                }
            }
            check_node(item, store)
        }
        SchemaNode::Record { fields } => {
            for field in fields {
                check_node(&field.node, store)?;
            }
            Ok(())
        }
        SchemaNode::Union {
            tags,
            offsets,
            variants,
        } => {
            let n = store.len(tags)?;
            if store.len(offsets)? != n {
                return Err(DatasetError::Corrupt {
                    detail: format!("arrays '{tags}' and '{offsets}' differ in length"),
                });
            }
            let domains = variants
                .iter()
                .map(|v| domain_len(v, store))
                .collect::<Result<Vec<_>, _>>()?;
            for index in 0..n {
                let tag = store.read_index(tags, index)?;
                if tag >= variants.len() {
                    return Err(DatasetError::Corrupt {
                        detail: format!(
                            "tag {tag} at index {index} of '{tags}' selects no variant"
                        ),
                    });
                }
                let offset = store.read_index(offsets, index)?;
                if let Some(domain) = domains[tag] {
                    if offset >= domain {
                        return Err(DatasetError::Corrupt {
                            detail: format!(
                                "offset {offset} at index {index} of '{offsets}' exceeds \
                                 variant domain {domain}"
                            ),
                        });
                    }
                }
            }
            for variant in variants {
                check_node(variant, store)?;
            }
            Ok(())
        }
        SchemaNode::Pointer {
            positions,
            mask,
            target,
        } => {
            let n = store.len(positions)?;
            if let Some(mask) = mask {
                if store.len(mask)? != n {
                    return Err(DatasetError::Corrupt {
                        detail: format!("arrays '{positions}' and '{mask}' differ in length"),
                    });
                }
            }
            let domain = domain_len(target, store)?;
            for index in 0..n {
                if let Some(mask) = mask {
                    if !read_bool(store, mask, index).map_err(access_to_dataset)? {
                        continue;
                    }
                }
                let position = store.read_index(positions, index)?;
                if let Some(domain) = domain {
                    if position >= domain {
                        return Err(DatasetError::Corrupt {
                            detail: format!(
                                "position {position} at index {index} of '{positions}' exceeds \
                                 target domain {domain}"
                            ),
                        });
                    }
                }
            }
            check_node(target, store)
        }
    }
}

fn access_to_dataset(err: AccessError) -> DatasetError {
    match err {
        AccessError::Schema(e) => DatasetError::Schema(e),
        AccessError::Store(e) => DatasetError::Store(e),
        other => DatasetError::Corrupt {
            detail: other.to_string(),
        },
    }
}
