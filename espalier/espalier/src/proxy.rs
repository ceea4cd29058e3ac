//! Lazy object views over schema nodes and array stores.
//!
//! Materializing an instance never copies array data: a proxy is a
//! schema node, a store handle, and an index. Reads happen when a
//! field or element is actually asked for, so the cost of `get` is
//! proportional to depth, not to the size of the subtree.

use std::sync::Arc;

use espalier_core::{
    ArrayId, ArrayStore, PrimitiveType, Scalar, ScalarTypeError, SchemaError, SchemaNode,
    StoreError,
};

use crate::error::AccessError;

/// One materialized value: a scalar, a view, or an absent pointer slot.
///
/// Unions never appear here; materialization resolves the tag and
/// yields the selected variant directly.
#[derive(Debug, Clone)]
pub enum Instance {
    /// A masked-out nullable pointer.
    Null,
    Scalar(Scalar),
    List(ListProxy),
    Record(RecordProxy),
}

/// A view of one record occurrence.
#[derive(Debug, Clone)]
pub struct RecordProxy {
    node: Arc<SchemaNode>,
    store: ArrayStore,
    index: usize,
}

/// A view of one list occurrence, covering `[start, stop)` of the item
/// domain.
#[derive(Debug, Clone)]
pub struct ListProxy {
    item: Arc<SchemaNode>,
    store: ArrayStore,
    start: usize,
    stop: usize,
}

/// Lazy iterator over a list's items. Cloning preserves the position;
/// calling [`ListProxy::iter`] again restarts from zero.
#[derive(Debug, Clone)]
pub struct ListIter {
    list: ListProxy,
    next: usize,
}

/// Materialize the instance of `node` at `index`.
pub(crate) fn materialize(
    node: &Arc<SchemaNode>,
    store: &ArrayStore,
    index: usize,
) -> Result<Instance, AccessError> {
    match &**node {
        SchemaNode::Primitive { data, .. } => Ok(Instance::Scalar(store.read(data, index)?)),
        SchemaNode::List {
            starts,
            stops,
            item,
        } => {
            let (start, stop) = store.read_range(starts, stops, index)?;
            Ok(Instance::List(ListProxy {
                item: Arc::clone(item),
                store: store.clone(),
                start,
                stop,
            }))
        }
        SchemaNode::Record { .. } => Ok(Instance::Record(RecordProxy {
            node: Arc::clone(node),
            store: store.clone(),
            index,
        })),
        SchemaNode::Union {
            tags,
            offsets,
            variants,
        } => {
            let tag = store.read_index(tags, index)?;
            let variant = variants.get(tag).ok_or(AccessError::IndexOutOfBounds {
                index: tag,
                len: variants.len(),
            })?;
            let offset = store.read_index(offsets, index)?;
            materialize(variant, store, offset)
        }
        SchemaNode::Pointer {
            positions,
            mask,
            target,
        } => {
            if let Some(mask) = mask {
                if !read_bool(store, mask, index)? {
                    return Ok(Instance::Null);
                }
            }
            let position = store.read_index(positions, index)?;
            materialize(target, store, position)
        }
    }
}

/// Read one mask element, reporting a non-bool value as a store-level
/// type mismatch.
pub(crate) fn read_bool(
    store: &ArrayStore,
    id: &ArrayId,
    index: usize,
) -> Result<bool, AccessError> {
    let value = store.read(id, index)?;
    value.try_bool().map_err(|_| {
        AccessError::Store(StoreError::TypeMismatch {
            id: id.clone(),
            expected: PrimitiveType::Bool,
            found: value.dtype(),
        })
    })
}

impl Instance {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Instance::Null => "null",
            Instance::Scalar(_) => "scalar",
            Instance::List(_) => "list",
            Instance::Record(_) => "record",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Instance::Null)
    }

    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            Instance::Scalar(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListProxy> {
        match self {
            Instance::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&RecordProxy> {
        match self {
            Instance::Record(record) => Some(record),
            _ => None,
        }
    }

    /// The scalar value, or a type error naming the actual kind.
    pub fn try_scalar(&self) -> Result<Scalar, ScalarTypeError> {
        self.as_scalar()
            .ok_or_else(|| ScalarTypeError::new("scalar", self.kind_name()))
    }

    pub fn try_list(&self) -> Result<&ListProxy, ScalarTypeError> {
        self.as_list()
            .ok_or_else(|| ScalarTypeError::new("list", self.kind_name()))
    }

    pub fn try_record(&self) -> Result<&RecordProxy, ScalarTypeError> {
        self.as_record()
            .ok_or_else(|| ScalarTypeError::new("record", self.kind_name()))
    }
}

impl RecordProxy {
    /// Materialize one field by name.
    ///
    /// # Errors
    ///
    /// [`SchemaError::UnknownPath`] (wrapped in [`AccessError::Schema`])
    /// when the record has no such field.
    pub fn get(&self, name: &str) -> Result<Instance, AccessError> {
        let fields = match &*self.node {
            SchemaNode::Record { fields } => fields,
            other => unreachable!("record proxy over a {} node", other.kind_name()),
        };
        let field = fields
            .iter()
            .find(|f| f.name.as_ref() == name)
            .ok_or_else(|| {
                AccessError::Schema(SchemaError::UnknownPath {
                    path: name.to_owned(),
                })
            })?;
        materialize(&field.node, &self.store, self.index)
    }

    pub fn field_names(&self) -> Vec<&str> {
        match &*self.node {
            SchemaNode::Record { fields } => {
                fields.iter().map(|f| f.name.as_ref()).collect()
            }
            other => unreachable!("record proxy over a {} node", other.kind_name()),
        }
    }

    /// Index of this occurrence in the record's domain.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn node(&self) -> &Arc<SchemaNode> {
        &self.node
    }
}

/// Two record views are equal when they present the same node of the
/// same store at the same index, not when their field values happen to
/// coincide.
impl PartialEq for RecordProxy {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
            && self.store.ptr_eq(&other.store)
            && self.index == other.index
    }
}

impl ListProxy {
    pub(crate) fn new(item: Arc<SchemaNode>, store: ArrayStore, start: usize, stop: usize) -> Self {
        Self {
            item,
            store,
            start,
            stop,
        }
    }

    pub fn len(&self) -> usize {
        self.stop - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.stop
    }

    /// Materialize the element at `index`.
    ///
    /// # Errors
    ///
    /// [`AccessError::IndexOutOfBounds`] past the end; never clamped.
    pub fn get(&self, index: usize) -> Result<Instance, AccessError> {
        if index >= self.len() {
            return Err(AccessError::IndexOutOfBounds {
                index,
                len: self.len(),
            });
        }
        materialize(&self.item, &self.store, self.start + index)
    }

    /// Like [`get`](Self::get), rejecting negative indices with the
    /// distinct [`AccessError::NegativeIndex`].
    pub fn get_signed(&self, index: i64) -> Result<Instance, AccessError> {
        let index = usize::try_from(index).map_err(|_| AccessError::NegativeIndex { index })?;
        self.get(index)
    }

    pub fn iter(&self) -> ListIter {
        ListIter {
            list: self.clone(),
            next: 0,
        }
    }

    pub fn item(&self) -> &Arc<SchemaNode> {
        &self.item
    }
}

/// Same range of the same item node over the same store.
impl PartialEq for ListProxy {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.item, &other.item)
            && self.store.ptr_eq(&other.store)
            && self.start == other.start
            && self.stop == other.stop
    }
}

impl Iterator for ListIter {
    type Item = Result<Instance, AccessError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.list.len() {
            return None;
        }
        let item = self.list.get(self.next);
        self.next += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.list.len() - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ListIter {}

impl IntoIterator for &ListProxy {
    type Item = Result<Instance, AccessError>;
    type IntoIter = ListIter;

    fn into_iter(self) -> ListIter {
        self.iter()
    }
}
