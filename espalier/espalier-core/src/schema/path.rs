//! Dotted-path resolution and structural-sharing rewrites.
//!
//! Paths name record fields. List and pointer nesting is transparent:
//! `Muon.pt` resolves through the `Muon` list into the item record's
//! `pt` field. Resolution is deterministic and never touches array data.

use std::sync::Arc;

use crate::error::SchemaError;

use super::node::{Field, SchemaNode};

/// Resolve `path` against `node`. An empty path is the node itself.
///
/// # Errors
///
/// [`SchemaError::UnknownPath`] when a segment names no field, and
/// [`SchemaError::KindMismatch`] when a segment must be looked up in a
/// node that has no fields to offer (primitive or union).
pub fn resolve(node: &Arc<SchemaNode>, path: &str) -> Result<Arc<SchemaNode>, SchemaError> {
    let mut current = Arc::clone(node);
    if path.is_empty() {
        return Ok(current);
    }
    for segment in path.split('.') {
        current = lookup(&current, segment, path)?;
    }
    Ok(current)
}

fn lookup(
    node: &Arc<SchemaNode>,
    segment: &str,
    full: &str,
) -> Result<Arc<SchemaNode>, SchemaError> {
    match &**node {
        SchemaNode::Record { fields } => fields
            .iter()
            .find(|f| f.name.as_ref() == segment)
            .map(|f| Arc::clone(&f.node))
            .ok_or_else(|| SchemaError::UnknownPath {
                path: full.to_owned(),
            }),
        SchemaNode::List { item, .. } => lookup(item, segment, full),
        SchemaNode::Pointer { target, .. } => lookup(target, segment, full),
        other => Err(SchemaError::KindMismatch {
            path: full.to_owned(),
            expected: "record",
            found: other.kind_name(),
        }),
    }
}

/// Return a new tree in which the field at `path` is `child`, replacing
/// an existing field of that name or appending a new one. Only the spine
/// from the root to the enclosing record is rebuilt; every untouched
/// child is shared with the original tree.
///
/// # Errors
///
/// Same conditions as [`resolve`], applied to the parent of `path`.
pub fn with_field(
    root: &Arc<SchemaNode>,
    path: &str,
    child: Arc<SchemaNode>,
) -> Result<Arc<SchemaNode>, SchemaError> {
    if path.is_empty() {
        return Err(SchemaError::UnknownPath {
            path: String::new(),
        });
    }
    let segments: Vec<&str> = path.split('.').collect();
    rebuild(root, &segments, path, child)
}

fn rebuild(
    node: &Arc<SchemaNode>,
    segments: &[&str],
    full: &str,
    child: Arc<SchemaNode>,
) -> Result<Arc<SchemaNode>, SchemaError> {
    let rebuilt = match &**node {
        SchemaNode::Record { fields } => match segments {
            [name] => {
                let mut fields = fields.clone();
                match fields.iter_mut().find(|f| f.name.as_ref() == *name) {
                    Some(slot) => slot.node = child,
                    None => fields.push(Field::new(name, child)),
                }
                SchemaNode::Record { fields }
            }
            [head, rest @ ..] => {
                let mut fields = fields.clone();
                let slot = fields
                    .iter_mut()
                    .find(|f| f.name.as_ref() == *head)
                    .ok_or_else(|| SchemaError::UnknownPath {
                        path: full.to_owned(),
                    })?;
                slot.node = rebuild(&slot.node, rest, full, child)?;
                SchemaNode::Record { fields }
            }
            [] => unreachable!("path segments are never empty"),
        },
        SchemaNode::List {
            starts,
            stops,
            item,
        } => SchemaNode::List {
            starts: starts.clone(),
            stops: stops.clone(),
            item: rebuild(item, segments, full, child)?,
        },
        SchemaNode::Pointer {
            positions,
            mask,
            target,
        } => SchemaNode::Pointer {
            positions: positions.clone(),
            mask: mask.clone(),
            target: rebuild(target, segments, full, child)?,
        },
        other => {
            return Err(SchemaError::KindMismatch {
                path: full.to_owned(),
                expected: "record",
                found: other.kind_name(),
            });
        }
    };
    Ok(Arc::new(rebuilt))
}
