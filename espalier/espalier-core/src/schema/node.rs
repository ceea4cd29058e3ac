//! Physical schema nodes: logical shape plus the names of the arrays
//! holding each part.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use crate::decl::{FieldDecl, TypeDecl};
use crate::error::SchemaError;
use crate::scalar::PrimitiveType;
use crate::store::ArrayId;

/// One node of a resolved schema tree.
///
/// Variants mirror [`TypeDecl`] but every variant that owns data carries
/// the [`ArrayId`]s it reads from. Nodes are immutable once built and are
/// always handled through `Arc`, so derived schemas share untouched
/// subtrees instead of copying them.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum SchemaNode {
    /// Fixed-width values read directly from `data`.
    Primitive { dtype: PrimitiveType, data: ArrayId },
    /// Variable-length runs of `item`, delimited by the parallel
    /// `starts`/`stops` index arrays.
    List {
        starts: ArrayId,
        stops: ArrayId,
        item: Arc<SchemaNode>,
    },
    /// Named fields sharing the parent's index domain.
    Record { fields: Vec<Field> },
    /// One of several variants per instance, selected by `tags` and
    /// re-indexed into the chosen variant by `offsets` (dense layout).
    Union {
        tags: ArrayId,
        offsets: ArrayId,
        variants: Vec<Arc<SchemaNode>>,
    },
    /// Indirection: instance `i` stands for `target` at index
    /// `positions[i]`. With `mask` present, a `false` entry marks the
    /// instance as absent.
    Pointer {
        positions: ArrayId,
        mask: Option<ArrayId>,
        target: Arc<SchemaNode>,
    },
}

/// A named field of a record node.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Field {
    pub name: Arc<str>,
    pub node: Arc<SchemaNode>,
}

impl Field {
    pub fn new(name: impl AsRef<str>, node: Arc<SchemaNode>) -> Self {
        Self {
            name: Arc::from(name.as_ref()),
            node,
        }
    }
}

impl SchemaNode {
    /// Build a schema tree from a declaration, assigning array names from
    /// field paths: a primitive at `Muon.pt` reads `Muon.pt`, a list at
    /// `Muon` reads `Muon#starts`/`Muon#stops`, and so on. Pointer targets
    /// are resolved against the root of `decl`, so a pointer shares the
    /// target's arrays by name.
    ///
    /// # Errors
    ///
    /// [`SchemaError::DuplicateField`] for repeated record field names,
    /// [`SchemaError::InvalidFieldName`] for names that would break path
    /// addressing, [`SchemaError::UnknownPath`] for an unresolvable pointer
    /// target, and [`SchemaError::PointerCycle`] when pointer targets loop.
    pub fn from_decl(decl: &TypeDecl) -> Result<Arc<SchemaNode>, SchemaError> {
        let mut ctx = DeclContext {
            root: decl,
            active_targets: Vec::new(),
        };
        ctx.build(decl, "")
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            SchemaNode::Primitive { .. } => "primitive",
            SchemaNode::List { .. } => "list",
            SchemaNode::Record { .. } => "record",
            SchemaNode::Union { .. } => "union",
            SchemaNode::Pointer { .. } => "pointer",
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, SchemaNode::Primitive { .. })
    }

    /// Element type of a primitive node.
    pub fn dtype(&self) -> Option<PrimitiveType> {
        match self {
            SchemaNode::Primitive { dtype, .. } => Some(*dtype),
            _ => None,
        }
    }

    /// The array whose physical length equals the size of this node's
    /// index domain. Records delegate to their first field; an empty
    /// record has no measurable domain.
    pub fn length_array(&self) -> Option<&ArrayId> {
        match self {
            SchemaNode::Primitive { data, .. } => Some(data),
            SchemaNode::List { starts, .. } => Some(starts),
            SchemaNode::Record { fields } => {
                fields.iter().find_map(|f| f.node.length_array())
            }
            SchemaNode::Union { tags, .. } => Some(tags),
            SchemaNode::Pointer { positions, .. } => Some(positions),
        }
    }

    /// Every array this tree reads, with the element type each must hold.
    /// Arrays referenced more than once (shared pointer targets) appear
    /// once.
    pub fn arrays(&self) -> BTreeMap<ArrayId, PrimitiveType> {
        let mut out = BTreeMap::new();
        self.collect_arrays(&mut out);
        out
    }

    fn collect_arrays(&self, out: &mut BTreeMap<ArrayId, PrimitiveType>) {
        match self {
            SchemaNode::Primitive { dtype, data } => {
                out.insert(data.clone(), *dtype);
            }
            SchemaNode::List {
                starts,
                stops,
                item,
            } => {
                out.insert(starts.clone(), PrimitiveType::I64);
                out.insert(stops.clone(), PrimitiveType::I64);
                item.collect_arrays(out);
            }
            SchemaNode::Record { fields } => {
                for field in fields {
                    field.node.collect_arrays(out);
                }
            }
            SchemaNode::Union {
                tags,
                offsets,
                variants,
            } => {
                out.insert(tags.clone(), PrimitiveType::I8);
                out.insert(offsets.clone(), PrimitiveType::I64);
                for variant in variants {
                    variant.collect_arrays(out);
                }
            }
            SchemaNode::Pointer {
                positions,
                mask,
                target,
            } => {
                out.insert(positions.clone(), PrimitiveType::I64);
                if let Some(mask) = mask {
                    out.insert(mask.clone(), PrimitiveType::Bool);
                }
                target.collect_arrays(out);
            }
        }
    }
}

impl Display for SchemaNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let text = super::format_node(self).map_err(|_| std::fmt::Error)?;
        f.write_str(&text)
    }
}

/// Join a field name onto a dotted path.
fn child_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_owned()
    } else {
        format!("{path}.{name}")
    }
}

/// Name one of a node's role arrays (`starts`, `stops`, `tags`, ...).
fn role_id(path: &str, role: &str) -> ArrayId {
    ArrayId::from(format!("{path}#{role}"))
}

/// List content shares the list's path, except that a directly nested
/// list moves to `path#item` so its own role arrays cannot collide with
/// the outer list's.
fn list_item_path(path: &str, item: &TypeDecl) -> String {
    if matches!(item, TypeDecl::List(_)) {
        format!("{path}#item")
    } else {
        path.to_owned()
    }
}

struct DeclContext<'a> {
    root: &'a TypeDecl,
    /// Pointer target paths currently being expanded, for cycle detection.
    active_targets: Vec<String>,
}

impl DeclContext<'_> {
    fn build(&mut self, decl: &TypeDecl, path: &str) -> Result<Arc<SchemaNode>, SchemaError> {
        let node = match decl {
            TypeDecl::Primitive(dtype) => SchemaNode::Primitive {
                dtype: *dtype,
                data: ArrayId::from(path),
            },
            TypeDecl::List(item) => SchemaNode::List {
                starts: role_id(path, "starts"),
                stops: role_id(path, "stops"),
                item: self.build(item, &list_item_path(path, item))?,
            },
            TypeDecl::Record(fields) => {
                let mut built = Vec::with_capacity(fields.len());
                for FieldDecl { name, decl } in fields {
                    if name.is_empty() || name.contains(['.', '#', '@', '/', '\\']) {
                        return Err(SchemaError::InvalidFieldName { name: name.clone() });
                    }
                    if built.iter().any(|f: &Field| f.name.as_ref() == name) {
                        return Err(SchemaError::DuplicateField {
                            path: path.to_owned(),
                            name: name.clone(),
                        });
                    }
                    let child = self.build(decl, &child_path(path, name))?;
                    built.push(Field::new(name, child));
                }
                SchemaNode::Record { fields: built }
            }
            TypeDecl::Union(variants) => {
                let mut built = Vec::with_capacity(variants.len());
                for (tag, variant) in variants.iter().enumerate() {
                    built.push(self.build(variant, &format!("{path}#v{tag}"))?);
                }
                SchemaNode::Union {
                    tags: role_id(path, "tags"),
                    offsets: role_id(path, "offsets"),
                    variants: built,
                }
            }
            TypeDecl::Pointer { target, nullable } => {
                if self.active_targets.iter().any(|t| t == target) {
                    return Err(SchemaError::PointerCycle {
                        path: target.clone(),
                    });
                }
                let target_decl = resolve_decl(self.root, target)?;
                self.active_targets.push(target.clone());
                // A pointer into a list indexes the list's content domain.
                let built = match target_decl {
                    TypeDecl::List(item) => self.build(item, &list_item_path(target, item))?,
                    other => self.build(other, target)?,
                };
                self.active_targets.pop();
                SchemaNode::Pointer {
                    positions: role_id(path, "positions"),
                    mask: nullable.then(|| role_id(path, "mask")),
                    target: built,
                }
            }
        };
        Ok(Arc::new(node))
    }
}

/// Walk a declaration tree by dotted path. Record fields consume one
/// segment each; list nesting is transparent.
fn resolve_decl<'a>(root: &'a TypeDecl, path: &str) -> Result<&'a TypeDecl, SchemaError> {
    let mut current = root;
    if path.is_empty() {
        return Ok(current);
    }
    for segment in path.split('.') {
        loop {
            match current {
                TypeDecl::Record(fields) => {
                    current = fields
                        .iter()
                        .find(|f| f.name == segment)
                        .map(|f| &f.decl)
                        .ok_or_else(|| SchemaError::UnknownPath {
                            path: path.to_owned(),
                        })?;
                    break;
                }
                TypeDecl::List(item) => current = item,
                _ => {
                    return Err(SchemaError::KindMismatch {
                        path: path.to_owned(),
                        expected: "record",
                        found: current.kind_name(),
                    });
                }
            }
        }
    }
    Ok(current)
}
