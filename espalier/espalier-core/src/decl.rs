//! Logical type declarations, independent of physical array layout.
//!
//! A [`TypeDecl`] describes shape only. Physical schemas
//! ([`SchemaNode`](crate::SchemaNode)) are derived from declarations by
//! assigning array names from field paths.

use crate::scalar::PrimitiveType;

/// Array-free shape declaration for one field or subtree.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TypeDecl {
    Primitive(PrimitiveType),
    List(Box<TypeDecl>),
    Record(Vec<FieldDecl>),
    /// Positional variants; each instance carries a tag selecting one.
    Union(Vec<TypeDecl>),
    /// Indirection into the element domain of a previously declared path.
    /// `target` names a list field (the pointer indexes its content) or any
    /// other node (the pointer indexes that node's own domain).
    Pointer { target: String, nullable: bool },
}

/// A named field inside a record declaration. Order is significant.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldDecl {
    pub name: String,
    pub decl: TypeDecl,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, decl: TypeDecl) -> Self {
        Self {
            name: name.into(),
            decl,
        }
    }
}

impl TypeDecl {
    pub fn primitive(dtype: PrimitiveType) -> Self {
        TypeDecl::Primitive(dtype)
    }

    pub fn list(item: TypeDecl) -> Self {
        TypeDecl::List(Box::new(item))
    }

    pub fn record(fields: impl IntoIterator<Item = (&'static str, TypeDecl)>) -> Self {
        TypeDecl::Record(
            fields
                .into_iter()
                .map(|(name, decl)| FieldDecl::new(name, decl))
                .collect(),
        )
    }

    pub fn union(variants: impl IntoIterator<Item = TypeDecl>) -> Self {
        TypeDecl::Union(variants.into_iter().collect())
    }

    pub fn pointer(target: impl Into<String>, nullable: bool) -> Self {
        TypeDecl::Pointer {
            target: target.into(),
            nullable,
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, TypeDecl::Primitive(_))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            TypeDecl::Primitive(_) => "primitive",
            TypeDecl::List(_) => "list",
            TypeDecl::Record(_) => "record",
            TypeDecl::Union(_) => "union",
            TypeDecl::Pointer { .. } => "pointer",
        }
    }
}

impl From<PrimitiveType> for TypeDecl {
    fn from(dtype: PrimitiveType) -> Self {
        TypeDecl::Primitive(dtype)
    }
}
