//! Storage-agnostic core types for `espalier`.
//!
//! This crate provides the logical/physical schema representations
//! ([`TypeDecl`] / [`SchemaNode`]), the flat-value layer ([`Scalar`],
//! [`PrimitiveType`], [`Value`]), and the layered [`ArrayStore`] with its
//! [`ArrayBackend`] contract.

mod decl;
mod error;
mod scalar;
mod schema;
mod store;
mod value;

pub use decl::{FieldDecl, TypeDecl};
pub use error::{ScalarTypeError, SchemaError, StoreError};
pub use scalar::{PrimitiveType, Scalar};
pub use schema::{Field, SchemaNode, format_node, resolve, with_field};
pub use store::{
    ArrayBackend, ArrayId, ArrayStore, MemoryBackend, PrimitiveArray, PrimitiveBuilder,
};
pub use value::Value;
