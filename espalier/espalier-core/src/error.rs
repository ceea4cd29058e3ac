//! Error types for the schema and array-store layers.

use crate::scalar::PrimitiveType;
use crate::store::ArrayId;

/// A scalar had a different variant than an operation expected.
#[derive(Debug, thiserror::Error)]
#[error("scalar type mismatch: expected {expected}, found {found}")]
pub struct ScalarTypeError {
    pub expected: String,
    pub found: String,
}

impl ScalarTypeError {
    pub fn new(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

/// Errors raised while resolving or rewriting schema trees.
///
/// All variants are detected before any array data is touched.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The path does not name a field of the schema.
    #[error("unknown schema path '{path}'")]
    UnknownPath { path: String },

    /// The operation is incompatible with the node kind at `path`
    /// (e.g. flattening a record, or a field lookup on a primitive).
    #[error("schema kind mismatch at '{path}': expected {expected}, found {found}")]
    KindMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A record declaration carries the same field name twice.
    #[error("duplicate field '{name}' in record at '{path}'")]
    DuplicateField { path: String, name: String },

    /// A field name is empty or contains a character reserved by path
    /// addressing or array naming ('.', '#', '@', '/', '\').
    #[error("invalid field name '{name}'")]
    InvalidFieldName { name: String },

    /// A chain of pointer declarations leads back to itself.
    #[error("pointer cycle through '{path}'")]
    PointerCycle { path: String },
}

/// Errors raised by array backends and the layered store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No array with this id is reachable from the store.
    #[error("unknown array '{id}'")]
    UnknownArray { id: ArrayId },

    /// The index is past the end of the array. Never clamped.
    #[error("index {index} out of bounds for array '{id}' of length {len}")]
    OutOfBounds {
        id: ArrayId,
        index: usize,
        len: usize,
    },

    /// The array holds a different element type than the schema declares.
    #[error("array '{id}' holds {found}, expected {expected}")]
    TypeMismatch {
        id: ArrayId,
        expected: PrimitiveType,
        found: PrimitiveType,
    },

    /// A starts/stops pair produced an inverted range.
    #[error("invalid range [{start}, {stop}) from arrays '{starts}'/'{stops}' at index {index}")]
    InvalidRange {
        starts: ArrayId,
        stops: ArrayId,
        index: usize,
        start: i64,
        stop: i64,
    },

    /// A value read from an index array could not be used as an index.
    #[error("array '{id}' holds {value} at index {index}, which is not a valid index")]
    BadIndexValue {
        id: ArrayId,
        index: usize,
        value: i64,
    },

    /// An I/O or transport fault below the store contract.
    /// Propagated verbatim; retry policy belongs to the backend.
    #[error("backend error on array '{id}': {source}")]
    Backend {
        id: ArrayId,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
