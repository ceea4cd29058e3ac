//! Error types for the engine layer.

use espalier_arrow::ArrowBridgeError;
use espalier_core::{ArrayId, ScalarTypeError, SchemaError, StoreError};

/// An error returned by user-supplied closures and callbacks.
pub type UserError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while materializing object views from arrays.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    /// Path resolution failed; no array data was touched.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The backing store failed or served unusable data.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An index past the end of a list or variant set. Never clamped.
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// A negative index. Distinct from [`AccessError::IndexOutOfBounds`]
    /// so callers can tell the two apart.
    #[error("negative index {index}")]
    NegativeIndex { index: i64 },
}

/// Errors raised by dataset transforms.
///
/// Schema and path problems are reported before any per-element
/// evaluation starts.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A closure passed to `define` produced values of more than one type.
    #[error("defined column '{name}' mixes output types: expected {expected}, found {found}")]
    OutputTypeMismatch {
        name: String,
        expected: String,
        found: String,
    },

    /// An error returned by the user-supplied closure, passed through
    /// verbatim.
    #[error(transparent)]
    User(UserError),
}

/// Errors raised while translating an expression to a compiled program.
#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    /// The expression names fields the schema does not have, or applies
    /// an operation to the wrong node kind. A caller bug, not a reason
    /// to fall back.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The expression is valid but uses a construct the translator
    /// cannot lower to index arithmetic. Callers fall back to proxy
    /// evaluation.
    #[error("unsupported access pattern: {detail}")]
    UnsupportedPattern { detail: String },
}

/// Errors raised while evaluating an expression against one entry.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A list was indexed with a non-integer value.
    #[error("non-integer list index of type {found}")]
    NonIntegerIndex { found: &'static str },

    /// An operand had the wrong kind or type for the operation.
    #[error(transparent)]
    Type(#[from] ScalarTypeError),
}

/// Errors raised by dataset construction, export, and persistence.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Scalar(#[from] ScalarTypeError),

    /// Failure while building record batches for export.
    #[error(transparent)]
    Export(#[from] ArrowBridgeError),

    /// The target directory already exists. Saving never overwrites.
    #[error("dataset directory '{path}' already exists")]
    AlreadyExists { path: String },

    /// An array named by the schema is absent from the manifest or the
    /// dataset directory.
    #[error("array '{id}' is missing from the dataset")]
    MissingArray { id: ArrayId },

    /// An array file's size does not match its manifest entry.
    #[error("array file for '{id}' holds {found} bytes, manifest expects {expected}")]
    LengthMismatch {
        id: ArrayId,
        expected: u64,
        found: u64,
    },

    /// Offsets, tags, or positions violate the bounds the schema implies.
    #[error("corrupt dataset: {detail}")]
    Corrupt { detail: String },

    /// An error returned by a record-batch callback, passed through
    /// verbatim.
    #[error(transparent)]
    Callback(UserError),
}
