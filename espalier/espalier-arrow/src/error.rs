use arrow::error::ArrowError;
use espalier_core::{ScalarTypeError, SchemaError, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArrowBridgeError {
    /// The arrow column uses a type the engine cannot represent.
    #[error("unsupported arrow type {dtype} in column '{column}'")]
    UnsupportedType { column: String, dtype: String },

    /// The arrow column contains nulls outside a nullable pointer field.
    #[error("column '{column}' contains {nulls} null value(s), which the schema cannot hold")]
    NullValues { column: String, nulls: usize },

    /// Nothing in the arrow schema survived conversion.
    #[error("no importable columns in arrow schema")]
    NoImportableColumns,

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("value type mismatch: {0}")]
    Scalar(#[from] ScalarTypeError),

    #[error(transparent)]
    Arrow(#[from] ArrowError),
}
