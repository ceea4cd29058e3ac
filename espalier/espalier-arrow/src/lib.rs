//! Arrow interchange layer for `espalier`.
//!
//! This crate covers the arrow-facing half of the engine:
//! 1. Convert engine schemas to Arrow `Schema`s and back
//!    ([`entry_to_arrow_schema`] / [`arrow_schema_to_decl`]).
//! 2. Export dataset entries as `RecordBatch`es ([`ExportPlan`]).
//! 3. Serve imported record batches as dataset storage without copying
//!    column data ([`record_batch_to_parts`] / [`ArrowBackend`]).
//! 4. Flatten nested batches for tabular writers
//!    ([`flatten_record_batch`]).
//!
//! Conversions are lossy by policy rather than by accident: anything
//! that cannot cross the boundary is reported by path, never silently
//! misrendered.

pub mod error;
pub mod export;
pub mod flatten;
pub mod import;
pub mod schema_convert;

/// Re-export of [`error::ArrowBridgeError`].
pub use error::ArrowBridgeError;
/// Re-export of [`export::ExportPlan`].
pub use export::ExportPlan;
/// Re-exports from [`flatten`].
pub use flatten::{FlattenPolicy, ListPolicy, StructPolicy, flatten_record_batch};
/// Re-exports from [`import`].
pub use import::{ArrowBackend, record_batch_to_parts};
/// Re-exports from [`schema_convert`].
pub use schema_convert::{arrow_schema_to_decl, entry_to_arrow_schema};
