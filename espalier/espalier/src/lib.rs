//! Array-backed object mapping over columnar storage.
//!
//! `espalier` keeps nested data as flat typed arrays and serves it
//! back as lazy object views. Datasets are built by shredding values
//! ([`DatasetBuilder`]), derived from one another by structural-sharing
//! transforms ([`Dataset::define`], [`Dataset::filter`],
//! [`Dataset::project`], [`Dataset::flatten`]), queried through
//! expressions compiled down to index arithmetic ([`Dataset::query`]),
//! and persisted as a manifest plus raw array files ([`Dataset::save`]).

mod builder;
mod dataset;
mod dirstore;
mod error;
mod expr;
mod proxy;
mod transform;
mod translate;

pub use builder::DatasetBuilder;
pub use dataset::Dataset;
pub use dirstore::MmapBackend;
pub use error::{AccessError, DatasetError, EvalError, TransformError, TranslateError, UserError};
pub use expr::{BinaryOp, Expr, UnaryOp, entry};
pub use proxy::{Instance, ListIter, ListProxy, RecordProxy};
pub use transform::MapEntries;
pub use translate::{CompiledQuery, FallbackQuery, Program, Query};

pub use espalier_arrow as arrow;
pub use espalier_core as core;
