//! Physical schema trees and the operations that rewrite them.

mod format;
mod node;
mod path;

pub use format::format_node;
pub use node::{Field, SchemaNode};
pub use path::{resolve, with_field};
