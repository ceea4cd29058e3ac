pub mod convert;
pub mod import;
pub mod info;
pub mod schema;
