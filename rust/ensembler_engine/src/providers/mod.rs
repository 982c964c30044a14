//! Table providers: the lazy Delta warehouse catalog and dataset registration.

pub mod registration;
pub mod warehouse;

pub use registration::resolve_dataset;
pub use warehouse::{Warehouse, WarehouseCatalogList};
