//! Row storage boundary.
//!
//! The unit of work reads rows from here when a reference is loaded. Rows are
//! JSON objects keyed by entity class and serialized primary key.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryRowStore;
pub use r#trait::{RowKey, RowStore, RowStoreError};
