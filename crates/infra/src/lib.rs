//! Infrastructure layer: row storage and the in-memory unit of work that
//! creates and materializes entities for references.

pub mod config;
pub mod row_store;
pub mod unit_of_work;

pub use config::UnitOfWorkConfig;
pub use row_store::{InMemoryRowStore, RowKey, RowStore, RowStoreError};
pub use unit_of_work::{IdentityKey, IdentityMap, InMemoryUnitOfWork, UnitOfWorkStats};
