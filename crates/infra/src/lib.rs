//! Infrastructure layer: stores, the generic repository, config and event
//! transports.

pub mod config;
pub mod error;
pub mod event_bus;
pub mod repository;
pub mod store;

#[cfg(test)]
mod integration_tests;

pub use config::{ConfigError, InfraConfig, StoreBackend};
pub use error::{BulkFailure, RepositoryError, RepositoryResult};
pub use repository::{ReferenceTarget, Repository};
pub use store::{EntityStore, InMemoryEntityStore, PostgresEntityStore, StoreError, Window};
