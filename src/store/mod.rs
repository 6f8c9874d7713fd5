//! Persistence for location records.
//!
//! Handlers talk to the store through [`LocationStore`]. The production
//! implementation is [`MongoStore`], which owns the lazily established
//! database handle; [`MemoryStore`] keeps records in memory for tests.

mod connection;
mod memory;
mod mongo;

use std::time::Duration;

use async_trait::async_trait;

use crate::record::LocationRecord;

pub use connection::ConnectionManager;
pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database connection failed: {0}")]
    Connect(#[source] mongodb::error::Error),

    #[error("Database did not respond within {0:?}")]
    ConnectTimeout(Duration),

    #[error("Database write failed: {0}")]
    Write(#[source] mongodb::error::Error),

    #[error("Failed to encode record: {0}")]
    Encode(#[from] mongodb::bson::ser::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Destination for normalized location records
#[async_trait]
pub trait LocationStore: Send + Sync {
    /// Make sure the backing store is reachable, connecting on first use
    async fn ensure_connected(&self) -> Result<(), StoreError>;

    /// Append a record; no deduplication
    async fn insert(&self, record: &LocationRecord) -> Result<(), StoreError>;

    /// Insert or overwrite the record sharing `(device_id, timestamp)`
    async fn upsert(&self, record: &LocationRecord) -> Result<(), StoreError>;
}
