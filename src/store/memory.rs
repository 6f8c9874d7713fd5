//! In-memory [`LocationStore`] used by tests and local experiments.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::record::LocationRecord;

use super::{LocationStore, StoreError};

/// Keeps records in insertion order. Can be switched offline to simulate an
/// unreachable database, or limited to a number of successful writes.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<LocationRecord>>,
    offline: AtomicBool,
    writes_left: Mutex<Option<usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every call fails as if the database were down
    pub fn offline() -> Self {
        let store = Self::default();
        store.set_offline(true);
        store
    }

    /// A store that accepts `writes` writes and fails every one after that
    pub fn failing_after(writes: usize) -> Self {
        Self {
            writes_left: Mutex::new(Some(writes)),
            ..Self::default()
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Snapshot of the stored records
    pub async fn records(&self) -> Vec<LocationRecord> {
        self.records.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store is offline".to_string()))
        } else {
            Ok(())
        }
    }

    async fn take_write(&self) -> Result<(), StoreError> {
        self.check_online()?;
        match self.writes_left.lock().await.as_mut() {
            Some(0) => Err(StoreError::Unavailable("memory store write limit reached".to_string())),
            Some(left) => {
                *left -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl LocationStore for MemoryStore {
    async fn ensure_connected(&self) -> Result<(), StoreError> {
        self.check_online()
    }

    async fn insert(&self, record: &LocationRecord) -> Result<(), StoreError> {
        self.take_write().await?;
        self.records.lock().await.push(record.clone());
        Ok(())
    }

    async fn upsert(&self, record: &LocationRecord) -> Result<(), StoreError> {
        self.take_write().await?;
        let mut records = self.records.lock().await;
        match records.iter_mut().find(|r| r.key() == record.key()) {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
        Ok(())
    }
}
