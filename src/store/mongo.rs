//! MongoDB-backed [`LocationStore`].

use async_trait::async_trait;
use mongodb::bson::{doc, to_bson, DateTime as BsonDateTime, Document};

use crate::config::MongoConfig;
use crate::record::LocationRecord;

use super::{ConnectionManager, LocationStore, StoreError};

pub struct MongoStore {
    connection: ConnectionManager,
    collection: String,
}

impl MongoStore {
    pub fn new(connection: ConnectionManager, collection: impl Into<String>) -> Self {
        Self {
            connection,
            collection: collection.into(),
        }
    }

    pub fn from_config(uri: &str, config: &MongoConfig) -> Self {
        Self::new(ConnectionManager::from_config(uri, config), config.collection.clone())
    }

    async fn collection(&self) -> Result<mongodb::Collection<Document>, StoreError> {
        let db = self.connection.ensure_connected().await?;
        Ok(db.collection(&self.collection))
    }
}

/// Encode a record with the stored field names
fn to_document(record: &LocationRecord) -> Result<Document, StoreError> {
    Ok(doc! {
        "deviceId": record.device_id.clone(),
        "timestamp": BsonDateTime::from_millis(record.timestamp.timestamp_millis()),
        "lat": record.lat,
        "lng": record.lng,
        "accuracy": record.accuracy,
        "source": record.source.as_str(),
        "raw": to_bson(&record.raw)?,
    })
}

fn key_filter(record: &LocationRecord) -> Document {
    doc! {
        "deviceId": record.device_id.clone(),
        "timestamp": BsonDateTime::from_millis(record.timestamp.timestamp_millis()),
    }
}

#[async_trait]
impl LocationStore for MongoStore {
    async fn ensure_connected(&self) -> Result<(), StoreError> {
        self.connection.ensure_connected().await.map(|_| ())
    }

    async fn insert(&self, record: &LocationRecord) -> Result<(), StoreError> {
        let document = to_document(record)?;
        self.collection()
            .await?
            .insert_one(document)
            .await
            .map_err(StoreError::Write)?;
        Ok(())
    }

    async fn upsert(&self, record: &LocationRecord) -> Result<(), StoreError> {
        let document = to_document(record)?;
        let result = self
            .collection()
            .await?
            .update_one(key_filter(record), doc! { "$set": document })
            .upsert(true)
            .await
            .map_err(StoreError::Write)?;

        tracing::trace!(
            matched = result.matched_count,
            upserted = result.upserted_id.is_some(),
            "Upserted location record"
        );
        Ok(())
    }
}
