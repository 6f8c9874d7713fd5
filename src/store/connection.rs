//! Lazily established, process-wide database handle.

use std::time::Duration;

use mongodb::bson::doc;
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};
use tokio::sync::OnceCell;
use tokio::time::timeout;

use crate::config::{MongoConfig, DEFAULT_DATABASE};

use super::StoreError;

const APP_NAME: &str = "thingy-relay";

/// Connects to MongoDB on first use and hands out the same handle afterwards.
///
/// Initialization is single-flight: concurrent first callers wait on one
/// connection attempt. A failed attempt leaves the cell empty, so the next
/// caller connects again. An established handle is never replaced.
pub struct ConnectionManager {
    uri: String,
    database: Option<String>,
    connect_timeout: Duration,
    db: OnceCell<Database>,
}

impl ConnectionManager {
    pub fn new(uri: impl Into<String>, database: Option<String>, connect_timeout: Duration) -> Self {
        Self {
            uri: uri.into(),
            database,
            connect_timeout,
            db: OnceCell::new(),
        }
    }

    pub fn from_config(uri: &str, config: &MongoConfig) -> Self {
        Self::new(uri, config.database.clone(), config.connect_timeout())
    }

    /// Whether a handle has been established
    pub fn is_connected(&self) -> bool {
        self.db.initialized()
    }

    /// Return the database handle, connecting if this is the first call.
    ///
    /// Fails with [`StoreError::ConnectTimeout`] if the server cannot be
    /// reached within the configured bound.
    pub async fn ensure_connected(&self) -> Result<&Database, StoreError> {
        self.db
            .get_or_try_init(|| async {
                match timeout(self.connect_timeout, self.connect()).await {
                    Ok(result) => result,
                    Err(_) => Err(StoreError::ConnectTimeout(self.connect_timeout)),
                }
            })
            .await
    }

    async fn connect(&self) -> Result<Database, StoreError> {
        tracing::debug!(timeout = ?self.connect_timeout, "Connecting to MongoDB");

        let mut options = ClientOptions::parse(&self.uri)
            .await
            .map_err(StoreError::Connect)?;
        options.server_selection_timeout = Some(self.connect_timeout);
        options.connect_timeout = Some(self.connect_timeout);
        options.app_name = Some(APP_NAME.to_string());

        let client = Client::with_options(options).map_err(StoreError::Connect)?;
        let db = client.default_database().unwrap_or_else(|| {
            client.database(self.database.as_deref().unwrap_or(DEFAULT_DATABASE))
        });

        // The driver connects lazily; ping so an unreachable server fails here
        db.run_command(doc! { "ping": 1 })
            .await
            .map_err(StoreError::Connect)?;

        tracing::info!(database = %db.name(), "Connected to MongoDB");
        Ok(db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_server_times_out() {
        let manager = ConnectionManager::new(
            "mongodb://127.0.0.1:1/?directConnection=true",
            None,
            Duration::from_millis(300),
        );

        let started = std::time::Instant::now();
        let result = manager.ensure_connected().await;

        assert!(matches!(
            result,
            Err(StoreError::Connect(_)) | Err(StoreError::ConnectTimeout(_))
        ));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn test_invalid_uri_is_connect_error() {
        let manager = ConnectionManager::new("not-a-uri", None, Duration::from_millis(300));
        assert!(matches!(
            manager.ensure_connected().await,
            Err(StoreError::Connect(_))
        ));
    }
}
