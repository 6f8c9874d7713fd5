//! thingy-relay: nRF Cloud location relay.
//!
//! This is the application entry point. It loads configuration from TOML and
//! the environment, initializes tracing, creates the MongoDB-backed store and
//! the nRF Cloud client, sets up the Axum router and starts the HTTP server.
//! The database connection is established by the first request, not here.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use thingy_relay::config::{AppConfig, DEFAULT_CONFIG_PATH, DEFAULT_LOG_FILTER};
use thingy_relay::nrf_cloud::NrfCloudClient;
use thingy_relay::store::MongoStore;
use thingy_relay::{create_router, http, AppState};

/// thingy-relay: stores nRF Cloud location updates in MongoDB
#[derive(Parser, Debug)]
#[command(name = "thingy-relay", version, about)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Log level filter (e.g., "thingy_relay=debug,tower_http=info")
    #[arg(short, long)]
    log_level: Option<String>,
}

fn init_tracing(filter: &str, json: bool) {
    let registry = tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(filter));
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration, then overlay the deployment environment
    let mut config = AppConfig::load(&args.config)?;
    config.apply_env(|key| std::env::var(key).ok())?;

    // Initialize tracing with priority: CLI > env > default
    let log_filter = args
        .log_level
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    init_tracing(&log_filter, config.logging.is_json());

    config.validate()?;
    tracing::info!(path = %args.config, "Loaded configuration");

    // Both rustls providers end up linked (server and clients); pick one explicitly
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("rustls crypto provider already installed");
    }

    let uri = config.mongodb.uri.clone().unwrap_or_default();
    let store = MongoStore::from_config(&uri, &config.mongodb);
    tracing::info!(
        collection = %config.mongodb.collection,
        connect_timeout_secs = config.mongodb.connect_timeout_seconds,
        "MongoDB store configured (connects on first request)"
    );

    let nrf_cloud = NrfCloudClient::new(&config.nrf_cloud, &config.poll)?;
    if nrf_cloud.has_api_key() {
        tracing::info!(base_url = %config.nrf_cloud.base_url, "nRF Cloud polling enabled");
    } else {
        tracing::warn!("NRF_CLOUD_API_KEY not set; /fetch-messages will fail until it is configured");
    }

    if config.http.webhook_token.is_some() {
        tracing::info!("Webhook bearer token required");
    }

    let http_config = config.http.clone();
    let state = AppState::new(config, Arc::new(store), nrf_cloud);
    let app = create_router(state);

    http::start_server(app, &http_config).await?;

    Ok(())
}
