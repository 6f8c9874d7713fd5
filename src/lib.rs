//! thingy-relay: nRF Cloud location ingestion relay.
//!
//! Receives location webhooks pushed by nRF Cloud and, when asked, polls the
//! nRF Cloud message API for the recent window. Both paths normalize location
//! fixes into [`record::LocationRecord`]s and persist them in MongoDB.

pub mod config;
pub mod error;
pub mod http;
pub mod middleware;
pub mod nrf_cloud;
pub mod payload;
pub mod record;
pub mod routes;
pub mod state;
pub mod store;

pub use error::{AppError, JsonError};
pub use routes::create_router;
pub use state::AppState;
