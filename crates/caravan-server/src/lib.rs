//! HTTP surface for the Caravan engagement core.
//!
//! Thin route handlers over [`caravan_engagement`]: the scoring rules live
//! entirely in the core crate, this crate only parses requests, applies the
//! caller-side retry budget, and renders results as JSON.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::Router;
use tower_http::cors::CorsLayer;

pub use config::ServerConfig;
pub use state::{AppState, SharedState};

/// Build the application router with a fresh in-memory store.
pub fn build_app(config: &ServerConfig) -> Router {
    let state = AppState::from_config(config);
    routes::router(state).layer(CorsLayer::permissive())
}
