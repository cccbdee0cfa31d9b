//! Office relay server library.
//!
//! This module exposes the server components for use in tests and binaries.

pub mod config;
pub mod identity;
pub mod registry;
pub mod relay;
pub mod ws;

use axum::routing::get;
use axum::Router;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;

use crate::config::ServerConfig;
use crate::identity::IdentityAllocator;
use crate::registry::SessionRegistry;
use crate::relay::{run_relay, RelayCommand};
use crate::ws::{ws_handler, AppState, ConnectionLimits};

/// Spawn the relay task and build the router that feeds it.
///
/// Must be called from inside a tokio runtime.
pub fn app(config: &ServerConfig) -> Router {
    let (relay_tx, relay_rx) = mpsc::channel::<RelayCommand>(1024);
    let registry = SessionRegistry::new(IdentityAllocator::new(config.rng_seed), config.spawn);
    tokio::spawn(run_relay(relay_rx, registry));

    let app_state = AppState {
        relay_tx,
        limits: ConnectionLimits::from(config),
    };
    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
