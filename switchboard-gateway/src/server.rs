//! HTTP server assembly.
//!
//! Builds the shared application state out of the relay pieces, wires the
//! routes, and starts the background health prober. The prober's handle is
//! returned to the caller so shutdown can stop it with a bounded wait.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use switchboard_relay::{
    FailoverCoordinator, Forwarder, HealthProber, ProberHandle, ProviderRegistry, StatsStore,
};

use crate::config::Config;
use crate::handlers;

/// State shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ProviderRegistry>,
    pub stats: Arc<StatsStore>,
    pub relay: Arc<FailoverCoordinator>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let registry = Arc::new(config.registry());
        let stats = Arc::new(StatsStore::new(&registry));
        let forwarder = Forwarder::new(stats.clone())?;
        let relay = Arc::new(FailoverCoordinator::new(registry.clone(), forwarder));

        Ok(Self {
            registry,
            stats,
            relay,
            started_at: Utc::now(),
        })
    }
}

/// Build the router over an existing state.
///
/// Kept separate from [`create_server`] so tests can drive the routes
/// without a live prober.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(handlers::chat_completions))
        .route("/health", get(handlers::health))
        .route("/admin/providers", get(handlers::providers_status))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Assemble the full service: state, routes and the running health prober.
pub fn create_server(config: &Config) -> anyhow::Result<(Router, ProberHandle)> {
    let state = AppState::from_config(config)?;

    let prober = HealthProber::new(
        state.registry.clone(),
        state.stats.clone(),
        config.probe.to_prober_config(),
    )?;
    let prober_handle = prober.spawn();

    Ok((create_router(state), prober_handle))
}
