//! # Switchboard Relay
//!
//! Core of the Switchboard AI gateway: decide which OpenAI-compatible
//! upstream should take a chat-completion request, send it there, and keep
//! the decision honest with background health probes.
//!
//! ## Pieces
//!
//! - [`registry`]: the static, ordered list of upstream providers. Each
//!   entry names the environment variable holding its bearer credential;
//!   resolution happens per call, so an unset variable simply sidelines the
//!   provider.
//! - [`stats`]: the only shared mutable state. Probes and forwards both
//!   feed per-provider counters, reachability and a rolling latency average;
//!   readers get consistent snapshots.
//! - [`routing`]: a pure scoring function. Configured, online providers
//!   with a success rate above 70% compete on
//!   `0.6 * latency + 0.4 * failure share`; lowest score wins, declaration
//!   order breaks ties.
//! - [`prober`]: a background task issuing minimal "ping" completions
//!   against every configured provider on a fixed cadence.
//! - [`forwarder`]: per-request translation (the one rewritten field is
//!   `model`) and the upstream HTTP call, buffered or chunk-streamed.
//! - [`failover`]: walks the remaining configured providers in declared
//!   order when the chosen one fails, returning the original error if all of
//!   them do.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use switchboard_relay::{
//!     best_provider, FailoverCoordinator, Forwarder, HealthProber, ProberConfig,
//!     ProviderRegistry, StatsStore,
//! };
//!
//! let registry = Arc::new(ProviderRegistry::default());
//! let stats = Arc::new(StatsStore::new(&registry));
//!
//! let prober = HealthProber::new(registry.clone(), stats.clone(), ProberConfig::default())?;
//! let prober_handle = prober.spawn();
//!
//! let forwarder = Forwarder::new(stats.clone())?;
//! let relay = FailoverCoordinator::new(registry.clone(), forwarder);
//!
//! if let Some(provider) = best_provider(&registry, &stats) {
//!     let response = relay.dispatch(provider, &request_body).await?;
//! }
//!
//! prober_handle.shutdown().await;
//! ```

pub mod error;
pub mod failover;
pub mod forwarder;
pub mod models;
pub mod prober;
pub mod registry;
pub mod routing;
pub mod stats;
mod upstream;

pub use error::RelayError;
pub use failover::FailoverCoordinator;
pub use forwarder::{ChunkStream, Forwarder, UpstreamBody, UpstreamResponse, FORWARD_TIMEOUT};
pub use prober::{HealthProber, ProberConfig, ProberHandle};
pub use registry::{ProviderDescriptor, ProviderRegistry};
pub use routing::{best_provider, MIN_SUCCESS_RATE};
pub use stats::{ProviderStats, StatsStore, FAILURE_PENALTY_MS};
