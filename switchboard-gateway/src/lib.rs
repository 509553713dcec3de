//! # Switchboard Gateway
//!
//! OpenAI-compatible HTTP front for [`switchboard_relay`]: a single
//! `POST /v1/chat/completions` endpoint that routes each request to the
//! currently best upstream provider, streams server-sent events through
//! untouched, and fails over to alternate providers when the chosen one
//! breaks.
//!
//! The crate splits into:
//! - [`config`]: TOML configuration with built-in defaults,
//! - [`server`]: state assembly, routes and prober lifecycle,
//! - [`handlers`]: the completion passthrough plus health/status endpoints,
//! - [`gateway_error`]: the `detail`-shaped error responses clients see.

pub mod config;
pub mod gateway_error;
pub mod handlers;
pub mod server;
