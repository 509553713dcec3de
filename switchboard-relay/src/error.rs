//! Error types shared by the probing, forwarding and failover paths.
//!
//! Every upstream interaction funnels into [`RelayError`]. The prober turns
//! errors into stored diagnostics via [`RelayError::diagnostic`]; the
//! forwarder surfaces them to the failover coordinator, which either recovers
//! by trying an alternate provider or hands the original error back to the
//! HTTP layer.

use thiserror::Error;

/// Failure modes of a single upstream interaction.
#[derive(Error, Debug)]
pub enum RelayError {
    /// The provider's credential environment variable is unset or empty.
    #[error("provider '{name}' has no credential configured")]
    Unconfigured { name: String },

    /// Transport-level failure before a response was received.
    #[error("connection error: {message}")]
    Connection { message: String },

    /// The upstream answered with a non-2xx status.
    #[error("upstream returned status {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    /// The upstream answered 2xx but the payload carried no usable content.
    #[error("invalid API response")]
    InvalidResponse,

    /// The request exceeded its timeout budget.
    #[error("request timed out")]
    Timeout,

    /// Anything that does not fit the categories above.
    #[error("{kind}: {message}")]
    Unexpected { kind: String, message: String },
}

impl RelayError {
    /// Human-readable diagnostic stored in a provider's `last_error` slot.
    ///
    /// Timeouts are folded into the connection-error wording since both mean
    /// the upstream never produced a usable response.
    pub fn diagnostic(&self) -> String {
        match self {
            RelayError::Unconfigured { name } => {
                format!("Missing API key for {name}")
            }
            RelayError::Connection { message } => format!("Connection error: {message}"),
            RelayError::Timeout => "Connection error: request timed out".to_string(),
            RelayError::UpstreamStatus { status, body } => {
                format!("API error: {status} {body}")
            }
            RelayError::InvalidResponse => "Invalid API response".to_string(),
            RelayError::Unexpected { kind, message } => format!("{kind}: {message}"),
        }
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RelayError::Timeout
        } else if err.is_connect() || err.is_request() {
            RelayError::Connection {
                message: err.to_string(),
            }
        } else {
            RelayError::Unexpected {
                kind: "http".to_string(),
                message: err.to_string(),
            }
        }
    }
}
