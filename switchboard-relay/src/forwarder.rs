//! Request forwarding.
//!
//! The forwarder owns the upstream HTTP call for live client traffic. It
//! rewrites exactly one field of the inbound body (`model`), attaches the
//! provider's bearer credential, and records the outcome in the statistics
//! store. Responses come back either fully buffered or as a live chunk
//! stream that the HTTP layer relays without ever holding the whole body.
//!
//! The 30 second budget covers the whole buffered exchange: connect,
//! request, headers and body. Only a streaming body escapes it; once
//! headers are in, the stream may take as long as the upstream needs, and
//! the connection stays owned by the returned stream until it is drained or
//! dropped.
//!
//! Retrying is deliberately not done here. One descriptor in, one attempt
//! out; alternate providers are the failover coordinator's business.

use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_stream::stream;
use futures::{Stream, StreamExt};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde_json::Value;

use crate::error::RelayError;
use crate::registry::ProviderDescriptor;
use crate::stats::{StatsStore, FAILURE_PENALTY_MS};
use crate::upstream::{chat_completions_url, status_error};

/// Budget for connect + request + response headers.
pub const FORWARD_TIMEOUT: Duration = Duration::from_secs(30);

/// Live upstream body chunks, in arrival order.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<bytes::Bytes, RelayError>> + Send>>;

/// What came back from the chosen upstream.
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: UpstreamBody,
}

impl std::fmt::Debug for UpstreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .finish()
    }
}

pub enum UpstreamBody {
    /// Complete response body, read to the end before returning.
    Buffered(bytes::Bytes),
    /// Chunk-at-a-time passthrough for `"stream": true` requests.
    Streaming(ChunkStream),
}

impl std::fmt::Debug for UpstreamBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamBody::Buffered(bytes) => f.debug_tuple("Buffered").field(bytes).finish(),
            UpstreamBody::Streaming(_) => f.debug_tuple("Streaming").finish(),
        }
    }
}

impl UpstreamResponse {
    pub fn is_streaming(&self) -> bool {
        matches!(self.body, UpstreamBody::Streaming(_))
    }
}

pub struct Forwarder {
    http: reqwest::Client,
    stats: Arc<StatsStore>,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(stats: Arc<StatsStore>) -> Result<Self, RelayError> {
        Self::with_timeout(stats, FORWARD_TIMEOUT)
    }

    pub fn with_timeout(stats: Arc<StatsStore>, timeout: Duration) -> Result<Self, RelayError> {
        // No client-level timeout: the ceiling is applied around `send()`
        // and the buffered body read, leaving streaming bodies alone.
        let http = reqwest::Client::builder()
            .build()
            .map_err(|err| RelayError::Unexpected {
                kind: "configuration".to_string(),
                message: format!("failed to build HTTP client: {err}"),
            })?;
        Ok(Self {
            http,
            stats,
            timeout,
        })
    }

    /// Forward one client request to `provider`.
    ///
    /// The outbound body is the inbound body with only `model` replaced.
    /// Every attempt that reaches the network records an outcome for the
    /// provider; an unconfigured provider fails before any I/O and records
    /// nothing.
    pub async fn forward(
        &self,
        provider: &ProviderDescriptor,
        body: &Value,
    ) -> Result<UpstreamResponse, RelayError> {
        let credential = provider.credential().ok_or_else(|| RelayError::Unconfigured {
            name: provider.name.clone(),
        })?;

        let mut outbound = body.clone();
        let object = outbound
            .as_object_mut()
            .ok_or_else(|| RelayError::Unexpected {
                kind: "request".to_string(),
                message: "request body is not a JSON object".to_string(),
            })?;
        object.insert("model".to_string(), Value::String(provider.model.clone()));
        let wants_stream = object
            .get("stream")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let url = chat_completions_url(&provider.base_url);
        tracing::debug!(
            provider = %provider.name,
            model = %provider.model,
            stream = wants_stream,
            "forwarding chat completion"
        );

        let started = Instant::now();
        let send = self
            .http
            .post(&url)
            .bearer_auth(&credential)
            .json(&outbound)
            .send();

        let response = match tokio::time::timeout(self.timeout, send).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                self.stats.record(&provider.name, false, FAILURE_PENALTY_MS);
                return Err(err.into());
            }
            Err(_) => {
                self.stats.record(&provider.name, false, FAILURE_PENALTY_MS);
                return Err(RelayError::Timeout);
            }
        };

        let status = response.status();
        let headers = response.headers().clone();

        if !status.is_success() {
            self.stats.record(&provider.name, false, FAILURE_PENALTY_MS);
            return Err(status_error(response).await);
        }

        let body = if wants_stream {
            let elapsed_ms = started.elapsed().as_millis() as f64;
            self.stats.record(&provider.name, true, elapsed_ms);
            UpstreamBody::Streaming(Box::pin(stream! {
                let mut chunks = response.bytes_stream();
                while let Some(chunk) = chunks.next().await {
                    match chunk {
                        Ok(bytes) => yield Ok(bytes),
                        Err(err) => {
                            yield Err(RelayError::from(err));
                            return;
                        }
                    }
                }
            }))
        } else {
            // The body read stays inside the original budget.
            let remaining = self.timeout.saturating_sub(started.elapsed());
            let bytes = match tokio::time::timeout(remaining, response.bytes()).await {
                Ok(Ok(bytes)) => bytes,
                Ok(Err(err)) => {
                    self.stats.record(&provider.name, false, FAILURE_PENALTY_MS);
                    return Err(err.into());
                }
                Err(_) => {
                    self.stats.record(&provider.name, false, FAILURE_PENALTY_MS);
                    return Err(RelayError::Timeout);
                }
            };
            let elapsed_ms = started.elapsed().as_millis() as f64;
            self.stats.record(&provider.name, true, elapsed_ms);
            UpstreamBody::Buffered(bytes)
        };

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}
