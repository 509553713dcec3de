//! Failover across alternate providers.
//!
//! When a forward fails, every other configured provider gets one attempt,
//! in registry declaration order. The list is deliberately not filtered by
//! router candidacy: the health metric can lag reality, so an alternate
//! currently marked offline is still worth a try. If nothing succeeds the
//! caller gets the primary's original error back, not the last alternate's.
//!
//! Because the forwarder only returns once upstream headers are accepted,
//! failover for a streaming request happens entirely before any byte is
//! relayed to the client; after that the request is committed to the chosen
//! upstream.

use std::sync::Arc;

use serde_json::Value;

use crate::error::RelayError;
use crate::forwarder::{Forwarder, UpstreamResponse};
use crate::registry::{ProviderDescriptor, ProviderRegistry};

pub struct FailoverCoordinator {
    registry: Arc<ProviderRegistry>,
    forwarder: Forwarder,
}

impl FailoverCoordinator {
    pub fn new(registry: Arc<ProviderRegistry>, forwarder: Forwarder) -> Self {
        Self {
            registry,
            forwarder,
        }
    }

    /// Forward to `primary`, falling through the alternates on failure.
    pub async fn dispatch(
        &self,
        primary: &ProviderDescriptor,
        body: &Value,
    ) -> Result<UpstreamResponse, RelayError> {
        let primary_error = match self.forwarder.forward(primary, body).await {
            Ok(response) => return Ok(response),
            Err(err) => err,
        };

        tracing::warn!(
            provider = %primary.name,
            error = %primary_error,
            "forward failed, trying alternates"
        );

        for alternate in self
            .registry
            .configured()
            .filter(|p| p.name != primary.name)
        {
            match self.forwarder.forward(alternate, body).await {
                Ok(response) => {
                    tracing::info!(
                        provider = %alternate.name,
                        "alternate provider took over the request"
                    );
                    return Ok(response);
                }
                Err(err) => {
                    tracing::warn!(provider = %alternate.name, error = %err, "alternate failed");
                }
            }
        }

        Err(primary_error)
    }
}
