//! HTTP request handlers.
//!
//! `POST /v1/chat/completions` is the whole point: pick a provider, dispatch
//! through the failover coordinator, and hand the upstream's answer back
//! with its own status and headers. A `"stream": true` request gets the
//! upstream body relayed chunk by chunk as `text/event-stream`; nothing is
//! held back until EOF.
//!
//! The read-only `/health` and `/admin/providers` endpoints expose liveness
//! and the statistics snapshot the router works from.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Response};
use axum::Json;
use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio_stream::wrappers::ReceiverStream;

use switchboard_relay::{best_provider, UpstreamBody, UpstreamResponse};

use crate::gateway_error::GatewayError;
use crate::server::AppState;

/// Handle a chat-completion request, buffered or streaming.
///
/// The client's `model` field is ignored; the selected provider's model is
/// substituted before forwarding. Everything else in the body goes upstream
/// untouched.
pub async fn chat_completions(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Response<Body>, GatewayError> {
    let provider =
        best_provider(&state.registry, &state.stats).ok_or(GatewayError::NoProviders)?;
    tracing::info!(provider = %provider.name, "dispatching chat completion");

    let upstream = state.relay.dispatch(provider, &body).await?;
    Ok(relay_response(upstream))
}

/// Turn an upstream response into the client-facing one.
///
/// Status and headers are the upstream's own, minus framing headers that no
/// longer apply once the body has been re-framed on this hop. A streaming
/// body is pumped through a channel so the upstream connection stays alive
/// exactly as long as the client keeps reading.
fn relay_response(upstream: UpstreamResponse) -> Response<Body> {
    match upstream.body {
        UpstreamBody::Buffered(bytes) => {
            let mut response = Response::new(Body::from(bytes));
            *response.status_mut() = upstream.status;
            copy_upstream_headers(&upstream.headers, response.headers_mut());
            response
        }
        UpstreamBody::Streaming(mut chunks) => {
            let (tx, rx) = tokio::sync::mpsc::channel::<Result<Bytes, std::io::Error>>(16);
            tokio::spawn(async move {
                while let Some(item) = chunks.next().await {
                    let forwarded =
                        item.map_err(|err| std::io::Error::other(err.to_string()));
                    let failed = forwarded.is_err();
                    if tx.send(forwarded).await.is_err() {
                        // Client disconnected; dropping the stream releases
                        // the upstream connection.
                        tracing::debug!("client went away mid-stream");
                        break;
                    }
                    if failed {
                        break;
                    }
                }
            });

            let mut response = Response::new(Body::from_stream(ReceiverStream::new(rx)));
            *response.status_mut() = upstream.status;
            copy_upstream_headers(&upstream.headers, response.headers_mut());
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/event-stream"),
            );
            response
        }
    }
}

fn copy_upstream_headers(upstream: &HeaderMap, target: &mut HeaderMap) {
    for (name, value) in upstream {
        // Framing is renegotiated on this hop.
        if name == &header::CONTENT_LENGTH
            || name == &header::TRANSFER_ENCODING
            || name == &header::CONNECTION
        {
            continue;
        }
        target.insert(name.clone(), value.clone());
    }
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": (Utc::now() - state.started_at).num_seconds(),
    }))
}

/// Per-provider statistics snapshot plus the router's current preference.
pub async fn providers_status(State(state): State<AppState>) -> Json<Value> {
    let preferred = best_provider(&state.registry, &state.stats).map(|p| p.name.clone());

    let providers: Vec<Value> = state
        .registry
        .iter()
        .map(|provider| {
            let stats = state.stats.snapshot(&provider.name).unwrap_or_default();
            json!({
                "name": provider.name,
                "model": provider.model,
                "base_url": provider.base_url,
                "configured": provider.is_configured(),
                "online": stats.online,
                "success_rate": stats.success_rate(),
                "response_time_ms": stats.response_time_ms,
                "total_requests": stats.total_requests,
                "failed_requests": stats.failed_requests,
                "retry_count": stats.retry_count,
                "last_error": stats.last_error,
                "last_check": stats.last_check,
            })
        })
        .collect();

    Json(json!({ "preferred": preferred, "providers": providers }))
}
