//! Background health probing.
//!
//! A single long-lived task walks the registry on a fixed cadence and sends
//! each configured provider a minimal one-turn chat completion. Outcomes
//! land in the statistics store exactly like forwarded traffic does, so a
//! provider earns its way into the routing candidate set purely by answering
//! probes.
//!
//! A 2xx answer only counts if the first choice actually carries content;
//! plenty of gateways return empty envelopes while degraded. Every failure
//! is charged the fixed latency penalty so the router backs away quickly.
//!
//! Probe failures are never surfaced to clients. They exist to move the
//! statistics and to leave a diagnostic in `last_error`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::RelayError;
use crate::models::{ChatCompletion, ProbeRequest};
use crate::registry::{ProviderDescriptor, ProviderRegistry};
use crate::routing::best_provider;
use crate::stats::{StatsStore, FAILURE_PENALTY_MS};
use crate::upstream::{chat_completions_url, status_error};

#[derive(Debug, Clone)]
pub struct ProberConfig {
    /// Pause between successful probe cycles.
    pub interval: Duration,
    /// Shorter pause after a cycle that blew up unexpectedly.
    pub error_backoff: Duration,
    /// Budget for one probe request, body included.
    pub request_timeout: Duration,
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            error_backoff: Duration::from_secs(60),
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Clone)]
pub struct HealthProber {
    registry: Arc<ProviderRegistry>,
    stats: Arc<StatsStore>,
    http: reqwest::Client,
    config: ProberConfig,
}

impl HealthProber {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        stats: Arc<StatsStore>,
        config: ProberConfig,
    ) -> Result<Self, RelayError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| RelayError::Unexpected {
                kind: "configuration".to_string(),
                message: format!("failed to build probe HTTP client: {err}"),
            })?;
        Ok(Self {
            registry,
            stats,
            http,
            config,
        })
    }

    /// Start the probe loop and hand back its shutdown handle.
    pub fn spawn(self) -> ProberHandle {
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(self.run(rx));
        ProberHandle { shutdown: tx, task }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            providers = self.registry.len(),
            "health prober started"
        );
        loop {
            // The cycle runs as its own task so a panic in it degrades to a
            // shorter sleep instead of killing the prober.
            let prober = self.clone();
            let mut cycle = tokio::spawn(async move { prober.run_cycle().await });

            let nap = tokio::select! {
                _ = shutdown.changed() => {
                    cycle.abort();
                    break;
                }
                joined = &mut cycle => match joined {
                    Ok(()) => self.config.interval,
                    Err(err) => {
                        tracing::error!(error = %err, "health check cycle aborted");
                        self.config.error_backoff
                    }
                }
            };

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(nap) => {}
            }
        }
        tracing::debug!("health prober stopped");
    }

    /// One full pass over the registry, all configured providers in parallel.
    pub async fn run_cycle(&self) {
        let probes: Vec<_> = self
            .registry
            .configured()
            .map(|provider| self.probe(provider))
            .collect();
        futures::future::join_all(probes).await;

        match best_provider(&self.registry, &self.stats) {
            Some(provider) => {
                tracing::info!(provider = %provider.name, "current preferred provider");
            }
            None => tracing::info!("no provider currently routable"),
        }
    }

    async fn probe(&self, provider: &ProviderDescriptor) {
        let Some(credential) = provider.credential() else {
            return;
        };

        match self.send_probe(provider, &credential).await {
            Ok(latency_ms) => {
                self.stats.record(&provider.name, true, latency_ms);
                self.stats.note_probe_success(&provider.name);
                tracing::debug!(provider = %provider.name, latency_ms, "probe succeeded");
            }
            Err(err) => {
                let diagnostic = err.diagnostic();
                self.stats.record(&provider.name, false, FAILURE_PENALTY_MS);
                self.stats
                    .note_probe_failure(&provider.name, diagnostic.clone());
                tracing::warn!(provider = %provider.name, error = %diagnostic, "probe failed");
            }
        }
    }

    async fn send_probe(
        &self,
        provider: &ProviderDescriptor,
        credential: &str,
    ) -> Result<f64, RelayError> {
        let payload = ProbeRequest::for_model(provider.model.clone());
        let started = Instant::now();

        let response = self
            .http
            .post(chat_completions_url(&provider.base_url))
            .bearer_auth(credential)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|_| RelayError::InvalidResponse)?;
        if !completion.has_content() {
            return Err(RelayError::InvalidResponse);
        }

        Ok(started.elapsed().as_millis() as f64)
    }
}

/// Handle for stopping the probe loop at shutdown.
pub struct ProberHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ProberHandle {
    /// Signal the loop and wait for it to stop, aborting after one second.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if tokio::time::timeout(Duration::from_secs(1), &mut self.task)
            .await
            .is_err()
        {
            self.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn prober_for(
        providers: Vec<ProviderDescriptor>,
    ) -> (HealthProber, Arc<StatsStore>, Arc<ProviderRegistry>) {
        let registry = Arc::new(ProviderRegistry::new(providers));
        let stats = Arc::new(StatsStore::new(&registry));
        let prober = HealthProber::new(
            registry.clone(),
            stats.clone(),
            ProberConfig {
                request_timeout: Duration::from_secs(2),
                ..ProberConfig::default()
            },
        )
        .unwrap();
        (prober, stats, registry)
    }

    #[tokio::test]
    async fn successful_probe_marks_provider_online() {
        std::env::set_var("PROBE_TEST_OK_KEY", "sk-probe");
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer sk-probe"))
            .and(body_partial_json(json!({
                "messages": [{"role": "user", "content": "ping"}],
                "max_tokens": 5
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "pong"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = ProviderDescriptor::new("p1", "PROBE_TEST_OK_KEY", server.uri(), "m1");
        let (prober, stats, _) = prober_for(vec![provider]);
        prober.run_cycle().await;

        let snapshot = stats.snapshot("p1").unwrap();
        assert!(snapshot.online);
        assert_eq!(snapshot.total_requests, 1);
        assert_eq!(snapshot.failed_requests, 0);
        assert_eq!(snapshot.retry_count, 0);
        assert!(snapshot.last_error.is_none());
        assert!(snapshot.response_time_ms < FAILURE_PENALTY_MS);
    }

    #[tokio::test]
    async fn empty_completion_counts_as_invalid_response() {
        std::env::set_var("PROBE_TEST_EMPTY_KEY", "sk-probe");
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let provider = ProviderDescriptor::new("p1", "PROBE_TEST_EMPTY_KEY", server.uri(), "m1");
        let (prober, stats, _) = prober_for(vec![provider]);
        prober.run_cycle().await;

        let snapshot = stats.snapshot("p1").unwrap();
        assert!(!snapshot.online);
        assert_eq!(snapshot.failed_requests, 1);
        assert_eq!(snapshot.retry_count, 1);
        assert_eq!(snapshot.last_error.as_deref(), Some("Invalid API response"));
        assert_eq!(snapshot.response_time_ms, FAILURE_PENALTY_MS);
    }

    #[tokio::test]
    async fn error_status_stores_api_diagnostic() {
        std::env::set_var("PROBE_TEST_STATUS_KEY", "sk-probe");
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let provider = ProviderDescriptor::new("p1", "PROBE_TEST_STATUS_KEY", server.uri(), "m1");
        let (prober, stats, _) = prober_for(vec![provider]);
        prober.run_cycle().await;

        let snapshot = stats.snapshot("p1").unwrap();
        assert_eq!(
            snapshot.last_error.as_deref(),
            Some("API error: 429 rate limited")
        );
    }

    #[tokio::test]
    async fn unreachable_provider_stores_connection_diagnostic() {
        std::env::set_var("PROBE_TEST_CONN_KEY", "sk-probe");
        let provider =
            ProviderDescriptor::new("p1", "PROBE_TEST_CONN_KEY", "http://127.0.0.1:9", "m1");
        let (prober, stats, _) = prober_for(vec![provider]);
        prober.run_cycle().await;

        let snapshot = stats.snapshot("p1").unwrap();
        assert!(!snapshot.online);
        let diagnostic = snapshot.last_error.unwrap();
        assert!(
            diagnostic.starts_with("Connection error:"),
            "unexpected diagnostic: {diagnostic}"
        );
    }

    #[tokio::test]
    async fn unconfigured_provider_is_never_probed() {
        std::env::remove_var("PROBE_TEST_UNSET_KEY");
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let provider = ProviderDescriptor::new("ghost", "PROBE_TEST_UNSET_KEY", server.uri(), "m");
        let (prober, stats, _) = prober_for(vec![provider]);
        prober.run_cycle().await;

        let snapshot = stats.snapshot("ghost").unwrap();
        assert_eq!(snapshot.total_requests, 0);
        assert!(snapshot.last_error.is_none());
    }

    #[tokio::test]
    async fn recovery_clears_failure_bookkeeping() {
        std::env::set_var("PROBE_TEST_RECOVERY_KEY", "sk-probe");
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("down"))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "pong"}}]
            })))
            .mount(&server)
            .await;

        let provider = ProviderDescriptor::new("p1", "PROBE_TEST_RECOVERY_KEY", server.uri(), "m1");
        let (prober, stats, _) = prober_for(vec![provider]);

        prober.run_cycle().await;
        prober.run_cycle().await;
        assert_eq!(stats.snapshot("p1").unwrap().retry_count, 2);

        prober.run_cycle().await;
        let snapshot = stats.snapshot("p1").unwrap();
        assert_eq!(snapshot.retry_count, 0);
        assert!(snapshot.last_error.is_none());
        assert!(snapshot.online);
    }

    #[tokio::test]
    async fn shutdown_is_prompt_even_mid_sleep() {
        std::env::set_var("PROBE_TEST_SHUTDOWN_KEY", "sk-probe");
        let provider = ProviderDescriptor::new(
            "p1",
            "PROBE_TEST_SHUTDOWN_KEY",
            "http://127.0.0.1:9",
            "m1",
        );
        let registry = Arc::new(ProviderRegistry::new(vec![provider]));
        let stats = Arc::new(StatsStore::new(&registry));
        let prober = HealthProber::new(registry, stats, ProberConfig::default()).unwrap();

        let handle = prober.spawn();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = Instant::now();
        handle.shutdown().await;
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
