//! Gateway configuration.
//!
//! Configuration is TOML with defaults that reproduce the reference
//! deployment, so the binary runs usefully with no file at all. A file
//! overrides the provider list and the listener/probe settings wholesale.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8000
//!
//! [probe]
//! interval_secs = 300
//! error_backoff_secs = 60
//! request_timeout_secs = 10
//!
//! [[providers]]
//! name = "deepseek"
//! credential_ref = "OPENAI_API_KEY"
//! base_url = "https://api.deepseek.com"
//! model = "deepseek-chat"
//! ```
//!
//! Credentials never live in the file; each provider names the environment
//! variable to read at call time.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use switchboard_relay::{ProberConfig, ProviderDescriptor, ProviderRegistry};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub probe: ProbeSettings,
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeSettings {
    #[serde(default = "default_probe_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_probe_backoff")]
    pub error_backoff_secs: u64,
    #[serde(default = "default_probe_timeout")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_probe_interval() -> u64 {
    300
}

fn default_probe_backoff() -> u64 {
    60
}

fn default_probe_timeout() -> u64 {
    10
}

fn default_providers() -> Vec<ProviderDescriptor> {
    ProviderRegistry::default().iter().cloned().collect()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_probe_interval(),
            error_backoff_secs: default_probe_backoff(),
            request_timeout_secs: default_probe_timeout(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            probe: ProbeSettings::default(),
            providers: default_providers(),
        }
    }
}

impl ProbeSettings {
    pub fn to_prober_config(&self) -> ProberConfig {
        ProberConfig {
            interval: Duration::from_secs(self.interval_secs),
            error_backoff: Duration::from_secs(self.error_backoff_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` when it exists, otherwise fall back to the built-in
    /// provider set.
    pub fn load_or_default(path: &str) -> anyhow::Result<Self> {
        if std::path::Path::new(path).exists() {
            Self::load(path)
        } else {
            tracing::info!(path, "no config file found, using built-in providers");
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.providers.is_empty() {
            anyhow::bail!("at least one provider must be declared");
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            if provider.name.is_empty() {
                anyhow::bail!("provider name cannot be empty");
            }
            if !seen.insert(provider.name.as_str()) {
                anyhow::bail!("duplicate provider name: {}", provider.name);
            }
            if provider.base_url.is_empty() {
                anyhow::bail!("provider '{}' has an empty base_url", provider.name);
            }
            if provider.model.is_empty() {
                anyhow::bail!("provider '{}' has an empty model", provider.name);
            }
        }

        if self.probe.interval_secs == 0 {
            anyhow::bail!("probe interval must be at least one second");
        }

        Ok(())
    }

    pub fn registry(&self) -> ProviderRegistry {
        ProviderRegistry::new(self.providers.clone())
    }
}
