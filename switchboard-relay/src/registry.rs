//! Static provider registry.
//!
//! The registry is loaded once at startup and never mutated afterwards. Its
//! declared order is load-bearing: the router breaks score ties by it, the
//! prober walks it each cycle, and the failover coordinator tries alternates
//! in it.
//!
//! A descriptor only names the environment variable holding its credential.
//! Resolution happens at access time, so a provider whose variable is unset
//! (or empty) is treated as unconfigured for that call without any registry
//! rebuild.

use serde::{Deserialize, Serialize};

/// One upstream OpenAI-compatible endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Unique identifier, also the key into the statistics store.
    pub name: String,
    /// Name of the environment variable holding the bearer credential.
    /// Empty means the provider can never be configured.
    pub credential_ref: String,
    /// Fully qualified endpoint prefix, e.g. `https://api.deepseek.com`.
    pub base_url: String,
    /// Model identifier substituted into every forwarded request.
    pub model: String,
}

impl ProviderDescriptor {
    pub fn new(
        name: impl Into<String>,
        credential_ref: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            credential_ref: credential_ref.into(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    /// Resolve the bearer credential from the environment.
    ///
    /// Returns `None` when the variable is unset or empty, which marks the
    /// provider as unconfigured for this call.
    pub fn credential(&self) -> Option<String> {
        if self.credential_ref.is_empty() {
            return None;
        }
        std::env::var(&self.credential_ref)
            .ok()
            .filter(|value| !value.is_empty())
    }

    pub fn is_configured(&self) -> bool {
        self.credential().is_some()
    }
}

/// Ordered, immutable collection of provider descriptors.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: Vec<ProviderDescriptor>,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<ProviderDescriptor>) -> Self {
        Self { providers }
    }

    /// All descriptors in declared order.
    pub fn iter(&self) -> impl Iterator<Item = &ProviderDescriptor> {
        self.providers.iter()
    }

    /// Descriptors whose credential currently resolves, in declared order.
    pub fn configured(&self) -> impl Iterator<Item = &ProviderDescriptor> {
        self.providers.iter().filter(|p| p.is_configured())
    }

    pub fn get(&self, name: &str) -> Option<&ProviderDescriptor> {
        self.providers.iter().find(|p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for ProviderRegistry {
    /// The upstream set of the reference deployment: five OpenAI-compatible
    /// DeepSeek hosts, each behind its own credential variable.
    fn default() -> Self {
        Self::new(vec![
            ProviderDescriptor::new(
                "deepseek",
                "OPENAI_API_KEY",
                "https://api.deepseek.com",
                "deepseek-chat",
            ),
            ProviderDescriptor::new(
                "siliconflow",
                "SILICONFLOW_API_KEY",
                "https://api.siliconflow.cn/v1",
                "deepseek-ai/DeepSeek-V3",
            ),
            ProviderDescriptor::new(
                "huoshan",
                "HUOSHAN_API_KEY",
                "https://ark.cn-beijing.volces.com/api/v3",
                "ep-20250204220334-l2q5g",
            ),
            ProviderDescriptor::new(
                "tencent",
                "TENCENT_API_KEY",
                "https://api.lkeap.cloud.tencent.com/v1",
                "deepseek-v3",
            ),
            ProviderDescriptor::new(
                "bailian",
                "DASHSCOPE_API_KEY",
                "https://dashscope.aliyuncs.com/compatible-mode/v1",
                "deepseek-v3",
            ),
        ])
    }
}
