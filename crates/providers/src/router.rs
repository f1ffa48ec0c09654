//! Provider router — selects the completion provider based on config.
//!
//! Every configured provider speaks the OpenAI-compatible protocol. When
//! more than one is configured, [`ProviderRouter::chained`] wraps them in a
//! [`FallbackProvider`] with the default first.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use forager_config::AppConfig;
use forager_core::provider::Provider;

use crate::fallback::FallbackProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// Routes completion requests to the correct provider.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    models: HashMap<String, String>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            models: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Register a provider together with the model it should be asked for
    /// when it serves as a fallback.
    pub fn register_with_model(
        &mut self,
        name: impl Into<String>,
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
    ) {
        let name = name.into();
        self.models.insert(name.clone(), model.into());
        self.providers.insert(name, provider);
    }

    /// Get the default provider.
    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// The default provider followed by every other registered provider,
    /// as one fallback chain. Returns the bare default when it is alone.
    pub fn chained(&self, timeout: Duration) -> Option<Arc<dyn Provider>> {
        let primary = self.default()?;
        if self.providers.len() == 1 {
            return Some(primary);
        }

        let mut chain = FallbackProvider::new("fallback").add(primary, timeout);
        let mut rest: Vec<&String> = self
            .providers
            .keys()
            .filter(|name| **name != self.default_provider)
            .collect();
        rest.sort();

        for name in rest {
            let provider = self.providers[name].clone();
            chain = match self.models.get(name) {
                Some(model) => chain.add_with_model(provider, timeout, model.clone()),
                None => chain.add(provider, timeout),
            };
        }

        Some(Arc::new(chain))
    }

    /// List all registered provider names.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Build providers from configuration.
pub fn build_from_config(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);

    for (name, provider_config) in &config.providers {
        let api_key = provider_config
            .api_key
            .clone()
            .or_else(|| config.api_key.clone())
            .unwrap_or_default();

        let base_url = provider_config
            .api_url
            .clone()
            .unwrap_or_else(|| default_base_url(name));

        let provider: Arc<dyn Provider> =
            Arc::new(OpenAiCompatProvider::new(name, &base_url, &api_key));

        match &provider_config.default_model {
            Some(model) => router.register_with_model(name.clone(), provider, model.clone()),
            None => router.register(name.clone(), provider),
        }
    }

    // The default provider exists even when not explicitly configured
    if router.get(&config.default_provider).is_none() {
        let api_key = config.api_key.clone().unwrap_or_default();
        let base_url = default_base_url(&config.default_provider);

        router.register(
            config.default_provider.clone(),
            Arc::new(OpenAiCompatProvider::new(
                &config.default_provider,
                &base_url,
                &api_key,
            )),
        );
    }

    router
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
