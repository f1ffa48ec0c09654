//! Provider fallback: an ordered chain of completion providers.
//!
//! Each entry gets one attempt under its own timeout. The chain moves on
//! when the failure belongs to the provider (outage, rate limit, bad key,
//! unknown model) and stops when it belongs to the request, since every
//! entry would reject a malformed request the same way.
//!
//! The chain does not retry an entry. Retrying with backoff is the
//! caller's job, so the error handed back is retryable only when at least
//! one entry failed transiently.

use async_trait::async_trait;
use forager_core::error::ProviderError;
use forager_core::provider::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct FallbackProvider {
    name: String,
    chain: Vec<FallbackEntry>,
}

struct FallbackEntry {
    provider: Arc<dyn forager_core::Provider>,
    timeout: Duration,
    /// Model to request from this provider instead of the caller's model.
    model: Option<String>,
}

/// Whether another provider could succeed where this one failed.
fn falls_over(error: &ProviderError) -> bool {
    match error {
        ProviderError::ApiError { status_code, .. } => !(400..500).contains(status_code),
        _ => true,
    }
}

impl FallbackProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chain: Vec::new(),
        }
    }

    pub fn add(mut self, provider: Arc<dyn forager_core::Provider>, timeout: Duration) -> Self {
        self.chain.push(FallbackEntry {
            provider,
            timeout,
            model: None,
        });
        self
    }

    /// Add a provider that is always asked for `model`, whatever the
    /// caller requested.
    pub fn add_with_model(
        mut self,
        provider: Arc<dyn forager_core::Provider>,
        timeout: Duration,
        model: impl Into<String>,
    ) -> Self {
        self.chain.push(FallbackEntry {
            provider,
            timeout,
            model: Some(model.into()),
        });
        self
    }

    async fn attempt(
        entry: &FallbackEntry,
        mut request: ProviderRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        if let Some(model) = &entry.model {
            request.model = model.clone();
        }
        match tokio::time::timeout(entry.timeout, entry.provider.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(format!(
                "Provider '{}' timed out after {}s",
                entry.provider.name(),
                entry.timeout.as_secs()
            ))),
        }
    }
}

#[async_trait]
impl forager_core::Provider for FallbackProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut transient: Option<ProviderError> = None;
        let mut permanent: Option<ProviderError> = None;

        for (i, entry) in self.chain.iter().enumerate() {
            debug!(provider = %entry.provider.name(), position = i + 1, "Trying provider");

            let error = match Self::attempt(entry, request.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };
            warn!(
                provider = %entry.provider.name(),
                retryable = error.is_retryable(),
                error = %error,
                "Provider failed"
            );

            if !falls_over(&error) {
                return Err(error);
            }
            if error.is_retryable() {
                transient.get_or_insert(error);
            } else {
                permanent.get_or_insert(error);
            }
        }

        Err(transient.or(permanent).unwrap_or_else(|| {
            ProviderError::NotConfigured("No providers in fallback chain".into())
        }))
    }
}
