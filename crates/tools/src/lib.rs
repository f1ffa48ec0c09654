//! Built-in tool capabilities for Forager.
//!
//! Each capability serves one intent: web search over rotating SearXNG
//! instances, image synthesis, local program execution, and markdown
//! document drafting.

pub mod code;
pub mod document;
pub mod image;
pub mod search;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use forager_config::AppConfig;
use forager_core::error::ToolError;
use forager_core::intent::Intent;
use forager_core::tool::CapabilityRegistry;
use tracing::debug;

pub use code::{CodeRunner, CodeTool, ProcessRunner};
pub use document::{DocumentTool, create_document};
pub use image::{ImageBackend, ImageTool, OpenAiImageBackend};
pub use search::{LoadBalancedSearch, SearchBackend, SearchTool, SearxngBackend};

/// Map a reqwest failure onto the tool error taxonomy.
pub(crate) fn http_error(tool_name: &str, error: reqwest::Error) -> ToolError {
    if error.is_timeout() {
        ToolError::Timeout {
            tool_name: tool_name.into(),
            timeout_secs: 0,
        }
    } else {
        ToolError::Transport {
            tool_name: tool_name.into(),
            reason: error.to_string(),
        }
    }
}

/// Build the capability registry described by the configuration.
///
/// - search: registered when at least one search instance is configured
/// - image: registered when an images endpoint is configured
/// - code and document: always registered
pub fn registry_from_config(config: &AppConfig) -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();

    if !config.tools.search_instances.is_empty() {
        let backend = LoadBalancedSearch::from_urls(&config.tools.search_instances);
        registry.register(Arc::new(SearchTool::new(Arc::new(backend))));
    }

    if let Some(url) = &config.tools.image_api_url {
        let api_key = config
            .providers
            .get("openai")
            .and_then(|p| p.api_key.clone())
            .or_else(|| config.api_key.clone())
            .unwrap_or_default();
        let backend: Arc<dyn ImageBackend> = Arc::new(OpenAiImageBackend::new(
            url.as_str(),
            api_key,
            config.tools.image_model.as_str(),
        ));
        registry.register(Arc::new(ImageTool::single(backend.clone())));
        registry.register(Arc::new(ImageTool::batch(backend)));
    }

    let runner = ProcessRunner::new(config.tools.code_interpreters.clone());
    registry.register(Arc::new(CodeTool::new(Arc::new(runner))));
    registry.register(Arc::new(DocumentTool));

    debug!(tools = ?registry.intents(), "Capability registry built");
    registry
}

/// Per-intent dispatch timeouts from configuration.
pub fn dispatch_timeouts(config: &AppConfig) -> HashMap<Intent, Duration> {
    let tools = &config.tools;
    HashMap::from([
        (Intent::Search, Duration::from_secs(tools.search_timeout_secs)),
        (Intent::ImageSingle, Duration::from_secs(tools.image_timeout_secs)),
        (Intent::ImageBatch, Duration::from_secs(tools.image_timeout_secs)),
        (Intent::Code, Duration::from_secs(tools.code_timeout_secs)),
        (Intent::Document, Duration::from_secs(tools.document_timeout_secs)),
    ])
}
