//! Web search capability.
//!
//! [`SearchTool`] serves the `search` intent over any [`SearchBackend`].
//! [`LoadBalancedSearch`] rotates across interchangeable instances and
//! benches failing ones with exponential cooldown; the agent never sees
//! instance health.

use async_trait::async_trait;
use forager_core::error::ToolError;
use forager_core::intent::Intent;
use forager_core::observation::SearchHit;
use forager_core::tool::ToolCapability;
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::http_error;

const DEFAULT_MAX_RESULTS: usize = 5;

/// A source of web search results. An empty result list is a valid answer.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ToolError>;
}

/// A SearXNG instance queried through its JSON API.
pub struct SearxngBackend {
    base_url: String,
    client: reqwest::Client,
}

impl SearxngBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearxngResponse {
    #[serde(default)]
    results: Vec<SearxngResult>,
}

#[derive(Debug, Deserialize)]
struct SearxngResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

#[async_trait]
impl SearchBackend for SearxngBackend {
    fn name(&self) -> &str {
        &self.base_url
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ToolError> {
        let url = format!("{}/search", self.base_url);
        debug!(instance = %self.base_url, query = %query, "Querying search instance");

        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("format", "json")])
            .send()
            .await
            .map_err(|e| http_error("search", e))?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(ToolError::Transport {
                tool_name: "search".into(),
                reason: format!("{} answered {status}", self.base_url),
            });
        }
        if !status.is_success() {
            return Err(ToolError::Rejected {
                tool_name: "search".into(),
                reason: format!("{} answered {status}", self.base_url),
            });
        }

        let body: SearxngResponse = response.json().await.map_err(|e| ToolError::Transport {
            tool_name: "search".into(),
            reason: format!("unreadable search response: {e}"),
        })?;

        Ok(body
            .results
            .into_iter()
            .filter(|r| !r.url.is_empty())
            .take(max_results)
            .map(|r| SearchHit {
                title: r.title,
                url: r.url,
                snippet: r.content,
            })
            .collect())
    }
}

/// Cooldown schedule for a failing instance.
#[derive(Debug, Clone)]
pub struct Cooldown {
    pub base: Duration,
    pub cap: Duration,
    pub multiplier: f64,
}

impl Default for Cooldown {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(5),
            cap: Duration::from_secs(300),
            multiplier: 2.0,
        }
    }
}

impl Cooldown {
    /// Cooldown after the given number of consecutive failures (1-based).
    pub fn after(&self, consecutive_failures: u32) -> Duration {
        let exponent = consecutive_failures.saturating_sub(1) as i32;
        let secs = self.base.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(secs.min(self.cap.as_secs_f64()))
    }
}

#[derive(Debug, Default, Clone)]
struct InstanceHealth {
    cooldown_until: Option<Instant>,
    consecutive_failures: u32,
}

impl InstanceHealth {
    fn is_cooling(&self, now: Instant) -> bool {
        self.cooldown_until.is_some_and(|until| now < until)
    }
}

/// Round-robin over interchangeable search backends with health tracking.
pub struct LoadBalancedSearch {
    backends: Vec<Arc<dyn SearchBackend>>,
    health: Mutex<Vec<InstanceHealth>>,
    next: AtomicUsize,
    cooldown: Cooldown,
}

impl LoadBalancedSearch {
    pub fn new(backends: Vec<Arc<dyn SearchBackend>>) -> Self {
        let health = vec![InstanceHealth::default(); backends.len()];
        Self {
            backends,
            health: Mutex::new(health),
            next: AtomicUsize::new(0),
            cooldown: Cooldown::default(),
        }
    }

    pub fn with_cooldown(mut self, cooldown: Cooldown) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Build from a list of SearXNG base URLs.
    pub fn from_urls(urls: &[String]) -> Self {
        Self::new(
            urls.iter()
                .map(|u| Arc::new(SearxngBackend::new(u.as_str())) as Arc<dyn SearchBackend>)
                .collect(),
        )
    }

    /// Number of instances not currently cooling down.
    pub async fn healthy_count(&self) -> usize {
        let now = Instant::now();
        self.health
            .lock()
            .await
            .iter()
            .filter(|h| !h.is_cooling(now))
            .count()
    }

    async fn record_success(&self, idx: usize) {
        let mut health = self.health.lock().await;
        health[idx] = InstanceHealth::default();
    }

    async fn record_failure(&self, idx: usize) {
        let mut health = self.health.lock().await;
        let entry = &mut health[idx];
        entry.consecutive_failures += 1;
        let wait = self.cooldown.after(entry.consecutive_failures);
        entry.cooldown_until = Some(Instant::now() + wait);
        warn!(
            instance = %self.backends[idx].name(),
            failures = entry.consecutive_failures,
            cooldown_secs = wait.as_secs(),
            "Search instance benched"
        );
    }
}

#[async_trait]
impl SearchBackend for LoadBalancedSearch {
    fn name(&self) -> &str {
        "load_balanced"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ToolError> {
        let total = self.backends.len();
        if total == 0 {
            return Err(ToolError::Unavailable("no search instances configured".into()));
        }

        let start = self.next.fetch_add(1, Ordering::Relaxed) % total;
        let mut last_error = None;

        for offset in 0..total {
            let idx = (start + offset) % total;
            if self.health.lock().await[idx].is_cooling(Instant::now()) {
                continue;
            }

            match self.backends[idx].search(query, max_results).await {
                Ok(hits) => {
                    self.record_success(idx).await;
                    return Ok(hits);
                }
                Err(e) if e.is_retryable() => {
                    self.record_failure(idx).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| ToolError::Transport {
            tool_name: "search".into(),
            reason: "every search instance is cooling down".into(),
        }))
    }
}

/// The `search` capability. Supports a single `query` plus optional
/// extra `queries` that run as independent sub-calls.
pub struct SearchTool {
    backend: Arc<dyn SearchBackend>,
}

impl SearchTool {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl ToolCapability for SearchTool {
    fn intent(&self) -> Intent {
        Intent::Search
    }

    fn description(&self) -> &str {
        "Search the web for current information. Returns titles, URLs and snippets."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "queries": {
                    "type": "array",
                    "description": "Additional independent queries to research in parallel"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Results per query (default 5)",
                    "minimum": 1,
                    "maximum": 10
                }
            },
            "required": ["query"]
        })
    }

    fn split(&self, arguments: &serde_json::Value) -> Vec<serde_json::Value> {
        let mut queries: Vec<String> = Vec::new();
        if let Some(q) = arguments["query"].as_str() {
            queries.push(q.to_string());
        }
        if let Some(extra) = arguments["queries"].as_array() {
            for q in extra.iter().filter_map(|v| v.as_str()) {
                if !q.trim().is_empty() && !queries.iter().any(|known| known == q) {
                    queries.push(q.to_string());
                }
            }
        }
        if queries.len() <= 1 {
            return vec![arguments.clone()];
        }

        queries
            .into_iter()
            .map(|q| {
                let mut sub = serde_json::json!({ "query": q });
                if let Some(max) = arguments.get("max_results") {
                    sub["max_results"] = max.clone();
                }
                sub
            })
            .collect()
    }

    async fn invoke(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;
        let max_results = arguments["max_results"]
            .as_u64()
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_MAX_RESULTS);

        let hits = self.backend.search(query, max_results).await?;
        debug!(query = %query, hits = hits.len(), "Search finished");

        Ok(serde_json::json!({
            "query": query,
            "results": hits,
        }))
    }
}
