//! Configuration loading, validation, and management for Forager.
//!
//! Loads configuration from `~/.forager/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound on fan-out inside a single tool action.
pub const MAX_FAN_OUT: usize = 4;

/// The root configuration structure.
///
/// Maps directly to `~/.forager/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default completion provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per completion
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Loop budgets and behaviour switches
    #[serde(default)]
    pub agent: AgentConfig,

    /// Tool endpoints and timeouts
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openrouter".into()
}
fn default_model() -> String {
    "anthropic/claude-sonnet-4".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("agent", &self.agent)
            .field("tools", &self.tools)
            .field("memory", &self.memory)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

/// Budgets and switches for the reasoning loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Reasoning steps allowed before the run fails
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Wall-clock budget for a whole run
    #[serde(default = "default_wall_clock_secs")]
    pub wall_clock_secs: u64,

    /// Retries of one action before falling back
    #[serde(default = "default_max_retries")]
    pub max_retries_per_action: u32,

    /// Reasoning/action/observation steps shown to the model
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Memories injected per run
    #[serde(default = "default_memory_limit")]
    pub memory_limit: usize,

    /// Completion retries at the reasoning step
    #[serde(default = "default_completion_retries")]
    pub completion_retries: u32,

    #[serde(default = "default_backoff_ms")]
    pub completion_backoff_ms: u64,

    #[serde(default = "default_backoff_cap_ms")]
    pub completion_backoff_cap_ms: u64,

    /// Enter the tool loop when an intent matches
    #[serde(default = "default_true")]
    pub tool_mode: bool,

    /// Search automatically for real-time questions that match no tool
    #[serde(default = "default_true")]
    pub realtime_auto_search: bool,

    /// Concurrent sub-calls inside one action (at most 4)
    #[serde(default = "default_fan_out")]
    pub fan_out_concurrency: usize,
}

fn default_max_iterations() -> u32 {
    5
}
fn default_wall_clock_secs() -> u64 {
    90
}
fn default_max_retries() -> u32 {
    2
}
fn default_history_window() -> usize {
    6
}
fn default_memory_limit() -> usize {
    10
}
fn default_completion_retries() -> u32 {
    2
}
fn default_backoff_ms() -> u64 {
    500
}
fn default_backoff_cap_ms() -> u64 {
    4000
}
fn default_fan_out() -> usize {
    MAX_FAN_OUT
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            wall_clock_secs: default_wall_clock_secs(),
            max_retries_per_action: default_max_retries(),
            history_window: default_history_window(),
            memory_limit: default_memory_limit(),
            completion_retries: default_completion_retries(),
            completion_backoff_ms: default_backoff_ms(),
            completion_backoff_cap_ms: default_backoff_cap_ms(),
            tool_mode: true,
            realtime_auto_search: true,
            fan_out_concurrency: default_fan_out(),
        }
    }
}

impl AgentConfig {
    pub fn wall_clock(&self) -> Duration {
        Duration::from_secs(self.wall_clock_secs)
    }

    /// Backoff before completion retry number `retry` (1-based), capped.
    pub fn completion_backoff(&self, retry: u32) -> Duration {
        let factor = 2u64.saturating_pow(retry.saturating_sub(1));
        let ms = self
            .completion_backoff_ms
            .saturating_mul(factor)
            .min(self.completion_backoff_cap_ms);
        Duration::from_millis(ms)
    }

    pub fn fan_out(&self) -> usize {
        self.fan_out_concurrency.clamp(1, MAX_FAN_OUT)
    }
}

/// Tool endpoints and per-class timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Interchangeable SearXNG-style instances, rotated by health
    #[serde(default)]
    pub search_instances: Vec<String>,

    #[serde(default = "default_short_timeout")]
    pub search_timeout_secs: u64,

    #[serde(default = "default_image_timeout")]
    pub image_timeout_secs: u64,

    #[serde(default = "default_short_timeout")]
    pub code_timeout_secs: u64,

    #[serde(default = "default_short_timeout")]
    pub document_timeout_secs: u64,

    /// OpenAI-compatible images endpoint base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_api_url: Option<String>,

    #[serde(default = "default_image_model")]
    pub image_model: String,

    /// Language → interpreter command for code execution
    #[serde(default = "default_interpreters")]
    pub code_interpreters: HashMap<String, String>,
}

fn default_short_timeout() -> u64 {
    15
}
fn default_image_timeout() -> u64 {
    30
}
fn default_image_model() -> String {
    "dall-e-3".into()
}
fn default_interpreters() -> HashMap<String, String> {
    HashMap::from([
        ("python".to_string(), "python3".to_string()),
        ("javascript".to_string(), "node".to_string()),
    ])
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            search_instances: vec![],
            search_timeout_secs: default_short_timeout(),
            image_timeout_secs: default_image_timeout(),
            code_timeout_secs: default_short_timeout(),
            document_timeout_secs: default_short_timeout(),
            image_api_url: None,
            image_model: default_image_model(),
            code_interpreters: default_interpreters(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// "in_memory", "file", or "none"
    #[serde(default = "default_memory_backend")]
    pub backend: String,

    /// JSON-lines file used by the "file" backend.
    /// Defaults to `~/.forager/memory/memories.jsonl`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Owner of memories read and written by the CLI
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

fn default_memory_backend() -> String {
    "in_memory".into()
}
fn default_user_id() -> String {
    "local".into()
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            path: None,
            user_id: default_user_id(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.forager/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `FORAGER_API_KEY` (highest priority)
    /// - `OPENROUTER_API_KEY`
    /// - `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if self.api_key.is_none() {
            self.api_key = std::env::var("FORAGER_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("FORAGER_PROVIDER") {
            self.default_provider = provider;
        }

        if let Ok(model) = std::env::var("FORAGER_MODEL") {
            self.default_model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".forager")
    }

    /// Where the "file" memory backend keeps its entries.
    pub fn memory_path(&self) -> PathBuf {
        self.memory
            .path
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("memory").join("memories.jsonl"))
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if self.agent.wall_clock_secs == 0 {
            return Err(ConfigError::ValidationError(
                "agent.wall_clock_secs must be at least 1".into(),
            ));
        }

        if self.agent.fan_out_concurrency == 0 || self.agent.fan_out_concurrency > MAX_FAN_OUT {
            return Err(ConfigError::ValidationError(format!(
                "agent.fan_out_concurrency must be between 1 and {MAX_FAN_OUT}"
            )));
        }

        if !matches!(self.memory.backend.as_str(), "in_memory" | "file" | "none") {
            return Err(ConfigError::ValidationError(format!(
                "unknown memory backend '{}'",
                self.memory.backend
            )));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            agent: AgentConfig::default(),
            tools: ToolsConfig::default(),
            memory: MemoryConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
