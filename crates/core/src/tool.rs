//! Tool capability trait — the abstraction over external tools.
//!
//! Capabilities are what give the agent the ability to act in the world:
//! search the web, synthesize images, run code, draft documents. Each one
//! is registered under a single [`Intent`] so the dispatcher can look it up
//! without knowing anything about the tool itself.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ToolError;
use crate::intent::Intent;
use crate::provider::ToolDefinition;

/// Default dispatch timeout for a tool class.
pub fn default_timeout(intent: Intent) -> Duration {
    match intent {
        Intent::ImageSingle | Intent::ImageBatch => Duration::from_secs(30),
        _ => Duration::from_secs(15),
    }
}

/// The core capability trait.
///
/// Implementations must be safe for concurrent use: one registry is shared
/// by every agent run in the process.
#[async_trait]
pub trait ToolCapability: Send + Sync {
    /// The intent this capability serves.
    fn intent(&self) -> Intent;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Split one invocation into independent sub-calls.
    ///
    /// Most tools run as a single call. Batch-style tools (several images,
    /// several research queries) return one argument object per sub-call;
    /// the dispatcher runs them through a bounded pool.
    fn split(&self, arguments: &serde_json::Value) -> Vec<serde_json::Value> {
        vec![arguments.clone()]
    }

    /// Invoke the tool. Returns the raw response body; interpreting it is
    /// left to the observation builder.
    async fn invoke(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError>;

    /// Convert this capability into a ToolDefinition for the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.intent().as_str().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available capabilities, keyed by intent.
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    tools: HashMap<Intent, Arc<dyn ToolCapability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a capability. Replaces any existing one for the same intent.
    pub fn register(&mut self, tool: Arc<dyn ToolCapability>) {
        let intent = tool.intent();
        self.tools.insert(intent, tool);
    }

    /// Builder-style registration.
    pub fn with(mut self, tool: Arc<dyn ToolCapability>) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, intent: Intent) -> Option<Arc<dyn ToolCapability>> {
        self.tools.get(&intent).cloned()
    }

    pub fn contains(&self, intent: Intent) -> bool {
        self.tools.contains_key(&intent)
    }

    /// Tool definitions in classification priority order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        Intent::PRIORITY
            .iter()
            .filter_map(|intent| self.tools.get(intent))
            .map(|t| t.to_definition())
            .collect()
    }

    /// Registered intents in classification priority order.
    pub fn intents(&self) -> Vec<Intent> {
        Intent::PRIORITY
            .iter()
            .copied()
            .filter(|intent| self.tools.contains_key(intent))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
