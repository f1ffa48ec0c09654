//! Reasoning step generator — the only caller of the completion service.
//!
//! Each step is one completion. A native tool call becomes an
//! [`ActionProposal`]; without one, the reply is scanned for a JSON action
//! block (`{"tool": ..., "parameters": {...}}`) so models without tool
//! calling still work. Anything else is the final answer.
//!
//! Completion failures are retried here with capped exponential backoff,
//! independently of tool retries.

use forager_config::AgentConfig;
use forager_core::error::ProviderError;
use forager_core::intent::Intent;
use forager_core::message::Message;
use forager_core::provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::prompt;
use crate::state::{ActionProposal, AgentState};

/// Outcome of one reasoning step.
#[derive(Debug, Clone, PartialEq)]
pub enum ReasoningStep {
    Answer { thought: String, answer: String },
    Action { thought: String, proposal: ActionProposal },
}

pub struct ReasoningStepGenerator {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    tools: Vec<ToolDefinition>,
    settings: AgentConfig,
}

impl ReasoningStepGenerator {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        settings: AgentConfig,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            tools: Vec::new(),
            settings,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Tool definitions offered to the model on every reasoning step.
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    /// Produce the next thought plus an answer or an action.
    pub async fn next_step(&self, state: &AgentState) -> Result<ReasoningStep, ProviderError> {
        let messages =
            prompt::reasoning_messages(state, &self.tools, self.settings.history_window);
        let response = self.complete_with_retry(messages, self.tools.clone()).await?;
        let step = parse_step(&response.message);

        debug!(
            iteration = state.iteration,
            action = matches!(step, ReasoningStep::Action { .. }),
            "Reasoning step parsed"
        );
        Ok(step)
    }

    /// Ask for corrected parameters for the same tool.
    pub async fn regenerate_parameters(
        &self,
        state: &AgentState,
        proposal: &ActionProposal,
        error: &str,
    ) -> Result<Map<String, Value>, ProviderError> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name == proposal.intent.as_str());
        let messages = prompt::repair_messages(state, proposal, error, tool);
        let response = self.complete_with_retry(messages, Vec::new()).await?;

        let parameters = extract_json_block(&response.message.content)
            .and_then(|v| match v {
                // tolerate a full action block
                Value::Object(mut obj) if obj.contains_key("parameters") => {
                    match obj.remove("parameters") {
                        Some(Value::Object(params)) => Some(params),
                        _ => None,
                    }
                }
                Value::Object(obj) => Some(obj),
                _ => None,
            })
            .unwrap_or_else(|| {
                warn!(
                    intent = %proposal.intent,
                    "Repair reply held no parameters; keeping originals"
                );
                proposal.parameters.clone()
            });

        Ok(parameters)
    }

    /// One tool-less completion: the plain path and every fallback.
    pub async fn plain_answer(
        &self,
        state: &AgentState,
        note: Option<&str>,
    ) -> Result<String, ProviderError> {
        let messages = prompt::plain_messages(state, note);
        let response = self.complete_with_retry(messages, Vec::new()).await?;
        Ok(response.message.content.trim().to_string())
    }

    /// Call the provider, retrying retryable failures with capped backoff.
    pub async fn complete_with_retry(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
    ) -> Result<ProviderResponse, ProviderError> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools,
        };

        let mut retry = 0;
        loop {
            match self.provider.complete(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && retry < self.settings.completion_retries => {
                    retry += 1;
                    let delay = self.settings.completion_backoff(retry);
                    warn!(
                        provider = self.provider.name(),
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Completion failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Interpret one model reply.
pub fn parse_step(message: &Message) -> ReasoningStep {
    let content = message.content.trim();

    if let Some(call) = message.tool_calls.first() {
        let intent = Intent::from_name(&call.name).unwrap_or_else(|| {
            warn!(tool = %call.name, "Model called an unknown tool");
            Intent::None
        });
        let parameters = serde_json::from_str::<Map<String, Value>>(&call.arguments)
            .unwrap_or_default();
        let thought = if content.is_empty() {
            format!("Calling {}", call.name)
        } else {
            content.to_string()
        };
        return ReasoningStep::Action {
            thought,
            proposal: ActionProposal::new(intent, parameters),
        };
    }

    if let Some((tool, parameters, before)) = action_block(content) {
        let intent = Intent::from_name(&tool).unwrap_or(Intent::None);
        let thought = if before.is_empty() {
            format!("Calling {tool}")
        } else {
            before
        };
        return ReasoningStep::Action {
            thought,
            proposal: ActionProposal::new(intent, parameters),
        };
    }

    ReasoningStep::Answer {
        thought: "Answering directly".to_string(),
        answer: content.to_string(),
    }
}

/// A `{"tool": ..., "parameters": ...}` block in free text, plus the text before it.
fn action_block(content: &str) -> Option<(String, Map<String, Value>, String)> {
    let Value::Object(mut obj) = extract_json_block(content)? else {
        return None;
    };
    let tool = obj.get("tool")?.as_str()?.trim().to_string();
    if tool.is_empty() {
        return None;
    }
    let parameters = match obj.remove("parameters") {
        Some(Value::Object(p)) => p,
        _ => Map::new(),
    };
    let before = content
        .find("```")
        .or_else(|| content.find('{'))
        .map(|i| content[..i].trim().to_string())
        .unwrap_or_default();
    Some((tool, parameters, before))
}

/// First JSON value in the text: a ```json fence, else first `{` to last `}`.
pub fn extract_json_block(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    let candidate = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim())
    } else {
        let start = trimmed.find('{')?;
        let end = trimmed.rfind('}')?;
        if end < start {
            return None;
        }
        &trimmed[start..=end]
    };
    serde_json::from_str(candidate).ok()
}
