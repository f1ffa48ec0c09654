//! Tool dispatcher — validates an action and runs it against its capability.
//!
//! Every dispatch yields an [`Observation`]; failures come back as
//! `ToolError` observations, never as `Err`. Parameters are checked against
//! the capability's JSON schema before any call is made. Sub-calls from
//! [`ToolCapability::split`] run through an ordered pool bounded by
//! `fan_out`, each under its own timeout.

use forager_core::error::ToolError;
use forager_core::intent::Intent;
use forager_core::observation::Observation;
use forager_core::tool::{CapabilityRegistry, ToolCapability, default_timeout};
use futures::StreamExt;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::observation::ObservationBuilder;
use crate::state::ActionProposal;

pub struct ToolDispatcher {
    registry: CapabilityRegistry,
    timeouts: HashMap<Intent, Duration>,
    fan_out: usize,
}

impl ToolDispatcher {
    pub fn new(registry: CapabilityRegistry) -> Self {
        Self {
            registry,
            timeouts: HashMap::new(),
            fan_out: 4,
        }
    }

    /// Override per-intent timeouts. Intents left out use the default.
    pub fn with_timeouts(mut self, timeouts: HashMap<Intent, Duration>) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_fan_out(mut self, fan_out: usize) -> Self {
        self.fan_out = fan_out.clamp(1, 4);
        self
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn timeout_for(&self, intent: Intent) -> Duration {
        self.timeouts
            .get(&intent)
            .copied()
            .unwrap_or_else(|| default_timeout(intent))
    }

    /// Run one action to an observation.
    pub async fn dispatch(
        &self,
        proposal: &ActionProposal,
        cancel: &CancellationToken,
    ) -> Observation {
        let intent = proposal.intent;
        let Some(tool) = self.registry.get(intent) else {
            warn!(intent = %intent, "No capability registered");
            return ObservationBuilder::from_error(&ToolError::Unavailable(format!(
                "no tool is available for {intent}"
            )));
        };

        if let Err(e) = validate(&tool.parameters_schema(), &proposal.parameters) {
            debug!(intent = %intent, error = %e, "Parameters failed validation");
            return ObservationBuilder::from_error(&e);
        }

        let sub_calls = tool.split(&proposal.arguments());
        let timeout = self.timeout_for(intent);
        debug!(
            intent = %intent,
            attempt = proposal.attempt,
            sub_calls = sub_calls.len(),
            "Dispatching"
        );

        let outcomes: Vec<Result<Value, ToolError>> = futures::stream::iter(sub_calls)
            .map(|args| invoke_one(tool.clone(), args, timeout, cancel))
            .buffered(self.fan_out)
            .collect()
            .await;

        ObservationBuilder::combine(intent, &proposal.parameters, outcomes)
    }
}

async fn invoke_one(
    tool: Arc<dyn ToolCapability>,
    args: Value,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Value, ToolError> {
    let intent = tool.intent();
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ToolError::Transport {
            tool_name: intent.as_str().to_string(),
            reason: "cancelled".into(),
        }),
        result = tokio::time::timeout(timeout, tool.invoke(args)) => match result {
            Ok(outcome) => outcome,
            Err(_) => Err(ToolError::Timeout {
                tool_name: intent.as_str().to_string(),
                timeout_secs: timeout.as_secs(),
            }),
        },
    }
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

/// Check parameters against the subset of JSON Schema tools declare:
/// required keys, primitive types, and integer bounds.
pub fn validate(schema: &Value, params: &Map<String, Value>) -> Result<(), ToolError> {
    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            match params.get(key) {
                None | Some(Value::Null) => {
                    return Err(ToolError::InvalidArguments(format!(
                        "missing required parameter '{key}'"
                    )));
                }
                Some(Value::String(s)) if s.trim().is_empty() => {
                    return Err(ToolError::InvalidArguments(format!(
                        "required parameter '{key}' is empty"
                    )));
                }
                _ => {}
            }
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };

    for (key, value) in params {
        let Some(spec) = properties.get(key) else {
            continue;
        };
        let expected = spec.get("type").and_then(Value::as_str).unwrap_or("any");
        if !type_matches(expected, value) {
            return Err(ToolError::InvalidArguments(format!(
                "parameter '{key}' must be of type {expected}"
            )));
        }
        let Some(n) = value.as_i64() else {
            continue;
        };
        match (
            spec.get("minimum").and_then(Value::as_i64),
            spec.get("maximum").and_then(Value::as_i64),
        ) {
            (Some(min), _) if n < min => {
                return Err(ToolError::InvalidArguments(format!(
                    "parameter '{key}' must be at least {min}"
                )));
            }
            (_, Some(max)) if n > max => {
                return Err(ToolError::InvalidArguments(format!(
                    "parameter '{key}' must be at most {max}"
                )));
            }
            _ => {}
        }
    }
    Ok(())
}
