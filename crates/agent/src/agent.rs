//! The agent facade: one request in, one [`AgentResult`] out.

use chrono::Utc;
use forager_config::{AgentConfig, AppConfig};
use forager_core::event::{DomainEvent, EventBus};
use forager_core::intent::Intent;
use forager_core::memory::{MemoryEntry, MemoryStore};
use forager_core::message::Message;
use forager_core::provider::Provider;
use forager_core::tool::CapabilityRegistry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::controller::{LoopController, LoopOutcome};
use crate::correction::SelfCorrectionPolicy;
use crate::dispatcher::ToolDispatcher;
use crate::formatter::{self, AUTO_SEARCH_BADGE, AgentResult, FormatInput, RunMetadata, ToolUsage};
use crate::goal::{Goal, understand};
use crate::memory::{propose_memories, recall};
use crate::reasoning::ReasoningStepGenerator;
use crate::state::AgentState;

/// How a request is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// The reason/act/observe loop with tools.
    Loop,
    /// One tool-less completion.
    Plain,
    /// One automatic search, then a plain completion over its results.
    RealtimeAugmented,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loop => "loop",
            Self::Plain => "plain",
            Self::RealtimeAugmented => "realtime_augmented",
        }
    }
}

pub struct Agent {
    reasoning: ReasoningStepGenerator,
    dispatcher: ToolDispatcher,
    memory: Option<Arc<dyn MemoryStore>>,
    events: Option<Arc<EventBus>>,
    settings: AgentConfig,
}

impl Agent {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        registry: CapabilityRegistry,
        settings: AgentConfig,
    ) -> Self {
        let reasoning = ReasoningStepGenerator::new(provider, model, settings.clone())
            .with_tools(registry.definitions());
        let dispatcher = ToolDispatcher::new(registry).with_fan_out(settings.fan_out());
        Self {
            reasoning,
            dispatcher,
            memory: None,
            events: None,
            settings,
        }
    }

    /// Build from the application config, with a provider and tools made elsewhere.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        registry: CapabilityRegistry,
    ) -> Self {
        let mut agent = Self::new(
            provider,
            config.default_model.clone(),
            registry,
            config.agent.clone(),
        );
        agent.reasoning = agent
            .reasoning
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens);
        agent
    }

    pub fn with_memory(mut self, memory: Arc<dyn MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_timeouts(mut self, timeouts: HashMap<Intent, Duration>) -> Self {
        self.dispatcher = self.dispatcher.with_timeouts(timeouts);
        self
    }

    pub fn settings(&self) -> &AgentConfig {
        &self.settings
    }

    /// Pick how a goal is handled.
    pub fn select_mode(&self, goal: &Goal) -> RunMode {
        if !self.settings.tool_mode {
            return RunMode::Plain;
        }
        if goal.has_tool_intent() {
            RunMode::Loop
        } else if goal.requires_real_time_data && self.settings.realtime_auto_search {
            RunMode::RealtimeAugmented
        } else {
            RunMode::Plain
        }
    }

    fn emit(&self, event: DomainEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }

    /// Handle one request end to end.
    ///
    /// Memory is read once before the loop; nothing is written. Proposed
    /// memories come back in the result for the caller to commit.
    pub async fn run(
        &self,
        request: &str,
        history: &[Message],
        user_id: &str,
        cancel: &CancellationToken,
    ) -> AgentResult {
        let started = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let goal = understand(request, history);
        let mode = self.select_mode(&goal);

        info!(
            run_id = %run_id,
            intent = %goal.matched_intent,
            realtime = goal.requires_real_time_data,
            mode = mode.as_str(),
            "Run started"
        );
        self.emit(DomainEvent::RunStarted {
            run_id: run_id.clone(),
            intent: goal.matched_intent,
            requires_real_time_data: goal.requires_real_time_data,
            timestamp: Utc::now(),
        });

        let deadline = started + self.settings.wall_clock();
        let memories = self.recall_guarded(user_id, deadline, cancel).await;

        let mut state = AgentState::new(run_id, goal, memories.unwrap_or_default());
        state.started_at = started;

        let outcome = if cancel.is_cancelled() {
            LoopOutcome::cancelled(state)
        } else {
            let mut controller = LoopController::new(&self.reasoning, &self.dispatcher)
                .with_policy(SelfCorrectionPolicy::new(self.settings.max_retries_per_action))
                .with_max_iterations(self.settings.max_iterations)
                .with_wall_clock(self.settings.wall_clock());
            if let Some(bus) = &self.events {
                controller = controller.with_events(bus);
            }

            match mode {
                RunMode::Loop => controller.run(state, cancel).await,
                RunMode::Plain => controller.run_plain(state, cancel).await,
                RunMode::RealtimeAugmented => controller.run_augmented(state, cancel).await,
            }
        };

        let result = self.finish(outcome, mode, propose_memories(request), started);

        info!(
            run_id = %result.metadata.run_id,
            iterations = result.iterations,
            used_fallback = result.used_fallback,
            elapsed_ms = result.metadata.elapsed_ms,
            "Run finished"
        );
        self.emit(DomainEvent::RunFinished {
            run_id: result.metadata.run_id.clone(),
            iterations: result.iterations,
            used_fallback: result.used_fallback,
            fallback_reason: result.fallback_reason.map(|r| r.as_str().to_string()),
            timestamp: Utc::now(),
        });
        result
    }

    /// Read memories once, bounded by the run deadline and the cancel token.
    /// `None` when the read was cut short.
    async fn recall_guarded(
        &self,
        user_id: &str,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Option<Vec<MemoryEntry>> {
        let store = match &self.memory {
            Some(store) => store,
            None => return Some(Vec::new()),
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            _ = tokio::time::sleep_until(deadline) => {
                warn!(user_id = %user_id, "Memory read outlived the run budget");
                None
            }
            memories = recall(store.as_ref(), user_id, self.settings.memory_limit) => {
                Some(memories)
            }
        }
    }

    fn finish(
        &self,
        outcome: LoopOutcome,
        mode: RunMode,
        memory_proposals: Vec<forager_core::memory::MemoryProposal>,
        started: Instant,
    ) -> AgentResult {
        let observations = outcome.state.successful_observations();

        let tools_used = match mode {
            RunMode::RealtimeAugmented if outcome.auto_searched => vec![ToolUsage {
                intent: Intent::Search,
                badge: AUTO_SEARCH_BADGE.to_string(),
            }],
            RunMode::RealtimeAugmented | RunMode::Plain => Vec::new(),
            RunMode::Loop => formatter::tools_used(&observations),
        };

        let content = formatter::render_content(&FormatInput {
            terminal: outcome.terminal(),
            answer: outcome.answer.as_deref(),
            observations,
            fallback_reason: outcome.fallback_reason,
        });

        AgentResult {
            content,
            tools_used,
            used_fallback: outcome.used_fallback,
            fallback_reason: outcome.fallback_reason,
            iterations: outcome.state.iteration,
            memory_proposals,
            metadata: RunMetadata {
                run_id: outcome.state.run_id.clone(),
                mode: mode.as_str().to_string(),
                transitions: outcome.state.transitions.clone(),
                error_causes: outcome.error_causes.clone(),
                escalations: outcome.escalations.clone(),
                retries: outcome.retries,
                elapsed_ms: started.elapsed().as_millis() as u64,
            },
        }
    }
}
