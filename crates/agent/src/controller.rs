//! Loop controller — the Reason → Act → Observe state machine.
//!
//! ```text
//! Init → Reason → { Act | Done }
//! Act → Observe → { Reason | Correct }
//! Correct → { Act | Done }
//! any → Failed   (iteration or wall-clock budget, completion failure, cancellation)
//! ```
//!
//! The controller is the only code that mutates [`AgentState`]. Every
//! awaited step runs under a guard that races it against cancellation and
//! the run deadline, so an in-flight call is dropped the moment either
//! fires.

use chrono::Utc;
use forager_core::event::{DomainEvent, EventBus};
use forager_core::intent::Intent;
use forager_core::observation::{Observation, ToolErrorCause};
use serde_json::{Map, Value};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::correction::{CorrectionDecision, SelfCorrectionPolicy};
use crate::dispatcher::ToolDispatcher;
use crate::error::RunError;
use crate::formatter::{Escalation, FallbackReason};
use crate::reasoning::{ReasoningStep, ReasoningStepGenerator};
use crate::state::{ActionProposal, AgentState, HistoryStep, LoopState};

const AUTO_SEARCH_NOTE: &str = "Live web results for this question are listed above. \
Base the answer on them and cite the sources you use.";

/// Where a finished run ended up.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub state: AgentState,
    pub answer: Option<String>,
    pub error: Option<RunError>,
    pub used_fallback: bool,
    pub fallback_reason: Option<FallbackReason>,
    pub retries: u32,
    pub escalations: Vec<Escalation>,
    pub error_causes: Vec<ToolErrorCause>,
    /// The real-time augmentation produced usable search results.
    pub auto_searched: bool,
}

impl LoopOutcome {
    fn new(state: AgentState) -> Self {
        Self {
            state,
            answer: None,
            error: None,
            used_fallback: false,
            fallback_reason: None,
            retries: 0,
            escalations: Vec::new(),
            error_causes: Vec::new(),
            auto_searched: false,
        }
    }

    /// A run cancelled before the loop started.
    pub fn cancelled(state: AgentState) -> Self {
        let mut out = Self::new(state);
        out.fail(RunError::Cancelled);
        out
    }

    pub fn terminal(&self) -> LoopState {
        self.state.state
    }

    fn fail(&mut self, error: RunError) {
        warn!(run_id = %self.state.run_id, iteration = self.state.iteration, "Run failed: {error}");
        if error.is_budget() {
            self.state.budget_exceeded = true;
        }
        self.used_fallback = true;
        self.fallback_reason
            .get_or_insert(FallbackReason::from_run_error(&error));
        self.error = Some(error);
        self.state.transition(LoopState::Failed);
    }
}

pub struct LoopController<'a> {
    reasoning: &'a ReasoningStepGenerator,
    dispatcher: &'a ToolDispatcher,
    policy: SelfCorrectionPolicy,
    max_iterations: u32,
    wall_clock: Duration,
    events: Option<&'a EventBus>,
}

impl<'a> LoopController<'a> {
    pub fn new(reasoning: &'a ReasoningStepGenerator, dispatcher: &'a ToolDispatcher) -> Self {
        Self {
            reasoning,
            dispatcher,
            policy: SelfCorrectionPolicy::default(),
            max_iterations: 5,
            wall_clock: Duration::from_secs(90),
            events: None,
        }
    }

    pub fn with_policy(mut self, policy: SelfCorrectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_wall_clock(mut self, budget: Duration) -> Self {
        self.wall_clock = budget;
        self
    }

    pub fn with_events(mut self, events: &'a EventBus) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: DomainEvent) {
        if let Some(bus) = self.events {
            bus.publish(event);
        }
    }

    fn deadline(&self, state: &AgentState) -> Instant {
        state.started_at + self.wall_clock
    }

    /// Race a step against cancellation and the run deadline.
    async fn guard<T>(
        &self,
        deadline: Instant,
        cancel: &CancellationToken,
        step: impl Future<Output = T>,
    ) -> Result<T, RunError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RunError::Cancelled),
            _ = tokio::time::sleep_until(deadline) => Err(RunError::WallClock {
                secs: self.wall_clock.as_secs(),
            }),
            out = step => Ok(out),
        }
    }

    /// Run the full tool loop.
    pub async fn run(&self, state: AgentState, cancel: &CancellationToken) -> LoopOutcome {
        let deadline = self.deadline(&state);
        let mut out = LoopOutcome::new(state);
        let mut pending: Option<ActionProposal> = None;
        let mut last: Option<(ActionProposal, Observation)> = None;

        out.state.transition(LoopState::Reason);

        loop {
            match out.state.state {
                LoopState::Reason => {
                    if out.state.iteration > self.max_iterations {
                        out.fail(RunError::IterationBudget {
                            max: self.max_iterations,
                        });
                        break;
                    }

                    let step = match self
                        .guard(deadline, cancel, self.reasoning.next_step(&out.state))
                        .await
                    {
                        Ok(Ok(step)) => step,
                        Ok(Err(e)) => {
                            out.fail(RunError::Completion {
                                message: e.to_string(),
                            });
                            break;
                        }
                        Err(e) => {
                            out.fail(e);
                            break;
                        }
                    };

                    match step {
                        ReasoningStep::Answer { thought, answer } => {
                            self.emit_reasoning(&out.state, None);
                            out.state.record(HistoryStep::Thought { text: thought });
                            out.answer = Some(answer);
                            out.state.transition(LoopState::Done);
                            break;
                        }
                        ReasoningStep::Action { thought, proposal } => {
                            self.emit_reasoning(&out.state, Some(proposal.intent));
                            debug!(
                                iteration = out.state.iteration,
                                intent = %proposal.intent,
                                "Action proposed"
                            );
                            out.state.record(HistoryStep::Thought { text: thought });
                            pending = Some(proposal);
                            out.state.transition(LoopState::Act);
                        }
                    }
                }

                LoopState::Act => {
                    let Some(proposal) = pending.take() else {
                        // nothing to run; let the model decide again
                        out.state.transition(LoopState::Reason);
                        continue;
                    };
                    out.state.record(HistoryStep::Action {
                        proposal: proposal.clone(),
                    });

                    let started = Instant::now();
                    let observation = match self
                        .guard(deadline, cancel, self.dispatcher.dispatch(&proposal, cancel))
                        .await
                    {
                        Ok(obs) => obs,
                        Err(e) => {
                            out.fail(e);
                            break;
                        }
                    };

                    self.emit(DomainEvent::ToolDispatched {
                        run_id: out.state.run_id.clone(),
                        intent: proposal.intent,
                        attempt: proposal.attempt,
                        success: !observation.is_error(),
                        duration_ms: started.elapsed().as_millis() as u64,
                        timestamp: Utc::now(),
                    });
                    info!(
                        intent = %proposal.intent,
                        attempt = proposal.attempt,
                        success = !observation.is_error(),
                        "Tool dispatched"
                    );

                    out.state.record(HistoryStep::Observation {
                        intent: proposal.intent,
                        observation: observation.clone(),
                    });
                    last = Some((proposal, observation));
                    out.state.transition(LoopState::Observe);
                }

                LoopState::Observe => {
                    let cause = last.as_ref().and_then(|(_, obs)| obs.error_cause());
                    match cause {
                        Some(cause) => {
                            out.error_causes.push(cause);
                            if SelfCorrectionPolicy::needs_correction(cause) {
                                out.state.transition(LoopState::Correct);
                            } else {
                                out.state.transition(LoopState::Reason);
                            }
                        }
                        None => out.state.transition(LoopState::Reason),
                    }
                }

                LoopState::Correct => {
                    let Some((proposal, observation)) = last.take() else {
                        out.state.transition(LoopState::Reason);
                        continue;
                    };
                    let cause = observation
                        .error_cause()
                        .unwrap_or(ToolErrorCause::Rejected);
                    let decision = self.policy.decide(cause, proposal.attempt);

                    info!(
                        intent = %proposal.intent,
                        attempt = proposal.attempt,
                        cause = %cause,
                        decision = decision.as_str(),
                        "Self-correction"
                    );
                    self.emit(DomainEvent::SelfCorrection {
                        run_id: out.state.run_id.clone(),
                        intent: proposal.intent,
                        cause,
                        decision: decision.as_str().to_string(),
                        timestamp: Utc::now(),
                    });

                    match decision {
                        CorrectionDecision::RetrySame => {
                            out.retries += 1;
                            pending = Some(proposal.retry());
                            out.state.transition(LoopState::Act);
                        }
                        CorrectionDecision::RepairParameters => {
                            let error = observation.summarize(500);
                            match self
                                .guard(
                                    deadline,
                                    cancel,
                                    self.reasoning
                                        .regenerate_parameters(&out.state, &proposal, &error),
                                )
                                .await
                            {
                                Ok(Ok(parameters)) => {
                                    out.retries += 1;
                                    pending = Some(proposal.repaired(parameters));
                                    out.state.transition(LoopState::Act);
                                }
                                Ok(Err(e)) => {
                                    warn!(
                                        intent = %proposal.intent,
                                        "Parameter repair failed: {e}"
                                    );
                                    self.fall_back(
                                        &mut out,
                                        deadline,
                                        cancel,
                                        FallbackReason::RetriesExhausted,
                                        proposal.intent,
                                    )
                                    .await;
                                    break;
                                }
                                Err(e) => {
                                    out.fail(e);
                                    break;
                                }
                            }
                        }
                        CorrectionDecision::Escalate => {
                            out.escalations.push(Escalation {
                                from: proposal.intent,
                                cause,
                                iteration: out.state.iteration,
                            });
                            self.fall_back(
                                &mut out,
                                deadline,
                                cancel,
                                FallbackReason::ToolUnavailable,
                                proposal.intent,
                            )
                            .await;
                            break;
                        }
                        CorrectionDecision::GiveUp => {
                            self.fall_back(
                                &mut out,
                                deadline,
                                cancel,
                                FallbackReason::RetriesExhausted,
                                proposal.intent,
                            )
                            .await;
                            break;
                        }
                    }
                }

                LoopState::Init | LoopState::Done | LoopState::Failed => break,
            }
        }

        out
    }

    /// Correct → Done on a plain completion.
    async fn fall_back(
        &self,
        out: &mut LoopOutcome,
        deadline: Instant,
        cancel: &CancellationToken,
        reason: FallbackReason,
        intent: Intent,
    ) {
        out.used_fallback = true;
        out.fallback_reason = Some(reason);
        let note = format!(
            "The {intent} tool could not be used for this request. Answer from what you \
             know, and say briefly if current data would be needed."
        );

        match self
            .guard(deadline, cancel, self.reasoning.plain_answer(&out.state, Some(&note)))
            .await
        {
            Ok(Ok(answer)) => {
                out.answer = Some(answer);
                out.state.transition(LoopState::Done);
            }
            Ok(Err(e)) => out.fail(RunError::Completion {
                message: e.to_string(),
            }),
            Err(e) => out.fail(e),
        }
    }

    /// One tool-less completion, no loop.
    pub async fn run_plain(&self, state: AgentState, cancel: &CancellationToken) -> LoopOutcome {
        self.answer_plainly(LoopOutcome::new(state), None, cancel).await
    }

    /// Search once with the objective, then answer plainly with the results.
    /// A failed search degrades to a plain answer.
    pub async fn run_augmented(
        &self,
        state: AgentState,
        cancel: &CancellationToken,
    ) -> LoopOutcome {
        let deadline = self.deadline(&state);
        let mut out = LoopOutcome::new(state);

        let proposal = search_proposal(&out.state.goal.primary_objective);

        let observation = match self
            .guard(deadline, cancel, self.dispatcher.dispatch(&proposal, cancel))
            .await
        {
            Ok(obs) => obs,
            Err(e) => {
                out.fail(e);
                return out;
            }
        };

        let usable = matches!(
            &observation,
            Observation::SearchResult { results, .. } if !results.is_empty()
        );
        if let Some(cause) = observation.error_cause() {
            warn!(cause = %cause, "Automatic search failed, answering without it");
            out.error_causes.push(cause);
        }
        out.state.record(HistoryStep::Action { proposal });
        out.state.record(HistoryStep::Observation {
            intent: Intent::Search,
            observation,
        });
        out.auto_searched = usable;

        let note = usable.then_some(AUTO_SEARCH_NOTE);
        self.answer_plainly(out, note, cancel).await
    }

    async fn answer_plainly(
        &self,
        mut out: LoopOutcome,
        note: Option<&str>,
        cancel: &CancellationToken,
    ) -> LoopOutcome {
        let deadline = self.deadline(&out.state);
        out.state.transition(LoopState::Reason);
        self.emit_reasoning(&out.state, None);

        match self
            .guard(deadline, cancel, self.reasoning.plain_answer(&out.state, note))
            .await
        {
            Ok(Ok(answer)) => {
                out.answer = Some(answer);
                out.state.transition(LoopState::Done);
            }
            Ok(Err(e)) => out.fail(RunError::Completion {
                message: e.to_string(),
            }),
            Err(e) => out.fail(e),
        }
        out
    }

    fn emit_reasoning(&self, state: &AgentState, proposed: Option<Intent>) {
        self.emit(DomainEvent::ReasoningStep {
            run_id: state.run_id.clone(),
            iteration: state.iteration,
            proposed,
            timestamp: Utc::now(),
        });
    }
}

/// Build the search proposal used by the real-time augmentation.
pub fn search_proposal(query: &str) -> ActionProposal {
    let mut parameters = Map::new();
    parameters.insert("query".into(), Value::String(query.to_string()));
    ActionProposal::new(Intent::Search, parameters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goal::understand;
    use crate::test_helpers::{
        ScriptedProvider, StubCapability, make_text_response, make_tool_call_response,
    };
    use forager_config::AgentConfig;
    use forager_core::error::{ProviderError, ToolError};
    use forager_core::tool::CapabilityRegistry;
    use std::sync::Arc;

    fn generator(
        provider: Arc<ScriptedProvider>,
        registry: &CapabilityRegistry,
    ) -> ReasoningStepGenerator {
        let settings = AgentConfig {
            completion_backoff_ms: 10,
            completion_backoff_cap_ms: 20,
            ..AgentConfig::default()
        };
        ReasoningStepGenerator::new(provider, "mock-model", settings)
            .with_tools(registry.definitions())
    }

    fn state(text: &str) -> AgentState {
        AgentState::new("run-test", understand(text, &[]), vec![])
    }

    fn always_search() -> Arc<ScriptedProvider> {
        Arc::new(ScriptedProvider::repeating(Ok(make_tool_call_response(
            "search",
            serde_json::json!({"query": "silver"}),
            "I need fresh data.",
        ))))
    }

    #[tokio::test]
    async fn answer_on_first_step_is_done() {
        let registry = CapabilityRegistry::new();
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(make_text_response("Paris."))]));
        let reasoning = generator(provider, &registry);
        let dispatcher = ToolDispatcher::new(registry);

        let out = LoopController::new(&reasoning, &dispatcher)
            .run(state("What is the capital of France?"), &CancellationToken::new())
            .await;

        assert_eq!(out.terminal(), LoopState::Done);
        assert_eq!(out.answer.as_deref(), Some("Paris."));
        assert!(!out.used_fallback);
        assert_eq!(out.state.iteration, 1);
    }

    #[tokio::test]
    async fn always_acting_model_fails_after_max_plus_one_reason_entries() {
        let stub = Arc::new(StubCapability::search_ok());
        let registry = CapabilityRegistry::new().with(stub.clone());
        let provider = always_search();
        let reasoning = generator(provider.clone(), &registry);
        let dispatcher = ToolDispatcher::new(registry);

        let out = LoopController::new(&reasoning, &dispatcher)
            .with_max_iterations(3)
            .run(state("search for silver"), &CancellationToken::new())
            .await;

        assert_eq!(out.terminal(), LoopState::Failed);
        assert_eq!(out.error, Some(RunError::IterationBudget { max: 3 }));
        assert_eq!(out.state.reason_entries(), 4);
        assert_eq!(provider.call_count(), 3);
        assert_eq!(stub.call_count(), 3);
        assert!(out.state.budget_exceeded);
        assert!(out.used_fallback);
        assert_eq!(out.fallback_reason, Some(FallbackReason::IterationBudget));
    }

    #[tokio::test]
    async fn transient_tool_is_retried_then_falls_back() {
        let stub = Arc::new(StubCapability::failing(
            Intent::Search,
            ToolError::Transport { tool_name: "search".into(), reason: "502".into() },
        ));
        let registry = CapabilityRegistry::new().with(stub.clone());
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(make_tool_call_response("search", serde_json::json!({"query": "silver"}), "")),
            Ok(make_text_response("I can't check live prices right now.")),
        ]));
        let reasoning = generator(provider.clone(), &registry);
        let dispatcher = ToolDispatcher::new(registry);

        let out = LoopController::new(&reasoning, &dispatcher)
            .with_policy(SelfCorrectionPolicy::new(2))
            .run(state("search for silver"), &CancellationToken::new())
            .await;

        assert_eq!(out.retries, 2);
        assert_eq!(stub.call_count(), 3);
        assert_eq!(out.terminal(), LoopState::Done);
        assert!(out.used_fallback);
        assert_eq!(out.fallback_reason, Some(FallbackReason::RetriesExhausted));
        assert_eq!(out.error_causes, vec![ToolErrorCause::Transport; 3]);
        assert_eq!(out.answer.as_deref(), Some("I can't check live prices right now."));
        assert_eq!(provider.call_count(), 2);

        let attempts: Vec<u32> = out
            .state
            .history
            .iter()
            .filter_map(|s| match s {
                HistoryStep::Action { proposal } => {
                    assert_eq!(proposal.intent, Intent::Search);
                    Some(proposal.attempt)
                }
                _ => None,
            })
            .collect();
        assert_eq!(attempts, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn invalid_parameters_are_repaired() {
        let stub = Arc::new(StubCapability::search_ok());
        let registry = CapabilityRegistry::new().with(stub.clone());
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(make_tool_call_response("search", serde_json::json!({"q": "silver"}), "")),
            Ok(make_text_response(r#"{"query": "silver price"}"#)),
            Ok(make_text_response("Silver is $31.20.")),
        ]));
        let reasoning = generator(provider, &registry);
        let dispatcher = ToolDispatcher::new(registry);

        let out = LoopController::new(&reasoning, &dispatcher)
            .run(state("search for silver"), &CancellationToken::new())
            .await;

        assert_eq!(out.terminal(), LoopState::Done);
        assert!(!out.used_fallback);
        assert_eq!(out.retries, 1);
        assert_eq!(stub.call_count(), 1);
        assert_eq!(out.error_causes, vec![ToolErrorCause::InvalidParameters]);
        assert_eq!(out.state.successful_observations().len(), 1);
    }

    #[tokio::test]
    async fn unavailable_tool_escalates_to_plain_answer() {
        let registry = CapabilityRegistry::new();
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(make_tool_call_response("code", serde_json::json!({"code": "print(1)"}), "")),
            Ok(make_text_response("It prints 1.")),
        ]));
        let reasoning = generator(provider, &registry);
        let dispatcher = ToolDispatcher::new(registry);

        let out = LoopController::new(&reasoning, &dispatcher)
            .run(state("run this code"), &CancellationToken::new())
            .await;

        assert_eq!(out.terminal(), LoopState::Done);
        assert_eq!(out.escalations.len(), 1);
        assert_eq!(out.escalations[0].from, Intent::Code);
        assert_eq!(out.retries, 0);
        assert_eq!(out.fallback_reason, Some(FallbackReason::ToolUnavailable));
        assert_eq!(out.answer.as_deref(), Some("It prints 1."));
    }

    #[tokio::test]
    async fn rejection_goes_back_to_reasoning() {
        let stub = Arc::new(StubCapability::failing(
            Intent::Search,
            ToolError::Rejected { tool_name: "search".into(), reason: "blocked".into() },
        ));
        let registry = CapabilityRegistry::new().with(stub);
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(make_tool_call_response("search", serde_json::json!({"query": "x"}), "")),
            Ok(make_text_response("That search isn't allowed.")),
        ]));
        let reasoning = generator(provider, &registry);
        let dispatcher = ToolDispatcher::new(registry);

        let out = LoopController::new(&reasoning, &dispatcher)
            .run(state("search for x"), &CancellationToken::new())
            .await;

        assert_eq!(out.terminal(), LoopState::Done);
        assert!(!out.used_fallback);
        assert_eq!(out.error_causes, vec![ToolErrorCause::Rejected]);
        assert!(!out.state.transitions.iter().any(|t| t.to == LoopState::Correct));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_mid_act_ends_the_run() {
        let stub = Arc::new(StubCapability::search_ok().with_delay(Duration::from_secs(60)));
        let registry = CapabilityRegistry::new().with(stub);
        let reasoning = generator(always_search(), &registry);
        let dispatcher = ToolDispatcher::new(registry);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let out = LoopController::new(&reasoning, &dispatcher)
            .run(state("search for silver"), &cancel)
            .await;

        assert!(started.elapsed() < dispatcher.timeout_for(Intent::Search));
        assert_eq!(out.terminal(), LoopState::Failed);
        assert_eq!(out.error, Some(RunError::Cancelled));
        assert_eq!(out.fallback_reason, Some(FallbackReason::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn wall_clock_budget_drops_in_flight_call() {
        let stub = Arc::new(StubCapability::search_ok().with_delay(Duration::from_secs(25)));
        let registry = CapabilityRegistry::new().with(stub);
        let reasoning = generator(always_search(), &registry);
        let timeouts =
            std::collections::HashMap::from([(Intent::Search, Duration::from_secs(30))]);
        let dispatcher = ToolDispatcher::new(registry).with_timeouts(timeouts);

        let started = Instant::now();
        let out = LoopController::new(&reasoning, &dispatcher)
            .with_wall_clock(Duration::from_secs(10))
            .run(state("search for silver"), &CancellationToken::new())
            .await;

        assert_eq!(out.error, Some(RunError::WallClock { secs: 10 }));
        assert!(out.state.budget_exceeded);
        assert!(started.elapsed() < Duration::from_secs(11));
    }

    #[tokio::test]
    async fn completion_failure_fails_the_run() {
        let registry = CapabilityRegistry::new();
        let provider = Arc::new(ScriptedProvider::repeating(Err(
            ProviderError::AuthenticationFailed("bad key".into()),
        )));
        let reasoning = generator(provider, &registry);
        let dispatcher = ToolDispatcher::new(registry);

        let out = LoopController::new(&reasoning, &dispatcher)
            .run(state("hello"), &CancellationToken::new())
            .await;

        assert_eq!(out.terminal(), LoopState::Failed);
        assert!(matches!(out.error, Some(RunError::Completion { .. })));
        assert_eq!(out.fallback_reason, Some(FallbackReason::CompletionFailed));
    }

    #[tokio::test]
    async fn events_trace_the_run() {
        let stub = Arc::new(StubCapability::search_ok());
        let registry = CapabilityRegistry::new().with(stub);
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(make_tool_call_response("search", serde_json::json!({"query": "silver"}), "")),
            Ok(make_text_response("Done.")),
        ]));
        let reasoning = generator(provider, &registry);
        let dispatcher = ToolDispatcher::new(registry);
        let bus = EventBus::new(32);
        let mut rx = bus.subscribe();

        LoopController::new(&reasoning, &dispatcher)
            .with_events(&bus)
            .run(state("search for silver"), &CancellationToken::new())
            .await;

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(match event.as_ref() {
                DomainEvent::ReasoningStep { .. } => "reason",
                DomainEvent::ToolDispatched { .. } => "tool",
                _ => "other",
            });
        }
        assert_eq!(kinds, vec!["reason", "tool", "reason"]);
    }

    #[tokio::test]
    async fn augmented_run_searches_once_then_answers() {
        let stub = Arc::new(StubCapability::search_ok());
        let registry = CapabilityRegistry::new().with(stub.clone());
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(make_text_response(
            "Silver trades at $31.20.",
        ))]));
        let reasoning = generator(provider.clone(), &registry);
        let dispatcher = ToolDispatcher::new(registry);

        let out = LoopController::new(&reasoning, &dispatcher)
            .run_augmented(state("What's the silver price today?"), &CancellationToken::new())
            .await;

        assert!(out.auto_searched);
        assert_eq!(stub.call_count(), 1);
        assert_eq!(out.terminal(), LoopState::Done);
        let sent = &provider.requests()[0];
        assert!(sent.tools.is_empty());
        assert!(sent.messages[0].content.contains("$31.20"));
    }

    #[tokio::test]
    async fn failed_augmentation_degrades_to_plain() {
        let registry = CapabilityRegistry::new();
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(make_text_response("No idea."))]));
        let reasoning = generator(provider, &registry);
        let dispatcher = ToolDispatcher::new(registry);

        let out = LoopController::new(&reasoning, &dispatcher)
            .run_augmented(state("weather today"), &CancellationToken::new())
            .await;

        assert!(!out.auto_searched);
        assert_eq!(out.terminal(), LoopState::Done);
        assert_eq!(out.error_causes, vec![ToolErrorCause::Unavailable]);
        assert_eq!(out.answer.as_deref(), Some("No idea."));
    }
}
