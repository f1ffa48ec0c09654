//! Per-run agent state — owned and mutated by the loop controller alone.

use forager_core::intent::Intent;
use forager_core::memory::MemoryEntry;
use forager_core::observation::Observation;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::time::Instant;

use crate::goal::Goal;

/// States of the reasoning loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Init,
    Reason,
    Act,
    Observe,
    Correct,
    Done,
    Failed,
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// One recorded state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: LoopState,
    pub to: LoopState,
    pub iteration: u32,
}

/// A tool invocation the reasoning step asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionProposal {
    pub intent: Intent,
    pub parameters: Map<String, Value>,
    /// 1 for the first try, incremented by every retry or repair.
    pub attempt: u32,
}

impl ActionProposal {
    pub fn new(intent: Intent, parameters: Map<String, Value>) -> Self {
        Self {
            intent,
            parameters,
            attempt: 1,
        }
    }

    /// Same tool, same parameters, next attempt.
    pub fn retry(&self) -> Self {
        Self {
            intent: self.intent,
            parameters: self.parameters.clone(),
            attempt: self.attempt + 1,
        }
    }

    /// Same tool, new parameters, next attempt.
    pub fn repaired(&self, parameters: Map<String, Value>) -> Self {
        Self {
            intent: self.intent,
            parameters,
            attempt: self.attempt + 1,
        }
    }

    pub fn arguments(&self) -> Value {
        Value::Object(self.parameters.clone())
    }
}

/// One entry of the reasoning trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryStep {
    Thought { text: String },
    Action { proposal: ActionProposal },
    Observation { intent: Intent, observation: Observation },
}

/// Everything one run knows about itself.
#[derive(Debug, Clone)]
pub struct AgentState {
    pub run_id: String,
    pub goal: Goal,
    pub memories: Vec<MemoryEntry>,
    pub history: Vec<HistoryStep>,
    /// Number of REASON entries so far.
    pub iteration: u32,
    pub started_at: Instant,
    pub budget_exceeded: bool,
    pub state: LoopState,
    pub transitions: Vec<Transition>,
}

impl AgentState {
    pub fn new(run_id: impl Into<String>, goal: Goal, memories: Vec<MemoryEntry>) -> Self {
        Self {
            run_id: run_id.into(),
            goal,
            memories,
            history: Vec::new(),
            iteration: 0,
            started_at: Instant::now(),
            budget_exceeded: false,
            state: LoopState::Init,
            transitions: Vec::new(),
        }
    }

    /// Move to `to`, recording the transition. Entering REASON counts an iteration.
    pub fn transition(&mut self, to: LoopState) {
        if to == LoopState::Reason {
            self.iteration += 1;
        }
        self.transitions.push(Transition {
            from: self.state,
            to,
            iteration: self.iteration,
        });
        self.state = to;
    }

    pub fn record(&mut self, step: HistoryStep) {
        self.history.push(step);
    }

    /// The last `k` trace entries, oldest first.
    pub fn recent(&self, k: usize) -> &[HistoryStep] {
        let start = self.history.len().saturating_sub(k);
        &self.history[start..]
    }

    /// Successful observations in trace order.
    pub fn successful_observations(&self) -> Vec<(Intent, &Observation)> {
        self.history
            .iter()
            .filter_map(|step| match step {
                HistoryStep::Observation { intent, observation } if !observation.is_error() => {
                    Some((*intent, observation))
                }
                _ => None,
            })
            .collect()
    }

    /// Count of REASON entries recorded in the transition trace.
    pub fn reason_entries(&self) -> usize {
        self.transitions
            .iter()
            .filter(|t| t.to == LoopState::Reason)
            .count()
    }
}
