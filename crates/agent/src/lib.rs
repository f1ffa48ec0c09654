//! The Forager agent core — a reason/act/observe loop over injected
//! collaborators.
//!
//! A run moves through:
//!
//! 1. **Understand** the request: objective, real-time need, tool intent
//! 2. **Recall** the user's memories, once
//! 3. **Reason** with the model: answer directly, or propose an action
//! 4. **Act** through the dispatcher and **observe** the result
//! 5. **Correct** failed actions: retry, repair parameters, or fall back
//! 6. **Format** the answer and the tool artifacts into an [`AgentResult`]
//!
//! The loop ends on an answer, on a spent iteration or wall-clock budget,
//! or on cancellation. The core persists nothing: memory proposals travel
//! out in the result and the caller commits them.

pub mod agent;
pub mod controller;
pub mod correction;
pub mod dispatcher;
pub mod error;
pub mod formatter;
pub mod goal;
pub mod intent;
pub mod memory;
pub mod observation;
pub mod prompt;
pub mod reasoning;
pub mod state;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use agent::{Agent, RunMode};
pub use controller::{LoopController, LoopOutcome};
pub use correction::{CorrectionDecision, SelfCorrectionPolicy};
pub use dispatcher::ToolDispatcher;
pub use error::RunError;
pub use formatter::{AgentResult, Escalation, FallbackReason, RunMetadata, ToolUsage};
pub use goal::{Goal, RealtimeSignal, understand};
pub use intent::{Classification, classify};
pub use memory::{commit_proposals, propose_memories, recall};
pub use observation::ObservationBuilder;
pub use reasoning::{ReasoningStep, ReasoningStepGenerator};
pub use state::{ActionProposal, AgentState, HistoryStep, LoopState, Transition};
