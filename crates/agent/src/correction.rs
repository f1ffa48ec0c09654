//! Self-correction policy after a failed tool call.

use forager_core::observation::ToolErrorCause;
use serde::{Deserialize, Serialize};

/// What to do about a failed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionDecision {
    /// Same tool, same parameters.
    RetrySame,
    /// Same tool, parameters regenerated by the reasoning step.
    RepairParameters,
    /// Leave the tool class and answer with a plain completion.
    Escalate,
    /// Stop trying and fall back.
    GiveUp,
}

impl CorrectionDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RetrySame => "retry_same",
            Self::RepairParameters => "repair_parameters",
            Self::Escalate => "escalate",
            Self::GiveUp => "give_up",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SelfCorrectionPolicy {
    pub max_retries_per_action: u32,
}

impl Default for SelfCorrectionPolicy {
    fn default() -> Self {
        Self {
            max_retries_per_action: 2,
        }
    }
}

impl SelfCorrectionPolicy {
    pub fn new(max_retries_per_action: u32) -> Self {
        Self {
            max_retries_per_action,
        }
    }

    /// Whether an error of this cause goes to CORRECT rather than back to REASON.
    pub fn needs_correction(cause: ToolErrorCause) -> bool {
        !matches!(cause, ToolErrorCause::Rejected)
    }

    /// Decide for the failed `attempt` (1-based) of an action.
    ///
    /// An attempt number above `max_retries_per_action` gives up regardless
    /// of cause, so a permanently transient tool runs `max + 1` times.
    pub fn decide(&self, cause: ToolErrorCause, attempt: u32) -> CorrectionDecision {
        if attempt > self.max_retries_per_action {
            return CorrectionDecision::GiveUp;
        }
        match cause {
            ToolErrorCause::Timeout | ToolErrorCause::Transport => CorrectionDecision::RetrySame,
            ToolErrorCause::InvalidParameters => CorrectionDecision::RepairParameters,
            ToolErrorCause::Unavailable => CorrectionDecision::Escalate,
            // never routed here by the controller
            ToolErrorCause::Rejected => CorrectionDecision::GiveUp,
        }
    }
}
