//! Terminal failure reasons of a run.
//!
//! None of these reach the end user verbatim. The formatter turns them into
//! a short explanation and records the reason in the result metadata.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunError {
    #[error("iteration budget of {max} exhausted")]
    IterationBudget { max: u32 },

    #[error("wall-clock budget of {secs}s exhausted")]
    WallClock { secs: u64 },

    #[error("completion service failed: {message}")]
    Completion { message: String },

    #[error("run cancelled")]
    Cancelled,
}

impl RunError {
    pub fn is_budget(&self) -> bool {
        matches!(self, Self::IterationBudget { .. } | Self::WallClock { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_errors_are_flagged() {
        assert!(RunError::IterationBudget { max: 5 }.is_budget());
        assert!(RunError::WallClock { secs: 90 }.is_budget());
        assert!(!RunError::Cancelled.is_budget());
    }

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_value(RunError::Cancelled).unwrap();
        assert_eq!(json["kind"], "cancelled");
    }
}
