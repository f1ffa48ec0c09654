//! Result formatter — the outbound contract of a run.
//!
//! Terminal answers are joined with the artifacts the tools produced.
//! Failures become a short natural-language explanation; iteration counts
//! and error causes go to [`RunMetadata`] only, never into the prose.

use forager_core::intent::Intent;
use forager_core::memory::MemoryProposal;
use forager_core::observation::{CodeOutcome, Observation, ToolErrorCause};
use serde::{Deserialize, Serialize};

use crate::error::RunError;
use crate::state::{LoopState, Transition};

/// Badge for the real-time search augmentation.
pub const AUTO_SEARCH_BADGE: &str = "auto-web-search";

/// Why a run ended on a fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    RetriesExhausted,
    ToolUnavailable,
    IterationBudget,
    WallClock,
    CompletionFailed,
    Cancelled,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RetriesExhausted => "retries_exhausted",
            Self::ToolUnavailable => "tool_unavailable",
            Self::IterationBudget => "iteration_budget",
            Self::WallClock => "wall_clock",
            Self::CompletionFailed => "completion_failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_run_error(error: &RunError) -> Self {
        match error {
            RunError::IterationBudget { .. } => Self::IterationBudget,
            RunError::WallClock { .. } => Self::WallClock,
            RunError::Completion { .. } => Self::CompletionFailed,
            RunError::Cancelled => Self::Cancelled,
        }
    }

    fn explanation(&self) -> &'static str {
        match self {
            Self::IterationBudget | Self::WallClock => {
                "I couldn't finish working on this in the time I had. Try asking again, or narrow the request a little."
            }
            Self::CompletionFailed => {
                "I couldn't reach the language model just now, so I can't answer yet. Please try again in a moment."
            }
            Self::Cancelled => "The request was cancelled before I could finish.",
            Self::RetriesExhausted | Self::ToolUnavailable => {
                "The tool I needed isn't working right now, so I couldn't complete this. Please try again later."
            }
        }
    }
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool that contributed to the result, with its UI badge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolUsage {
    pub intent: Intent,
    pub badge: String,
}

impl ToolUsage {
    pub fn for_intent(intent: Intent) -> Option<Self> {
        intent.badge().map(|badge| Self {
            intent,
            badge: badge.to_string(),
        })
    }
}

/// A self-correction step that left the tool class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Escalation {
    pub from: Intent,
    pub cause: ToolErrorCause,
    pub iteration: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub mode: String,
    pub transitions: Vec<Transition>,
    pub error_causes: Vec<ToolErrorCause>,
    pub escalations: Vec<Escalation>,
    pub retries: u32,
    pub elapsed_ms: u64,
}

/// What a run hands back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub content: String,
    pub tools_used: Vec<ToolUsage>,
    pub used_fallback: bool,
    pub fallback_reason: Option<FallbackReason>,
    pub iterations: u32,
    pub memory_proposals: Vec<MemoryProposal>,
    pub metadata: RunMetadata,
}

/// Everything the formatter needs from a finished loop.
#[derive(Debug, Clone)]
pub struct FormatInput<'a> {
    pub terminal: LoopState,
    pub answer: Option<&'a str>,
    pub observations: Vec<(Intent, &'a Observation)>,
    pub fallback_reason: Option<FallbackReason>,
}

fn cited(answer: &str, url: &str) -> bool {
    answer.contains(url)
}

fn artifacts(answer: &str, observations: &[(Intent, &Observation)]) -> Vec<String> {
    let mut out = Vec::new();
    let mut sources: Vec<String> = Vec::new();

    for (_, obs) in observations {
        match obs {
            Observation::ImageResult { prompt, urls, .. } => {
                for (i, url) in urls.iter().enumerate() {
                    if !cited(answer, url) {
                        out.push(format!("![{prompt} {}]({url})", i + 1));
                    }
                }
            }
            Observation::DocumentResult { content, .. } => {
                if !answer.contains(content.trim()) {
                    out.push(content.trim().to_string());
                }
            }
            Observation::CodeResult { language, code, outcome } => {
                let result = match outcome {
                    CodeOutcome::Output(o) => format!("Output:\n```\n{o}\n```"),
                    CodeOutcome::Error(e) => format!("Error:\n```\n{e}\n```"),
                };
                out.push(format!("```{language}\n{code}\n```\n{result}"));
            }
            Observation::SearchResult { results, .. } => {
                for hit in results.iter().take(5) {
                    if !cited(answer, &hit.url) && !sources.iter().any(|s| s.contains(&hit.url)) {
                        let title = if hit.title.is_empty() { &hit.url } else { &hit.title };
                        sources.push(format!("- [{title}]({})", hit.url));
                    }
                }
            }
            Observation::ToolError { .. } => {}
        }
    }

    if !sources.is_empty() {
        out.push(format!("Sources:\n{}", sources.join("\n")));
    }
    out
}

fn partial_findings(observations: &[(Intent, &Observation)]) -> Option<String> {
    let lines: Vec<String> = observations
        .iter()
        .filter_map(|(_, obs)| match obs {
            Observation::SearchResult { results, .. } => results
                .first()
                .map(|hit| format!("- {}: {} ({})", hit.title, hit.snippet, hit.url)),
            Observation::ImageResult { urls, .. } => {
                Some(format!("- Generated {} image(s).", urls.len()))
            }
            Observation::DocumentResult { title, .. } => Some(format!("- Drafted \"{title}\".")),
            Observation::CodeResult { outcome: CodeOutcome::Output(o), .. } => {
                Some(format!("- Program output: {}", o.lines().next().unwrap_or_default()))
            }
            _ => None,
        })
        .collect();
    (!lines.is_empty())
        .then(|| format!("Here is what I found before stopping:\n{}", lines.join("\n")))
}

/// Render the user-facing content of a run.
pub fn render_content(input: &FormatInput<'_>) -> String {
    let answer = input.answer.map(str::trim).filter(|a| !a.is_empty());

    // a failed run may still carry the best partial answer
    let Some(answer) = answer else {
        let reason = input.fallback_reason.unwrap_or(match input.terminal {
            LoopState::Failed => FallbackReason::CompletionFailed,
            _ => FallbackReason::RetriesExhausted,
        });
        let mut sections = vec![reason.explanation().to_string()];
        sections.extend(partial_findings(&input.observations));
        return sections.join("\n\n");
    };

    let mut sections = vec![answer.to_string()];
    sections.extend(artifacts(answer, &input.observations));
    sections.join("\n\n")
}

/// Distinct tools that produced a usable observation, in first-use order.
pub fn tools_used(observations: &[(Intent, &Observation)]) -> Vec<ToolUsage> {
    let mut out: Vec<ToolUsage> = Vec::new();
    for (intent, _) in observations {
        if out.iter().any(|u| u.intent == *intent) {
            continue;
        }
        if let Some(usage) = ToolUsage::for_intent(*intent) {
            out.push(usage);
        }
    }
    out
}
