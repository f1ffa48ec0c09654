//! Observations — the normalized outcome of one tool invocation.

use serde::{Deserialize, Serialize};

/// A single web search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Why a tool invocation failed, as seen by the self-correction policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorCause {
    /// Parameters failed schema validation or were rejected as malformed.
    InvalidParameters,
    /// The call exceeded its timeout.
    Timeout,
    /// Network or server failure on the way to the tool.
    Transport,
    /// The tool understood the request and refused it.
    Rejected,
    /// No capability is registered (or enabled) for the intent.
    Unavailable,
}

impl ToolErrorCause {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Transport)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidParameters => "invalid_parameters",
            Self::Timeout => "timeout",
            Self::Transport => "transport",
            Self::Rejected => "rejected",
            Self::Unavailable => "unavailable",
        }
    }
}

impl std::fmt::Display for ToolErrorCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of running a program: a failing program is data, not a tool failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeOutcome {
    Output(String),
    Error(String),
}

/// The normalized result (success or error) of one tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Observation {
    SearchResult {
        query: String,
        results: Vec<SearchHit>,
    },
    ImageResult {
        prompt: String,
        urls: Vec<String>,
        model: String,
    },
    DocumentResult {
        title: String,
        content: String,
        format: String,
    },
    CodeResult {
        language: String,
        code: String,
        outcome: CodeOutcome,
    },
    ToolError {
        cause: ToolErrorCause,
        message: String,
        retryable: bool,
    },
}

impl Observation {
    pub fn tool_error(cause: ToolErrorCause, message: impl Into<String>) -> Self {
        Observation::ToolError {
            cause,
            message: message.into(),
            retryable: cause.is_retryable(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Observation::ToolError { .. })
    }

    /// The error cause, if this observation is a tool error.
    pub fn error_cause(&self) -> Option<ToolErrorCause> {
        match self {
            Observation::ToolError { cause, .. } => Some(*cause),
            _ => None,
        }
    }

    /// Compact text rendering fed back to the reasoning step.
    pub fn summarize(&self, max_chars: usize) -> String {
        let text = match self {
            Observation::SearchResult { query, results } => {
                if results.is_empty() {
                    format!("Search for \"{query}\" returned no results.")
                } else {
                    let mut out = format!("Search results for \"{query}\":");
                    for (i, hit) in results.iter().enumerate() {
                        out.push_str(&format!(
                            "\n[{}] {} ({}) — {}",
                            i + 1,
                            hit.title,
                            hit.url,
                            hit.snippet
                        ));
                    }
                    out
                }
            }
            Observation::ImageResult { prompt, urls, model } => format!(
                "Generated {} image(s) for \"{prompt}\" with {model}: {}",
                urls.len(),
                urls.join(", ")
            ),
            Observation::DocumentResult { title, content, format } => {
                format!("Drafted {format} document \"{title}\" ({} chars).", content.len())
            }
            Observation::CodeResult { language, outcome, .. } => match outcome {
                CodeOutcome::Output(out) => format!("{language} program output:\n{out}"),
                CodeOutcome::Error(err) => format!("{language} program failed:\n{err}"),
            },
            Observation::ToolError { cause, message, .. } => {
                format!("Tool error ({cause}): {message}")
            }
        };
        truncate_chars(&text, max_chars)
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push('…');
    out
}
