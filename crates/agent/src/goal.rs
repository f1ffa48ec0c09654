//! Goal understanding.
//!
//! Derives what the user wants from the request and the recent
//! conversation. Real-time detection runs independently of intent matching:
//! a request can need live data without naming any tool.

use forager_core::intent::Intent;
use forager_core::message::{Message, Role};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::LazyLock;

use crate::intent::classify;

/// Kinds of live data a request may depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RealtimeSignal {
    Price,
    News,
    Weather,
    Sports,
    Time,
}

/// The interpreted request. Built once per run and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub raw_text: String,
    pub primary_objective: String,
    pub requires_real_time_data: bool,
    pub matched_intent: Intent,
    pub confidence: f32,
    pub parameters: Map<String, Value>,
    pub realtime_signals: Vec<RealtimeSignal>,
}

impl Goal {
    pub fn has_tool_intent(&self) -> bool {
        self.matched_intent.is_tool()
    }
}

static REALTIME_PATTERNS: LazyLock<Vec<(RealtimeSignal, Regex)>> = LazyLock::new(|| {
    [
        (
            RealtimeSignal::Price,
            r"(?i)\b(?:price|prices|stock|stocks|share price|exchange rate|bitcoin|btc|ethereum|crypto|gold|silver|oil|market cap|trading at|worth)\b",
        ),
        (
            RealtimeSignal::News,
            r"(?i)\b(?:news|headlines?|breaking|latest|announced|election results?|happening)\b",
        ),
        (
            RealtimeSignal::Weather,
            r"(?i)\b(?:weather|forecast|temperature|raining|rain|snow|sunny|humidity)\b",
        ),
        (
            RealtimeSignal::Sports,
            r"(?i)\b(?:score|scores|match|game|fixture|standings|league table|who won)\b",
        ),
        (
            RealtimeSignal::Time,
            r"(?i)\b(?:today|tonight|tomorrow|yesterday|right now|currently|current|this week|this morning|live)\b",
        ),
    ]
    .into_iter()
    .map(|(signal, pattern)| (signal, Regex::new(pattern).expect("static realtime pattern")))
    .collect()
});

static LEAD_IN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:(?:hey|hi|ok(?:ay)?|so)[,!\s]+)?(?:please\s+|can you\s+|could you\s+|would you\s+|will you\s+|i want you to\s+)+")
        .expect("static lead-in pattern")
});

static FOLLOW_UP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:what about|how about|and what about|what of|and)\s+(.+)$")
        .expect("static follow-up pattern")
});

/// Follow-ups longer than this are treated as standalone requests.
const FOLLOW_UP_MAX_WORDS: usize = 6;

fn clean(text: &str) -> String {
    let trimmed = text.trim();
    let stripped = LEAD_IN.replace(trimmed, "");
    let had_lead_in = stripped.len() != trimmed.len();
    let out = stripped.trim().trim_end_matches(['?', '.', '!', ' ']);

    // lead-in removed: restore a capital letter
    let mut chars = out.chars();
    match chars.next() {
        Some(first) if had_lead_in => first.to_uppercase().chain(chars).collect(),
        _ => out.to_string(),
    }
}

fn previous_user_message(history: &[Message]) -> Option<&str> {
    history
        .iter()
        .rev()
        .find(|m| m.role == Role::User && !m.content.trim().is_empty())
        .map(|m| m.content.as_str())
}

/// Resolve a short referential follow-up against the previous user turn.
fn resolve_follow_up(objective: &str, history: &[Message]) -> Option<String> {
    if objective.split_whitespace().count() > FOLLOW_UP_MAX_WORDS {
        return None;
    }
    let caps = FOLLOW_UP.captures(objective)?;
    let previous = clean(previous_user_message(history)?);
    Some(format!("{previous} ({})", caps[1].trim()))
}

/// Which live-data detectors fire for `text`.
pub fn realtime_signals(text: &str) -> Vec<RealtimeSignal> {
    REALTIME_PATTERNS
        .iter()
        .filter(|(_, pattern)| pattern.is_match(text))
        .map(|(signal, _)| *signal)
        .collect()
}

/// Build the goal for one request.
pub fn understand(raw_text: &str, recent_history: &[Message]) -> Goal {
    let cleaned = clean(raw_text);
    let primary_objective =
        resolve_follow_up(&cleaned, recent_history).unwrap_or(cleaned);

    let signals = realtime_signals(&primary_objective);
    let classification = classify(&primary_objective);

    Goal {
        raw_text: raw_text.to_string(),
        requires_real_time_data: !signals.is_empty(),
        realtime_signals: signals,
        matched_intent: classification.intent,
        confidence: classification.confidence,
        parameters: classification.parameters,
        primary_objective,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lead_ins_and_punctuation_are_stripped() {
        let goal = understand("Could you please explain how tides work?", &[]);
        assert_eq!(goal.primary_objective, "Explain how tides work");
        assert_eq!(goal.raw_text, "Could you please explain how tides work?");
    }

    #[test]
    fn realtime_is_orthogonal_to_intent() {
        let goal = understand("What's the weather in Oslo today?", &[]);
        assert!(goal.requires_real_time_data);
        assert_eq!(goal.matched_intent, Intent::None);
        assert_eq!(goal.confidence, 0.0);
        assert!(goal.realtime_signals.contains(&RealtimeSignal::Weather));
        assert!(goal.realtime_signals.contains(&RealtimeSignal::Time));

        let goal = understand("draw a picture of a sunset", &[]);
        assert!(!goal.requires_real_time_data);
        assert_eq!(goal.matched_intent, Intent::ImageSingle);
    }

    #[test]
    fn silver_price_search_is_realtime() {
        let goal = understand("search for today's silver price", &[]);
        assert!(goal.requires_real_time_data);
        assert_eq!(goal.matched_intent, Intent::Search);
        assert_eq!(goal.parameters["query"], "today's silver price");
    }

    #[test]
    fn follow_up_resolves_against_previous_user_turn() {
        let history = vec![
            Message::user("What's the weather in London?"),
            Message::assistant("Cloudy, 14°C."),
        ];
        let goal = understand("and in Paris?", &history);
        assert_eq!(goal.primary_objective, "What's the weather in London (in Paris)");
        assert!(goal.requires_real_time_data);
    }

    #[test]
    fn follow_up_without_history_stays_literal() {
        let goal = understand("what about tomorrow?", &[]);
        assert_eq!(goal.primary_objective, "what about tomorrow");
    }

    #[test]
    fn long_messages_are_not_follow_ups() {
        let history = vec![Message::user("Tell me about Lisbon")];
        let goal = understand(
            "and now explain the history of the printing press in Europe",
            &history,
        );
        assert!(!goal.primary_objective.contains("Lisbon"));
    }

    #[test]
    fn plain_question_needs_nothing() {
        let goal = understand("What is the capital of France?", &[]);
        assert!(!goal.requires_real_time_data);
        assert!(!goal.has_tool_intent());
    }
}
