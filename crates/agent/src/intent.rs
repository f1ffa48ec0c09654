//! Intent classifier — deterministic, pattern-based tool routing.
//!
//! Each tool intent owns a set of case-insensitive patterns. Intents are
//! tried in the fixed [`Intent::PRIORITY`] order and the first one with any
//! matching pattern wins; confidence is 1.0 on a match and 0.0 otherwise.
//! After a match, intent-specific extractors pull out the parameters the
//! tool will most likely need.

use forager_core::intent::Intent;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::LazyLock;

/// Images per batch request when the user names no count.
pub const DEFAULT_BATCH_COUNT: u64 = 4;
/// Upper bound on images per batch request.
pub const MAX_BATCH_COUNT: u64 = 4;

/// Outcome of classifying one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,
    pub confidence: f32,
    pub parameters: Map<String, Value>,
}

impl Classification {
    pub fn none() -> Self {
        Self {
            intent: Intent::None,
            confidence: 0.0,
            parameters: Map::new(),
        }
    }

    pub fn is_match(&self) -> bool {
        self.intent.is_tool()
    }
}

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static intent pattern")
}

const IMAGE_NOUNS: &str =
    r"images?|pictures?|pics?|photos?|drawings?|illustrations?|logos?|icons?|artworks?|portraits?|wallpapers?|renders?";

const BATCH_QUANTIFIERS: &str =
    r"\d+|two|three|four|five|six|seven|eight|nine|ten|several|multiple|a few|a batch of";

/// A quantity directly in front of an image noun. `count` holds the quantity.
static BATCH_QUANTITY: LazyLock<Regex> = LazyLock::new(|| {
    re(&format!(
        r"(?i)\b(?P<count>{BATCH_QUANTIFIERS})\s+(?:(?:different|unique|more)\s+)?(?:variations?|variants?|{IMAGE_NOUNS})\b"
    ))
});

static IMAGE_BATCH_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        BATCH_QUANTITY.clone(),
        re(r"(?i)\b(?:generate|create|make|draw|render|give me)\b.{0,40}\bvariations?\s+of\b"),
    ]
});

static IMAGE_SINGLE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        re(&format!(
            r"(?i)\b(?:generate|create|make|draw|paint|render|design|produce|sketch|imagine)\b.{{0,40}}\b(?:{IMAGE_NOUNS}|art)\b"
        )),
        re(r"(?i)^\s*(?:please\s+)?(?:draw|paint|sketch|illustrate)\b"),
        re(r"(?i)\b(?:image|picture|photo|drawing|illustration)\s+of\b"),
    ]
});

static DOCUMENT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        re(r"(?i)\b(?:write|draft|create|prepare|compose|make|produce)\b.{0,40}\b(?:document|doc|report|essay|article|memo|letter|proposal|outline|whitepaper|brief)\b"),
    ]
});

static CODE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        re(r"```"),
        re(r"(?i)\b(?:run|execute|eval(?:uate)?)\b.{0,30}\b(?:code|script|program|snippet|python|javascript|js)\b"),
    ]
});

static SEARCH_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        re(r"(?i)\b(?:search|look\s*up|google|browse)\b"),
        re(r"(?i)\bfind\b.{0,30}\b(?:online|on the web|on the internet)\b"),
        re(r"(?i)\bweb\s+search\b"),
    ]
});

fn patterns_for(intent: Intent) -> &'static [Regex] {
    match intent {
        Intent::ImageBatch => &IMAGE_BATCH_PATTERNS,
        Intent::ImageSingle => &IMAGE_SINGLE_PATTERNS,
        Intent::Document => &DOCUMENT_PATTERNS,
        Intent::Code => &CODE_PATTERNS,
        Intent::Search => &SEARCH_PATTERNS,
        Intent::None => &[],
    }
}

/// Classify a raw request. Never fails; no match is `(None, 0.0)`.
pub fn classify(raw_text: &str) -> Classification {
    let text = raw_text.trim();
    if text.is_empty() {
        return Classification::none();
    }

    for intent in Intent::PRIORITY {
        if patterns_for(intent).iter().any(|p| p.is_match(text)) {
            return Classification {
                intent,
                confidence: 1.0,
                parameters: extract_parameters(intent, text),
            };
        }
    }

    Classification::none()
}

/// Intent-specific parameter extraction.
pub fn extract_parameters(intent: Intent, text: &str) -> Map<String, Value> {
    let mut params = Map::new();
    match intent {
        Intent::ImageSingle => {
            params.insert("prompt".into(), json!(image_prompt(text)));
        }
        Intent::ImageBatch => {
            params.insert("prompt".into(), json!(image_prompt(text)));
            params.insert("count".into(), json!(batch_count(text)));
        }
        Intent::Search => {
            params.insert("query".into(), json!(search_query(text)));
        }
        Intent::Document => {
            let topic = about_capture(text).unwrap_or_else(|| strip_trailing(text));
            let title = quoted(text).unwrap_or_else(|| title_case(&topic));
            params.insert("title".into(), json!(title));
            params.insert("topic".into(), json!(topic));
        }
        Intent::Code => {
            if let Some((language, code)) = fenced_code(text) {
                params.insert("language".into(), json!(language));
                params.insert("code".into(), json!(code));
            } else {
                params.insert("language".into(), json!(code_language(text)));
            }
        }
        Intent::None => {}
    }
    params
}

static QUOTED: LazyLock<Regex> = LazyLock::new(|| re(r#"["“]([^"”]{2,})["”]"#));
static OF_ABOUT: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)\b(?:of|about|on|showing|depicting)\s+(.+)$"));
static ABOUT: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)\b(?:about|on|regarding|covering)\s+(.+)$"));
static SEARCH_LEAD: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)\b(?:search(?:\s+(?:the\s+web|online|the\s+internet))?(?:\s+for)?|look\s*up|google|web\s+search\s+for|browse\s+for|find\s+online)\s+(.+)$")
});
static IMAGE_COMMAND_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    re(&format!(
        r"(?i)\b(?:please|can you|could you|generate|create|make|draw|paint|render|design|produce|sketch|imagine|illustrate|me|an?|\d+|variations?|variants?|{IMAGE_NOUNS})\b"
    ))
});
static FENCED: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?s)```([A-Za-z0-9_+-]*)[ \t]*\r?\n(.*?)```"));

fn strip_trailing(text: &str) -> String {
    text.trim()
        .trim_end_matches(['?', '.', '!', ' ', ',', ';', ':'])
        .to_string()
}

fn quoted(text: &str) -> Option<String> {
    QUOTED
        .captures(text)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
}

fn about_capture(text: &str) -> Option<String> {
    ABOUT
        .captures(text)
        .map(|c| strip_trailing(&c[1]))
        .filter(|s| !s.is_empty())
}

fn image_prompt(text: &str) -> String {
    if let Some(q) = quoted(text) {
        return q;
    }
    if let Some(c) = OF_ABOUT.captures(text) {
        let prompt = strip_trailing(&c[1]);
        if !prompt.is_empty() {
            return prompt;
        }
    }
    let stripped = IMAGE_COMMAND_WORDS.replace_all(text, " ");
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    let prompt = strip_trailing(&collapsed);
    if prompt.is_empty() {
        strip_trailing(text)
    } else {
        prompt
    }
}

/// An explicit quantity; vague ones ("several", "a few") give `None`.
fn quantity(word: &str) -> Option<u64> {
    if let Ok(n) = word.parse::<u64>() {
        return Some(n);
    }
    match word.to_lowercase().as_str() {
        "two" => Some(2),
        "three" => Some(3),
        "four" => Some(4),
        "five" => Some(5),
        "six" => Some(6),
        "seven" => Some(7),
        "eight" => Some(8),
        "nine" => Some(9),
        "ten" => Some(10),
        _ => None,
    }
}

/// The quantity in front of the image noun, default 4, clamped to [1, 4].
pub fn batch_count(text: &str) -> u64 {
    BATCH_QUANTITY
        .captures(text)
        .and_then(|c| quantity(&c["count"]))
        .unwrap_or(DEFAULT_BATCH_COUNT)
        .clamp(1, MAX_BATCH_COUNT)
}

fn search_query(text: &str) -> String {
    SEARCH_LEAD
        .captures(text)
        .map(|c| strip_trailing(&c[1]))
        .filter(|q| !q.is_empty())
        .unwrap_or_else(|| strip_trailing(text))
}

fn fenced_code(text: &str) -> Option<(String, String)> {
    let caps = FENCED.captures(text)?;
    let tag = caps[1].trim().to_lowercase();
    let language = if tag.is_empty() { "python".to_string() } else { tag };
    Some((language, caps[2].trim_end().to_string()))
}

fn code_language(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    if lower.contains("javascript") || lower.contains(" js ") || lower.contains("node") {
        "javascript"
    } else if lower.contains("bash") || lower.contains("shell") {
        "bash"
    } else {
        "python"
    }
}

fn title_case(text: &str) -> String {
    let mut title: String = text
        .split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    if title.chars().count() > 80 {
        title = title.chars().take(80).collect();
    }
    title
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_match_is_none_with_zero_confidence() {
        let c = classify("What is the capital of France?");
        assert_eq!(c.intent, Intent::None);
        assert_eq!(c.confidence, 0.0);
        assert!(c.parameters.is_empty());
        assert!(!c.is_match());
    }

    #[test]
    fn batch_variations_extract_prompt_and_count() {
        let c = classify("generate 4 variations of a cat");
        assert_eq!(c.intent, Intent::ImageBatch);
        assert_eq!(c.confidence, 1.0);
        assert_eq!(c.parameters["prompt"], "a cat");
        assert_eq!(c.parameters["count"], 4);
    }

    #[test]
    fn batch_count_clamps() {
        assert_eq!(batch_count("make 10 images of a fox"), 4);
        assert_eq!(batch_count("make 0 images of a fox"), 1);
        assert_eq!(batch_count("make two pictures of a fox"), 2);
        assert_eq!(batch_count("several images of a fox"), 4);
        assert_eq!(batch_count("generate variations of a fox"), 4);
    }

    #[test]
    fn count_comes_from_the_quantity_before_the_noun() {
        let c = classify("for my 3 kids, make 2 pictures of a dragon");
        assert_eq!(c.intent, Intent::ImageBatch);
        assert_eq!(c.parameters["count"], 2);
        assert_eq!(c.parameters["prompt"], "a dragon");
    }

    #[test]
    fn vague_quantity_ignores_numbers_in_the_prompt() {
        let c = classify("generate several images of one cat");
        assert_eq!(c.intent, Intent::ImageBatch);
        assert_eq!(c.parameters["count"], 4);
        assert_eq!(c.parameters["prompt"], "one cat");
    }

    #[test]
    fn batch_beats_single() {
        let c = classify("draw 3 pictures of a lighthouse at dusk");
        assert_eq!(c.intent, Intent::ImageBatch);
        assert_eq!(c.parameters["count"], 3);
        assert_eq!(c.parameters["prompt"], "a lighthouse at dusk");
    }

    #[test]
    fn single_image_prefers_quoted_prompt() {
        let c = classify(r#"Create an image: "neon city skyline in the rain""#);
        assert_eq!(c.intent, Intent::ImageSingle);
        assert_eq!(c.parameters["prompt"], "neon city skyline in the rain");
    }

    #[test]
    fn single_image_of_capture() {
        let c = classify("Can you draw a picture of a red panda?");
        assert_eq!(c.intent, Intent::ImageSingle);
        assert_eq!(c.parameters["prompt"], "a red panda");
    }

    #[test]
    fn search_extracts_query_after_lead() {
        let c = classify("search for today's silver price");
        assert_eq!(c.intent, Intent::Search);
        assert_eq!(c.parameters["query"], "today's silver price");

        let c = classify("Look up the population of Lagos.");
        assert_eq!(c.intent, Intent::Search);
        assert_eq!(c.parameters["query"], "the population of Lagos");
    }

    #[test]
    fn document_title_and_topic() {
        let c = classify("Write a report about renewable energy in Portugal");
        assert_eq!(c.intent, Intent::Document);
        assert_eq!(c.parameters["topic"], "renewable energy in Portugal");
        assert_eq!(c.parameters["title"], "Renewable Energy In Portugal");

        let c = classify(r#"Draft a memo titled "Q3 offsite" about the schedule"#);
        assert_eq!(c.parameters["title"], "Q3 offsite");
    }

    #[test]
    fn code_from_fenced_block() {
        let c = classify("Run this:\n```js\nconsole.log(1 + 1)\n```");
        assert_eq!(c.intent, Intent::Code);
        assert_eq!(c.parameters["language"], "js");
        assert_eq!(c.parameters["code"], "console.log(1 + 1)");
    }

    #[test]
    fn fence_without_tag_defaults_to_python() {
        let c = classify("```\nprint(2 ** 10)\n```");
        assert_eq!(c.intent, Intent::Code);
        assert_eq!(c.parameters["language"], "python");
        assert_eq!(c.parameters["code"], "print(2 ** 10)");
    }

    #[test]
    fn priority_is_fixed_not_scored() {
        // Mentions both a document and a web search; document ranks higher.
        let c = classify("search the web and write a report about lithium mining");
        assert_eq!(c.intent, Intent::Document);
    }

    #[test]
    fn empty_text_is_none() {
        assert_eq!(classify("   ").intent, Intent::None);
    }
}
