//! Tool intents — the discrete categories of tool-worthy requests.
//!
//! Every tool capability is registered under exactly one intent, and the
//! intent classifier maps raw user text onto one of these variants.

use serde::{Deserialize, Serialize};

/// A discrete tool intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Search,
    ImageSingle,
    ImageBatch,
    Document,
    Code,
    /// No tool intent matched; answer with a plain completion.
    #[default]
    None,
}

impl Intent {
    /// Classification priority, highest first. Ties between matching
    /// pattern sets are broken by this order, never by score.
    pub const PRIORITY: [Intent; 5] = [
        Intent::ImageBatch,
        Intent::ImageSingle,
        Intent::Document,
        Intent::Code,
        Intent::Search,
    ];

    /// Stable wire name, also used as the tool name offered to the model.
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Search => "search",
            Intent::ImageSingle => "image_single",
            Intent::ImageBatch => "image_batch",
            Intent::Document => "document",
            Intent::Code => "code",
            Intent::None => "none",
        }
    }

    /// Parse a wire name back into an intent.
    pub fn from_name(name: &str) -> Option<Intent> {
        match name.trim().to_ascii_lowercase().as_str() {
            "search" | "web_search" => Some(Intent::Search),
            "image_single" | "image" | "generate_image" => Some(Intent::ImageSingle),
            "image_batch" => Some(Intent::ImageBatch),
            "document" | "create_document" => Some(Intent::Document),
            "code" | "execute_code" => Some(Intent::Code),
            "none" => Some(Intent::None),
            _ => None,
        }
    }

    /// UI badge attached to a result that used this tool.
    pub fn badge(&self) -> Option<&'static str> {
        match self {
            Intent::Search => Some("agent-web-search"),
            Intent::ImageSingle => Some("agent-image"),
            Intent::ImageBatch => Some("agent-image-batch"),
            Intent::Document => Some("agent-document"),
            Intent::Code => Some("agent-code"),
            Intent::None => None,
        }
    }

    pub fn is_tool(&self) -> bool {
        !matches!(self, Intent::None)
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_order_is_fixed() {
        assert_eq!(Intent::PRIORITY[0], Intent::ImageBatch);
        assert_eq!(Intent::PRIORITY[4], Intent::Search);
        assert!(!Intent::PRIORITY.contains(&Intent::None));
    }

    #[test]
    fn names_parse_back() {
        for intent in Intent::PRIORITY {
            assert_eq!(Intent::from_name(intent.as_str()), Some(intent));
        }
        assert_eq!(Intent::from_name("web_search"), Some(Intent::Search));
        assert_eq!(Intent::from_name("teleport"), None);
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&Intent::ImageBatch).unwrap();
        assert_eq!(json, "\"image_batch\"");
    }

    #[test]
    fn none_has_no_badge() {
        assert_eq!(Intent::None.badge(), None);
        assert_eq!(Intent::Search.badge(), Some("agent-web-search"));
    }
}
