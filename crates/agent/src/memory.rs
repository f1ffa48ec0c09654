//! Memory integration: one read before the loop, proposals after it.
//!
//! The loop never writes memory. New facts travel out in the result as
//! [`MemoryProposal`]s and the caller commits them with [`commit_proposals`].

use forager_core::error::MemoryError;
use forager_core::memory::{
    Importance, MemoryCategory, MemoryEntry, MemoryProposal, MemorySource, MemoryStore,
};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Fetch the user's active memories. A failing store degrades to none.
pub async fn recall(store: &dyn MemoryStore, user_id: &str, limit: usize) -> Vec<MemoryEntry> {
    match store.get_active_memories(user_id, limit).await {
        Ok(entries) => {
            if !entries.is_empty() {
                debug!(count = entries.len(), store = store.name(), "Recalled memories");
            }
            entries
        }
        Err(e) => {
            warn!(store = store.name(), "Memory recall failed: {e}");
            Vec::new()
        }
    }
}

struct ProposalRule {
    pattern: Regex,
    category: MemoryCategory,
    importance: Importance,
    /// Prefix put in front of the captured text.
    lead: &'static str,
}

static RULES: LazyLock<Vec<ProposalRule>> = LazyLock::new(|| {
    let rule = |pattern: &str, category, importance, lead| ProposalRule {
        pattern: Regex::new(pattern).expect("static memory pattern"),
        category,
        importance,
        lead,
    };
    vec![
        rule(
            r"(?i)\bremember(?:\s+that)?\s+([^.!?\n]{3,200})",
            MemoryCategory::Fact,
            Importance::High,
            "",
        ),
        rule(
            r"(?i)\bmy name is\s+([\p{L}][\p{L}'\- ]{0,60}?)(?:[.,!?\n]|\s+and\b|$)",
            MemoryCategory::Fact,
            Importance::High,
            "Name is ",
        ),
        rule(
            r"(?i)\bi\s+(?:really\s+)?(?:prefer|like|love)\s+([^.!?\n]{2,200})",
            MemoryCategory::Preference,
            Importance::Medium,
            "Prefers ",
        ),
        rule(
            r"(?im)(?:^|[.!?]\s+)((?:always|never)\s+[^.!?\n]{3,200})",
            MemoryCategory::Instruction,
            Importance::Medium,
            "",
        ),
    ]
});

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Extract memory proposals from what the user said.
pub fn propose_memories(text: &str) -> Vec<MemoryProposal> {
    let mut proposals: Vec<MemoryProposal> = Vec::new();
    for rule in RULES.iter() {
        for caps in rule.pattern.captures_iter(text) {
            let captured = caps[1].trim();
            if captured.is_empty() {
                continue;
            }
            let content = capitalize(&format!("{}{captured}", rule.lead));
            if proposals.iter().any(|p| p.content.eq_ignore_ascii_case(&content)) {
                continue;
            }
            proposals.push(MemoryProposal {
                content,
                category: rule.category,
                importance: rule.importance,
                source: MemorySource::User,
            });
        }
    }
    proposals
}

/// Commit proposals for a user, skipping ones already stored. Returns new ids.
pub async fn commit_proposals(
    store: &dyn MemoryStore,
    user_id: &str,
    proposals: Vec<MemoryProposal>,
) -> Result<Vec<String>, MemoryError> {
    if proposals.is_empty() {
        return Ok(Vec::new());
    }
    let existing = store.get_active_memories(user_id, usize::MAX).await?;

    let mut ids = Vec::new();
    for proposal in proposals {
        if existing
            .iter()
            .any(|e| e.content.eq_ignore_ascii_case(&proposal.content))
        {
            debug!(content = %proposal.content, "Memory already known");
            continue;
        }
        ids.push(store.store(proposal.into_entry(user_id)).await?);
    }
    debug!(count = ids.len(), user_id = %user_id, "Committed memories");
    Ok(ids)
}
