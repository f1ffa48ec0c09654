//! Memory store trait — durable, user-scoped facts.
//!
//! A run reads active memories once, before its first reasoning step, and
//! never writes. New facts leave the run as [`MemoryProposal`]s and are
//! committed by the caller afterwards.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MemoryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryCategory {
    Preference,
    Fact,
    Context,
    Instruction,
}

/// Importance ranks order memories on read; `High` sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemorySource {
    /// Stated explicitly by the user.
    User,
    /// Inferred by the agent.
    Inferred,
}

/// A single memory entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Unique ID for this memory
    pub id: String,

    /// Owner of the memory
    pub user_id: String,

    /// The content of the memory
    pub content: String,

    pub category: MemoryCategory,

    pub importance: Importance,

    pub source: MemorySource,

    /// Inactive entries are kept but never injected.
    #[serde(default = "default_active")]
    pub is_active: bool,

    /// When this memory was created
    pub created_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

/// A fact a run would like remembered. Committing it is the caller's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryProposal {
    pub content: String,
    pub category: MemoryCategory,
    pub importance: Importance,
    pub source: MemorySource,
}

impl MemoryProposal {
    /// Materialize the proposal as an entry owned by `user_id`.
    pub fn into_entry(self, user_id: &str) -> MemoryEntry {
        MemoryEntry {
            id: String::new(),
            user_id: user_id.to_string(),
            content: self.content,
            category: self.category,
            importance: self.importance,
            source: self.source,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

/// The core MemoryStore trait.
///
/// Implementations: in-memory, none (no-op). Must be safe for concurrent
/// use across runs.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// The backend name (e.g., "in_memory", "none").
    fn name(&self) -> &str;

    /// Up to `limit` active memories of `user_id`, ordered by importance
    /// descending, then recency descending.
    async fn get_active_memories(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>, MemoryError>;

    /// Store a new memory entry, returning its ID.
    async fn store(&self, entry: MemoryEntry) -> Result<String, MemoryError>;

    /// Mark a memory inactive. Returns whether it existed.
    async fn deactivate(&self, id: &str) -> Result<bool, MemoryError>;
}
