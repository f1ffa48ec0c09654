//! In-memory store — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use forager_core::error::MemoryError;
use forager_core::memory::{MemoryEntry, MemoryStore};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::select_active;

/// An in-memory store that keeps entries in a Vec.
/// Nothing survives the process.
#[derive(Clone)]
pub struct InMemoryStore {
    entries: Arc<RwLock<Vec<MemoryEntry>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Total number of entries, active or not.
    pub async fn count(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn get_active_memories(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>, MemoryError> {
        let entries = self.entries.read().await;
        Ok(select_active(&entries, user_id, limit))
    }

    async fn store(&self, mut entry: MemoryEntry) -> Result<String, MemoryError> {
        if entry.id.is_empty() {
            entry.id = Uuid::new_v4().to_string();
        }
        let id = entry.id.clone();
        self.entries.write().await.push(entry);
        Ok(id)
    }

    async fn deactivate(&self, id: &str) -> Result<bool, MemoryError> {
        let mut entries = self.entries.write().await;
        match entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
