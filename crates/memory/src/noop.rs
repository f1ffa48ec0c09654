//! No-op memory store — disables memory entirely.

use async_trait::async_trait;
use forager_core::error::MemoryError;
use forager_core::memory::{MemoryEntry, MemoryStore};

/// A memory store that remembers nothing.
pub struct NoopStore;

#[async_trait]
impl MemoryStore for NoopStore {
    fn name(&self) -> &str {
        "none"
    }

    async fn get_active_memories(
        &self,
        _user_id: &str,
        _limit: usize,
    ) -> Result<Vec<MemoryEntry>, MemoryError> {
        Ok(Vec::new())
    }

    async fn store(&self, _entry: MemoryEntry) -> Result<String, MemoryError> {
        Ok(String::new())
    }

    async fn deactivate(&self, _id: &str) -> Result<bool, MemoryError> {
        Ok(false)
    }
}
