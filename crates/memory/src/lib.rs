//! Memory store implementations for Forager.

pub mod file_backend;
pub mod in_memory;
pub mod noop;

use std::sync::Arc;

use forager_config::AppConfig;
use forager_core::memory::{MemoryEntry, MemoryStore};

pub use file_backend::FileStore;
pub use in_memory::InMemoryStore;
pub use noop::NoopStore;

/// Build the memory store named by `config.memory.backend`.
pub fn build_from_config(config: &AppConfig) -> Arc<dyn MemoryStore> {
    match config.memory.backend.as_str() {
        "file" => Arc::new(FileStore::new(config.memory_path())),
        "none" => Arc::new(NoopStore),
        _ => Arc::new(InMemoryStore::new()),
    }
}

/// Active entries of `user_id`, importance descending then most recent
/// first, truncated to `limit`.
pub(crate) fn select_active(
    entries: &[MemoryEntry],
    user_id: &str,
    limit: usize,
) -> Vec<MemoryEntry> {
    let mut active: Vec<MemoryEntry> = entries
        .iter()
        .filter(|e| e.is_active && e.user_id == user_id)
        .cloned()
        .collect();

    active.sort_by(|a, b| {
        b.importance
            .cmp(&a.importance)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    active.truncate(limit);
    active
}
