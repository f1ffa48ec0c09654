//! File-based memory store — persistent JSON-lines storage.
//!
//! Each line is a JSON-encoded `MemoryEntry`. Entries are loaded on
//! creation and the whole file is rewritten on every mutation, so reads
//! never touch disk. Deactivated entries stay in the file.
//!
//! Storage location: `~/.forager/memory/memories.jsonl` unless configured.

use async_trait::async_trait;
use forager_core::error::MemoryError;
use forager_core::memory::{MemoryEntry, MemoryStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::select_active;

/// A file-backed memory store using JSONL (one JSON object per line).
pub struct FileStore {
    path: PathBuf,
    entries: Arc<RwLock<Vec<MemoryEntry>>>,
}

impl FileStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    pub fn new(path: PathBuf) -> Self {
        let entries = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = entries.len(), "File memory store loaded");
        Self {
            path,
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(path: &Path) -> Vec<MemoryEntry> {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Vec::new();
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<MemoryEntry>(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted memory entry");
                    None
                }
            })
            .collect()
    }

    async fn flush(&self, entries: &[MemoryEntry]) -> Result<(), MemoryError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                MemoryError::Storage(format!("Failed to create memory directory: {e}"))
            })?;
        }

        let mut content = String::new();
        for entry in entries {
            let line = serde_json::to_string(entry).map_err(|e| {
                MemoryError::Storage(format!("Failed to serialize memory entry: {e}"))
            })?;
            content.push_str(&line);
            content.push('\n');
        }

        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to write memory file: {e}")))
    }
}

#[async_trait]
impl MemoryStore for FileStore {
    fn name(&self) -> &str {
        "file"
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

        // Hold the write lock across the flush so concurrent writers
        // cannot interleave partial files.
        let mut entries = self.entries.write().await;
        entries.push(entry);
        if let Err(e) = self.flush(&entries).await {
            entries.pop();
            return Err(e);
        }
        Ok(id)
    }

    async fn deactivate(&self, id: &str) -> Result<bool, MemoryError> {
        let mut entries = self.entries.write().await;
        let Some(idx) = entries.iter().position(|e| e.id == id) else {
            return Ok(false);
        };
        if !entries[idx].is_active {
            return Ok(true);
        }
        entries[idx].is_active = false;
        if let Err(e) = self.flush(&entries).await {
            entries[idx].is_active = true;
            return Err(e);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use forager_core::memory::{Importance, MemoryCategory, MemorySource};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn test_entry(content: &str) -> MemoryEntry {
        MemoryEntry {
            id: String::new(),
            user_id: "u".into(),
            content: content.into(),
            category: MemoryCategory::Preference,
            importance: Importance::Medium,
            source: MemorySource::User,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("memories.jsonl");

        let mem = FileStore::new(path.clone());
        let id = mem.store(test_entry("Prefers metric units")).await.unwrap();
        assert!(!id.is_empty());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Prefers metric units"));

        let reopened = FileStore::new(path);
        let got = reopened.get_active_memories("u", 10).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].id, id);
    }

    #[tokio::test]
    async fn deactivate_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memories.jsonl");

        let mem = FileStore::new(path.clone());
        let id = mem.store(test_entry("Temporary")).await.unwrap();
        assert!(mem.deactivate(&id).await.unwrap());

        let reopened = FileStore::new(path);
        assert!(reopened.get_active_memories("u", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_write_keeps_memory_and_disk_in_step() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memories.jsonl");
        // A directory where the file should be makes every write fail.
        std::fs::create_dir(&path).unwrap();

        let mem = FileStore::new(path.clone());
        let err = mem.store(test_entry("Lost on write")).await.unwrap_err();
        assert!(matches!(err, MemoryError::Storage(_)));
        assert!(mem.get_active_memories("u", 10).await.unwrap().is_empty());

        std::fs::remove_dir(&path).unwrap();
        let id = mem.store(test_entry("Written")).await.unwrap();
        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert!(!on_disk.contains("Lost on write"));

        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();
        assert!(mem.deactivate(&id).await.is_err());
        let got = mem.get_active_memories("u", 10).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].content, "Written");
    }

    #[tokio::test]
    async fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mem = FileStore::new(dir.path().join("absent.jsonl"));
        assert!(mem.get_active_memories("u", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupted_lines_are_skipped() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(tmp, r#"{{"id":"1","user_id":"u","content":"valid","category":"fact","importance":"low","source":"user","created_at":"2026-01-01T00:00:00Z"}}"#).unwrap();
        writeln!(tmp, "this is not json").unwrap();
        writeln!(tmp, r#"{{"id":"2","user_id":"u","content":"also valid","category":"fact","importance":"high","source":"inferred","created_at":"2026-01-02T00:00:00Z"}}"#).unwrap();

        let mem = FileStore::new(tmp.path().to_path_buf());
        let got = mem.get_active_memories("u", 10).await.unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].content, "also valid");
    }
}
