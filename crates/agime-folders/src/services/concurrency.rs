//! Concurrency control utilities
//!
//! Folder mutations use optimistic locking: every record carries an ETag
//! derived from its store version and modification time, and a caller that
//! supplies an expected ETag only succeeds if nothing changed in between.
//! Mutations of the same folder inside one process are additionally
//! serialized through [`FolderLocks`].

use crate::error::{FolderError, FolderResult};
use crate::models::FolderRecord;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// ETag for optimistic locking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ETag(pub String);

impl ETag {
    /// Weak ETag of the record's current state
    pub fn for_record(record: &FolderRecord) -> Self {
        ETag(format!(
            "W/\"{}-{:x}\"",
            record.version,
            record.modified_at.timestamp_millis()
        ))
    }

    /// Parse an ETag string, weak or strong
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.starts_with("W/\"") && s.ends_with('"') && s.len() > 4 {
            Some(ETag(s.to_string()))
        } else if s.starts_with('"') && s.ends_with('"') && s.len() > 1 {
            // Strong form of the same tag compares equal to the weak one
            Some(ETag(format!("W/{}", s)))
        } else {
            None
        }
    }

    pub fn value(&self) -> &str {
        &self.0
    }

    /// Fail with a conflict unless `record` still carries this tag
    pub fn check(&self, record: &FolderRecord) -> FolderResult<()> {
        let current = ETag::for_record(record);
        if current == *self {
            Ok(())
        } else {
            Err(FolderError::Conflict {
                folder_id: record.id.clone(),
                expected: self.0.clone(),
                current: current.0,
            })
        }
    }
}

impl std::fmt::Display for ETag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-folder async mutexes, created on first use
#[derive(Debug, Default)]
pub struct FolderLocks {
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FolderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to one folder
    pub async fn lock(&self, folder_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // Entries nobody else holds can go
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            locks
                .entry(folder_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Lock several folders in a fixed order
    pub async fn lock_many(&self, folder_ids: &[&str]) -> Vec<OwnedMutexGuard<()>> {
        let mut ids: Vec<&str> = folder_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            guards.push(self.lock(id).await);
        }
        guards
    }
}
