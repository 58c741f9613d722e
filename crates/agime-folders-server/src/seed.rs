//! Initial store contents loaded from a JSON file

use agime_folders::models::{DocumentDescriptor, FolderRecord};
use agime_folders::store::{MemoryDocumentStore, MemoryFolderStore};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// `{"folders": [...], "documents": [...]}`, both optional
#[derive(Debug, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub folders: Vec<FolderRecord>,
    #[serde(default)]
    pub documents: Vec<DocumentDescriptor>,
}

impl Seed {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse seed file {}", path.display()))
    }

    pub fn into_stores(self) -> (MemoryFolderStore, MemoryDocumentStore) {
        (
            MemoryFolderStore::with_records(self.folders),
            MemoryDocumentStore::with_documents(self.documents),
        )
    }
}
