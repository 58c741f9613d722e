//! In-memory stores used by the server binary and tests

use super::{DocumentStore, FolderStore};
use crate::error::{FolderError, FolderResult};
use crate::models::{DocumentDescriptor, DocumentFilter, FolderPage, FolderPatch, FolderRecord};
use crate::services::ETag;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// Folder records kept in insertion order
#[derive(Debug, Default)]
pub struct MemoryFolderStore {
    records: RwLock<Vec<FolderRecord>>,
}

impl MemoryFolderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with records as-is, without validation
    pub fn with_records(records: Vec<FolderRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

fn position(records: &[FolderRecord], id: &str) -> FolderResult<usize> {
    records
        .iter()
        .position(|r| r.id == id)
        .ok_or_else(|| FolderError::FolderNotFound(id.to_string()))
}

#[async_trait::async_trait]
impl FolderStore for MemoryFolderStore {
    async fn list_folders(&self, page: usize, page_size: usize) -> FolderResult<FolderPage> {
        let page_size = page_size.max(1);
        let records = self.records.read().await;
        let start = page.saturating_mul(page_size).min(records.len());
        let end = start.saturating_add(page_size).min(records.len());
        Ok(FolderPage {
            records: records[start..end].to_vec(),
            has_more: end < records.len(),
        })
    }

    async fn get_folder(&self, id: &str) -> FolderResult<FolderRecord> {
        let records = self.records.read().await;
        let idx = position(&records, id)?;
        Ok(records[idx].clone())
    }

    async fn create_folder(&self, record: FolderRecord) -> FolderResult<FolderRecord> {
        let mut records = self.records.write().await;
        if records.iter().any(|r| r.id == record.id) {
            return Err(FolderError::Validation(format!(
                "Folder id already exists: {}",
                record.id
            )));
        }
        records.push(record.clone());
        Ok(record)
    }

    async fn update_folder(
        &self,
        id: &str,
        patch: FolderPatch,
        expected: Option<&ETag>,
    ) -> FolderResult<FolderRecord> {
        let mut records = self.records.write().await;
        let idx = position(&records, id)?;
        let record = &mut records[idx];
        if let Some(etag) = expected {
            etag.check(record)?;
        }
        patch.apply(record, Utc::now());
        record.version += 1;
        Ok(record.clone())
    }

    async fn delete_folder(&self, id: &str, expected: Option<&ETag>) -> FolderResult<FolderRecord> {
        let mut records = self.records.write().await;
        let idx = position(&records, id)?;
        if let Some(etag) = expected {
            etag.check(&records[idx])?;
        }
        Ok(records.remove(idx))
    }
}

/// Document descriptors with switchable availability and optional latency
#[derive(Debug)]
pub struct MemoryDocumentStore {
    documents: RwLock<Vec<DocumentDescriptor>>,
    available: AtomicBool,
    latency: Option<Duration>,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::with_documents(Vec::new())
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(documents: Vec<DocumentDescriptor>) -> Self {
        Self {
            documents: RwLock::new(documents),
            available: AtomicBool::new(true),
            latency: None,
        }
    }

    /// Delay every listing by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make listings fail until switched back on
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Insert or replace a document by id
    pub async fn upsert(&self, document: DocumentDescriptor) {
        let mut documents = self.documents.write().await;
        match documents.iter_mut().find(|d| d.id == document.id) {
            Some(existing) => *existing = document,
            None => documents.push(document),
        }
    }

    pub async fn remove(&self, id: &str) -> FolderResult<DocumentDescriptor> {
        let mut documents = self.documents.write().await;
        let idx = documents
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| FolderError::DocumentNotFound(id.to_string()))?;
        Ok(documents.remove(idx))
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn list_documents(
        &self,
        filter: Option<&DocumentFilter>,
    ) -> FolderResult<Vec<DocumentDescriptor>> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if !self.available.load(Ordering::SeqCst) {
            return Err(FolderError::Store("document store unavailable".to_string()));
        }
        let documents = self.documents.read().await;
        Ok(match filter {
            Some(filter) => documents
                .iter()
                .filter(|d| filter.matches(d))
                .cloned()
                .collect(),
            None => documents.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_folder_pagination() {
        let store = MemoryFolderStore::with_records(
            (0..5)
                .map(|i| FolderRecord::regular(format!("f{}", i), "x"))
                .collect(),
        );
        let first = store.list_folders(0, 2).await.unwrap();
        assert_eq!(first.records.len(), 2);
        assert!(first.has_more);
        let last = store.list_folders(2, 2).await.unwrap();
        assert_eq!(last.records[0].id, "f4");
        assert!(!last.has_more);
        let past = store.list_folders(9, 2).await.unwrap();
        assert!(past.records.is_empty());
        assert!(!past.has_more);
    }

    #[tokio::test]
    async fn test_update_bumps_version_and_checks_etag() {
        let store = MemoryFolderStore::new();
        let created = store
            .create_folder(FolderRecord::regular("a", "a"))
            .await
            .unwrap();
        let etag = ETag::for_record(&created);

        let patch = FolderPatch {
            name: Some("renamed".into()),
            ..Default::default()
        };
        let updated = store.update_folder("a", patch.clone(), Some(&etag)).await.unwrap();
        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.version, 1);

        // The old tag is now stale
        let err = store.update_folder("a", patch, Some(&etag)).await.unwrap_err();
        assert!(matches!(err, FolderError::Conflict { .. }));
        assert_err!(store.delete_folder("a", Some(&etag)).await);
        assert_ok!(store.delete_folder("a", None).await);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_missing_and_duplicate() {
        let store = MemoryFolderStore::new();
        let err = store.get_folder("nope").await.unwrap_err();
        assert!(matches!(err, FolderError::FolderNotFound(_)));

        assert_ok!(store.create_folder(FolderRecord::regular("a", "a")).await);
        assert_err!(store.create_folder(FolderRecord::regular("a", "b")).await);
    }

    #[tokio::test]
    async fn test_document_filter_and_availability() {
        let store = MemoryDocumentStore::with_documents(vec![
            DocumentDescriptor::new("d1", "1", "pdf", 1).in_folder("a"),
            DocumentDescriptor::new("d2", "2", "pdf", 1),
        ]);
        let filter = DocumentFilter::in_folder("a");
        let docs = store.list_documents(Some(&filter)).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(store.list_documents(None).await.unwrap().len(), 2);

        store.set_available(false);
        assert_err!(store.list_documents(None).await);
        store.set_available(true);

        store
            .upsert(DocumentDescriptor::new("d2", "2", "docx", 5))
            .await;
        assert_ok!(store.remove("d1").await);
        let docs = store.list_documents(None).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].type_label, "docx");
    }
}
