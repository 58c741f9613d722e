//! Collaborator interfaces for folder and document persistence
//!
//! The folder core never talks to a database directly. Hosts plug in a
//! [`FolderStore`] for the flat folder records and a [`DocumentStore`] for
//! the document descriptors that membership and statistics are computed
//! from. In-memory implementations live in [`memory`].

pub mod memory;

pub use memory::{MemoryDocumentStore, MemoryFolderStore};

use crate::error::FolderResult;
use crate::models::{DocumentDescriptor, DocumentFilter, FolderPage, FolderPatch, FolderRecord};
use crate::services::ETag;

/// Persistence of flat folder records
#[async_trait::async_trait]
pub trait FolderStore: Send + Sync {
    /// One page of records. Order only needs to be stable within a session.
    async fn list_folders(&self, page: usize, page_size: usize) -> FolderResult<FolderPage>;

    async fn get_folder(&self, id: &str) -> FolderResult<FolderRecord>;

    async fn create_folder(&self, record: FolderRecord) -> FolderResult<FolderRecord>;

    /// Apply `patch`, bump the version and return the updated record.
    /// Fails with a conflict when `expected` no longer matches.
    async fn update_folder(
        &self,
        id: &str,
        patch: FolderPatch,
        expected: Option<&ETag>,
    ) -> FolderResult<FolderRecord>;

    /// Remove a record and return it
    async fn delete_folder(&self, id: &str, expected: Option<&ETag>) -> FolderResult<FolderRecord>;
}

/// Read access to the document collection
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// All documents, or those matching `filter`
    async fn list_documents(
        &self,
        filter: Option<&DocumentFilter>,
    ) -> FolderResult<Vec<DocumentDescriptor>>;
}
