//! Document descriptors supplied by the document store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Attributes of a stored document needed for membership and statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDescriptor {
    pub id: String,
    pub name: String,
    /// Regular folder this document was explicitly filed into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    /// Type label such as `pdf` or `docx`
    #[serde(rename = "type")]
    pub type_label: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// Extracted text, absent when extraction has not run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl DocumentDescriptor {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        type_label: impl Into<String>,
        size_bytes: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            folder_id: None,
            type_label: type_label.into(),
            tags: BTreeSet::new(),
            author: None,
            status: None,
            size_bytes,
            created_at: now,
            modified_at: now,
            content: None,
        }
    }

    pub fn in_folder(mut self, folder_id: impl Into<String>) -> Self {
        self.folder_id = Some(folder_id.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn by(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn modified(mut self, at: DateTime<Utc>) -> Self {
        self.modified_at = at;
        self
    }

    /// Type label normalized for comparison
    pub fn normalized_type(&self) -> String {
        self.type_label.trim().to_lowercase()
    }
}

/// Filter accepted by the document store
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentFilter {
    #[serde(default)]
    pub folder_id: Option<String>,
}

impl DocumentFilter {
    pub fn in_folder(folder_id: impl Into<String>) -> Self {
        Self {
            folder_id: Some(folder_id.into()),
        }
    }

    pub fn matches(&self, document: &DocumentDescriptor) -> bool {
        match &self.folder_id {
            Some(fid) => document.folder_id.as_deref() == Some(fid.as_str()),
            None => true,
        }
    }
}

/// Document summary for list views
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub type_label: String,
    pub size_bytes: u64,
    pub folder_id: Option<String>,
    pub modified_at: DateTime<Utc>,
}

impl From<&DocumentDescriptor> for DocumentSummary {
    fn from(d: &DocumentDescriptor) -> Self {
        Self {
            id: d.id.clone(),
            name: d.name.clone(),
            type_label: d.type_label.clone(),
            size_bytes: d.size_bytes,
            folder_id: d.folder_id.clone(),
            modified_at: d.modified_at,
        }
    }
}
