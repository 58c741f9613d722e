//! Folder statistics aggregation
//!
//! Direct statistics come from each folder's own membership; every node then
//! adds the already-aggregated statistics of its children. A single post-order
//! pass visits each node once.

use crate::models::{AggregatedStats, DocumentDescriptor, FolderTree};
use std::collections::HashMap;

/// Document ids that belong directly to each folder
#[derive(Debug, Clone, Default)]
pub struct FolderMembership {
    members: HashMap<String, Vec<String>>,
}

impl FolderMembership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicit membership of regular folders, taken from each document's folder ref
    pub fn from_documents(documents: &[DocumentDescriptor]) -> Self {
        let mut membership = Self::new();
        for doc in documents {
            if let Some(folder_id) = &doc.folder_id {
                membership
                    .members
                    .entry(folder_id.clone())
                    .or_default()
                    .push(doc.id.clone());
            }
        }
        membership
    }

    /// Replace the membership of one folder
    pub fn insert(&mut self, folder_id: impl Into<String>, document_ids: Vec<String>) {
        self.members.insert(folder_id.into(), document_ids);
    }

    pub fn members(&self, folder_id: &str) -> &[String] {
        self.members
            .get(folder_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

pub struct StatisticsAggregator;

impl StatisticsAggregator {
    /// Fill `stats` on every node of `tree`.
    ///
    /// Member ids with no matching descriptor are skipped.
    pub fn aggregate(
        tree: &mut FolderTree,
        membership: &FolderMembership,
        documents: &[DocumentDescriptor],
    ) {
        let lookup: HashMap<&str, &DocumentDescriptor> =
            documents.iter().map(|d| (d.id.as_str(), d)).collect();

        for id in tree.post_order() {
            let node = tree.node(id);
            let mut stats = Self::direct_stats(membership.members(node.id()), &lookup);
            for child in &node.children {
                Self::merge(&mut stats, &tree.node(*child).stats);
            }
            stats.average_file_size = average(stats.total_size_bytes, stats.document_count);
            tree.node_mut(id).stats = stats;
        }

        tracing::debug!(
            "Aggregated statistics for {} folders over {} documents",
            tree.len(),
            documents.len()
        );
    }

    fn direct_stats(
        member_ids: &[String],
        lookup: &HashMap<&str, &DocumentDescriptor>,
    ) -> AggregatedStats {
        let mut stats = AggregatedStats::default();
        for doc in member_ids.iter().filter_map(|id| lookup.get(id.as_str())) {
            stats.direct_document_count += 1;
            stats.document_count += 1;
            stats.total_size_bytes += doc.size_bytes;
            *stats
                .file_type_distribution
                .entry(doc.normalized_type())
                .or_insert(0) += 1;
            stats.last_activity = stats.last_activity.max(Some(doc.modified_at));
        }
        stats
    }

    fn merge(into: &mut AggregatedStats, child: &AggregatedStats) {
        into.document_count += child.document_count;
        into.total_size_bytes += child.total_size_bytes;
        for (type_label, count) in &child.file_type_distribution {
            *into
                .file_type_distribution
                .entry(type_label.clone())
                .or_insert(0) += count;
        }
        into.last_activity = into.last_activity.max(child.last_activity);
    }
}

fn average(total: u64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}
