//! Built folder hierarchy
//!
//! The tree is an arena: nodes live in one vector and refer to each other by
//! index. Index 0 is always the synthetic root.

use super::folder::{FolderKind, FolderRecord, PermissionSet};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Index of a node inside its [`FolderTree`]
pub type NodeId = usize;

/// Rolled-up statistics of a folder and its descendants
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedStats {
    /// Documents that are members of this folder itself
    pub direct_document_count: u64,
    pub document_count: u64,
    pub total_size_bytes: u64,
    /// `total_size_bytes / document_count`, 0 for an empty folder
    pub average_file_size: f64,
    pub file_type_distribution: BTreeMap<String, u64>,
    pub last_activity: Option<DateTime<Utc>>,
}

/// In-memory folder node owned by a single tree
#[derive(Debug, Clone)]
pub struct FolderNode {
    pub record: FolderRecord,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub depth: usize,
    pub stats: AggregatedStats,
}

impl FolderNode {
    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Non-fatal anomaly recovered while building a tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BuildWarning {
    /// Declared parent is not in the record set
    MissingParent {
        #[serde(rename = "folderId")]
        folder_id: String,
        #[serde(rename = "parentId")]
        parent_id: String,
    },
    /// Attaching under the declared parent would close a cycle
    Cycle {
        #[serde(rename = "folderId")]
        folder_id: String,
        #[serde(rename = "parentId")]
        parent_id: String,
    },
    /// Document collection could not be read; statistics were skipped
    StatisticsUnavailable { reason: String },
}

impl std::fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildWarning::MissingParent {
                folder_id,
                parent_id,
            } => write!(
                f,
                "folder {} references missing parent {}, attached to root",
                folder_id, parent_id
            ),
            BuildWarning::Cycle {
                folder_id,
                parent_id,
            } => write!(
                f,
                "folder {} under {} would form a cycle, attached to root",
                folder_id, parent_id
            ),
            BuildWarning::StatisticsUnavailable { reason } => {
                write!(f, "statistics unavailable: {}", reason)
            }
        }
    }
}

/// Single-rooted folder hierarchy produced by one build
#[derive(Debug, Clone)]
pub struct FolderTree {
    nodes: Vec<FolderNode>,
    index: HashMap<String, NodeId>,
}

impl FolderTree {
    pub const ROOT: NodeId = 0;

    pub(crate) fn from_parts(nodes: Vec<FolderNode>, index: HashMap<String, NodeId>) -> Self {
        Self { nodes, index }
    }

    pub fn root(&self) -> &FolderNode {
        &self.nodes[Self::ROOT]
    }

    pub fn node(&self, id: NodeId) -> &FolderNode {
        &self.nodes[id]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut FolderNode {
        &mut self.nodes[id]
    }

    pub fn nodes(&self) -> &[FolderNode] {
        &self.nodes
    }

    /// Number of nodes including the synthetic root
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn find(&self, folder_id: &str) -> Option<NodeId> {
        self.index.get(folder_id).copied()
    }

    pub fn get(&self, folder_id: &str) -> Option<&FolderNode> {
        self.find(folder_id).map(|id| &self.nodes[id])
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &FolderNode> {
        self.nodes[id].children.iter().map(|c| &self.nodes[*c])
    }

    /// Records from the root down to `id`, inclusive
    pub fn ancestor_chain(&self, id: NodeId) -> Vec<&FolderRecord> {
        let mut chain = Vec::with_capacity(self.nodes[id].depth + 1);
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = &self.nodes[node_id];
            chain.push(&node.record);
            current = node.parent;
        }
        chain.reverse();
        chain
    }

    /// True when `candidate` is `id` or lies below it
    pub fn is_descendant_or_self(&self, candidate: NodeId, id: NodeId) -> bool {
        let mut current = Some(candidate);
        while let Some(node_id) = current {
            if node_id == id {
                return true;
            }
            current = self.nodes[node_id].parent;
        }
        false
    }

    /// Nodes in post-order (children before parents), root last
    pub fn post_order(&self) -> Vec<NodeId> {
        self.post_order_from(Self::ROOT)
    }

    fn post_order_from(&self, start: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![(start, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            stack.push((id, true));
            for child in self.nodes[id].children.iter().rev() {
                stack.push((*child, false));
            }
        }
        order
    }

    /// Nested, serializable view rooted at `id`.
    ///
    /// Built bottom-up from a post-order walk, so deep chains do not recurse.
    pub fn view(&self, id: NodeId) -> FolderTreeView {
        let mut built: Vec<Option<FolderTreeView>> = vec![None; self.nodes.len()];
        for node_id in self.post_order_from(id) {
            let node = &self.nodes[node_id];
            let children = node
                .children
                .iter()
                .filter_map(|c| built[*c].take())
                .collect();
            built[node_id] = Some(FolderTreeView::from_node(node, children));
        }
        built[id]
            .take()
            .unwrap_or_else(|| FolderTreeView::from_node(&self.nodes[id], Vec::new()))
    }
}

/// Folder tree node for hierarchical display
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderTreeView {
    pub id: String,
    pub name: String,
    pub kind: FolderKind,
    pub depth: usize,
    pub inherit_permissions: bool,
    pub permission_set: PermissionSet,
    pub auto_refresh: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub stats: AggregatedStats,
    pub children: Vec<FolderTreeView>,
}

impl FolderTreeView {
    fn from_node(node: &FolderNode, children: Vec<FolderTreeView>) -> Self {
        FolderTreeView {
            id: node.record.id.clone(),
            name: node.record.name.clone(),
            kind: node.record.kind,
            depth: node.depth,
            inherit_permissions: node.record.inherit_permissions,
            permission_set: node.record.permission_set,
            auto_refresh: node.record.auto_refresh,
            description: node.record.description.clone(),
            color: node.record.color.clone(),
            icon: node.record.icon.clone(),
            stats: node.stats.clone(),
            children,
        }
    }
}

/// Result of a tree build: the tree plus recovered anomalies
#[derive(Debug, Clone)]
pub struct TreeBuild {
    pub tree: FolderTree,
    pub warnings: Vec<BuildWarning>,
}
