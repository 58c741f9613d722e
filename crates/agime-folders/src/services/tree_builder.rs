//! Flat folder records to a single-rooted tree
//!
//! Records whose parent is missing, or whose parent link closes a cycle, are
//! re-attached under the synthetic root and reported as [`BuildWarning`]s.
//! Only a duplicate id aborts a build.

use crate::config::ChildOrder;
use crate::error::{FolderError, FolderResult};
use crate::models::{
    AggregatedStats, BuildWarning, FolderNode, FolderRecord, FolderTree, NodeId, TreeBuild,
    ROOT_FOLDER_ID,
};
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    Pending,
    OnPath,
    Done,
}

/// Builds [`FolderTree`]s from flat record lists
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeBuilder {
    order: ChildOrder,
}

impl TreeBuilder {
    pub fn new(order: ChildOrder) -> Self {
        Self { order }
    }

    /// Build a tree. Deterministic for a fixed input sequence.
    pub fn build(&self, records: Vec<FolderRecord>) -> FolderResult<TreeBuild> {
        let mut index: HashMap<String, usize> = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if record.id == ROOT_FOLDER_ID || index.insert(record.id.clone(), i).is_some() {
                return Err(FolderError::DuplicateId {
                    id: record.id.clone(),
                });
            }
        }

        let mut warnings = Vec::new();
        let mut parents: Vec<Option<usize>> = Vec::with_capacity(records.len());
        for record in &records {
            let parent = match record.parent_id.as_deref() {
                None | Some(ROOT_FOLDER_ID) => None,
                Some(pid) => match index.get(pid) {
                    Some(p) => Some(*p),
                    None => {
                        warn!(
                            "Folder {} references missing parent {}, attaching to root",
                            record.id, pid
                        );
                        warnings.push(BuildWarning::MissingParent {
                            folder_id: record.id.clone(),
                            parent_id: pid.to_string(),
                        });
                        None
                    }
                },
            };
            parents.push(parent);
        }

        break_cycles(&records, &mut parents, &mut warnings);

        let mut nodes: Vec<FolderNode> = Vec::with_capacity(records.len() + 1);
        nodes.push(FolderNode {
            record: FolderRecord::synthetic_root(),
            parent: None,
            children: Vec::new(),
            depth: 0,
            stats: AggregatedStats::default(),
        });
        let mut node_index: HashMap<String, NodeId> = HashMap::with_capacity(records.len() + 1);
        node_index.insert(ROOT_FOLDER_ID.to_string(), FolderTree::ROOT);

        for (i, record) in records.into_iter().enumerate() {
            let parent = parents[i].map_or(FolderTree::ROOT, |p| p + 1);
            node_index.insert(record.id.clone(), i + 1);
            nodes.push(FolderNode {
                record,
                parent: Some(parent),
                children: Vec::new(),
                depth: 0,
                stats: AggregatedStats::default(),
            });
        }
        for id in 1..nodes.len() {
            if let Some(parent) = nodes[id].parent {
                nodes[parent].children.push(id);
            }
        }

        for id in 0..nodes.len() {
            let mut children = std::mem::take(&mut nodes[id].children);
            match self.order {
                ChildOrder::Insertion => {}
                ChildOrder::Name => {
                    children.sort_by(|a, b| nodes[*a].record.name.cmp(&nodes[*b].record.name))
                }
                ChildOrder::CreatedAt => children
                    .sort_by(|a, b| nodes[*a].record.created_at.cmp(&nodes[*b].record.created_at)),
            }
            nodes[id].children = children;
        }

        let mut stack = vec![FolderTree::ROOT];
        while let Some(id) = stack.pop() {
            let depth = nodes[id].depth + 1;
            let children = nodes[id].children.clone();
            for child in children {
                nodes[child].depth = depth;
                stack.push(child);
            }
        }

        debug!(
            "Built folder tree: {} folders, {} warnings",
            nodes.len() - 1,
            warnings.len()
        );

        Ok(TreeBuild {
            tree: FolderTree::from_parts(nodes, node_index),
            warnings,
        })
    }
}

/// Detach one member of every parent cycle.
///
/// Each record is visited once while following parent links; reaching a
/// record already on the current path means the path closed a cycle. The
/// cycle member that comes first in input order loses its parent link.
fn break_cycles(
    records: &[FolderRecord],
    parents: &mut [Option<usize>],
    warnings: &mut Vec<BuildWarning>,
) {
    let mut state = vec![Visit::Pending; records.len()];
    let mut path: Vec<usize> = Vec::new();

    for start in 0..records.len() {
        if state[start] != Visit::Pending {
            continue;
        }
        path.clear();
        let mut current = start;
        loop {
            state[current] = Visit::OnPath;
            path.push(current);
            let Some(parent) = parents[current] else {
                break;
            };
            match state[parent] {
                Visit::Pending => current = parent,
                Visit::Done => break,
                Visit::OnPath => {
                    let cycle_start = path.iter().position(|n| *n == parent).unwrap_or(0);
                    let breaker = path[cycle_start..]
                        .iter()
                        .copied()
                        .min()
                        .unwrap_or(current);
                    let record = &records[breaker];
                    let parent_id = record.parent_id.clone().unwrap_or_default();
                    warn!(
                        "Folder {} under {} forms a cycle, attaching to root",
                        record.id, parent_id
                    );
                    warnings.push(BuildWarning::Cycle {
                        folder_id: record.id.clone(),
                        parent_id,
                    });
                    parents[breaker] = None;
                    break;
                }
            }
        }
        for node in &path {
            state[*node] = Visit::Done;
        }
    }
}
