//! Effective permission resolution along the inheritance chain

use crate::error::{FolderError, FolderResult};
use crate::models::{FolderRecord, FolderTree, NodeId, PermissionSet};
use serde::Serialize;

/// Effective permission set and the folder it was taken from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectivePermissions {
    pub folder_id: String,
    #[serde(flatten)]
    pub permissions: PermissionSet,
    /// Folder whose own set applies; `None` when the system default was used
    pub source_folder_id: Option<String>,
}

/// Pure resolver: reads permission data, never mutates it
pub struct PermissionResolver;

impl PermissionResolver {
    /// Resolve from an ancestor chain ordered root → folder.
    ///
    /// Walks from the folder toward the root and stops at the first record
    /// that does not inherit. A chain that inherits all the way up resolves
    /// to the deny-all default.
    pub fn resolve(chain: &[&FolderRecord]) -> PermissionSet {
        chain
            .iter()
            .rev()
            .find(|record| !record.inherit_permissions)
            .map(|record| record.permission_set)
            .unwrap_or_else(PermissionSet::deny_all)
    }

    /// Resolve a node of a built tree by following parent links
    pub fn resolve_node(tree: &FolderTree, node: NodeId) -> EffectivePermissions {
        let folder_id = tree.node(node).record.id.clone();
        let mut current = Some(node);
        while let Some(id) = current {
            let record = &tree.node(id).record;
            if !record.inherit_permissions {
                return EffectivePermissions {
                    folder_id,
                    permissions: record.permission_set,
                    source_folder_id: Some(record.id.clone()),
                };
            }
            current = tree.node(id).parent;
        }
        EffectivePermissions {
            folder_id,
            permissions: PermissionSet::deny_all(),
            source_folder_id: None,
        }
    }

    pub fn resolve_folder(tree: &FolderTree, folder_id: &str) -> FolderResult<EffectivePermissions> {
        let node = tree
            .find(folder_id)
            .ok_or_else(|| FolderError::FolderNotFound(folder_id.to_string()))?;
        Ok(Self::resolve_node(tree, node))
    }
}
