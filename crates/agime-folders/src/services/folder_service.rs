//! Folder service: tree, permission and membership queries plus mutations
//!
//! Every read rebuilds the hierarchy from the folder store, so callers always
//! see a tree derived from one consistent snapshot of records. Mutations are
//! validated and permission-checked against that snapshot before the store is
//! touched.

use crate::config::FolderConfig;
use crate::error::{FolderError, FolderResult};
use crate::models::{
    BuildWarning, CreateFolderRequest, CriteriaExpression, DocumentDescriptor, DocumentFilter,
    DocumentSummary, FolderKind, FolderPatch, FolderRecord, FolderTree, Permission,
    PermissionSet, TreeBuild, UpdateFolderRequest, ROOT_FOLDER_ID,
};
use crate::security::{
    check_permission, required_for_update, validate_description, validate_folder_id,
    validate_folder_name, validate_kind_criteria,
};
use crate::services::concurrency::{ETag, FolderLocks};
use crate::services::criteria_evaluator::{CriteriaEvaluator, MatchSummary};
use crate::services::permission_resolver::{EffectivePermissions, PermissionResolver};
use crate::services::refresh::SmartFolderRefresher;
use crate::services::stats_service::{FolderMembership, StatisticsAggregator};
use crate::services::tree_builder::TreeBuilder;
use crate::store::{DocumentStore, FolderStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Members of one folder
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FolderMembers {
    /// Documents explicitly filed into a regular folder
    Regular {
        #[serde(rename = "folderId")]
        folder_id: String,
        documents: Vec<DocumentSummary>,
    },
    /// Documents matched by a smart folder's criteria
    Smart {
        #[serde(rename = "folderId")]
        folder_id: String,
        documents: Vec<DocumentSummary>,
        summary: MatchSummary,
        /// Evaluation failed and the last successful result is shown
        stale: bool,
        #[serde(rename = "evaluatedAt")]
        evaluated_at: DateTime<Utc>,
    },
}

impl FolderMembers {
    pub fn documents(&self) -> &[DocumentSummary] {
        match self {
            FolderMembers::Regular { documents, .. } | FolderMembers::Smart { documents, .. } => {
                documents
            }
        }
    }
}

pub struct FolderService {
    folders: Arc<dyn FolderStore>,
    documents: Arc<dyn DocumentStore>,
    refresher: Arc<SmartFolderRefresher>,
    builder: TreeBuilder,
    evaluator: CriteriaEvaluator,
    locks: FolderLocks,
    config: FolderConfig,
}

impl FolderService {
    pub fn new(
        folders: Arc<dyn FolderStore>,
        documents: Arc<dyn DocumentStore>,
        config: FolderConfig,
    ) -> Self {
        Self {
            refresher: Arc::new(SmartFolderRefresher::new(documents.clone(), &config)),
            builder: TreeBuilder::new(config.child_order),
            evaluator: CriteriaEvaluator::from_config(&config),
            locks: FolderLocks::new(),
            folders,
            documents,
            config,
        }
    }

    pub fn config(&self) -> &FolderConfig {
        &self.config
    }

    pub fn refresher(&self) -> &Arc<SmartFolderRefresher> {
        &self.refresher
    }

    /// Drain the folder store page by page
    pub async fn load_records(&self) -> FolderResult<Vec<FolderRecord>> {
        let mut records = Vec::new();
        let mut page = 0;
        loop {
            let batch = self.folders.list_folders(page, self.config.page_size).await?;
            records.extend(batch.records);
            if !batch.has_more {
                break;
            }
            page += 1;
        }
        Ok(records)
    }

    /// Hierarchy only, without statistics
    async fn build_hierarchy(&self) -> FolderResult<TreeBuild> {
        let records = self.load_records().await?;
        self.builder.build(records)
    }

    /// Full tree with aggregated statistics.
    ///
    /// A document store failure does not fail the tree: statistics are left
    /// empty and a warning is attached instead.
    pub async fn get_tree(&self) -> FolderResult<TreeBuild> {
        let mut build = self.build_hierarchy().await?;
        match self.documents.list_documents(None).await {
            Ok(documents) => {
                let membership = self.membership(&build.tree, &documents);
                StatisticsAggregator::aggregate(&mut build.tree, &membership, &documents);
            }
            Err(e) => {
                warn!("Folder statistics skipped: {}", e);
                build.warnings.push(BuildWarning::StatisticsUnavailable {
                    reason: e.to_string(),
                });
            }
        }
        Ok(build)
    }

    /// Explicit refs for regular folders, current matches for smart folders.
    ///
    /// Smart folders are evaluated against the same document fetch as the
    /// rest of the tree, so statistics always reflect the stored criteria.
    fn membership(
        &self,
        tree: &FolderTree,
        documents: &[DocumentDescriptor],
    ) -> FolderMembership {
        let mut membership = FolderMembership::from_documents(documents);
        for node in tree.nodes() {
            let record = &node.record;
            if !record.is_smart() {
                continue;
            }
            let matched = match &record.criteria {
                Some(criteria) => self.evaluator.evaluate(criteria, documents).matched_ids,
                None => Vec::new(),
            };
            membership.insert(record.id.clone(), matched);
        }
        membership
    }

    /// A single record, for callers that need its current ETag
    pub async fn get_folder(&self, folder_id: &str) -> FolderResult<FolderRecord> {
        let build = self.build_hierarchy().await?;
        let effective = PermissionResolver::resolve_folder(&build.tree, folder_id)?;
        check_permission(&effective, Permission::View)?;
        self.folders.get_folder(folder_id).await
    }

    pub async fn get_effective_permissions(
        &self,
        folder_id: &str,
    ) -> FolderResult<EffectivePermissions> {
        let build = self.build_hierarchy().await?;
        PermissionResolver::resolve_folder(&build.tree, folder_id)
    }

    pub async fn get_folder_members(&self, folder_id: &str) -> FolderResult<FolderMembers> {
        let build = self.build_hierarchy().await?;
        let tree = &build.tree;
        let effective = PermissionResolver::resolve_folder(tree, folder_id)?;
        check_permission(&effective, Permission::View)?;

        let record = match tree.get(folder_id) {
            Some(node) => &node.record,
            None => return Err(FolderError::FolderNotFound(folder_id.to_string())),
        };

        match (&record.kind, &record.criteria) {
            (FolderKind::Smart, Some(criteria)) => {
                let read = self.refresher.evaluate_now(folder_id, criteria).await?;
                if read.stale {
                    warn!("Serving stale members for smart folder {}", folder_id);
                }
                Ok(FolderMembers::Smart {
                    folder_id: folder_id.to_string(),
                    documents: read.snapshot.documents,
                    summary: read.snapshot.summary,
                    stale: read.stale,
                    evaluated_at: read.snapshot.evaluated_at,
                })
            }
            (FolderKind::Smart, None) => Err(FolderError::invalid_criteria(format!(
                "smart folder {} has no criteria",
                folder_id
            ))),
            (FolderKind::Regular, _) => {
                let filter = DocumentFilter::in_folder(folder_id);
                let documents = self.documents.list_documents(Some(&filter)).await?;
                Ok(FolderMembers::Regular {
                    folder_id: folder_id.to_string(),
                    documents: documents.iter().map(DocumentSummary::from).collect(),
                })
            }
        }
    }

    /// Evaluate an unsaved expression. With a folder context the caller
    /// needs view access to that folder.
    pub async fn preview_criteria(
        &self,
        parent_id: Option<&str>,
        criteria: &CriteriaExpression,
    ) -> FolderResult<MatchSummary> {
        if let Some(parent_id) = parent_id {
            let build = self.build_hierarchy().await?;
            let effective = PermissionResolver::resolve_folder(&build.tree, parent_id)?;
            check_permission(&effective, Permission::View)?;
        }
        let documents = self
            .documents
            .list_documents(None)
            .await
            .map_err(|e| FolderError::EvaluationUnavailable {
                reason: e.to_string(),
            })?;
        Ok(self.evaluator.evaluate(criteria, &documents).summary)
    }

    pub async fn create_folder(&self, request: CreateFolderRequest) -> FolderResult<FolderRecord> {
        let name = request.name.trim().to_string();
        validate_folder_name(&name, &self.config)?;
        if let Some(description) = &request.description {
            validate_description(description, &self.config)?;
        }
        validate_kind_criteria(request.kind, request.criteria.as_ref())?;
        let id = match request.id {
            Some(id) => {
                validate_folder_id(&id)?;
                id
            }
            None => uuid::Uuid::new_v4().to_string(),
        };
        let parent_id = request.parent_id.filter(|p| p != ROOT_FOLDER_ID);

        let _guard = match &parent_id {
            Some(parent_id) => Some(self.locks.lock(parent_id).await),
            None => None,
        };

        let build = self.build_hierarchy().await?;
        let tree = &build.tree;
        if tree.find(&id).is_some() {
            return Err(FolderError::Validation(format!(
                "Folder id already exists: {}",
                id
            )));
        }
        if let Some(parent_id) = &parent_id {
            let parent = tree
                .find(parent_id)
                .ok_or_else(|| FolderError::FolderNotFound(parent_id.clone()))?;
            if tree.node(parent).record.is_smart() {
                return Err(FolderError::Validation(
                    "Cannot create folders inside a smart folder".to_string(),
                ));
            }
            let effective = PermissionResolver::resolve_node(tree, parent);
            check_permission(&effective, Permission::CreateChild)?;
        }

        let inherit_permissions = request
            .inherit_permissions
            .unwrap_or(parent_id.is_some() && request.permission_set.is_none());
        let criteria = match request.kind {
            FolderKind::Smart => request.criteria,
            FolderKind::Regular => None,
        };
        let now = Utc::now();
        let record = FolderRecord {
            id,
            name,
            parent_id,
            kind: request.kind,
            criteria,
            auto_refresh: request.auto_refresh,
            permission_set: request.permission_set.unwrap_or(PermissionSet::full()),
            inherit_permissions,
            description: non_empty(request.description),
            color: non_empty(request.color),
            icon: non_empty(request.icon),
            created_at: now,
            modified_at: now,
            version: 0,
        };

        let created = self.folders.create_folder(record).await?;
        info!(
            "Folder created: {} ({}, parent {:?})",
            created.id, created.kind, created.parent_id
        );
        self.schedule_if_auto(&created).await;
        Ok(created)
    }

    pub async fn update_folder(
        &self,
        folder_id: &str,
        request: UpdateFolderRequest,
        expected: Option<ETag>,
    ) -> FolderResult<FolderRecord> {
        if request.is_empty() {
            return Err(FolderError::Validation("No fields to update".to_string()));
        }
        if folder_id == ROOT_FOLDER_ID {
            return Err(FolderError::Validation(
                "The root folder cannot be modified".to_string(),
            ));
        }

        let destination = request.parent_id.as_deref().filter(|p| *p != ROOT_FOLDER_ID);
        let mut ids = vec![folder_id];
        ids.extend(destination);
        let _guards = self.locks.lock_many(&ids).await;

        let build = self.build_hierarchy().await?;
        let tree = &build.tree;
        let node = tree
            .find(folder_id)
            .ok_or_else(|| FolderError::FolderNotFound(folder_id.to_string()))?;
        let record = &tree.node(node).record;

        let effective = PermissionResolver::resolve_node(tree, node);
        for permission in required_for_update(&request) {
            check_permission(&effective, permission)?;
        }

        let name = match &request.name {
            Some(name) => {
                let name = name.trim().to_string();
                validate_folder_name(&name, &self.config)?;
                Some(name)
            }
            None => None,
        };
        if let Some(description) = &request.description {
            validate_description(description, &self.config)?;
        }
        if let Some(criteria) = &request.criteria {
            validate_kind_criteria(record.kind, Some(criteria))?;
        }

        let parent_id = match &request.parent_id {
            None => None,
            Some(_) => match destination {
                None => Some(None),
                Some(destination) => {
                    let target = tree
                        .find(destination)
                        .ok_or_else(|| FolderError::FolderNotFound(destination.to_string()))?;
                    if tree.is_descendant_or_self(target, node) {
                        return Err(FolderError::Validation(
                            "Cannot move a folder into itself or a descendant".to_string(),
                        ));
                    }
                    if tree.node(target).record.is_smart() {
                        return Err(FolderError::Validation(
                            "Cannot move a folder into a smart folder".to_string(),
                        ));
                    }
                    let target_effective = PermissionResolver::resolve_node(tree, target);
                    check_permission(&target_effective, Permission::CreateChild)?;
                    Some(Some(destination.to_string()))
                }
            },
        };

        let criteria_changed = request
            .criteria
            .as_ref()
            .is_some_and(|c| record.criteria.as_ref() != Some(c));
        let patch = FolderPatch {
            name,
            parent_id,
            criteria: request.criteria.map(Some),
            auto_refresh: request.auto_refresh,
            permission_set: request.permission_set,
            inherit_permissions: request.inherit_permissions,
            description: request.description.map(|d| non_empty(Some(d))),
            color: request.color.map(|c| non_empty(Some(c))),
            icon: request.icon.map(|i| non_empty(Some(i))),
        };

        let updated = self
            .folders
            .update_folder(folder_id, patch, expected.as_ref())
            .await?;
        info!("Folder updated: {} (version {})", updated.id, updated.version);

        if criteria_changed && !updated.auto_refresh {
            // Results for the old criteria must not be served as last-known-good
            self.refresher.forget(folder_id).await;
        } else if criteria_changed || request.auto_refresh == Some(true) {
            self.schedule_if_auto(&updated).await;
        }
        Ok(updated)
    }

    pub async fn delete_folder(
        &self,
        folder_id: &str,
        expected: Option<ETag>,
    ) -> FolderResult<FolderRecord> {
        if folder_id == ROOT_FOLDER_ID {
            return Err(FolderError::Validation(
                "The root folder cannot be deleted".to_string(),
            ));
        }
        let _guard = self.locks.lock(folder_id).await;

        let build = self.build_hierarchy().await?;
        let tree = &build.tree;
        let node = tree
            .find(folder_id)
            .ok_or_else(|| FolderError::FolderNotFound(folder_id.to_string()))?;
        let effective = PermissionResolver::resolve_node(tree, node);
        check_permission(&effective, Permission::Delete)?;
        if !tree.node(node).children.is_empty() {
            return Err(FolderError::Validation(format!(
                "Folder {} still has {} subfolders",
                folder_id,
                tree.node(node).children.len()
            )));
        }

        let deleted = self
            .folders
            .delete_folder(folder_id, expected.as_ref())
            .await?;
        if deleted.is_smart() {
            self.refresher.forget(folder_id).await;
        }
        info!("Folder deleted: {}", folder_id);
        Ok(deleted)
    }

    /// The document collection changed: schedule every auto-refreshing smart folder.
    /// Returns how many refreshes were scheduled.
    pub async fn notify_documents_changed(&self) -> FolderResult<usize> {
        let records = self.load_records().await?;
        let mut scheduled = 0;
        for record in &records {
            if self.schedule_if_auto(record).await {
                scheduled += 1;
            }
        }
        info!("Documents changed, {} smart folders scheduled", scheduled);
        Ok(scheduled)
    }

    async fn schedule_if_auto(&self, record: &FolderRecord) -> bool {
        match (&record.kind, &record.criteria) {
            (FolderKind::Smart, Some(criteria)) if record.auto_refresh => {
                // Outcome is observed through refresh events
                drop(self.refresher.schedule(&record.id, criteria.clone()).await);
                true
            }
            _ => false,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
