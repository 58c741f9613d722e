//! Folder record model for document organization

use super::criteria::CriteriaExpression;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reserved id of the synthetic root node. Never persisted.
pub const ROOT_FOLDER_ID: &str = "__root__";

/// Display name of the synthetic root node
pub const ROOT_FOLDER_NAME: &str = "All Folders";

/// Folder kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FolderKind {
    /// Explicit, caller-curated membership
    #[default]
    Regular,
    /// Membership computed from a criteria expression
    Smart,
}

impl std::fmt::Display for FolderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FolderKind::Regular => write!(f, "regular"),
            FolderKind::Smart => write!(f, "smart"),
        }
    }
}

impl std::str::FromStr for FolderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "regular" => Ok(FolderKind::Regular),
            "smart" => Ok(FolderKind::Smart),
            _ => Err(format!("Invalid folder kind: {}", s)),
        }
    }
}

/// A single capability guarded by a folder's permission set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    View,
    Edit,
    Delete,
    CreateChild,
    ManagePermissions,
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Permission::View => write!(f, "view"),
            Permission::Edit => write!(f, "edit"),
            Permission::Delete => write!(f, "delete"),
            Permission::CreateChild => write!(f, "create_child"),
            Permission::ManagePermissions => write!(f, "manage_permissions"),
        }
    }
}

/// Folder permission flags. `Default` denies everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionSet {
    #[serde(default)]
    pub can_view: bool,
    #[serde(default)]
    pub can_edit: bool,
    #[serde(default)]
    pub can_delete: bool,
    #[serde(default)]
    pub can_create_child: bool,
    #[serde(default)]
    pub can_manage_permissions: bool,
}

impl PermissionSet {
    /// System fallback when an inheritance chain never resolves
    pub const fn deny_all() -> Self {
        Self {
            can_view: false,
            can_edit: false,
            can_delete: false,
            can_create_child: false,
            can_manage_permissions: false,
        }
    }

    /// Permissions of the synthetic root
    pub const fn view_only() -> Self {
        Self {
            can_view: true,
            ..Self::deny_all()
        }
    }

    pub const fn full() -> Self {
        Self {
            can_view: true,
            can_edit: true,
            can_delete: true,
            can_create_child: true,
            can_manage_permissions: true,
        }
    }

    pub fn allows(&self, permission: Permission) -> bool {
        match permission {
            Permission::View => self.can_view,
            Permission::Edit => self.can_edit,
            Permission::Delete => self.can_delete,
            Permission::CreateChild => self.can_create_child,
            Permission::ManagePermissions => self.can_manage_permissions,
        }
    }
}

/// Persisted, flat folder record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderRecord {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub kind: FolderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<CriteriaExpression>,
    #[serde(default)]
    pub auto_refresh: bool,
    #[serde(default)]
    pub permission_set: PermissionSet,
    #[serde(default)]
    pub inherit_permissions: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// Bumped by the store on every successful update
    #[serde(default)]
    pub version: u64,
}

impl FolderRecord {
    /// A top-level regular folder with its own full permission set
    pub fn regular(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            parent_id: None,
            kind: FolderKind::Regular,
            criteria: None,
            auto_refresh: false,
            permission_set: PermissionSet::full(),
            inherit_permissions: false,
            description: None,
            color: None,
            icon: None,
            created_at: now,
            modified_at: now,
            version: 0,
        }
    }

    /// A top-level smart folder evaluating `criteria`
    pub fn smart(
        id: impl Into<String>,
        name: impl Into<String>,
        criteria: CriteriaExpression,
    ) -> Self {
        Self {
            kind: FolderKind::Smart,
            criteria: Some(criteria),
            ..Self::regular(id, name)
        }
    }

    /// Set the declared parent
    pub fn under(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Switch to inherited permissions
    pub fn inheriting(mut self) -> Self {
        self.inherit_permissions = true;
        self
    }

    pub fn with_permissions(mut self, permission_set: PermissionSet) -> Self {
        self.permission_set = permission_set;
        self.inherit_permissions = false;
        self
    }

    pub fn is_smart(&self) -> bool {
        self.kind == FolderKind::Smart
    }

    pub fn is_synthetic_root(&self) -> bool {
        self.id == ROOT_FOLDER_ID
    }

    /// The non-persisted root that adopts top-level records and orphans
    pub fn synthetic_root() -> Self {
        Self {
            id: ROOT_FOLDER_ID.to_string(),
            name: ROOT_FOLDER_NAME.to_string(),
            parent_id: None,
            kind: FolderKind::Regular,
            criteria: None,
            auto_refresh: false,
            permission_set: PermissionSet::view_only(),
            inherit_permissions: false,
            description: None,
            color: None,
            icon: None,
            created_at: DateTime::<Utc>::default(),
            modified_at: DateTime::<Utc>::default(),
            version: 0,
        }
    }
}

/// Request to create a new folder
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderRequest {
    /// Caller-chosen id; a UUID is generated when absent
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub kind: FolderKind,
    #[serde(default)]
    pub criteria: Option<CriteriaExpression>,
    #[serde(default)]
    pub auto_refresh: bool,
    #[serde(default)]
    pub permission_set: Option<PermissionSet>,
    /// Defaults to inheriting when a parent is given and no explicit set is supplied
    #[serde(default)]
    pub inherit_permissions: Option<bool>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

/// Request to update a folder. Absent fields are left unchanged.
///
/// `parent_id` moves the folder; [`ROOT_FOLDER_ID`] moves it to the top level.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFolderRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub criteria: Option<CriteriaExpression>,
    #[serde(default)]
    pub auto_refresh: Option<bool>,
    #[serde(default)]
    pub permission_set: Option<PermissionSet>,
    #[serde(default)]
    pub inherit_permissions: Option<bool>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

impl UpdateFolderRequest {
    pub fn touches_permissions(&self) -> bool {
        self.permission_set.is_some() || self.inherit_permissions.is_some()
    }

    pub fn touches_content(&self) -> bool {
        self.name.is_some()
            || self.parent_id.is_some()
            || self.criteria.is_some()
            || self.auto_refresh.is_some()
            || self.description.is_some()
            || self.color.is_some()
            || self.icon.is_some()
    }

    pub fn is_empty(&self) -> bool {
        !self.touches_permissions() && !self.touches_content()
    }
}

/// Partial update applied by a folder store.
///
/// Outer `None` leaves a field unchanged; for nullable fields the inner
/// `None` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FolderPatch {
    pub name: Option<String>,
    pub parent_id: Option<Option<String>>,
    pub criteria: Option<Option<CriteriaExpression>>,
    pub auto_refresh: Option<bool>,
    pub permission_set: Option<PermissionSet>,
    pub inherit_permissions: Option<bool>,
    pub description: Option<Option<String>>,
    pub color: Option<Option<String>>,
    pub icon: Option<Option<String>>,
}

impl FolderPatch {
    /// Apply the patch in place, stamping `modified_at`
    pub fn apply(&self, record: &mut FolderRecord, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            record.name = name.clone();
        }
        if let Some(parent_id) = &self.parent_id {
            record.parent_id = parent_id.clone();
        }
        if let Some(criteria) = &self.criteria {
            record.criteria = criteria.clone();
        }
        if let Some(auto_refresh) = self.auto_refresh {
            record.auto_refresh = auto_refresh;
        }
        if let Some(permission_set) = self.permission_set {
            record.permission_set = permission_set;
        }
        if let Some(inherit) = self.inherit_permissions {
            record.inherit_permissions = inherit;
        }
        if let Some(description) = &self.description {
            record.description = description.clone();
        }
        if let Some(color) = &self.color {
            record.color = color.clone();
        }
        if let Some(icon) = &self.icon {
            record.icon = icon.clone();
        }
        record.modified_at = now;
    }
}

/// One page of folder records from a store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderPage {
    pub records: Vec<FolderRecord>,
    pub has_more: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_set_defaults_deny() {
        let set = PermissionSet::default();
        assert_eq!(set, PermissionSet::deny_all());
        assert!(!set.allows(Permission::View));
        assert!(PermissionSet::view_only().allows(Permission::View));
        assert!(!PermissionSet::view_only().allows(Permission::Edit));
    }

    #[test]
    fn test_record_json_shape() {
        let record = FolderRecord::regular("a", "Inbox").under("root-a");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["parentId"], "root-a");
        assert_eq!(json["kind"], "regular");
        assert_eq!(json["permissionSet"]["canCreateChild"], true);
        assert!(json.get("criteria").is_none());
        assert!(json.get("description").is_none());

        let back: FolderRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_patch_apply() {
        let mut record = FolderRecord::regular("a", "Old").under("p");
        let now = Utc::now();
        let patch = FolderPatch {
            name: Some("New".into()),
            parent_id: Some(None),
            description: Some(Some("notes".into())),
            ..Default::default()
        };
        patch.apply(&mut record, now);
        assert_eq!(record.name, "New");
        assert_eq!(record.parent_id, None);
        assert_eq!(record.description.as_deref(), Some("notes"));
        assert_eq!(record.modified_at, now);
    }

    #[test]
    fn test_synthetic_root() {
        let root = FolderRecord::synthetic_root();
        assert!(root.is_synthetic_root());
        assert!(!root.inherit_permissions);
        assert_eq!(root.permission_set, PermissionSet::view_only());
    }

    #[test]
    fn test_update_request_flags() {
        let req = UpdateFolderRequest {
            inherit_permissions: Some(true),
            ..Default::default()
        };
        assert!(req.touches_permissions());
        assert!(!req.touches_content());
        assert!(UpdateFolderRequest::default().is_empty());
    }
}
