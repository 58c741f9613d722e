//! Permission checking utilities

use crate::error::{FolderError, FolderResult};
use crate::models::{Permission, UpdateFolderRequest};
use crate::services::EffectivePermissions;

/// Deny unless the resolved set grants `permission`
pub fn check_permission(
    effective: &EffectivePermissions,
    permission: Permission,
) -> FolderResult<()> {
    if effective.permissions.allows(permission) {
        Ok(())
    } else {
        Err(FolderError::denied(
            permission.to_string(),
            effective.folder_id.clone(),
        ))
    }
}

/// Permissions an update needs on the folder being changed.
/// A move additionally needs `CreateChild` on the destination.
pub fn required_for_update(request: &UpdateFolderRequest) -> Vec<Permission> {
    let mut required = Vec::with_capacity(2);
    if request.touches_content() {
        required.push(Permission::Edit);
    }
    if request.touches_permissions() {
        required.push(Permission::ManagePermissions);
    }
    required
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PermissionSet;

    fn effective(permissions: PermissionSet) -> EffectivePermissions {
        EffectivePermissions {
            folder_id: "f".into(),
            permissions,
            source_folder_id: Some("f".into()),
        }
    }

    #[test]
    fn test_check_permission() {
        let view = effective(PermissionSet::view_only());
        assert!(check_permission(&view, Permission::View).is_ok());
        let err = check_permission(&view, Permission::Delete).unwrap_err();
        assert!(matches!(
            err,
            FolderError::PermissionDenied { ref action, ref folder_id }
                if action == "delete" && folder_id == "f"
        ));
        assert!(check_permission(&effective(PermissionSet::full()), Permission::Delete).is_ok());
    }

    #[test]
    fn test_required_for_update() {
        let rename = UpdateFolderRequest {
            name: Some("x".into()),
            ..Default::default()
        };
        assert_eq!(required_for_update(&rename), vec![Permission::Edit]);

        let both = UpdateFolderRequest {
            color: Some("#fff".into()),
            inherit_permissions: Some(true),
            ..Default::default()
        };
        assert_eq!(
            required_for_update(&both),
            vec![Permission::Edit, Permission::ManagePermissions]
        );
        assert!(required_for_update(&UpdateFolderRequest::default()).is_empty());
    }
}
