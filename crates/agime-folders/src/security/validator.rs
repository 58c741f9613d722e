//! Input validation for folder mutations

use crate::config::FolderConfig;
use crate::error::{FolderError, FolderResult};
use crate::models::{CriteriaExpression, FolderKind, ROOT_FOLDER_ID};
use regex::Regex;
use std::sync::LazyLock;

/// Control characters are never allowed in names
static CONTROL_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\p{Cc}").unwrap());

/// Caller-chosen folder ids: alphanumeric, underscore, hyphen, dot, colon
static VALID_FOLDER_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_\-\.:]{1,128}$").unwrap());

/// Validate a folder name: 1 to `max_name_length` code points, not blank
pub fn validate_folder_name(name: &str, config: &FolderConfig) -> FolderResult<()> {
    if name.trim().is_empty() {
        return Err(FolderError::Validation(
            "Folder name cannot be empty".to_string(),
        ));
    }
    let length = name.chars().count();
    if length > config.max_name_length {
        return Err(FolderError::Validation(format!(
            "Folder name is {} characters, maximum is {}",
            length, config.max_name_length
        )));
    }
    if CONTROL_CHARS.is_match(name) {
        return Err(FolderError::Validation(
            "Folder name contains control characters".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_description(description: &str, config: &FolderConfig) -> FolderResult<()> {
    let length = description.chars().count();
    if length > config.max_description_length {
        return Err(FolderError::Validation(format!(
            "Description is {} characters, maximum is {}",
            length, config.max_description_length
        )));
    }
    Ok(())
}

pub fn validate_folder_id(id: &str) -> FolderResult<()> {
    if id == ROOT_FOLDER_ID {
        return Err(FolderError::Validation(format!(
            "Folder id {} is reserved",
            ROOT_FOLDER_ID
        )));
    }
    if !VALID_FOLDER_ID.is_match(id) {
        return Err(FolderError::Validation(format!("Invalid folder id: {}", id)));
    }
    Ok(())
}

/// Smart folders need a criteria expression with at least one facet;
/// regular folders must not carry one
pub fn validate_kind_criteria(
    kind: FolderKind,
    criteria: Option<&CriteriaExpression>,
) -> FolderResult<()> {
    match (kind, criteria) {
        (FolderKind::Smart, Some(c)) if !c.is_empty() => Ok(()),
        (FolderKind::Smart, _) => Err(FolderError::invalid_criteria(
            "smart folder criteria must have at least one facet",
        )),
        (FolderKind::Regular, None) => Ok(()),
        (FolderKind::Regular, Some(c)) if c.is_empty() => Ok(()),
        (FolderKind::Regular, Some(_)) => Err(FolderError::Validation(
            "Regular folders cannot have criteria".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CriteriaBuilder;

    #[test]
    fn test_validate_folder_name() {
        let config = FolderConfig::default();
        assert!(validate_folder_name("Reports", &config).is_ok());
        assert!(validate_folder_name("报告 2024", &config).is_ok());
        assert!(validate_folder_name("", &config).is_err());
        assert!(validate_folder_name("   ", &config).is_err());
        assert!(validate_folder_name("bad\nname", &config).is_err());

        // Limit counts code points, not bytes
        assert!(validate_folder_name(&"é".repeat(255), &config).is_ok());
        assert!(validate_folder_name(&"é".repeat(256), &config).is_err());
    }

    #[test]
    fn test_validate_description() {
        let config = FolderConfig::default();
        assert!(validate_description("", &config).is_ok());
        assert!(validate_description(&"x".repeat(500), &config).is_ok());
        assert!(validate_description(&"x".repeat(501), &config).is_err());
    }

    #[test]
    fn test_validate_folder_id() {
        assert!(validate_folder_id("a-1").is_ok());
        assert!(validate_folder_id("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_folder_id(ROOT_FOLDER_ID).is_err());
        assert!(validate_folder_id("").is_err());
        assert!(validate_folder_id("a/b").is_err());
        assert!(validate_folder_id(&"a".repeat(129)).is_err());
    }

    #[test]
    fn test_validate_kind_criteria() {
        let criteria = CriteriaBuilder::new().tag("x").build().unwrap();
        let empty = CriteriaBuilder::new().build().unwrap();

        assert!(validate_kind_criteria(FolderKind::Smart, Some(&criteria)).is_ok());
        assert!(matches!(
            validate_kind_criteria(FolderKind::Smart, Some(&empty)),
            Err(FolderError::InvalidCriteria { .. })
        ));
        assert!(validate_kind_criteria(FolderKind::Smart, None).is_err());
        assert!(validate_kind_criteria(FolderKind::Regular, None).is_ok());
        assert!(validate_kind_criteria(FolderKind::Regular, Some(&empty)).is_ok());
        assert!(validate_kind_criteria(FolderKind::Regular, Some(&criteria)).is_err());
    }
}
