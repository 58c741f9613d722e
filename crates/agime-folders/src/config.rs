//! Folder module configuration

use serde::{Deserialize, Serialize};

/// Stable ordering applied to the children of every tree node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildOrder {
    /// Byte-wise ascending by name, ties keep input order
    #[default]
    Name,
    /// Input order of the flat record list
    Insertion,
    /// Ascending creation time, ties keep input order
    CreatedAt,
}

impl std::str::FromStr for ChildOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "name" => Ok(ChildOrder::Name),
            "insertion" => Ok(ChildOrder::Insertion),
            "created_at" | "created" => Ok(ChildOrder::CreatedAt),
            _ => Err(format!("Invalid child order: {}", s)),
        }
    }
}

/// Folder feature configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderConfig {
    /// Quiet period before a smart folder refresh runs; bursts inside it coalesce
    #[serde(default = "default_refresh_debounce_ms")]
    pub refresh_debounce_ms: u64,

    /// Number of sample document ids carried by a match summary
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// Page size used when draining the folder store
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Documents evaluated between two cancellation checks
    #[serde(default = "default_evaluation_chunk_size")]
    pub evaluation_chunk_size: usize,

    /// Maximum folder name length in code points
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,

    /// Maximum description length in code points
    #[serde(default = "default_max_description_length")]
    pub max_description_length: usize,

    /// Ordering of children in built trees
    #[serde(default)]
    pub child_order: ChildOrder,
}

fn default_refresh_debounce_ms() -> u64 {
    300
}

fn default_sample_size() -> usize {
    3
}

fn default_page_size() -> usize {
    100
}

fn default_evaluation_chunk_size() -> usize {
    256
}

fn default_max_name_length() -> usize {
    255
}

fn default_max_description_length() -> usize {
    500
}

impl Default for FolderConfig {
    fn default() -> Self {
        Self {
            refresh_debounce_ms: default_refresh_debounce_ms(),
            sample_size: default_sample_size(),
            page_size: default_page_size(),
            evaluation_chunk_size: default_evaluation_chunk_size(),
            max_name_length: default_max_name_length(),
            max_description_length: default_max_description_length(),
            child_order: ChildOrder::default(),
        }
    }
}

impl FolderConfig {
    /// Create a new folder config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Overlay `FOLDERS_*` environment variables on the defaults.
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_parse("FOLDERS_REFRESH_DEBOUNCE_MS") {
            config.refresh_debounce_ms = v;
        }
        if let Some(v) = env_parse("FOLDERS_SAMPLE_SIZE") {
            config.sample_size = v;
        }
        if let Some(v) = env_parse::<usize>("FOLDERS_PAGE_SIZE") {
            config.page_size = v.max(1);
        }
        if let Some(v) = env_parse::<usize>("FOLDERS_EVALUATION_CHUNK_SIZE") {
            config.evaluation_chunk_size = v.max(1);
        }
        if let Some(v) = env_parse("FOLDERS_CHILD_ORDER") {
            config.child_order = v;
        }
        config
    }

    pub fn refresh_debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.refresh_debounce_ms)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FolderConfig::new();
        assert_eq!(config.refresh_debounce_ms, 300);
        assert_eq!(config.sample_size, 3);
        assert_eq!(config.max_name_length, 255);
        assert_eq!(config.max_description_length, 500);
        assert_eq!(config.child_order, ChildOrder::Name);
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let config: FolderConfig =
            serde_json::from_str(r#"{"sample_size": 5, "child_order": "insertion"}"#).unwrap();
        assert_eq!(config.sample_size, 5);
        assert_eq!(config.child_order, ChildOrder::Insertion);
        assert_eq!(config.page_size, 100);
    }

    #[test]
    fn test_child_order_parse() {
        assert_eq!("Name".parse::<ChildOrder>().unwrap(), ChildOrder::Name);
        assert_eq!(
            "created_at".parse::<ChildOrder>().unwrap(),
            ChildOrder::CreatedAt
        );
        assert!("size".parse::<ChildOrder>().is_err());
    }
}
