//! Services module - folder business logic
//!
//! The tree builder, permission resolver, statistics aggregator and criteria
//! evaluator are pure computations over snapshots. [`FolderService`] composes
//! them with the stores, and [`SmartFolderRefresher`] owns the only long-lived
//! mutable state: per-folder smart evaluation results.

pub mod concurrency;
pub mod criteria_evaluator;
pub mod folder_service;
pub mod permission_resolver;
pub mod refresh;
pub mod stats_service;
pub mod tree_builder;

pub use concurrency::{ETag, FolderLocks};
pub use criteria_evaluator::{CriteriaEvaluator, MatchResult, MatchSummary};
pub use folder_service::{FolderMembers, FolderService};
pub use permission_resolver::{EffectivePermissions, PermissionResolver};
pub use refresh::{RefreshEvent, RefreshOutcome, SmartFolderRefresher, SmartSnapshot, SnapshotRead};
pub use stats_service::{FolderMembership, StatisticsAggregator};
pub use tree_builder::TreeBuilder;
