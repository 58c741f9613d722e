//! AGIME Folders Module
//!
//! Organizes documents into a hierarchy of regular and smart folders.
//!
//! # Features
//! - Tree building from flat, possibly malformed folder records
//! - Permission inheritance along the folder hierarchy
//! - Rolled-up per-folder document statistics
//! - Smart folders driven by criteria expressions, with debounced,
//!   cancelable background refresh
//! - Optimistic concurrency for folder mutations
//! - Axum routes exposing the folder API as JSON

pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod security;
pub mod services;
pub mod store;

pub use config::{ChildOrder, FolderConfig};
pub use error::{FolderError, FolderResult};
pub use services::FolderService;
