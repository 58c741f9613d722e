//! Routes module - HTTP API endpoints

pub mod folders;

use crate::services::FolderService;
use axum::Router;
use std::sync::Arc;

pub use folders::folder_routes;

/// Folder API router with its service attached
pub fn router(service: Arc<FolderService>) -> Router {
    folder_routes().with_state(service)
}
