//! Data models for the folder hierarchy

mod criteria;
mod document;
mod folder;
mod tree;

pub use criteria::*;
pub use document::*;
pub use folder::*;
pub use tree::*;
