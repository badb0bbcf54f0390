//! Task document model and its structured-text codec.

mod document;
pub mod frontmatter;
pub mod slug;
pub mod timestamp;

pub use document::{Metadata, Priority, Severity, SourceType, Status, TaskDocument};
