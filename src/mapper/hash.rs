//! Content hashing for change detection.
//!
//! Digests are persisted in the state file and the grouped sidecar, so the
//! function must give the same output on every platform and toolchain.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::ports::issues::IssueState;

/// Semantic fields compared between runs.
///
/// Both sides are reduced to this shape before hashing, so a document and
/// the issue it was pushed to hash identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HashInput<'a> {
    /// Title after normalization.
    pub title: &'a str,
    /// Body without decoration.
    pub body: &'a str,
    /// Open or closed.
    pub state: IssueState,
    /// Valid labels, sorted and deduplicated.
    pub labels: Vec<&'a str>,
    /// Resolved assignee.
    pub assignee: Option<&'a str>,
    /// Reporter carried in the body block.
    pub reporter: Option<&'a str>,
    /// Due date carried in the body block.
    pub due_date: Option<&'a str>,
    /// Epic carried in the body block.
    pub epic: Option<&'a str>,
    /// Commit carried in the body block.
    pub related_commit: Option<&'a str>,
}

impl HashInput<'_> {
    /// Hex SHA-256 of the canonical JSON rendering.
    #[must_use]
    pub fn digest(&self) -> String {
        let mut sorted = self.clone();
        sorted.labels.sort_unstable();
        sorted.labels.dedup();
        // Serializing a struct of strings cannot fail.
        let json = serde_json::to_string(&sorted).unwrap_or_default();
        hash_str(&json)
    }
}

/// Hex SHA-256 of a string.
#[must_use]
pub fn hash_str(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
