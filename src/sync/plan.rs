//! Classification of local/remote pairs against the recorded state.

use std::fmt;

use crate::ports::issues::RemoteIssue;
use crate::task::TaskDocument;

use super::state::StateEntry;

/// What a sync run does with one issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Neither side changed.
    Skip,
    /// Only the local document changed.
    Push,
    /// Only the remote issue changed.
    Pull,
    /// Both changed; an operator decides.
    Conflict,
}

impl SyncAction {
    /// Lowercase verb used in reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Push => "push",
            Self::Pull => "pull",
            Self::Conflict => "conflict",
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compares fresh hashes with the recorded pair.
///
/// Without a recorded pair, matching hashes are a skip (the entry is seeded)
/// and differing hashes are a conflict, since neither side can be trusted.
#[must_use]
pub fn classify(entry: Option<&StateEntry>, local_hash: &str, remote_hash: &str) -> SyncAction {
    let Some(entry) = entry else {
        return if local_hash == remote_hash { SyncAction::Skip } else { SyncAction::Conflict };
    };
    match (entry.local_hash == local_hash, entry.remote_hash == remote_hash) {
        (true, true) => SyncAction::Skip,
        (false, true) => SyncAction::Push,
        (true, false) => SyncAction::Pull,
        (false, false) => SyncAction::Conflict,
    }
}

/// One local document paired with its remote issue.
#[derive(Debug, Clone)]
pub struct PlannedItem {
    /// Issue number shared by both sides.
    pub number: u64,
    /// The local document, with its status already reconciled for hashing.
    pub doc: TaskDocument,
    /// The remote issue.
    pub record: RemoteIssue,
    /// Fresh local hash.
    pub local_hash: String,
    /// Fresh remote hash.
    pub remote_hash: String,
    /// Classification.
    pub action: SyncAction,
}

/// Everything a run found before acting.
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    /// Paired documents, in discovery order.
    pub items: Vec<PlannedItem>,
    /// Numbered documents whose issue is confirmed gone.
    pub orphans: Vec<TaskDocument>,
    /// Numbered documents whose issue could not be fetched.
    pub unverified: Vec<TaskDocument>,
    /// Documents not yet created remotely.
    pub unnumbered: Vec<TaskDocument>,
    /// Documents sharing a number with an earlier one.
    pub duplicates: Vec<TaskDocument>,
}

impl SyncPlan {
    /// Items classified as `action`.
    pub fn with_action(&self, action: SyncAction) -> impl Iterator<Item = &PlannedItem> {
        self.items.iter().filter(move |item| item.action == action)
    }

    /// Human-readable dry-run listing.
    #[must_use]
    pub fn format(&self) -> String {
        if self.items.is_empty()
            && self.orphans.is_empty()
            && self.unverified.is_empty()
            && self.unnumbered.is_empty()
        {
            return "No tasks to sync.".to_string();
        }
        let mut lines = Vec::new();
        for item in &self.items {
            lines.push(format!(
                "  {:<8} #{} {}",
                item.action.as_str().to_uppercase(),
                item.number,
                item.doc.frontmatter.title
            ));
        }
        for doc in &self.orphans {
            lines.push(format!("  ORPHAN   {} ({})", doc.label(), doc.filepath.display()));
        }
        for doc in &self.unverified {
            lines.push(format!("  UNKNOWN  {} ({}): remote fetch failed", doc.label(), doc.filepath.display()));
        }
        for doc in &self.unnumbered {
            lines.push(format!("  NEW      {} ({})", doc.frontmatter.title, doc.filepath.display()));
        }
        for doc in &self.duplicates {
            lines.push(format!("  DUPLICATE {} ({})", doc.label(), doc.filepath.display()));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(local: &str, remote: &str) -> StateEntry {
        StateEntry {
            local_hash: local.to_string(),
            remote_hash: remote.to_string(),
            last_synced_at: Utc::now(),
        }
    }

    #[test]
    fn classification_matrix() {
        let recorded = entry("L", "R");
        assert_eq!(classify(Some(&recorded), "L", "R"), SyncAction::Skip);
        assert_eq!(classify(Some(&recorded), "L2", "R"), SyncAction::Push);
        assert_eq!(classify(Some(&recorded), "L", "R2"), SyncAction::Pull);
        assert_eq!(classify(Some(&recorded), "L2", "R2"), SyncAction::Conflict);
    }

    #[test]
    fn first_sight_seeds_or_conflicts() {
        assert_eq!(classify(None, "same", "same"), SyncAction::Skip);
        assert_eq!(classify(None, "a", "b"), SyncAction::Conflict);
    }

    #[test]
    fn empty_plan_formats_a_placeholder() {
        assert_eq!(SyncPlan::default().format(), "No tasks to sync.");
    }
}
