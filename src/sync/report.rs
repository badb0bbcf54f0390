//! End-of-run summary.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::resolve::Resolution;

/// Identifies an item in the error list.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ItemKey {
    /// A numbered item.
    Number(u64),
    /// A document without a number yet.
    Path(PathBuf),
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "#{n}"),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// What a run did, by category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Local changes sent to the tracker.
    pub pushed: Vec<u64>,
    /// Remote changes written locally.
    pub pulled: Vec<u64>,
    /// Conflicts and how each was decided.
    pub conflicts: Vec<(u64, Resolution)>,
    /// Unchanged, or not acted on in this direction.
    pub skipped: Vec<u64>,
    /// Issue confirmed gone remotely.
    pub orphaned: Vec<u64>,
    /// Issue could not be fetched; existence unknown.
    pub unverified: Vec<u64>,
    /// New issues: document path and assigned number.
    pub created: Vec<(PathBuf, u64)>,
    /// Orphans deleted locally.
    pub deleted: Vec<u64>,
    /// Orphans whose number was removed.
    pub stripped: Vec<u64>,
    /// Unnumbered documents left alone because creation was not requested.
    pub new: Vec<PathBuf>,
    /// Per-item failures.
    pub errors: BTreeMap<ItemKey, String>,
}

impl SyncReport {
    /// Records a per-item failure.
    pub fn error(&mut self, key: ItemKey, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(item = %key, "{message}");
        self.errors.insert(key, message);
    }

    /// Returns `true` if any item failed.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Human-readable summary.
    #[must_use]
    pub fn format(&self) -> String {
        let mut lines = Vec::new();
        push_numbers(&mut lines, "PUSHED", &self.pushed);
        push_numbers(&mut lines, "PULLED", &self.pulled);
        if !self.conflicts.is_empty() {
            let list: Vec<String> =
                self.conflicts.iter().map(|(n, r)| format!("#{n} ({r})")).collect();
            lines.push(format!("  CONFLICT ({}): {}", self.conflicts.len(), list.join(", ")));
        }
        push_numbers(&mut lines, "SKIPPED", &self.skipped);
        push_numbers(&mut lines, "ORPHANED", &self.orphaned);
        push_numbers(&mut lines, "UNVERIFIED", &self.unverified);
        if !self.created.is_empty() {
            let list: Vec<String> = self
                .created
                .iter()
                .map(|(path, n)| format!("#{n} ({})", path.display()))
                .collect();
            lines.push(format!("  CREATED ({}): {}", self.created.len(), list.join(", ")));
        }
        push_numbers(&mut lines, "DELETED", &self.deleted);
        push_numbers(&mut lines, "STRIPPED", &self.stripped);
        if !self.new.is_empty() {
            lines.push(format!(
                "  NEW ({}): run with --create-new to create issues",
                self.new.len()
            ));
            for path in &self.new {
                lines.push(format!("    {}", path.display()));
            }
        }
        if !self.errors.is_empty() {
            lines.push(format!("  ERRORS ({}):", self.errors.len()));
            for (key, message) in &self.errors {
                lines.push(format!("    {key}: {message}"));
            }
        }
        if lines.is_empty() {
            return "Nothing to do.".to_string();
        }
        lines.join("\n")
    }
}

fn push_numbers(lines: &mut Vec<String>, heading: &str, numbers: &[u64]) {
    if numbers.is_empty() {
        return;
    }
    let list: Vec<String> = numbers.iter().map(|n| format!("#{n}")).collect();
    lines.push(format!("  {heading} ({}): {}", numbers.len(), list.join(", ")));
}
