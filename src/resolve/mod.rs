//! Interactive conflict resolution.
//!
//! The engine hands over its full conflict list and gets back one decision
//! per issue. Decisions pick a whole side; fields are never merged.

pub mod diff;

use std::collections::BTreeMap;
use std::fmt;

use crate::error::SyncError;
use crate::mapper::FieldMapper;
use crate::ports::prompt::Prompt;
use crate::sync::plan::PlannedItem;

/// Operator decision for one conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Overwrite the remote issue with the local document.
    UseLocal,
    /// Overwrite the local document with the remote issue.
    UseRemote,
    /// Leave both sides alone; the conflict resurfaces next run.
    Skip,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UseLocal => "use local",
            Self::UseRemote => "use remote",
            Self::Skip => "skip",
        })
    }
}

const USE_LOCAL: &str = "Use local";
const USE_REMOTE: &str = "Use remote";
const SKIP: &str = "Skip";
const SKIP_ALL: &str = "Skip all remaining";

/// Walks conflicts in order, asking the operator for each.
pub struct ConflictResolver<'a> {
    prompt: &'a dyn Prompt,
    mapper: &'a FieldMapper,
}

impl<'a> ConflictResolver<'a> {
    /// Creates a resolver.
    #[must_use]
    pub fn new(prompt: &'a dyn Prompt, mapper: &'a FieldMapper) -> Self {
        Self { prompt, mapper }
    }

    /// Collects a decision for every conflict.
    ///
    /// "Skip all remaining" is offered only while more than one conflict is
    /// left, and turns every later conflict into [`Resolution::Skip`]
    /// without asking.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Prompt`] if the operator cannot be asked.
    pub fn resolve(&self, conflicts: &[&PlannedItem]) -> Result<BTreeMap<u64, Resolution>, SyncError> {
        let mut decisions = BTreeMap::new();
        let mut skip_rest = false;
        for (index, item) in conflicts.iter().enumerate() {
            if skip_rest {
                decisions.insert(item.number, Resolution::Skip);
                continue;
            }
            self.prompt.show(&diff::render(self.mapper, item));

            let remaining = conflicts.len() - index;
            let mut choices = vec![USE_LOCAL, USE_REMOTE, SKIP];
            if remaining > 1 {
                choices.push(SKIP_ALL);
            }
            let question = format!("Resolve #{} ({} of {}):", item.number, index + 1, conflicts.len());
            let picked = self
                .prompt
                .select(&question, &choices)
                .map_err(|e| SyncError::Prompt(e.to_string()))?;

            let resolution = match choices.get(picked).copied() {
                Some(USE_LOCAL) => Resolution::UseLocal,
                Some(USE_REMOTE) => Resolution::UseRemote,
                Some(SKIP_ALL) => {
                    skip_rest = true;
                    Resolution::Skip
                }
                _ => Resolution::Skip,
            };
            tracing::info!(number = item.number, %resolution, "conflict resolved");
            decisions.insert(item.number, resolution);
        }
        Ok(decisions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::ScriptedPrompt;
    use crate::ports::issues::{IssueState, RemoteIssue};
    use crate::sync::plan::SyncAction;
    use crate::task::{Metadata, SourceType, Status, TaskDocument};
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;

    fn conflict(number: u64) -> PlannedItem {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        PlannedItem {
            number,
            doc: TaskDocument {
                issue_number: Some(number),
                source_type: SourceType::Numbered,
                filename: format!("{number:03}-x.md"),
                filepath: PathBuf::from(format!("/t/backlog/{number:03}-x.md")),
                frontmatter: Metadata::new("Local title", "alice", at),
                body: "local body".into(),
                last_modified: at,
                folder_last_modified: at,
                storage_status: Status::Backlog,
            },
            record: RemoteIssue {
                number,
                title: "Remote title".into(),
                body: Some("remote body".into()),
                state: IssueState::Closed,
                labels: vec!["priority:p0".into()],
                assignee: None,
                created_at: at,
                updated_at: at,
                closed_at: Some(at),
            },
            local_hash: "l".into(),
            remote_hash: "r".into(),
            action: SyncAction::Conflict,
        }
    }

    #[test]
    fn collects_one_decision_per_conflict() {
        let prompt = ScriptedPrompt::answering(&[0, 1]);
        let mapper = FieldMapper::default();
        let (a, b) = (conflict(1), conflict(2));

        let decisions = ConflictResolver::new(&prompt, &mapper).resolve(&[&a, &b]).unwrap();
        assert_eq!(decisions[&1], Resolution::UseLocal);
        assert_eq!(decisions[&2], Resolution::UseRemote);
    }

    #[test]
    fn skip_all_is_offered_only_when_more_remain() {
        let prompt = ScriptedPrompt::answering(&[2, 2]);
        let mapper = FieldMapper::default();
        let (a, b) = (conflict(1), conflict(2));

        ConflictResolver::new(&prompt, &mapper).resolve(&[&a, &b]).unwrap();
        let questions = prompt.questions();
        assert_eq!(questions[0].1.len(), 4);
        assert_eq!(questions[1].1.len(), 3);
    }

    #[test]
    fn skip_all_short_circuits_later_conflicts() {
        let prompt = ScriptedPrompt::answering(&[3]);
        let mapper = FieldMapper::default();
        let items: Vec<PlannedItem> = (1..=3).map(conflict).collect();
        let refs: Vec<&PlannedItem> = items.iter().collect();

        let decisions = ConflictResolver::new(&prompt, &mapper).resolve(&refs).unwrap();
        assert!(decisions.values().all(|r| *r == Resolution::Skip));
        assert_eq!(prompt.questions().len(), 1);
    }

    #[test]
    fn diff_shows_every_contested_field() {
        let prompt = ScriptedPrompt::answering(&[2]);
        let mapper = FieldMapper::default();
        let item = conflict(1);

        ConflictResolver::new(&prompt, &mapper).resolve(&[&item]).unwrap();
        let shown = prompt.shown().join("\n");
        assert!(shown.contains("Remote title"));
        assert!(shown.contains("+local body"));
        assert!(shown.contains("priority:p0 (remote only)"));
        assert!(shown.contains("State"));
        assert!(shown.contains("priority: p2 -> p0"));
    }

    #[test]
    fn prompt_failure_is_an_error() {
        let prompt = ScriptedPrompt::new();
        let mapper = FieldMapper::default();
        let item = conflict(1);
        assert!(matches!(
            ConflictResolver::new(&prompt, &mapper).resolve(&[&item]),
            Err(SyncError::Prompt(_))
        ));
    }
}
