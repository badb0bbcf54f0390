//! Handling documents whose remote issue is confirmed gone.

use std::path::PathBuf;

use crate::error::SyncError;
use crate::task::TaskDocument;

use super::engine::{SyncEngine, SyncOptions};
use super::report::{ItemKey, SyncReport};
use super::state::SyncState;

const DELETE: usize = 0;
const KEEP: usize = 1;
const DELETE_ALL: usize = 2;

impl SyncEngine<'_> {
    /// Runs interactive cleanup and stripping over confirmed orphans.
    /// Returns the orphans still present and numbered afterwards.
    pub(super) fn handle_orphans(
        &self,
        orphans: &[TaskDocument],
        options: &SyncOptions,
        state: &mut SyncState,
        report: &mut SyncReport,
    ) -> Result<Vec<TaskDocument>, SyncError> {
        let remaining = if options.clean_orphans {
            self.clean_orphans(orphans, state, report)?
        } else {
            orphans.to_vec()
        };
        if !options.strip_orphans {
            return Ok(remaining);
        }
        for doc in &remaining {
            self.strip_orphan(doc, state, report);
        }
        Ok(Vec::new())
    }

    /// Asks, one orphan at a time, whether to delete it.
    fn clean_orphans(
        &self,
        orphans: &[TaskDocument],
        state: &mut SyncState,
        report: &mut SyncReport,
    ) -> Result<Vec<TaskDocument>, SyncError> {
        let mut kept = Vec::new();
        let mut delete_all = false;
        for (idx, doc) in orphans.iter().enumerate() {
            let Some(number) = doc.issue_number else { continue };
            let delete = if delete_all {
                true
            } else {
                let question = format!(
                    "{} points at issue #{number}, which no longer exists. Delete it?",
                    doc.filepath.display()
                );
                match self
                    .ctx
                    .prompt
                    .select(&question, &["Delete", "Keep", "Delete all remaining", "Stop"])
                    .map_err(|e| SyncError::Prompt(e.to_string()))?
                {
                    DELETE => true,
                    KEEP => false,
                    DELETE_ALL => {
                        delete_all = true;
                        true
                    }
                    _ => {
                        kept.extend(orphans[idx..].iter().cloned());
                        break;
                    }
                }
            };
            if !delete {
                kept.push(doc.clone());
                continue;
            }
            match self.registry.for_doc(doc).and_then(|parser| parser.delete_task(doc)) {
                Ok(()) => {
                    tracing::info!(number, path = %doc.filepath.display(), "deleted orphan");
                    state.forget(number);
                    report.deleted.push(number);
                }
                Err(e) => {
                    report.error(ItemKey::Number(number), e.to_string());
                    kept.push(doc.clone());
                }
            }
        }
        Ok(kept)
    }

    /// Removes the number from one orphan so it can be created again.
    /// Returns the document's new path.
    pub(super) fn strip_orphan(
        &self,
        doc: &TaskDocument,
        state: &mut SyncState,
        report: &mut SyncReport,
    ) -> Option<PathBuf> {
        let number = doc.issue_number?;
        match self.registry.for_doc(doc).and_then(|parser| parser.strip_number(doc)) {
            Ok(path) => {
                tracing::info!(number, path = %path.display(), "removed orphaned issue number");
                state.forget(number);
                report.stripped.push(number);
                Some(path)
            }
            Err(e) => {
                report.error(ItemKey::Number(number), e.to_string());
                None
            }
        }
    }
}
