//! Creating remote issues for documents that do not have one yet.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{SourceError, SyncError};
use crate::ports::issues::NewIssue;
use crate::sources::normalize_path;
use crate::task::TaskDocument;

use super::engine::{Creator, SyncEngine, SyncOptions, Target};
use super::report::{ItemKey, SyncReport};
use super::state::SyncState;

impl SyncEngine<'_> {
    /// Strips confirmed orphans, then creates an issue for every unnumbered
    /// document in scope.
    ///
    /// A rename that collides with an existing document stops the pass: the
    /// remaining documents would likely hit the same problem.
    pub(super) fn create_new_tasks(
        &self,
        orphans: &[TaskDocument],
        options: &SyncOptions,
        state: &mut SyncState,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let mut moved = BTreeMap::new();
        for doc in orphans {
            if let Some(path) = self.strip_orphan(doc, state, report) {
                moved.insert(doc.filepath.clone(), path);
            }
        }

        let docs = match &options.target {
            Some(Target::File(path)) => {
                let path = normalize_path(path);
                let path = moved.get(&path).unwrap_or(&path);
                match self.read_target(path) {
                    Ok(doc) if doc.issue_number.is_none() => vec![doc],
                    Ok(_) => Vec::new(),
                    Err(e) => {
                        report.error(ItemKey::Path(path.clone()), e.to_string());
                        Vec::new()
                    }
                }
            }
            Some(Target::Number(_)) => Vec::new(),
            None => self.registry.discover_new(options.sources.as_ref())?,
        };

        for doc in docs {
            match self.create_one(&doc, state) {
                Ok((path, number)) => report.created.push((path, number)),
                Err(e @ SyncError::Source(SourceError::TargetExists { .. })) => {
                    report.error(ItemKey::Path(doc.filepath.clone()), e.to_string());
                    tracing::warn!("stopping issue creation after a naming collision");
                    break;
                }
                Err(e) => report.error(ItemKey::Path(doc.filepath.clone()), e.to_string()),
            }
        }
        Ok(())
    }

    fn create_one(
        &self,
        doc: &TaskDocument,
        state: &mut SyncState,
    ) -> Result<(PathBuf, u64), SyncError> {
        let parser = self.registry.for_doc(doc)?;
        let issue = self.mapper.new_issue(doc);
        self.ensure_labels(&issue.labels);
        let number = match &self.creator {
            Creator::Command { program, repository } => {
                self.create_with_command(program, repository, &issue)?
            }
            Creator::Api => {
                self.ctx
                    .issues
                    .create_issue(&issue)
                    .map_err(|e| SyncError::Create(e.to_string()))?
                    .number
            }
        };
        tracing::info!(number, doc = %doc.label(), "created issue");

        let path = parser.rename_task(&doc.filepath, number, None).inspect_err(|e| {
            tracing::warn!(number, "issue #{number} was created but the document was not renamed: {e}");
        })?;
        let created = parser.read_task(&path)?;

        match self.ctx.issues.get_issue(number) {
            Ok(Some(record)) => self.commit(parser, &created, &record, state)?,
            Ok(None) | Err(_) => {
                tracing::warn!(number, "new issue not readable yet; state recorded from local side");
                let hash = self.local_hash(&created);
                let now = self.ctx.clock.now();
                parser.mark_synced(&created, &hash, now)?;
                state.record(number, hash.clone(), hash, now);
            }
        }
        Ok((path, number))
    }

    fn create_with_command(
        &self,
        program: &str,
        repository: &str,
        issue: &NewIssue,
    ) -> Result<u64, SyncError> {
        let mut args: Vec<String> = [
            "issue",
            "create",
            "--repo",
            repository,
            "--title",
            issue.title.as_str(),
            "--body",
            issue.body.as_str(),
        ]
        .iter()
        .map(ToString::to_string)
        .collect();
        for label in &issue.labels {
            args.push("--label".to_string());
            args.push(label.clone());
        }
        if let Some(assignee) = &issue.assignee {
            args.push("--assignee".to_string());
            args.push(assignee.clone());
        }

        let output = self
            .ctx
            .shell
            .run(program, &args)
            .map_err(|e| SyncError::Create(format!("running {program}: {e}")))?;
        if !output.success() {
            return Err(SyncError::Create(format!(
                "{program} exited with {}: {}",
                output.exit_code,
                output.stderr.trim()
            )));
        }
        parse_issue_number(&output.stdout).ok_or_else(|| {
            SyncError::Create(format!("no issue number in output: {}", output.stdout.trim()))
        })
    }
}

fn issue_url() -> Option<&'static Regex> {
    static ISSUE_URL: OnceLock<Option<Regex>> = OnceLock::new();
    ISSUE_URL.get_or_init(|| Regex::new(r"/issues/(\d+)").ok()).as_ref()
}

/// Extracts the issue number from issue-creation output: the last issue
/// URL, or a bare trailing number with an optional `#`.
#[must_use]
pub fn parse_issue_number(output: &str) -> Option<u64> {
    let text = output.trim();
    if let Some(caps) = issue_url().and_then(|re| re.captures_iter(text).last()) {
        return caps[1].parse().ok();
    }
    text.split_whitespace().last()?.trim_start_matches('#').parse().ok()
}
