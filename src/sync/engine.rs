//! The reconciliation engine.
//!
//! A run is plan, resolve, apply: discovery and fetching produce a
//! [`SyncPlan`], conflicts are handed to the [`ConflictResolver`] in one
//! batch, then every item is applied in order. Per-item failures land in the
//! report; only setup and state-file failures abort the run.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::context::ServiceContext;
use crate::error::{SourceError, SyncError};
use crate::mapper::{labels, FieldMapper};
use crate::ports::issues::RemoteIssue;
use crate::resolve::{ConflictResolver, Resolution};
use crate::sources::{normalize_path, Registry, SourceParser, TaskFilter};
use crate::task::{SourceType, Status, TaskDocument};

use super::plan::{classify, PlannedItem, SyncAction, SyncPlan};
use super::report::{ItemKey, SyncReport};
use super::state::SyncState;

/// Which phases a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Push and pull.
    #[default]
    Sync,
    /// Push only; pull-classified items are reported as skipped.
    Push,
    /// Pull only; push-classified items are reported as skipped.
    Pull,
    /// Only create issues for new documents.
    Create,
}

impl Mode {
    fn pushes(self) -> bool {
        matches!(self, Self::Sync | Self::Push)
    }

    fn pulls(self) -> bool {
        matches!(self, Self::Sync | Self::Pull)
    }
}

/// Restricts a run to one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A document path.
    File(PathBuf),
    /// An issue number, local or remote.
    Number(u64),
}

/// How new issues are created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Creator {
    /// Run `<program> issue create --repo <repository> ...`.
    Command {
        /// Program to run.
        program: String,
        /// `owner/name` passed as `--repo`.
        repository: String,
    },
    /// Create through the issue tracker port.
    Api,
}

/// Per-run switches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Phases to run.
    pub mode: Mode,
    /// Backends to consider; `None` is all registered.
    pub sources: Option<BTreeSet<SourceType>>,
    /// Single document to address.
    pub target: Option<Target>,
    /// Create issues for unnumbered documents.
    pub create_new: bool,
    /// Offer to delete confirmed orphans.
    pub clean_orphans: bool,
    /// Remove numbers from confirmed orphans.
    pub strip_orphans: bool,
}

/// Drives discovery, classification and application for one project.
pub struct SyncEngine<'a> {
    pub(super) ctx: &'a ServiceContext,
    pub(super) registry: &'a Registry<'a>,
    pub(super) mapper: &'a FieldMapper,
    pub(super) state_path: PathBuf,
    pub(super) creator: Creator,
}

impl<'a> SyncEngine<'a> {
    /// Creates an engine persisting its state at `state_path`.
    #[must_use]
    pub fn new(
        ctx: &'a ServiceContext,
        registry: &'a Registry<'a>,
        mapper: &'a FieldMapper,
        state_path: &Path,
        creator: Creator,
    ) -> Self {
        Self { ctx, registry, mapper, state_path: state_path.to_path_buf(), creator }
    }

    /// Loads the persisted state.
    ///
    /// # Errors
    ///
    /// Returns an error if the state file is unreadable or corrupt.
    pub fn load_state(&self) -> Result<SyncState, SyncError> {
        Ok(SyncState::load(self.ctx.fs.as_ref(), &self.state_path)?)
    }

    pub(super) fn save_state(&self, state: &mut SyncState) -> Result<(), SyncError> {
        Ok(state.save(self.ctx.fs.as_ref(), &self.state_path, self.ctx.clock.now())?)
    }

    /// Runs every phase `options` asks for and reports what happened.
    ///
    /// # Errors
    ///
    /// Returns an error for setup problems, state-file failures and prompt
    /// failures. Failures of individual items are recorded in the report.
    pub fn run(&self, options: &SyncOptions) -> Result<SyncReport, SyncError> {
        let mut state = self.load_state()?;
        let mut report = SyncReport::default();

        if let Some(Target::Number(number)) = options.target {
            let filter = TaskFilter::number(number);
            if self.registry.discover(options.sources.as_ref(), Some(&filter))?.is_empty() {
                self.pull_missing(number, options, &mut state, &mut report)?;
                self.save_state(&mut state)?;
                return Ok(report);
            }
        }

        let plan = self.plan(options, &state)?;
        note_findings(&plan, options, &mut report);

        if options.mode != Mode::Create {
            self.apply(&plan, options.mode, &mut state, &mut report)?;
            self.save_state(&mut state)?;
        }

        let mut orphans = plan.orphans.clone();
        if options.clean_orphans || options.strip_orphans {
            orphans = self.handle_orphans(&orphans, options, &mut state, &mut report)?;
            self.save_state(&mut state)?;
        }

        if options.mode == Mode::Create || options.create_new {
            self.create_new_tasks(&orphans, options, &mut state, &mut report)?;
            self.save_state(&mut state)?;
        }

        Ok(report)
    }

    /// Discovers, fetches and classifies without changing anything.
    ///
    /// # Errors
    ///
    /// Returns an error if a backend root cannot be listed or an addressed
    /// file is not a managed document.
    pub fn plan(&self, options: &SyncOptions, state: &SyncState) -> Result<SyncPlan, SyncError> {
        let docs = match &options.target {
            Some(Target::File(path)) => vec![self.read_target(path)?],
            Some(Target::Number(number)) => self
                .registry
                .discover(options.sources.as_ref(), Some(&TaskFilter::number(*number)))?,
            None => self.registry.discover(options.sources.as_ref(), None)?,
        };

        let mut plan = SyncPlan::default();
        let mut numbered: Vec<(u64, TaskDocument)> = Vec::new();
        let mut seen = BTreeSet::new();
        for doc in docs {
            match doc.issue_number {
                None => plan.unnumbered.push(doc),
                Some(number) if !seen.insert(number) => plan.duplicates.push(doc),
                Some(number) => numbered.push((number, doc)),
            }
        }

        let numbers: Vec<u64> = numbered.iter().map(|(n, _)| *n).collect();
        let mut remote = self.ctx.issues.get_issues(&numbers);
        tracing::debug!(requested = numbers.len(), found = remote.len(), "fetched remote issues");

        for (number, doc) in numbered {
            let record = match remote.remove(&number) {
                Some(record) => record,
                None => match self.ctx.issues.get_issue(number) {
                    Ok(Some(record)) => record,
                    Ok(None) => {
                        tracing::info!(number, "remote issue not found; treating as orphan");
                        plan.orphans.push(doc);
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!(number, "could not verify remote issue: {e}");
                        plan.unverified.push(doc);
                        continue;
                    }
                },
            };
            let local_hash = self.local_hash(&doc);
            let remote_hash = self.mapper.hash_record(&record);
            let action = classify(state.entry(number), &local_hash, &remote_hash);
            tracing::debug!(number, %action, "classified");
            plan.items.push(PlannedItem { number, doc, record, local_hash, remote_hash, action });
        }
        Ok(plan)
    }

    /// Applies a plan: conflicts are resolved first, then every item in order.
    ///
    /// # Errors
    ///
    /// Returns an error only if the operator cannot be prompted.
    pub fn apply(
        &self,
        plan: &SyncPlan,
        mode: Mode,
        state: &mut SyncState,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let conflicts: Vec<&PlannedItem> = plan.with_action(SyncAction::Conflict).collect();
        let decisions = if conflicts.is_empty() {
            BTreeMap::new()
        } else {
            ConflictResolver::new(self.ctx.prompt.as_ref(), self.mapper).resolve(&conflicts)?
        };

        for item in &plan.items {
            let number = item.number;
            let outcome = match item.action {
                SyncAction::Skip => {
                    state.record(
                        number,
                        item.local_hash.clone(),
                        item.remote_hash.clone(),
                        self.ctx.clock.now(),
                    );
                    report.skipped.push(number);
                    Ok(())
                }
                SyncAction::Push if mode.pushes() => {
                    self.push(item, state).map(|()| report.pushed.push(number))
                }
                SyncAction::Pull if mode.pulls() => {
                    self.pull(item, state).map(|()| report.pulled.push(number))
                }
                SyncAction::Push | SyncAction::Pull => {
                    tracing::info!(number, action = %item.action, "not applied in this mode");
                    report.skipped.push(number);
                    Ok(())
                }
                SyncAction::Conflict => {
                    let resolution = decisions.get(&number).copied().unwrap_or(Resolution::Skip);
                    report.conflicts.push((number, resolution));
                    match resolution {
                        Resolution::UseLocal => self.push(item, state),
                        Resolution::UseRemote => self.pull(item, state),
                        Resolution::Skip => Ok(()),
                    }
                }
            };
            if let Err(e) = outcome {
                report.error(ItemKey::Number(number), e.to_string());
            }
        }
        Ok(())
    }

    /// Sends the local document over the remote issue.
    fn push(&self, item: &PlannedItem, state: &mut SyncState) -> Result<(), SyncError> {
        let parser = self.registry.for_doc(&item.doc)?;
        let doc = self.reconcile_status(parser, &item.doc)?;
        let update = self.mapper.to_remote(&doc);
        self.ensure_labels(&update.labels);
        let record = self
            .ctx
            .issues
            .update_issue(item.number, &update)
            .map_err(|e| SyncError::Remote(format!("updating #{}: {e}", item.number)))?;
        tracing::info!(number = item.number, "pushed");
        self.commit(parser, &doc, &record, state)
    }

    /// Writes the remote issue over the local document.
    fn pull(&self, item: &PlannedItem, state: &mut SyncState) -> Result<(), SyncError> {
        let parser = self.registry.for_doc(&item.doc)?;
        let (metadata, body) = self.mapper.from_remote(&item.record, Some(&item.doc.frontmatter));
        let status = metadata.status.unwrap_or(Status::Backlog);

        let mut doc = item.doc.clone();
        let status_changed = metadata.status != doc.frontmatter.status;
        doc.frontmatter = metadata;
        doc.body = body;
        if status_changed {
            doc.frontmatter.status_last_modified = Some(self.ctx.clock.now());
        }

        match parser.rename_task(&doc.filepath, item.number, Some(&item.record.title)) {
            Ok(path) => relocate(&mut doc, path),
            Err(e) => tracing::warn!(number = item.number, "keeping current name: {e}"),
        }
        if let Some(spatial) = parser.spatial() {
            if status != doc.storage_status {
                match spatial.move_task(&doc, status) {
                    Ok(path) => relocate(&mut doc, path),
                    Err(e) => tracing::warn!(number = item.number, "could not move to {status}: {e}"),
                }
            }
        }

        parser.write_task(&doc)?;
        let written = parser.read_task(&doc.filepath)?;
        tracing::info!(number = item.number, path = %written.filepath.display(), "pulled");
        let record = self.settle(&written, &item.record)?;
        self.commit(parser, &written, &record, state)
    }

    /// Sends a freshly pulled document back when it no longer hashes like
    /// the issue it came from, e.g. an issue without a `priority:` label
    /// pulled into a document that defaults it. Returns the issue as stored.
    fn settle(&self, doc: &TaskDocument, record: &RemoteIssue) -> Result<RemoteIssue, SyncError> {
        if self.local_hash(doc) == self.mapper.hash_record(record) {
            return Ok(record.clone());
        }
        let update = self.mapper.to_remote(&self.effective(doc));
        self.ensure_labels(&update.labels);
        let settled = self
            .ctx
            .issues
            .update_issue(record.number, &update)
            .map_err(|e| SyncError::Remote(format!("updating #{}: {e}", record.number)))?;
        tracing::info!(number = record.number, "sent fields filled in by the pull");
        Ok(settled)
    }

    /// Creates a local document for an issue that exists only remotely.
    fn pull_missing(
        &self,
        number: u64,
        options: &SyncOptions,
        state: &mut SyncState,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let record = self
            .ctx
            .issues
            .get_issue(number)
            .map_err(|e| SyncError::Remote(format!("fetching #{number}: {e}")))?
            .ok_or_else(|| SyncError::Remote(format!("issue #{number} exists neither locally nor remotely")))?;
        if !options.mode.pulls() {
            report.skipped.push(number);
            return Ok(());
        }
        let parser = self
            .registry
            .selected(options.sources.as_ref())
            .into_iter()
            .next()
            .ok_or(SyncError::NoBackends)?;

        let (mut metadata, body) = self.mapper.from_remote(&record, None);
        metadata.status_last_modified = Some(self.ctx.clock.now());
        let doc = parser.create_task(number, &metadata, &body, metadata.status)?;
        tracing::info!(number, path = %doc.filepath.display(), "created local document from remote");
        let record = self.settle(&doc, &record)?;
        self.commit(parser, &doc, &record, state)?;
        report.pulled.push(number);
        Ok(())
    }

    /// Brings the recorded status and the storage location into agreement.
    ///
    /// Whichever signal is newer wins and the other is rewritten: a newer
    /// recorded status moves the document, a newer location rewrites the
    /// metadata with a fresh `status_last_modified`.
    fn reconcile_status(
        &self,
        parser: &dyn SourceParser,
        doc: &TaskDocument,
    ) -> Result<TaskDocument, SyncError> {
        let Some(spatial) = parser.spatial() else {
            return Ok(doc.clone());
        };
        let resolved = spatial.resolve_status_conflict(doc);
        if resolved != doc.storage_status {
            let path = spatial.move_task(doc, resolved)?;
            tracing::info!(doc = %doc.label(), status = %resolved, "moved to match recorded status");
            return Ok(parser.read_task(&path)?);
        }
        if doc.frontmatter.status != Some(resolved) {
            let mut updated = doc.clone();
            let now = self.ctx.clock.now();
            updated.frontmatter.status = Some(resolved);
            updated.frontmatter.status_last_modified = Some(now);
            if resolved == Status::Completed && updated.frontmatter.completed.is_none() {
                updated.frontmatter.completed = Some(now);
            }
            parser.write_task(&updated)?;
            tracing::info!(doc = %doc.label(), status = %resolved, "recorded status from location");
            return Ok(parser.read_task(&updated.filepath)?);
        }
        Ok(doc.clone())
    }

    /// The document as a push would see it, stored under its resolved status.
    fn effective(&self, doc: &TaskDocument) -> TaskDocument {
        let mut effective = doc.clone();
        if let Some(spatial) = self.registry.get(doc.source_type).and_then(|p| p.spatial()) {
            effective.storage_status = spatial.resolve_status_conflict(doc);
        }
        effective
    }

    /// Local hash with the status a push would send.
    pub(super) fn local_hash(&self, doc: &TaskDocument) -> String {
        self.mapper.hash_document(&self.effective(doc))
    }

    /// Records the converged hash pair for a document and its issue.
    pub(super) fn commit(
        &self,
        parser: &dyn SourceParser,
        doc: &TaskDocument,
        record: &RemoteIssue,
        state: &mut SyncState,
    ) -> Result<(), SyncError> {
        let now = self.ctx.clock.now();
        let local_hash = self.local_hash(doc);
        let remote_hash = self.mapper.hash_record(record);
        if local_hash != remote_hash {
            tracing::debug!(number = record.number, "sides still differ after apply");
        }
        parser.mark_synced(doc, &local_hash, now)?;
        state.record(record.number, local_hash, remote_hash, now);
        Ok(())
    }

    /// Creates any missing labels. Failure only degrades to a warning.
    pub(super) fn ensure_labels(&self, names: &[String]) {
        if let Err(e) = self.ctx.issues.ensure_labels(&labels::specs(names)) {
            tracing::warn!("could not ensure labels: {e}");
        }
    }

    pub(super) fn read_target(&self, path: &Path) -> Result<TaskDocument, SyncError> {
        let path = normalize_path(path);
        let parser = self
            .registry
            .for_path(&path)
            .ok_or_else(|| SourceError::Unmanaged { path: path.clone() })?;
        Ok(parser.read_task(&path)?)
    }
}

/// Updates a document's location after a rename or move.
fn relocate(doc: &mut TaskDocument, path: PathBuf) {
    let name = match doc.source_type {
        SourceType::Numbered => path.file_name(),
        SourceType::Grouped => path.parent().and_then(Path::file_name),
    };
    if let Some(name) = name {
        doc.filename = name.to_string_lossy().into_owned();
    }
    doc.filepath = path;
}

/// Copies orphan, unverified and duplicate findings into the report.
fn note_findings(plan: &SyncPlan, options: &SyncOptions, report: &mut SyncReport) {
    report.orphaned.extend(plan.orphans.iter().filter_map(|d| d.issue_number));
    report.unverified.extend(plan.unverified.iter().filter_map(|d| d.issue_number));
    for doc in &plan.duplicates {
        report.error(
            ItemKey::Path(doc.filepath.clone()),
            format!("duplicate of {}; skipped", doc.label()),
        );
    }
    if !(options.create_new || options.mode == Mode::Create) {
        report.new.extend(plan.unnumbered.iter().map(|d| d.filepath.clone()));
    }
}
