//! Source parsers: discovery and persistence of task documents per backend.
//!
//! Every backend implements [`SourceParser`]. Backends that encode status in
//! the directory layout also expose [`SpatialStatus`] through
//! [`SourceParser::spatial`]; the engine checks for it before moving files
//! or reconciling status.

pub mod grouped;
pub mod numbered;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::SourceError;
use crate::task::{Metadata, SourceType, Status, TaskDocument};

pub use grouped::GroupedSource;
pub use numbered::NumberedSource;

/// Drops `.` components so `./tasks/x.md` and `tasks/x.md` compare equal.
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let cleaned: PathBuf = path.components().filter(|c| *c != Component::CurDir).collect();
    if cleaned.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        cleaned
    }
}

/// Restricts discovery to a subset of documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    /// Only documents with one of these issue numbers.
    pub numbers: Option<BTreeSet<u64>>,
    /// Only documents stored under these statuses.
    pub statuses: Option<BTreeSet<Status>>,
}

impl TaskFilter {
    /// Filter matching a single issue number.
    #[must_use]
    pub fn number(number: u64) -> Self {
        Self { numbers: Some(BTreeSet::from([number])), statuses: None }
    }

    /// Returns `true` if the document passes the filter.
    #[must_use]
    pub fn matches(&self, doc: &TaskDocument) -> bool {
        let number_ok = match (&self.numbers, doc.issue_number) {
            (None, _) => true,
            (Some(numbers), Some(n)) => numbers.contains(&n),
            (Some(_), None) => false,
        };
        let status_ok =
            self.statuses.as_ref().map_or(true, |statuses| statuses.contains(&doc.storage_status));
        number_ok && status_ok
    }
}

/// Discovers, reads and writes task documents for one storage backend.
pub trait SourceParser {
    /// The backend identifier.
    fn source_type(&self) -> SourceType;

    /// Root directory this backend manages.
    fn root(&self) -> &Path;

    /// Discovers all parseable documents passing `filter`.
    ///
    /// Malformed documents are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error only if the backend root itself cannot be listed.
    fn discover_tasks(&self, filter: Option<&TaskFilter>) -> Result<Vec<TaskDocument>, SourceError>;

    /// Discovers documents that have no remote issue number yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend root cannot be listed.
    fn discover_new_tasks(&self) -> Result<Vec<TaskDocument>, SourceError> {
        Ok(self.discover_tasks(None)?.into_iter().filter(|d| d.issue_number.is_none()).collect())
    }

    /// Reads a single document by path.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not managed here or cannot be parsed.
    fn read_task(&self, path: &Path) -> Result<TaskDocument, SourceError>;

    /// Writes a document's metadata and body to its current path.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    fn write_task(&self, doc: &TaskDocument) -> Result<(), SourceError>;

    /// Creates a new document for an existing remote issue.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::TargetExists`] if the target is taken.
    fn create_task(
        &self,
        number: u64,
        metadata: &Metadata,
        body: &str,
        status: Option<Status>,
    ) -> Result<TaskDocument, SourceError>;

    /// Returns `true` if a document with this number exists.
    fn task_exists(&self, number: u64) -> bool;

    /// Renames the document at `path` to embed `number` and, when given, a
    /// slug derived from `title`. Returns the new document path.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::TargetExists`] if the new name is taken.
    fn rename_task(
        &self,
        path: &Path,
        number: u64,
        title: Option<&str>,
    ) -> Result<PathBuf, SourceError>;

    /// Removes the issue number from a document so it is treated as new.
    /// Returns the new document path.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::TargetExists`] if the unnumbered name is taken.
    fn strip_number(&self, doc: &TaskDocument) -> Result<PathBuf, SourceError>;

    /// Deletes a document from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if removal fails.
    fn delete_task(&self, doc: &TaskDocument) -> Result<(), SourceError>;

    /// Records a successful reconciliation in backend-local bookkeeping.
    ///
    /// # Errors
    ///
    /// Returns an error if the bookkeeping cannot be written.
    fn mark_synced(
        &self,
        _doc: &TaskDocument,
        _hash: &str,
        _at: DateTime<Utc>,
    ) -> Result<(), SourceError> {
        Ok(())
    }

    /// Returns the status-directory capability if this backend has one.
    fn spatial(&self) -> Option<&dyn SpatialStatus> {
        None
    }
}

/// Capability of backends that encode status as a directory.
pub trait SpatialStatus {
    /// Directory holding documents of `status`.
    fn task_dir(&self, status: Status) -> PathBuf;

    /// Moves the document into the directory for `status`. Returns the new path.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::TargetExists`] if the destination is taken.
    fn move_task(&self, doc: &TaskDocument, status: Status) -> Result<PathBuf, SourceError>;

    /// Decides between the metadata status and the directory status.
    ///
    /// The more recent signal wins: `status_last_modified` versus the
    /// directory's modification time. Without a metadata status or
    /// timestamp the directory wins.
    fn resolve_status_conflict(&self, doc: &TaskDocument) -> Status {
        resolve_by_timestamp(
            doc.frontmatter.status,
            doc.frontmatter.status_last_modified,
            doc.storage_status,
            doc.folder_last_modified,
        )
    }
}

/// Timestamp precedence shared by spatial backends.
#[must_use]
pub fn resolve_by_timestamp(
    recorded: Option<Status>,
    recorded_at: Option<DateTime<Utc>>,
    location: Status,
    location_at: DateTime<Utc>,
) -> Status {
    match (recorded, recorded_at) {
        (Some(status), _) if status == location => location,
        (Some(status), Some(at)) if at > location_at => status,
        _ => location,
    }
}

/// Holds the active parsers keyed by backend identifier.
#[derive(Default)]
pub struct Registry<'a> {
    parsers: BTreeMap<SourceType, Box<dyn SourceParser + 'a>>,
}

impl<'a> Registry<'a> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a parser, replacing any previous one of the same type.
    pub fn register(&mut self, parser: Box<dyn SourceParser + 'a>) {
        self.parsers.insert(parser.source_type(), parser);
    }

    /// Returns `true` if no parser is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }

    /// Returns the parser for a backend.
    #[must_use]
    pub fn get(&self, source: SourceType) -> Option<&dyn SourceParser> {
        self.parsers.get(&source).map(AsRef::as_ref)
    }

    /// Returns the parser that owns `doc`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Unmanaged`] if that backend is not registered.
    pub fn for_doc(&self, doc: &TaskDocument) -> Result<&dyn SourceParser, SourceError> {
        self.get(doc.source_type)
            .ok_or_else(|| SourceError::Unmanaged { path: doc.filepath.clone() })
    }

    /// Returns the parser whose root contains `path`.
    #[must_use]
    pub fn for_path(&self, path: &Path) -> Option<&dyn SourceParser> {
        let path = normalize_path(path);
        self.parsers
            .values()
            .map(AsRef::as_ref)
            .find(|p| path.starts_with(normalize_path(p.root())))
    }

    /// Returns the registered parsers, optionally restricted to `only`.
    #[must_use]
    pub fn selected(&self, only: Option<&BTreeSet<SourceType>>) -> Vec<&dyn SourceParser> {
        self.parsers
            .iter()
            .filter(|(source, _)| only.map_or(true, |set| set.contains(source)))
            .map(|(_, parser)| parser.as_ref())
            .collect()
    }

    /// Discovers documents across the selected parsers.
    ///
    /// # Errors
    ///
    /// Returns the first backend whose root cannot be listed.
    pub fn discover(
        &self,
        only: Option<&BTreeSet<SourceType>>,
        filter: Option<&TaskFilter>,
    ) -> Result<Vec<TaskDocument>, SourceError> {
        let mut docs = Vec::new();
        for parser in self.selected(only) {
            docs.extend(parser.discover_tasks(filter)?);
        }
        Ok(docs)
    }

    /// Discovers unnumbered documents across the selected parsers.
    ///
    /// # Errors
    ///
    /// Returns the first backend whose root cannot be listed.
    pub fn discover_new(
        &self,
        only: Option<&BTreeSet<SourceType>>,
    ) -> Result<Vec<TaskDocument>, SourceError> {
        let mut docs = Vec::new();
        for parser in self.selected(only) {
            docs.extend(parser.discover_new_tasks()?);
        }
        Ok(docs)
    }
}
