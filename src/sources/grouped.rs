//! One-folder-per-task backend.
//!
//! ```text
//! <root>/
//!   └── login-redirect/
//!         ├── tasks.md      checklist, optional front matter
//!         ├── spec.md       optional description
//!         ├── .sync.json    sidecar: issue number and sync bookkeeping
//!         └── .archived     optional marker, forces completed
//! ```
//!
//! The sidecar replaces the numeric file-name prefix of the numbered
//! backend. Status comes from the checklist: all items checked is
//! completed, some checked is active, none is backlog.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::ServiceContext;
use crate::error::SourceError;
use crate::task::{frontmatter, slug, timestamp, Metadata, SourceType, Status, TaskDocument};

use super::{normalize_path, SourceParser, TaskFilter};

/// Checklist document inside each group.
pub const TASKS_FILE: &str = "tasks.md";
/// Companion description document.
pub const COMPANION_FILE: &str = "spec.md";
/// Sidecar state file.
pub const SIDECAR_FILE: &str = ".sync.json";
/// Archival marker.
pub const ARCHIVED_MARKER: &str = ".archived";

/// Line between the companion description and the checklist body.
const COMPANION_SEPARATOR: &str = "<!-- checklist -->";

/// Typed view of the sidecar. Unknown keys are carried in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sidecar {
    /// Remote issue number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_issue: Option<u64>,
    /// When the group was first linked to an issue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    /// Last successful reconciliation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced: Option<String>,
    /// Local hash at the last reconciliation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_hash: Option<String>,
    /// Anything else found in the file.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Source parser for `<root>/<group>/tasks.md` groups.
pub struct GroupedSource<'a> {
    ctx: &'a ServiceContext,
    root: PathBuf,
}

impl<'a> GroupedSource<'a> {
    /// Creates a parser rooted at `root`.
    #[must_use]
    pub fn new(ctx: &'a ServiceContext, root: &Path) -> Self {
        Self { ctx, root: normalize_path(root) }
    }

    fn groups(&self) -> Result<Vec<PathBuf>, SourceError> {
        if !self.ctx.fs.is_dir(&self.root) {
            return Ok(Vec::new());
        }
        let names = self.ctx.fs.list_dir(&self.root).map_err(|e| SourceError::io(&self.root, e))?;
        Ok(names
            .into_iter()
            .filter(|name| !name.starts_with('.'))
            .map(|name| self.root.join(name))
            .filter(|dir| self.ctx.fs.is_dir(dir) && self.ctx.fs.exists(&dir.join(TASKS_FILE)))
            .collect())
    }

    fn group_of(&self, path: &Path) -> Option<PathBuf> {
        let dir = path.parent()?;
        (path.file_name()? == TASKS_FILE && dir.parent()? == self.root).then(|| dir.to_path_buf())
    }

    /// Reads the raw sidecar object. A missing or malformed file is empty.
    fn sidecar_map(&self, dir: &Path) -> Map<String, Value> {
        let path = dir.join(SIDECAR_FILE);
        let Ok(contents) = self.ctx.fs.read_to_string(&path) else {
            return Map::new();
        };
        match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                tracing::warn!("ignoring malformed sidecar {}", path.display());
                Map::new()
            }
        }
    }

    /// Reads the sidecar of a group.
    #[must_use]
    pub fn sidecar(&self, dir: &Path) -> Sidecar {
        serde_json::from_value(Value::Object(self.sidecar_map(dir))).unwrap_or_default()
    }

    /// Shallow-merges `updates` into the sidecar. `Null` values remove keys.
    fn merge_sidecar(&self, dir: &Path, updates: Map<String, Value>) -> Result<(), SourceError> {
        let mut map = self.sidecar_map(dir);
        for (key, value) in updates {
            if value.is_null() {
                map.remove(&key);
            } else {
                map.insert(key, value);
            }
        }
        let path = dir.join(SIDECAR_FILE);
        let text = serde_json::to_string_pretty(&Value::Object(map))
            .map_err(|e| SourceError::io(&path, e))?;
        self.ctx.fs.write(&path, &format!("{text}\n")).map_err(|e| SourceError::io(&path, e))
    }

    fn companion(&self, dir: &Path) -> Option<String> {
        let contents = self.ctx.fs.read_to_string(&dir.join(COMPANION_FILE)).ok()?;
        let body = match frontmatter::split(&contents) {
            Ok(Some((_, body))) => body,
            _ => contents.as_str(),
        };
        let description = frontmatter::normalize_body(body);
        (!description.is_empty()).then_some(description)
    }

    fn load(&self, dir: &Path) -> Result<TaskDocument, SourceError> {
        let path = dir.join(TASKS_FILE);
        let contents = self.ctx.fs.read_to_string(&path).map_err(|e| SourceError::io(&path, e))?;
        let parse_err = |source| SourceError::Parse { path: path.clone(), source };
        let group = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| SourceError::Unmanaged { path: path.clone() })?;
        let sidecar = self.sidecar(dir);
        let last_modified = self.ctx.fs.modified(&path).map_err(|e| SourceError::io(&path, e))?;

        let (frontmatter, checklist) = match frontmatter::split(&contents).map_err(parse_err)? {
            Some(_) => frontmatter::parse(&contents).map_err(parse_err)?,
            None => {
                let body = frontmatter::normalize_body(&contents);
                let created = sidecar
                    .created
                    .as_deref()
                    .and_then(timestamp::parse)
                    .unwrap_or(last_modified);
                (Metadata::new(synthesized_title(&group, &body), "unknown", created), body)
            }
        };

        let archived = self.ctx.fs.exists(&dir.join(ARCHIVED_MARKER));
        let storage_status = checklist_status(&checklist, archived)
            .unwrap_or_else(|| frontmatter.status.unwrap_or(Status::Backlog));
        let body = match self.companion(dir) {
            Some(description) => format!("{description}\n\n{COMPANION_SEPARATOR}\n\n{checklist}"),
            None => checklist,
        };

        Ok(TaskDocument {
            issue_number: sidecar.github_issue,
            source_type: SourceType::Grouped,
            filename: group,
            filepath: path,
            frontmatter,
            body,
            last_modified,
            folder_last_modified: self.ctx.fs.modified(dir).map_err(|e| SourceError::io(dir, e))?,
            storage_status,
        })
    }

    fn write_files(&self, dir: &Path, metadata: &Metadata, body: &str) -> Result<(), SourceError> {
        let path = dir.join(TASKS_FILE);
        let text = frontmatter::render(metadata, strip_companion(body))
            .map_err(|source| SourceError::Parse { path: path.clone(), source })?;
        self.ctx.fs.write(&path, &text).map_err(|e| SourceError::io(&path, e))?;

        let marker = dir.join(ARCHIVED_MARKER);
        let archived = self.ctx.fs.exists(&marker);
        match metadata.status {
            Some(Status::Completed) if !archived => {
                self.ctx.fs.write(&marker, "").map_err(|e| SourceError::io(&marker, e))
            }
            Some(Status::Backlog | Status::Active) if archived => {
                self.ctx.fs.remove_file(&marker).map_err(|e| SourceError::io(&marker, e))
            }
            _ => Ok(()),
        }
    }
}

/// Status implied by the checklist, or `None` when it has no items.
fn checklist_status(body: &str, archived: bool) -> Option<Status> {
    if archived {
        return Some(Status::Completed);
    }
    let (mut total, mut checked) = (0usize, 0usize);
    for line in body.lines() {
        let line = line.trim_start();
        let Some(rest) = line.strip_prefix("- [").or_else(|| line.strip_prefix("* [")) else {
            continue;
        };
        match rest.get(..2) {
            Some("x]" | "X]") => {
                total += 1;
                checked += 1;
            }
            Some(" ]") => total += 1,
            _ => {}
        }
    }
    match (total, checked) {
        (0, _) => None,
        (t, c) if t == c => Some(Status::Completed),
        (_, 0) => Some(Status::Backlog),
        _ => Some(Status::Active),
    }
}

/// First `# ` heading, or the group name with dashes as spaces.
fn synthesized_title(group: &str, body: &str) -> String {
    body.lines()
        .find_map(|line| line.strip_prefix("# "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| group.replace(['-', '_'], " "))
}

/// Drops the companion description prepended on read.
fn strip_companion(body: &str) -> &str {
    match body.split_once(COMPANION_SEPARATOR) {
        Some((_, checklist)) => checklist.trim_start_matches('\n'),
        None => body,
    }
}

fn timestamp_value(at: &DateTime<Utc>) -> Value {
    Value::String(timestamp::format(at))
}

impl SourceParser for GroupedSource<'_> {
    fn source_type(&self) -> SourceType {
        SourceType::Grouped
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn discover_tasks(&self, filter: Option<&TaskFilter>) -> Result<Vec<TaskDocument>, SourceError> {
        let mut docs = Vec::new();
        for dir in self.groups()? {
            match self.load(&dir) {
                Ok(doc) if filter.map_or(true, |f| f.matches(&doc)) => docs.push(doc),
                Ok(_) => {}
                Err(e) => tracing::warn!("skipping {}: {e}", dir.display()),
            }
        }
        Ok(docs)
    }

    fn read_task(&self, path: &Path) -> Result<TaskDocument, SourceError> {
        let dir = if self.ctx.fs.is_dir(path) && path.parent() == Some(self.root.as_path()) {
            path.to_path_buf()
        } else {
            self.group_of(path).ok_or_else(|| SourceError::Unmanaged { path: path.to_path_buf() })?
        };
        self.load(&dir)
    }

    fn write_task(&self, doc: &TaskDocument) -> Result<(), SourceError> {
        let dir = self
            .group_of(&doc.filepath)
            .ok_or_else(|| SourceError::Unmanaged { path: doc.filepath.clone() })?;
        self.write_files(&dir, &doc.frontmatter, &doc.body)
    }

    fn create_task(
        &self,
        number: u64,
        metadata: &Metadata,
        body: &str,
        status: Option<Status>,
    ) -> Result<TaskDocument, SourceError> {
        let dir = self.root.join(slug::slugify(&metadata.title));
        if self.ctx.fs.exists(&dir) {
            return Err(SourceError::TargetExists { path: dir });
        }
        let mut metadata = metadata.clone();
        if status.is_some() {
            metadata.status = status;
        }
        self.write_files(&dir, &metadata, body)?;
        self.merge_sidecar(
            &dir,
            Map::from_iter([
                ("github_issue".to_string(), Value::from(number)),
                ("created".to_string(), timestamp_value(&self.ctx.clock.now())),
            ]),
        )?;
        self.load(&dir)
    }

    fn task_exists(&self, number: u64) -> bool {
        self.groups()
            .map(|dirs| dirs.iter().any(|dir| self.sidecar(dir).github_issue == Some(number)))
            .unwrap_or(false)
    }

    fn rename_task(
        &self,
        path: &Path,
        number: u64,
        title: Option<&str>,
    ) -> Result<PathBuf, SourceError> {
        let dir = self.group_of(path).ok_or_else(|| SourceError::Unmanaged { path: path.to_path_buf() })?;
        let target = match title {
            Some(title) => self.root.join(slug::slugify(title)),
            None => dir.clone(),
        };
        if target != dir {
            if self.ctx.fs.exists(&target) {
                return Err(SourceError::TargetExists { path: target });
            }
            self.ctx.fs.rename(&dir, &target).map_err(|e| SourceError::io(&dir, e))?;
            tracing::debug!(from = %dir.display(), to = %target.display(), "renamed group");
        }
        let mut updates = Map::from_iter([("github_issue".to_string(), Value::from(number))]);
        if self.sidecar(&target).created.is_none() {
            updates.insert("created".to_string(), timestamp_value(&self.ctx.clock.now()));
        }
        self.merge_sidecar(&target, updates)?;
        Ok(target.join(TASKS_FILE))
    }

    fn strip_number(&self, doc: &TaskDocument) -> Result<PathBuf, SourceError> {
        let dir = self
            .group_of(&doc.filepath)
            .ok_or_else(|| SourceError::Unmanaged { path: doc.filepath.clone() })?;
        self.merge_sidecar(&dir, Map::from_iter([("github_issue".to_string(), Value::Null)]))?;
        Ok(doc.filepath.clone())
    }

    fn delete_task(&self, doc: &TaskDocument) -> Result<(), SourceError> {
        let dir = self
            .group_of(&doc.filepath)
            .ok_or_else(|| SourceError::Unmanaged { path: doc.filepath.clone() })?;
        self.ctx.fs.remove_dir_all(&dir).map_err(|e| SourceError::io(&dir, e))
    }

    fn mark_synced(&self, doc: &TaskDocument, hash: &str, at: DateTime<Utc>) -> Result<(), SourceError> {
        let dir = self
            .group_of(&doc.filepath)
            .ok_or_else(|| SourceError::Unmanaged { path: doc.filepath.clone() })?;
        self.merge_sidecar(
            &dir,
            Map::from_iter([
                ("last_synced".to_string(), timestamp_value(&at)),
                ("local_hash".to_string(), Value::from(hash)),
            ]),
        )
    }
}
