//! Directory-per-status backend.
//!
//! ```text
//! <root>/
//!   ├── backlog/001-fix-login.md
//!   ├── active/002-add-export.md
//!   └── completed/
//! ```
//!
//! The directory a file sits in is its status. Files without a numeric
//! prefix have not been created remotely yet.

use std::path::{Path, PathBuf};

use crate::context::ServiceContext;
use crate::error::SourceError;
use crate::task::{frontmatter, slug, Metadata, SourceType, Status, TaskDocument};

use super::{normalize_path, SourceParser, SpatialStatus, TaskFilter};

/// Source parser for `<root>/<status>/NNN-slug.md` files.
pub struct NumberedSource<'a> {
    ctx: &'a ServiceContext,
    root: PathBuf,
}

impl<'a> NumberedSource<'a> {
    /// Creates a parser rooted at `root`.
    #[must_use]
    pub fn new(ctx: &'a ServiceContext, root: &Path) -> Self {
        Self { ctx, root: normalize_path(root) }
    }

    fn list_markdown(&self, status: Status) -> Result<Vec<String>, SourceError> {
        let dir = self.task_dir(status);
        if !self.ctx.fs.is_dir(&dir) {
            return Ok(Vec::new());
        }
        let names = self.ctx.fs.list_dir(&dir).map_err(|e| SourceError::io(&dir, e))?;
        Ok(names
            .into_iter()
            .filter(|name| {
                Path::new(name).extension().is_some_and(|ext| ext == slug::EXTENSION)
            })
            .collect())
    }

    fn status_of(&self, path: &Path) -> Option<Status> {
        let dir = path.parent()?;
        if dir.parent()? != self.root {
            return None;
        }
        let name = dir.file_name()?.to_str()?;
        Status::ALL.into_iter().find(|s| s.as_str() == name)
    }

    fn load(&self, path: &Path, status: Status) -> Result<TaskDocument, SourceError> {
        let contents = self.ctx.fs.read_to_string(path).map_err(|e| SourceError::io(path, e))?;
        let (frontmatter, body) = frontmatter::parse(&contents)
            .map_err(|source| SourceError::Parse { path: path.to_path_buf(), source })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| SourceError::Unmanaged { path: path.to_path_buf() })?;
        let dir = self.task_dir(status);
        Ok(TaskDocument {
            issue_number: slug::parse_numbered(&filename).map(|(n, _)| n),
            source_type: SourceType::Numbered,
            filename,
            filepath: path.to_path_buf(),
            frontmatter,
            body,
            last_modified: self.ctx.fs.modified(path).map_err(|e| SourceError::io(path, e))?,
            folder_last_modified: self.ctx.fs.modified(&dir).map_err(|e| SourceError::io(&dir, e))?,
            storage_status: status,
        })
    }

    fn find(&self, number: u64) -> Option<PathBuf> {
        Status::ALL.into_iter().find_map(|status| {
            let names = self.list_markdown(status).ok()?;
            names
                .into_iter()
                .find(|name| slug::parse_numbered(name).is_some_and(|(n, _)| n == number))
                .map(|name| self.task_dir(status).join(name))
        })
    }

    fn rename_to(&self, from: &Path, to: PathBuf) -> Result<PathBuf, SourceError> {
        if from == to {
            return Ok(to);
        }
        if self.ctx.fs.exists(&to) {
            return Err(SourceError::TargetExists { path: to });
        }
        self.ctx.fs.rename(from, &to).map_err(|e| SourceError::io(from, e))?;
        tracing::debug!(from = %from.display(), to = %to.display(), "renamed task");
        Ok(to)
    }
}

impl SourceParser for NumberedSource<'_> {
    fn source_type(&self) -> SourceType {
        SourceType::Numbered
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn discover_tasks(&self, filter: Option<&TaskFilter>) -> Result<Vec<TaskDocument>, SourceError> {
        let mut docs = Vec::new();
        for status in Status::ALL {
            if filter.and_then(|f| f.statuses.as_ref()).is_some_and(|s| !s.contains(&status)) {
                continue;
            }
            for name in self.list_markdown(status)? {
                let path = self.task_dir(status).join(&name);
                match self.load(&path, status) {
                    Ok(doc) if filter.map_or(true, |f| f.matches(&doc)) => docs.push(doc),
                    Ok(_) => {}
                    Err(e) => tracing::warn!("skipping {}: {e}", path.display()),
                }
            }
        }
        Ok(docs)
    }

    fn read_task(&self, path: &Path) -> Result<TaskDocument, SourceError> {
        let status =
            self.status_of(path).ok_or_else(|| SourceError::Unmanaged { path: path.to_path_buf() })?;
        self.load(path, status)
    }

    fn write_task(&self, doc: &TaskDocument) -> Result<(), SourceError> {
        let text = frontmatter::render(&doc.frontmatter, &doc.body)
            .map_err(|source| SourceError::Parse { path: doc.filepath.clone(), source })?;
        self.ctx.fs.write(&doc.filepath, &text).map_err(|e| SourceError::io(&doc.filepath, e))
    }

    fn create_task(
        &self,
        number: u64,
        metadata: &Metadata,
        body: &str,
        status: Option<Status>,
    ) -> Result<TaskDocument, SourceError> {
        let status = status.or(metadata.status).unwrap_or(Status::Backlog);
        let filename = slug::numbered_filename(number, &slug::slugify(&metadata.title));
        let path = self.task_dir(status).join(filename);
        if self.ctx.fs.exists(&path) {
            return Err(SourceError::TargetExists { path });
        }
        let text = frontmatter::render(metadata, body)
            .map_err(|source| SourceError::Parse { path: path.clone(), source })?;
        self.ctx.fs.write(&path, &text).map_err(|e| SourceError::io(&path, e))?;
        self.load(&path, status)
    }

    fn task_exists(&self, number: u64) -> bool {
        self.find(number).is_some()
    }

    fn rename_task(
        &self,
        path: &Path,
        number: u64,
        title: Option<&str>,
    ) -> Result<PathBuf, SourceError> {
        let dir = path.parent().ok_or_else(|| SourceError::Unmanaged { path: path.to_path_buf() })?;
        let current = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let slug = match title {
            Some(title) => slug::slugify(title),
            None => {
                let stripped = slug::strip_numbered(&current);
                stripped.strip_suffix(".md").unwrap_or(stripped).to_string()
            }
        };
        self.rename_to(path, dir.join(slug::numbered_filename(number, &slug)))
    }

    fn strip_number(&self, doc: &TaskDocument) -> Result<PathBuf, SourceError> {
        let dir = doc
            .filepath
            .parent()
            .ok_or_else(|| SourceError::Unmanaged { path: doc.filepath.clone() })?;
        self.rename_to(&doc.filepath, dir.join(slug::strip_numbered(&doc.filename)))
    }

    fn delete_task(&self, doc: &TaskDocument) -> Result<(), SourceError> {
        self.ctx.fs.remove_file(&doc.filepath).map_err(|e| SourceError::io(&doc.filepath, e))
    }

    fn spatial(&self) -> Option<&dyn SpatialStatus> {
        Some(self)
    }
}

impl SpatialStatus for NumberedSource<'_> {
    fn task_dir(&self, status: Status) -> PathBuf {
        self.root.join(status.as_str())
    }

    fn move_task(&self, doc: &TaskDocument, status: Status) -> Result<PathBuf, SourceError> {
        let target = self.task_dir(status).join(&doc.filename);
        self.rename_to(&doc.filepath, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{
        FixedClock, MemoryFileSystem, MemoryIssueTracker, ScriptedPrompt, ScriptedShell,
    };
    use crate::ports::filesystem::FileSystem;
    use chrono::{Duration, TimeZone, Utc};

    const DOC: &str = "---\ncreated: 2025-01-01T00:00:00Z\nreporter: alice\ntitle: Fix login\n\
                       severity: high\npriority: p1\nstatus: backlog\n\
                       status_last_modified: 2025-01-01T00:00:00Z\n---\n\nBody.\n";

    fn ctx(fs: &MemoryFileSystem) -> ServiceContext {
        ServiceContext::in_memory(
            fs,
            &MemoryIssueTracker::new(),
            &ScriptedShell::new(),
            &ScriptedPrompt::new(),
            &FixedClock::default(),
        )
    }

    #[test]
    fn discovers_across_status_directories() {
        let fs = MemoryFileSystem::new();
        fs.write(Path::new("/t/backlog/001-fix-login.md"), DOC).unwrap();
        fs.write(Path::new("/t/active/new-thing.md"), DOC).unwrap();
        fs.write(Path::new("/t/active/notes.txt"), "ignored").unwrap();
        let ctx = ctx(&fs);
        let source = NumberedSource::new(&ctx, Path::new("/t"));

        let docs = source.discover_tasks(None).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].issue_number, Some(1));
        assert_eq!(docs[0].storage_status, Status::Backlog);
        assert_eq!(docs[1].issue_number, None);
        assert_eq!(docs[1].storage_status, Status::Active);

        let new = source.discover_new_tasks().unwrap();
        assert_eq!(new.len(), 1);
        assert_eq!(new[0].filename, "new-thing.md");
    }

    #[test]
    fn malformed_documents_are_skipped() {
        let fs = MemoryFileSystem::new();
        fs.write(Path::new("/t/backlog/001-ok.md"), DOC).unwrap();
        fs.write(Path::new("/t/backlog/002-broken.md"), "no front matter").unwrap();
        let ctx = ctx(&fs);
        let source = NumberedSource::new(&ctx, Path::new("/t"));

        let docs = source.discover_tasks(None).unwrap();
        assert_eq!(docs.len(), 1);
        assert!(source.read_task(Path::new("/t/backlog/002-broken.md")).is_err());
    }

    #[test]
    fn filter_restricts_by_number() {
        let fs = MemoryFileSystem::new();
        fs.write(Path::new("/t/backlog/001-a.md"), DOC).unwrap();
        fs.write(Path::new("/t/backlog/002-b.md"), DOC).unwrap();
        let ctx = ctx(&fs);
        let source = NumberedSource::new(&ctx, Path::new("/t"));

        let docs = source.discover_tasks(Some(&TaskFilter::number(2))).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].filename, "002-b.md");
        assert!(source.task_exists(1));
        assert!(!source.task_exists(3));
    }

    #[test]
    fn rename_embeds_number_and_detects_collisions() {
        let fs = MemoryFileSystem::new();
        fs.write(Path::new("/t/backlog/fix-login.md"), DOC).unwrap();
        fs.write(Path::new("/t/backlog/012-taken.md"), DOC).unwrap();
        let ctx = ctx(&fs);
        let source = NumberedSource::new(&ctx, Path::new("/t"));

        let renamed = source.rename_task(Path::new("/t/backlog/fix-login.md"), 7, None).unwrap();
        assert_eq!(renamed, PathBuf::from("/t/backlog/007-fix-login.md"));

        let err = source.rename_task(&renamed, 12, Some("taken")).unwrap_err();
        assert!(matches!(err, SourceError::TargetExists { ref path } if path.ends_with("012-taken.md")));
        assert!(fs.exists(&renamed));
    }

    #[test]
    fn strip_number_makes_a_document_new_again() {
        let fs = MemoryFileSystem::new();
        fs.write(Path::new("/t/active/009-orphan.md"), DOC).unwrap();
        let ctx = ctx(&fs);
        let source = NumberedSource::new(&ctx, Path::new("/t"));
        let doc = source.read_task(Path::new("/t/active/009-orphan.md")).unwrap();

        let path = source.strip_number(&doc).unwrap();
        assert_eq!(path, PathBuf::from("/t/active/orphan.md"));
        assert_eq!(source.read_task(&path).unwrap().issue_number, None);
    }

    #[test]
    fn create_and_move_between_status_directories() {
        let fs = MemoryFileSystem::new();
        fs.create_dir(Path::new("/t/backlog"));
        let ctx = ctx(&fs);
        let source = NumberedSource::new(&ctx, Path::new("/t"));
        let created = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let metadata = Metadata::new("[#004] Ship it", "bob", created);

        let doc = source.create_task(4, &metadata, "body", Some(Status::Active)).unwrap();
        assert_eq!(doc.filepath, PathBuf::from("/t/active/004-ship-it.md"));
        assert!(matches!(
            source.create_task(4, &metadata, "body", Some(Status::Active)),
            Err(SourceError::TargetExists { .. })
        ));

        let moved = source.move_task(&doc, Status::Completed).unwrap();
        assert_eq!(moved, PathBuf::from("/t/completed/004-ship-it.md"));
        assert_eq!(source.read_task(&moved).unwrap().storage_status, Status::Completed);
    }

    #[test]
    fn status_tie_break_follows_the_newer_signal() {
        let fs = MemoryFileSystem::new();
        let path = Path::new("/t/active/001-fix-login.md");
        fs.write(path, DOC).unwrap();
        let ctx = ctx(&fs);
        let source = NumberedSource::new(&ctx, Path::new("/t"));
        let recorded = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        fs.set_modified(Path::new("/t/active"), recorded + Duration::hours(1));
        let doc = source.read_task(path).unwrap();
        assert_eq!(source.resolve_status_conflict(&doc), Status::Active);

        fs.set_modified(Path::new("/t/active"), recorded - Duration::hours(1));
        let doc = source.read_task(path).unwrap();
        assert_eq!(source.resolve_status_conflict(&doc), Status::Backlog);
    }

    #[test]
    fn paths_outside_status_directories_are_unmanaged() {
        let fs = MemoryFileSystem::new();
        fs.write(Path::new("/t/001-loose.md"), DOC).unwrap();
        let ctx = ctx(&fs);
        let source = NumberedSource::new(&ctx, Path::new("/t"));
        assert!(matches!(
            source.read_task(Path::new("/t/001-loose.md")),
            Err(SourceError::Unmanaged { .. })
        ));
    }
}
