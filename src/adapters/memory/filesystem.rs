//! In-memory filesystem with controllable modification times.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::ports::filesystem::FileSystem;

#[derive(Debug, Clone)]
enum Entry {
    File { contents: String, modified: DateTime<Utc> },
    Dir { modified: DateTime<Utc> },
}

impl Entry {
    fn modified(&self) -> DateTime<Utc> {
        match self {
            Self::File { modified, .. } | Self::Dir { modified } => *modified,
        }
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        match self {
            Self::File { modified, .. } | Self::Dir { modified } => *modified = at,
        }
    }
}

#[derive(Debug)]
struct Tree {
    entries: BTreeMap<PathBuf, Entry>,
    now: DateTime<Utc>,
}

impl Tree {
    /// Advances the internal clock one second per mutation so modification
    /// times are strictly ordered.
    fn tick(&mut self) -> DateTime<Utc> {
        self.now += Duration::seconds(1);
        self.now
    }

    fn ensure_dirs(&mut self, path: &Path, at: DateTime<Utc>) {
        for ancestor in path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            self.entries.entry(ancestor.to_path_buf()).or_insert(Entry::Dir { modified: at });
        }
    }

    fn touch_parent(&mut self, path: &Path, at: DateTime<Utc>) {
        if let Some(entry) = path.parent().and_then(|p| self.entries.get_mut(p)) {
            entry.touch(at);
        }
    }
}

/// Filesystem double backed by a shared in-memory tree.
///
/// Like a real filesystem, creating, renaming or removing an entry updates
/// the parent directory's modification time; rewriting a file does not.
#[derive(Debug, Clone)]
pub struct MemoryFileSystem {
    tree: Arc<Mutex<Tree>>,
}

impl Default for MemoryFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFileSystem {
    /// Creates an empty tree whose clock starts at 2025-01-01T00:00:00Z.
    #[must_use]
    pub fn new() -> Self {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().unwrap_or_default();
        Self { tree: Arc::new(Mutex::new(Tree { entries: BTreeMap::new(), now: start })) }
    }

    fn lock(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Creates a directory (and its parents).
    pub fn create_dir(&self, path: &Path) {
        let mut tree = self.lock();
        let at = tree.tick();
        tree.ensure_dirs(&path.join("x"), at);
    }

    /// Overrides the modification time of an existing entry.
    ///
    /// # Panics
    ///
    /// Panics if the path does not exist.
    pub fn set_modified(&self, path: &Path, at: DateTime<Utc>) {
        let mut tree = self.lock();
        tree.entries
            .get_mut(path)
            .unwrap_or_else(|| panic!("no such entry: {}", path.display()))
            .touch(at);
    }

    /// Returns every file path currently stored, sorted.
    #[must_use]
    pub fn files(&self) -> Vec<PathBuf> {
        self.lock()
            .entries
            .iter()
            .filter(|(_, e)| matches!(e, Entry::File { .. }))
            .map(|(p, _)| p.clone())
            .collect()
    }
}

type PortResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

impl FileSystem for MemoryFileSystem {
    fn read_to_string(&self, path: &Path) -> PortResult<String> {
        match self.lock().entries.get(path) {
            Some(Entry::File { contents, .. }) => Ok(contents.clone()),
            Some(Entry::Dir { .. }) => Err(format!("is a directory: {}", path.display()).into()),
            None => Err(format!("file not found: {}", path.display()).into()),
        }
    }

    fn write(&self, path: &Path, contents: &str) -> PortResult<()> {
        let mut tree = self.lock();
        let at = tree.tick();
        match tree.entries.get_mut(path) {
            Some(Entry::Dir { .. }) => {
                return Err(format!("is a directory: {}", path.display()).into());
            }
            Some(Entry::File { contents: existing, modified }) => {
                *existing = contents.to_string();
                *modified = at;
            }
            None => {
                tree.ensure_dirs(path, at);
                tree.entries.insert(
                    path.to_path_buf(),
                    Entry::File { contents: contents.to_string(), modified: at },
                );
                tree.touch_parent(path, at);
            }
        }
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock().entries.contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.lock().entries.get(path), Some(Entry::Dir { .. }))
    }

    fn list_dir(&self, path: &Path) -> PortResult<Vec<String>> {
        let tree = self.lock();
        if !matches!(tree.entries.get(path), Some(Entry::Dir { .. })) {
            return Err(format!("not a directory: {}", path.display()).into());
        }
        Ok(tree
            .entries
            .keys()
            .filter(|k| k.parent() == Some(path))
            .filter_map(|k| k.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect())
    }

    fn rename(&self, from: &Path, to: &Path) -> PortResult<()> {
        let mut tree = self.lock();
        if !tree.entries.contains_key(from) {
            return Err(format!("no such entry: {}", from.display()).into());
        }
        let at = tree.tick();
        let moved: Vec<PathBuf> =
            tree.entries.keys().filter(|k| k.starts_with(from)).cloned().collect();
        tree.ensure_dirs(to, at);
        for old in moved {
            if let Some(entry) = tree.entries.remove(&old) {
                let suffix = old.strip_prefix(from).unwrap_or(Path::new(""));
                let new = if suffix.as_os_str().is_empty() { to.to_path_buf() } else { to.join(suffix) };
                tree.entries.insert(new, entry);
            }
        }
        tree.touch_parent(from, at);
        tree.touch_parent(to, at);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> PortResult<()> {
        let mut tree = self.lock();
        match tree.entries.get(path) {
            Some(Entry::File { .. }) => {
                let at = tree.tick();
                tree.entries.remove(path);
                tree.touch_parent(path, at);
                Ok(())
            }
            Some(Entry::Dir { .. }) => Err(format!("is a directory: {}", path.display()).into()),
            None => Err(format!("file not found: {}", path.display()).into()),
        }
    }

    fn remove_dir_all(&self, path: &Path) -> PortResult<()> {
        let mut tree = self.lock();
        if !matches!(tree.entries.get(path), Some(Entry::Dir { .. })) {
            return Err(format!("not a directory: {}", path.display()).into());
        }
        let at = tree.tick();
        tree.entries.retain(|k, _| !k.starts_with(path));
        tree.touch_parent(path, at);
        Ok(())
    }

    fn modified(&self, path: &Path) -> PortResult<DateTime<Utc>> {
        self.lock()
            .entries
            .get(path)
            .map(Entry::modified)
            .ok_or_else(|| format!("no such entry: {}", path.display()).into())
    }
}
