//! Live filesystem adapter using `std::fs`.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::ports::filesystem::FileSystem;

/// Live filesystem adapter backed by real disk I/O.
pub struct LiveFileSystem;

impl FileSystem for LiveFileSystem {
    fn read_to_string(
        &self,
        path: &Path,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        Ok(std::fs::read_to_string(path)?)
    }

    fn write(
        &self,
        path: &Path,
        contents: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(std::fs::write(path, contents)?)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn list_dir(
        &self,
        path: &Path,
    ) -> Result<Vec<String>, Box<dyn std::error::Error + Send + Sync>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                entries.push(name.to_string());
            }
        }
        entries.sort();
        Ok(entries)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(std::fs::rename(from, to)?)
    }

    fn remove_file(&self, path: &Path) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(std::fs::remove_file(path)?)
    }

    fn remove_dir_all(&self, path: &Path) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(std::fs::remove_dir_all(path)?)
    }

    fn modified(
        &self,
        path: &Path,
    ) -> Result<DateTime<Utc>, Box<dyn std::error::Error + Send + Sync>> {
        let modified = std::fs::metadata(path)?.modified()?;
        Ok(DateTime::<Utc>::from(modified))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks/backlog/001-a.md");
        LiveFileSystem.write(&path, "hello").unwrap();
        assert_eq!(LiveFileSystem.read_to_string(&path).unwrap(), "hello");
        assert!(LiveFileSystem.is_dir(&dir.path().join("tasks/backlog")));
    }

    #[test]
    fn rename_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("backlog/a.md");
        let to = dir.path().join("active/a.md");
        LiveFileSystem.write(&from, "x").unwrap();
        LiveFileSystem.rename(&from, &to).unwrap();
        assert!(!LiveFileSystem.exists(&from));
        assert_eq!(LiveFileSystem.list_dir(&dir.path().join("active")).unwrap(), vec!["a.md"]);
        assert!(LiveFileSystem.modified(&to).is_ok());
    }

    #[test]
    fn remove_dir_all_removes_groups() {
        let dir = tempfile::tempdir().unwrap();
        let group = dir.path().join("login");
        LiveFileSystem.write(&group.join("tasks.md"), "x").unwrap();
        LiveFileSystem.remove_dir_all(&group).unwrap();
        assert!(!LiveFileSystem.exists(&group));
    }
}
