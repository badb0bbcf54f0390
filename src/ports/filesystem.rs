//! Filesystem port for file I/O operations.

use std::path::Path;

use chrono::{DateTime, Utc};

/// Provides filesystem access for reading, writing and moving task files.
///
/// Both source backends and the sync-state store go through this trait, so
/// the whole engine can run against an in-memory tree.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or is not valid UTF-8.
    fn read_to_string(&self, path: &Path)
        -> Result<String, Box<dyn std::error::Error + Send + Sync>>;

    /// Writes the given contents to a file, creating parents and overwriting it.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails (permissions, disk full, etc.).
    fn write(
        &self,
        path: &Path,
        contents: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Returns `true` if the path exists on the filesystem.
    fn exists(&self, path: &Path) -> bool;

    /// Returns `true` if the path exists and is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Lists the entry names in a directory, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not a directory or cannot be read.
    fn list_dir(&self, path: &Path)
        -> Result<Vec<String>, Box<dyn std::error::Error + Send + Sync>>;

    /// Moves `from` to `to`. Callers check for an existing target first;
    /// this is a plain rename, not an atomic swap.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is missing or the rename fails.
    fn rename(&self, from: &Path, to: &Path) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Removes a single file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or cannot be removed.
    fn remove_file(&self, path: &Path) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Removes a directory and everything under it.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is missing or cannot be removed.
    fn remove_dir_all(&self, path: &Path) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Returns the last modification time of a file or directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not exist.
    fn modified(&self, path: &Path)
        -> Result<DateTime<Utc>, Box<dyn std::error::Error + Send + Sync>>;
}
