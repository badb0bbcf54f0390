//! Error types for the sync subsystem.
//!
//! Each layer has its own enum. Port failures arrive as boxed errors and are
//! flattened into the `String` payloads here.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Errors from reading or writing a task document's front matter.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// The document does not start with a `---` front-matter block.
    #[error("missing front matter")]
    MissingFrontMatter,

    /// The front-matter block is never closed.
    #[error("unterminated front matter")]
    UnterminatedFrontMatter,

    /// The front matter is not valid YAML or lacks required fields.
    #[error("invalid front matter: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors raised by a source backend.
#[derive(Error, Debug)]
pub enum SourceError {
    /// A rename, move or create would overwrite an existing file.
    #[error("target already exists: {}", path.display())]
    TargetExists {
        /// The existing path.
        path: PathBuf,
    },

    /// A document could not be parsed.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        /// The offending document.
        path: PathBuf,
        /// What went wrong.
        #[source]
        source: DocumentError,
    },

    /// The document path is not one this backend manages.
    #[error("not a managed task path: {}", path.display())]
    Unmanaged {
        /// The rejected path.
        path: PathBuf,
    },

    /// Underlying filesystem failure.
    #[error("filesystem error on {}: {message}", path.display())]
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// The port's error message.
        message: String,
    },
}

impl SourceError {
    /// Wraps a filesystem port error for `path`.
    pub(crate) fn io(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::Io { path: path.into(), message: err.to_string() }
    }
}

/// Errors loading or saving the persisted sync state.
#[derive(Error, Debug)]
pub enum StateError {
    /// The state file exists but could not be read.
    #[error("failed to read sync state {}: {message}", path.display())]
    Read {
        /// State file path.
        path: PathBuf,
        /// The port's error message.
        message: String,
    },

    /// The state file is not valid JSON of the expected shape.
    #[error("corrupt sync state {}: {source}", path.display())]
    Corrupt {
        /// State file path.
        path: PathBuf,
        /// Parse error.
        #[source]
        source: serde_json::Error,
    },

    /// The state could not be written.
    #[error("failed to write sync state {}: {message}", path.display())]
    Write {
        /// State file path.
        path: PathBuf,
        /// The port's error message.
        message: String,
    },
}

/// Errors that abort a sync run or fail a single item.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// No source backend is available.
    #[error("no source backend registered")]
    NoBackends,

    /// The credentials cannot reach the repository.
    #[error("cannot access repository {0}; check the token and repository name")]
    AccessDenied(String),

    /// The sync state could not be loaded or saved.
    #[error(transparent)]
    State(#[from] StateError),

    /// A backend operation failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The remote tracker rejected or failed a request.
    #[error("remote error: {0}")]
    Remote(String),

    /// The external creation command failed or produced no issue number.
    #[error("issue creation failed: {0}")]
    Create(String),

    /// Reading operator input failed.
    #[error("prompt failed: {0}")]
    Prompt(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_exists_names_the_path() {
        let err = SourceError::TargetExists { path: PathBuf::from("tasks/backlog/001-a.md") };
        assert_eq!(err.to_string(), "target already exists: tasks/backlog/001-a.md");
    }

    #[test]
    fn source_error_converts_into_sync_error() {
        let err: SyncError = SourceError::io("x", "denied").into();
        assert!(matches!(err, SyncError::Source(SourceError::Io { .. })));
        assert_eq!(err.to_string(), "filesystem error on x: denied");
    }

    #[test]
    fn parse_error_keeps_source_chain() {
        use std::error::Error;

        let err = SourceError::Parse {
            path: PathBuf::from("a.md"),
            source: DocumentError::MissingFrontMatter,
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("missing front matter"));
    }
}
