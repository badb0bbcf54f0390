//! Configuration loaded from the environment.
//!
//! `.env` in the working directory is read first (see [`load_dotenv`]), then
//! the variables below.
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `GITHUB_TOKEN` / `GH_TOKEN` | Yes | - | API token |
//! | `GITHUB_REPOSITORY` | Yes | - | `owner/name` of the tracker repository |
//! | `TASKSYNC_ROOT` | No | `.` | Project root |
//! | `TASKSYNC_TASKS_DIR` | No | `tasks` | Numbered backend root, relative to the project |
//! | `TASKSYNC_SPECS_DIR` | No | `specs` | Grouped backend root, relative to the project |
//! | `TASKSYNC_STATE_FILE` | No | `.tasksync/state.json` | Persisted sync state |
//! | `TASKSYNC_API_URL` | No | `https://api.github.com` | REST API base URL |
//! | `TASKSYNC_CREATE_COMMAND` | No | `gh` | Program used to create issues |
//! | `TASKSYNC_ASSIGNEE_ALIASES` | No | - | `local=remote` pairs, comma-separated |

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

use thiserror::Error;

use crate::sources::normalize_path;

const DEFAULT_API_URL: &str = "https://api.github.com";
const DEFAULT_TASKS_DIR: &str = "tasks";
const DEFAULT_SPECS_DIR: &str = "specs";
const DEFAULT_STATE_FILE: &str = ".tasksync/state.json";
const DEFAULT_CREATE_COMMAND: &str = "gh";

/// Errors that can occur while reading configuration.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Environment variable has an invalid value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue {
        /// The variable name.
        key: String,
        /// Why it was rejected.
        message: String,
    },
}

/// Runtime configuration for a sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// API token for the tracker.
    pub token: String,
    /// `owner/name` of the tracker repository.
    pub repository: String,
    /// REST API base URL.
    pub api_url: String,
    /// Project root.
    pub root: PathBuf,
    /// Numbered backend root.
    pub tasks_dir: PathBuf,
    /// Grouped backend root.
    pub specs_dir: PathBuf,
    /// Persisted sync-state file.
    pub state_file: PathBuf,
    /// Program invoked to create issues.
    pub create_command: String,
    /// Local identity to remote login.
    pub assignee_aliases: BTreeMap<String, String>,
}

impl Config {
    /// Reads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let token = get("GITHUB_TOKEN")
            .or_else(|| get("GH_TOKEN"))
            .ok_or_else(|| ConfigError::MissingEnvVar("GITHUB_TOKEN".to_string()))?;
        let repository = get("GITHUB_REPOSITORY")
            .ok_or_else(|| ConfigError::MissingEnvVar("GITHUB_REPOSITORY".to_string()))?;
        validate_repository(&repository)?;

        let root = PathBuf::from(get("TASKSYNC_ROOT").unwrap_or_else(|| ".".to_string()));
        let under = |key: &str, default: &str| {
            normalize_path(&root.join(get(key).unwrap_or_else(|| default.to_string())))
        };
        let tasks_dir = under("TASKSYNC_TASKS_DIR", DEFAULT_TASKS_DIR);
        let specs_dir = under("TASKSYNC_SPECS_DIR", DEFAULT_SPECS_DIR);
        let state_file = under("TASKSYNC_STATE_FILE", DEFAULT_STATE_FILE);
        let api_url = get("TASKSYNC_API_URL")
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let create_command =
            get("TASKSYNC_CREATE_COMMAND").unwrap_or_else(|| DEFAULT_CREATE_COMMAND.to_string());
        let assignee_aliases = match get("TASKSYNC_ASSIGNEE_ALIASES") {
            Some(raw) => parse_aliases(&raw)?,
            None => BTreeMap::new(),
        };

        Ok(Self {
            token,
            repository,
            api_url,
            root,
            tasks_dir,
            specs_dir,
            state_file,
            create_command,
            assignee_aliases,
        })
    }
}

/// Loads `.env` from the working directory if present. A missing file is fine.
pub fn load_dotenv() {
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            tracing::warn!("ignoring unreadable .env: {err}");
        }
    }
}

fn validate_repository(repository: &str) -> Result<(), ConfigError> {
    let mut parts = repository.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => Ok(()),
        _ => Err(ConfigError::InvalidValue {
            key: "GITHUB_REPOSITORY".to_string(),
            message: format!("expected owner/name, got {repository:?}"),
        }),
    }
}

fn parse_aliases(raw: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut aliases = BTreeMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((local, remote)) = pair.split_once('=') else {
            return Err(ConfigError::InvalidValue {
                key: "TASKSYNC_ASSIGNEE_ALIASES".to_string(),
                message: format!("expected local=remote, got {pair:?}"),
            });
        };
        aliases.insert(local.trim().to_ascii_lowercase(), remote.trim().to_string());
    }
    Ok(aliases)
}
