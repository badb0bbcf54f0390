//! Issue tracker port for the remote side of synchronization.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Open/closed state of a remote issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    /// The issue is open.
    Open,
    /// The issue is closed.
    Closed,
}

impl IssueState {
    /// Returns the wire name of the state.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for IssueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An issue as returned by the remote tracker, already normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteIssue {
    /// Remote issue number.
    pub number: u64,
    /// The issue title.
    pub title: String,
    /// The issue body, if any.
    pub body: Option<String>,
    /// Open or closed.
    pub state: IssueState,
    /// Label names.
    pub labels: Vec<String>,
    /// Login of the assignee, if any.
    pub assignee: Option<String>,
    /// When the issue was created.
    pub created_at: DateTime<Utc>,
    /// When the issue was last updated.
    pub updated_at: DateTime<Utc>,
    /// When the issue was closed, if it is closed.
    pub closed_at: Option<DateTime<Utc>>,
}

/// Fields sent when creating an issue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewIssue {
    /// The issue title.
    pub title: String,
    /// The issue body.
    pub body: String,
    /// Labels to attach.
    pub labels: Vec<String>,
    /// Assignee login, if any.
    pub assignee: Option<String>,
}

/// Full replacement of an issue's synchronized fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueUpdate {
    /// The issue title.
    pub title: String,
    /// The issue body.
    pub body: String,
    /// Labels replacing the current set.
    pub labels: Vec<String>,
    /// Assignee login; `None` clears the assignee.
    pub assignee: Option<String>,
    /// Target state.
    pub state: IssueState,
}

/// A label name with the colour it should be created with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelSpec {
    /// Label name, e.g. `priority:p1`.
    pub name: String,
    /// Six-digit hex colour without `#`.
    pub color: String,
}

/// Reads and writes issues in the remote tracker.
///
/// Implementations handle authentication and retries themselves and return
/// normalized [`RemoteIssue`] records.
pub trait IssueTracker: Send + Sync {
    /// Fetches one issue. Returns `Ok(None)` when the tracker reports that it
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error for any failure other than "not found".
    fn get_issue(
        &self,
        number: u64,
    ) -> Result<Option<RemoteIssue>, Box<dyn std::error::Error + Send + Sync>>;

    /// Fetches many issues. Numbers that could not be fetched, for any
    /// reason, are simply absent from the returned map.
    fn get_issues(&self, numbers: &[u64]) -> BTreeMap<u64, RemoteIssue>;

    /// Creates an issue and returns it with its assigned number.
    ///
    /// # Errors
    ///
    /// Returns an error if the issue cannot be created.
    fn create_issue(
        &self,
        issue: &NewIssue,
    ) -> Result<RemoteIssue, Box<dyn std::error::Error + Send + Sync>>;

    /// Replaces the synchronized fields of an existing issue.
    ///
    /// # Errors
    ///
    /// Returns an error if the issue cannot be found or updated.
    fn update_issue(
        &self,
        number: u64,
        update: &IssueUpdate,
    ) -> Result<RemoteIssue, Box<dyn std::error::Error + Send + Sync>>;

    /// Makes sure every label exists. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if a missing label could not be created.
    fn ensure_labels(
        &self,
        labels: &[LabelSpec],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Returns `true` if the configured credentials can access the repository.
    fn verify_access(&self) -> bool;
}
