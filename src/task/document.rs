//! Task document and front-matter metadata types.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timestamp;

/// Workflow status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Not started.
    Backlog,
    /// In progress.
    Active,
    /// Done.
    Completed,
}

impl Status {
    /// All statuses, in workflow order.
    pub const ALL: [Self; 3] = [Self::Backlog, Self::Active, Self::Completed];

    /// Returns the lowercase name, which is also the backend directory name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "backlog" | "todo" => Ok(Self::Backlog),
            "active" | "in-progress" | "in_progress" => Ok(Self::Active),
            "completed" | "done" => Ok(Self::Completed),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

/// Impact severity, four levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Cosmetic or minor.
    Low,
    /// Noticeable but with a workaround.
    Medium,
    /// Major functionality affected.
    High,
    /// Data loss, outage or security impact.
    Critical,
}

impl Severity {
    /// Returns the lowercase label value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// Scheduling priority, five levels; `P0` is the most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Drop everything.
    P0,
    /// Next up.
    P1,
    /// Normal.
    P2,
    /// When time allows.
    P3,
    /// Someday.
    P4,
}

impl Priority {
    /// Returns the lowercase label value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::P0 => "p0",
            Self::P1 => "p1",
            Self::P2 => "p2",
            Self::P3 => "p3",
            Self::P4 => "p4",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "p0" => Ok(Self::P0),
            "p1" => Ok(Self::P1),
            "p2" => Ok(Self::P2),
            "p3" => Ok(Self::P3),
            "p4" => Ok(Self::P4),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

/// Structured fields stored in a document's front matter.
///
/// Optional keys are omitted on write; the YAML block has no way to say
/// "present but empty".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// When the task was first recorded.
    #[serde(with = "timestamp")]
    pub created: DateTime<Utc>,
    /// Who reported it.
    pub reporter: String,
    /// Human-readable title.
    pub title: String,
    /// Impact severity.
    pub severity: Severity,
    /// Scheduling priority.
    pub priority: Priority,
    /// Component tags.
    #[serde(default)]
    pub components: Vec<String>,
    /// Free-form `key:value` labels.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Issue type (bug, feature, chore...).
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub issue_type: Option<String>,
    /// Remote assignee.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    /// Recorded status; may lag behind the storage location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    /// When `status` was last written.
    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub status_last_modified: Option<DateTime<Utc>>,
    /// When the task was completed.
    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub completed: Option<DateTime<Utc>>,
    /// Parent or epic reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Free-text progress note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
    /// Related commit reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_commit: Option<String>,
    /// Related issue references.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_issues: Vec<String>,
    /// Due date, kept verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

impl Metadata {
    /// Builds metadata with only the required fields set.
    #[must_use]
    pub fn new(title: impl Into<String>, reporter: impl Into<String>, created: DateTime<Utc>) -> Self {
        Self {
            created,
            reporter: reporter.into(),
            title: title.into(),
            severity: Severity::Medium,
            priority: Priority::P2,
            components: Vec::new(),
            labels: Vec::new(),
            issue_type: None,
            assignee: None,
            status: None,
            status_last_modified: None,
            completed: None,
            parent: None,
            progress: None,
            related_commit: None,
            related_issues: Vec::new(),
            due_date: None,
        }
    }
}

/// Identifies which backend owns a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Files named `NNN-slug.md` in per-status directories.
    Numbered,
    /// One folder per task with a checklist and a sidecar state file.
    Grouped,
}

impl SourceType {
    /// All backend identifiers.
    pub const ALL: [Self; 2] = [Self::Numbered, Self::Grouped];

    /// Returns the identifier used on the command line.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Numbered => "numbered",
            Self::Grouped => "grouped",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "numbered" | "tasks" => Ok(Self::Numbered),
            "grouped" | "specs" => Ok(Self::Grouped),
            other => Err(format!("unknown source: {other} (expected numbered or grouped)")),
        }
    }
}

/// One work item as known locally.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDocument {
    /// Remote issue number, or `None` if not yet created remotely.
    pub issue_number: Option<u64>,
    /// Backend that owns this document.
    pub source_type: SourceType,
    /// File name (backend A) or group folder name (backend B).
    pub filename: String,
    /// Path of the document file.
    pub filepath: PathBuf,
    /// Front-matter fields.
    pub frontmatter: Metadata,
    /// Free-text body.
    pub body: String,
    /// Last write time of the document.
    pub last_modified: DateTime<Utc>,
    /// Last write time of the containing directory.
    pub folder_last_modified: DateTime<Utc>,
    /// Status implied by where and how the document is stored.
    pub storage_status: Status,
}

impl TaskDocument {
    /// Returns the display label used in reports: `#7` or the file name.
    #[must_use]
    pub fn label(&self) -> String {
        match self.issue_number {
            Some(n) => format!("#{n}"),
            None => self.filename.clone(),
        }
    }
}
