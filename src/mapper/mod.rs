//! Field mapper: task documents to issue fields and back.
//!
//! The mapper owns the set of labels it has already warned about, so a bad
//! label is reported once per mapper rather than once per call.

pub mod body;
pub mod hash;
pub mod labels;

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use crate::ports::issues::{IssueState, IssueUpdate, NewIssue, RemoteIssue};
use crate::task::frontmatter::normalize_body;
use crate::task::{slug, Metadata, Priority, Severity, Status, TaskDocument};

use self::body::BodyFields;
use self::hash::HashInput;

/// Reporter used when neither side knows one.
pub const UNKNOWN_REPORTER: &str = "unknown";

/// Assignee values that mean "nobody".
const ASSIGNEE_SENTINELS: &[&str] = &[
    "", "unassigned", "none", "n/a", "-", "todo", "backlog", "active", "completed",
    "in-progress", "open", "closed",
];

/// Bidirectional mapping between [`TaskDocument`]s and remote issues.
#[derive(Debug, Default)]
pub struct FieldMapper {
    aliases: BTreeMap<String, String>,
    normalize_titles: bool,
    warned: RefCell<BTreeSet<String>>,
}

impl FieldMapper {
    /// Creates a mapper.
    ///
    /// `aliases` maps lowercase local identities to remote logins. When
    /// `normalize_titles` is set, a leading `[#NNN]` marker is dropped from
    /// titles before they are sent or hashed.
    #[must_use]
    pub fn new(aliases: BTreeMap<String, String>, normalize_titles: bool) -> Self {
        Self { aliases, normalize_titles, warned: RefCell::default() }
    }

    /// Number of distinct invalid labels reported so far.
    #[must_use]
    pub fn warned_labels(&self) -> usize {
        self.warned.borrow().len()
    }

    /// Applies the title normalization toggle.
    #[must_use]
    pub fn normalize_title<'t>(&self, title: &'t str) -> &'t str {
        if self.normalize_titles {
            slug::strip_number_marker(title)
        } else {
            title.trim()
        }
    }

    /// Maps a local identity to a remote login, or `None` for placeholders.
    #[must_use]
    pub fn resolve_assignee(&self, raw: Option<&str>) -> Option<String> {
        let raw = raw?.trim();
        let key = raw.to_ascii_lowercase();
        if ASSIGNEE_SENTINELS.contains(&key.as_str()) {
            return None;
        }
        Some(self.aliases.get(&key).cloned().unwrap_or_else(|| raw.to_string()))
    }

    /// Keeps `key:value` labels; warns once per distinct invalid label.
    fn accept_label(&self, label: &str) -> bool {
        if labels::is_valid(label) {
            return true;
        }
        if self.warned.borrow_mut().insert(label.to_string()) {
            tracing::warn!(label, "dropping label that is not key:value");
        }
        false
    }

    /// Outgoing label set for a document, deduplicated in first-seen order.
    #[must_use]
    pub fn labels(&self, doc: &TaskDocument) -> Vec<String> {
        let meta = &doc.frontmatter;
        let mut out: Vec<String> =
            meta.labels.iter().filter(|l| self.accept_label(l)).cloned().collect();
        out.extend(meta.components.iter().map(|c| labels::join(labels::COMPONENT, c)));
        out.push(labels::join(labels::PRIORITY, meta.priority.as_str()));
        out.push(labels::join(labels::SEVERITY, meta.severity.as_str()));
        if let Some(issue_type) = &meta.issue_type {
            out.push(labels::join(labels::TYPE, issue_type));
        }
        if doc.storage_status != Status::Completed {
            out.push(labels::join(labels::STATUS, doc.storage_status.as_str()));
        }
        let mut seen = BTreeSet::new();
        out.retain(|l| seen.insert(l.clone()));
        out
    }

    /// Builds the full set of remote fields for a document.
    ///
    /// The state follows where the document is stored, not its recorded
    /// status, so a push reflects the document's current location.
    #[must_use]
    pub fn to_remote(&self, doc: &TaskDocument) -> IssueUpdate {
        let meta = &doc.frontmatter;
        let fields = BodyFields {
            reporter: Some(meta.reporter.trim())
                .filter(|r| !r.is_empty() && *r != UNKNOWN_REPORTER)
                .map(str::to_string),
            due_date: meta.due_date.clone(),
            epic: meta.parent.clone(),
            related_commit: meta.related_commit.clone(),
        };
        IssueUpdate {
            title: self.normalize_title(&meta.title).to_string(),
            body: body::encode(&fields, &doc.body),
            labels: self.labels(doc),
            assignee: self.resolve_assignee(meta.assignee.as_deref()),
            state: if doc.storage_status == Status::Completed {
                IssueState::Closed
            } else {
                IssueState::Open
            },
        }
    }

    /// Builds a creation request for a document.
    #[must_use]
    pub fn new_issue(&self, doc: &TaskDocument) -> NewIssue {
        let update = self.to_remote(doc);
        NewIssue {
            title: update.title,
            body: update.body,
            labels: update.labels,
            assignee: update.assignee,
        }
    }

    /// Maps an issue back to metadata and clean body text.
    ///
    /// Fields the issue cannot carry are taken from `existing` when given,
    /// otherwise from conservative defaults.
    #[must_use]
    pub fn from_remote(
        &self,
        record: &RemoteIssue,
        existing: Option<&Metadata>,
    ) -> (Metadata, String) {
        let (fields, clean_body) = body::decode(record.body.as_deref().unwrap_or_default());

        let mut meta = match existing {
            Some(existing) => existing.clone(),
            None => Metadata::new(String::new(), UNKNOWN_REPORTER, record.created_at),
        };
        meta.title = self.normalize_title(&record.title).to_string();
        if let Some(reporter) = fields.reporter {
            meta.reporter = reporter;
        }
        meta.due_date = fields.due_date.or(meta.due_date);
        meta.parent = fields.epic.or(meta.parent);
        meta.related_commit = fields.related_commit.or(meta.related_commit);

        let mut priority = None;
        let mut severity = None;
        let mut status_label = None;
        meta.issue_type = None;
        meta.components.clear();
        meta.labels.clear();
        for label in &record.labels {
            if !self.accept_label(label) {
                continue;
            }
            let Some((key, value)) = labels::split(label) else { continue };
            match key {
                labels::PRIORITY if value.parse::<Priority>().is_ok() => {
                    priority = value.parse().ok();
                }
                labels::SEVERITY if value.parse::<Severity>().is_ok() => {
                    severity = value.parse().ok();
                }
                labels::STATUS if value.parse::<Status>().is_ok() => {
                    status_label = value.parse().ok();
                }
                labels::TYPE => meta.issue_type = Some(value.to_string()),
                labels::COMPONENT => {
                    if !meta.components.iter().any(|c| c == value) {
                        meta.components.push(value.to_string());
                    }
                }
                _ => meta.labels.push(label.clone()),
            }
        }
        meta.priority = priority.unwrap_or(meta.priority);
        meta.severity = severity.unwrap_or(meta.severity);

        let was_completed = existing.and_then(|e| e.status) == Some(Status::Completed);
        match record.state {
            IssueState::Closed => {
                meta.status = Some(Status::Completed);
                meta.completed = match (was_completed, meta.completed) {
                    (true, Some(at)) => Some(at),
                    _ => Some(record.closed_at.unwrap_or(record.updated_at)),
                };
            }
            IssueState::Open => {
                meta.status = Some(match (status_label, existing.and_then(|e| e.status)) {
                    (Some(Status::Completed), _) => Status::Active,
                    (Some(status), _) => status,
                    (None, Some(status)) if status != Status::Completed => status,
                    _ => Status::Backlog,
                });
                meta.completed = None;
            }
        }
        meta.assignee = match (existing.and_then(|e| e.assignee.as_deref()), &record.assignee) {
            (Some(local), Some(remote))
                if self.resolve_assignee(Some(local)).as_deref() == Some(remote.as_str()) =>
            {
                Some(local.to_string())
            }
            (_, remote) => remote.clone(),
        };

        (meta, clean_body)
    }

    /// Change-detection hash of a document's outgoing fields.
    #[must_use]
    pub fn hash_document(&self, doc: &TaskDocument) -> String {
        let update = self.to_remote(doc);
        self.digest(&update.title, &update.body, update.state, &update.labels, update.assignee.as_deref())
    }

    /// Change-detection hash of an issue.
    #[must_use]
    pub fn hash_record(&self, record: &RemoteIssue) -> String {
        let labels: Vec<String> =
            record.labels.iter().filter(|l| labels::is_valid(l)).cloned().collect();
        let assignee = self.resolve_assignee(record.assignee.as_deref());
        self.digest(
            self.normalize_title(&record.title),
            record.body.as_deref().unwrap_or_default(),
            record.state,
            &labels,
            assignee.as_deref(),
        )
    }

    /// A closed issue's `status:` label is stale by definition and ignored.
    fn digest(
        &self,
        title: &str,
        raw_body: &str,
        state: IssueState,
        labels: &[String],
        assignee: Option<&str>,
    ) -> String {
        let (fields, clean) = body::decode(raw_body);
        HashInput {
            title: self.normalize_title(title),
            body: &normalize_body(&clean),
            state,
            labels: labels
                .iter()
                .map(String::as_str)
                .filter(|l| {
                    state == IssueState::Open
                        || labels::split(l).map_or(true, |(key, _)| key != labels::STATUS)
                })
                .collect(),
            assignee,
            reporter: fields.reporter.as_deref(),
            due_date: fields.due_date.as_deref(),
            epic: fields.epic.as_deref(),
            related_commit: fields.related_commit.as_deref(),
        }
        .digest()
    }
}
