//! In-memory issue tracker.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, TimeZone, Utc};

use crate::ports::issues::{IssueState, IssueTracker, IssueUpdate, LabelSpec, NewIssue, RemoteIssue};

#[derive(Debug, Default)]
struct Inner {
    issues: BTreeMap<u64, RemoteIssue>,
    labels: BTreeSet<String>,
    failing: BTreeSet<u64>,
    updates: Vec<(u64, IssueUpdate)>,
    next_number: u64,
}

/// Issue tracker double holding issues in a shared map.
///
/// Numbers marked with [`MemoryIssueTracker::fail_on`] behave like a
/// transient network failure: `get_issue` errors and `get_issues` omits them.
#[derive(Debug, Clone, Default)]
pub struct MemoryIssueTracker {
    inner: Arc<Mutex<Inner>>,
}

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().unwrap_or_default()
}

impl MemoryIssueTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Stores an issue, replacing any with the same number.
    pub fn insert(&self, issue: RemoteIssue) {
        let mut inner = self.lock();
        inner.next_number = inner.next_number.max(issue.number);
        inner.issues.insert(issue.number, issue);
    }

    /// Builds and stores a minimal open issue.
    pub fn insert_simple(&self, number: u64, title: &str, labels: &[&str]) -> RemoteIssue {
        let issue = RemoteIssue {
            number,
            title: title.to_string(),
            body: None,
            state: IssueState::Open,
            labels: labels.iter().map(|l| (*l).to_string()).collect(),
            assignee: None,
            created_at: epoch(),
            updated_at: epoch(),
            closed_at: None,
        };
        self.insert(issue.clone());
        issue
    }

    /// Returns a stored issue.
    #[must_use]
    pub fn issue(&self, number: u64) -> Option<RemoteIssue> {
        self.lock().issues.get(&number).cloned()
    }

    /// Removes an issue, as if deleted remotely.
    pub fn remove(&self, number: u64) {
        self.lock().issues.remove(&number);
    }

    /// Makes fetches of `number` fail.
    pub fn fail_on(&self, number: u64) {
        self.lock().failing.insert(number);
    }

    /// Every update sent so far, in order.
    #[must_use]
    pub fn updates(&self) -> Vec<(u64, IssueUpdate)> {
        self.lock().updates.clone()
    }

    /// Labels that have been ensured.
    #[must_use]
    pub fn labels(&self) -> BTreeSet<String> {
        self.lock().labels.clone()
    }
}

impl IssueTracker for MemoryIssueTracker {
    fn get_issue(
        &self,
        number: u64,
    ) -> Result<Option<RemoteIssue>, Box<dyn std::error::Error + Send + Sync>> {
        let inner = self.lock();
        if inner.failing.contains(&number) {
            return Err(format!("simulated failure fetching #{number}").into());
        }
        Ok(inner.issues.get(&number).cloned())
    }

    fn get_issues(&self, numbers: &[u64]) -> BTreeMap<u64, RemoteIssue> {
        let inner = self.lock();
        numbers
            .iter()
            .filter(|n| !inner.failing.contains(n))
            .filter_map(|n| inner.issues.get(n).map(|issue| (*n, issue.clone())))
            .collect()
    }

    fn create_issue(
        &self,
        issue: &NewIssue,
    ) -> Result<RemoteIssue, Box<dyn std::error::Error + Send + Sync>> {
        let mut inner = self.lock();
        inner.next_number += 1;
        let created = RemoteIssue {
            number: inner.next_number,
            title: issue.title.clone(),
            body: Some(issue.body.clone()),
            state: IssueState::Open,
            labels: issue.labels.clone(),
            assignee: issue.assignee.clone(),
            created_at: epoch(),
            updated_at: epoch(),
            closed_at: None,
        };
        inner.issues.insert(created.number, created.clone());
        Ok(created)
    }

    fn update_issue(
        &self,
        number: u64,
        update: &IssueUpdate,
    ) -> Result<RemoteIssue, Box<dyn std::error::Error + Send + Sync>> {
        let mut inner = self.lock();
        inner.updates.push((number, update.clone()));
        let issue =
            inner.issues.get_mut(&number).ok_or_else(|| format!("issue #{number} not found"))?;
        issue.title.clone_from(&update.title);
        issue.body = Some(update.body.clone());
        issue.labels.clone_from(&update.labels);
        issue.assignee.clone_from(&update.assignee);
        if issue.state != update.state {
            issue.closed_at = match update.state {
                IssueState::Closed => Some(epoch()),
                IssueState::Open => None,
            };
        }
        issue.state = update.state;
        Ok(issue.clone())
    }

    fn ensure_labels(
        &self,
        labels: &[LabelSpec],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut inner = self.lock();
        inner.labels.extend(labels.iter().map(|l| l.name.clone()));
        Ok(())
    }

    fn verify_access(&self) -> bool {
        true
    }
}
