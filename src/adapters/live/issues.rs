//! Live adapter for the `IssueTracker` port using the GitHub REST API.
//!
//! The port is synchronous, so the adapter owns a current-thread tokio
//! runtime and blocks on each request. Batch fetches fan out inside that
//! runtime in chunks of [`BATCH_SIZE`].

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::runtime::Runtime;
use tokio::task::JoinSet;

use crate::ports::issues::{
    IssueState, IssueTracker, IssueUpdate, LabelSpec, NewIssue, RemoteIssue,
};

/// Concurrent requests per batch when fetching many issues.
pub const BATCH_SIZE: usize = 10;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("tasksync/", env!("CARGO_PKG_VERSION"));
const ACCEPT: &str = "application/vnd.github+json";
const LABELS_PER_PAGE: usize = 100;

/// Live issue tracker talking to one GitHub repository.
pub struct GithubIssueTracker {
    runtime: Runtime,
    client: Client,
    repo_url: String,
    token: String,
}

impl GithubIssueTracker {
    /// Creates a tracker for `repository` (`owner/name`) under `api_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime or the HTTP client cannot be built.
    pub fn new(
        api_url: &str,
        repository: &str,
        token: &str,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| format!("failed to start runtime: {e}"))?;
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| format!("failed to create HTTP client: {e}"))?;
        Ok(Self {
            runtime,
            client,
            repo_url: format!("{}/repos/{repository}", api_url.trim_end_matches('/')),
            token: token.to_string(),
        })
    }

    fn request(&self) -> Request {
        Request {
            client: self.client.clone(),
            repo_url: self.repo_url.clone(),
            token: self.token.clone(),
        }
    }
}

/// Cloneable request context so batch fetches can run as spawned tasks.
#[derive(Clone)]
struct Request {
    client: Client,
    repo_url: String,
    token: String,
}

impl Request {
    fn builder(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.repo_url))
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, ACCEPT)
    }

    async fn get_issue(&self, number: u64) -> Result<Option<RemoteIssue>, String> {
        let response = self
            .builder(reqwest::Method::GET, &format!("/issues/{number}"))
            .send()
            .await
            .map_err(|e| format!("request for #{number} failed: {e}"))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("fetching #{number} returned {status}: {}", error_message(&body)));
        }
        let issue: GithubIssue = response
            .json()
            .await
            .map_err(|e| format!("failed to parse issue #{number}: {e}"))?;
        // The issues endpoint also serves pull requests; those are not tasks.
        if issue.pull_request.is_some() {
            return Ok(None);
        }
        Ok(Some(issue.into()))
    }

    async fn send_issue<T: Serialize + Sync>(
        &self,
        method: reqwest::Method,
        path: &str,
        payload: &T,
    ) -> Result<RemoteIssue, String> {
        let response = self
            .builder(method, path)
            .json(payload)
            .send()
            .await
            .map_err(|e| format!("request to {path} failed: {e}"))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| format!("failed to read response: {e}"))?;
        if !status.is_success() {
            return Err(format!("{path} returned {status}: {}", error_message(&body)));
        }
        let issue: GithubIssue =
            serde_json::from_str(&body).map_err(|e| format!("failed to parse issue: {e}"))?;
        Ok(issue.into())
    }

    async fn existing_labels(&self) -> Result<BTreeSet<String>, String> {
        let mut names = BTreeSet::new();
        for page in 1.. {
            let response = self
                .builder(reqwest::Method::GET, "/labels")
                .query(&[("per_page", LABELS_PER_PAGE), ("page", page)])
                .send()
                .await
                .map_err(|e| format!("listing labels failed: {e}"))?;
            let status = response.status();
            if !status.is_success() {
                return Err(format!("listing labels returned {status}"));
            }
            let labels: Vec<GithubLabel> =
                response.json().await.map_err(|e| format!("failed to parse labels: {e}"))?;
            let count = labels.len();
            names.extend(labels.into_iter().map(|l| l.name));
            if count < LABELS_PER_PAGE {
                break;
            }
        }
        Ok(names)
    }

    async fn create_label(&self, label: &LabelSpec) -> Result<(), String> {
        let response = self
            .builder(reqwest::Method::POST, "/labels")
            .json(label)
            .send()
            .await
            .map_err(|e| format!("creating label {} failed: {e}", label.name))?;
        let status = response.status();
        // 422 means another run created it in the meantime.
        if status.is_success() || status == StatusCode::UNPROCESSABLE_ENTITY {
            return Ok(());
        }
        Err(format!("creating label {} returned {status}", label.name))
    }
}

/// Issue payload as returned by the REST API.
#[derive(Deserialize)]
struct GithubIssue {
    number: u64,
    title: String,
    body: Option<String>,
    state: IssueState,
    #[serde(default)]
    labels: Vec<GithubLabel>,
    assignee: Option<GithubUser>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
    pull_request: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct GithubLabel {
    name: String,
}

#[derive(Deserialize)]
struct GithubUser {
    login: String,
}

#[derive(Deserialize)]
struct GithubError {
    message: String,
}

impl From<GithubIssue> for RemoteIssue {
    fn from(issue: GithubIssue) -> Self {
        Self {
            number: issue.number,
            title: issue.title,
            body: issue.body,
            state: issue.state,
            labels: issue.labels.into_iter().map(|l| l.name).collect(),
            assignee: issue.assignee.map(|u| u.login),
            created_at: issue.created_at,
            updated_at: issue.updated_at,
            closed_at: issue.closed_at,
        }
    }
}

/// Body of a create or update request.
#[derive(Serialize)]
struct IssuePayload<'a> {
    title: &'a str,
    body: &'a str,
    labels: &'a [String],
    assignees: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<IssueState>,
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<GithubError>(body).map_or_else(|_| body.to_string(), |e| e.message)
}

impl IssueTracker for GithubIssueTracker {
    fn get_issue(
        &self,
        number: u64,
    ) -> Result<Option<RemoteIssue>, Box<dyn std::error::Error + Send + Sync>> {
        let request = self.request();
        Ok(self.runtime.block_on(request.get_issue(number))?)
    }

    fn get_issues(&self, numbers: &[u64]) -> BTreeMap<u64, RemoteIssue> {
        let request = self.request();
        self.runtime.block_on(async move {
            let mut found = BTreeMap::new();
            for chunk in numbers.chunks(BATCH_SIZE) {
                let mut set = JoinSet::new();
                for &number in chunk {
                    let request = request.clone();
                    set.spawn(async move { (number, request.get_issue(number).await) });
                }
                while let Some(joined) = set.join_next().await {
                    match joined {
                        Ok((number, Ok(Some(issue)))) => {
                            found.insert(number, issue);
                        }
                        Ok((number, Ok(None))) => tracing::debug!(number, "issue not found"),
                        Ok((number, Err(e))) => tracing::warn!(number, "fetch failed: {e}"),
                        Err(e) => tracing::warn!("fetch task failed: {e}"),
                    }
                }
            }
            found
        })
    }

    fn create_issue(
        &self,
        issue: &NewIssue,
    ) -> Result<RemoteIssue, Box<dyn std::error::Error + Send + Sync>> {
        let payload = IssuePayload {
            title: &issue.title,
            body: &issue.body,
            labels: &issue.labels,
            assignees: issue.assignee.as_deref().into_iter().collect(),
            state: None,
        };
        let request = self.request();
        Ok(self.runtime.block_on(request.send_issue(reqwest::Method::POST, "/issues", &payload))?)
    }

    fn update_issue(
        &self,
        number: u64,
        update: &IssueUpdate,
    ) -> Result<RemoteIssue, Box<dyn std::error::Error + Send + Sync>> {
        let payload = IssuePayload {
            title: &update.title,
            body: &update.body,
            labels: &update.labels,
            assignees: update.assignee.as_deref().into_iter().collect(),
            state: Some(update.state),
        };
        let request = self.request();
        let path = format!("/issues/{number}");
        Ok(self.runtime.block_on(request.send_issue(reqwest::Method::PATCH, &path, &payload))?)
    }

    fn ensure_labels(
        &self,
        labels: &[LabelSpec],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if labels.is_empty() {
            return Ok(());
        }
        let request = self.request();
        let failed = self.runtime.block_on(async {
            let existing = request.existing_labels().await.unwrap_or_else(|e| {
                tracing::warn!("{e}; creating every label");
                BTreeSet::new()
            });
            let mut failed = Vec::new();
            for label in labels.iter().filter(|l| !existing.contains(&l.name)) {
                tracing::info!(label = %label.name, "creating label");
                if let Err(e) = request.create_label(label).await {
                    tracing::warn!("{e}");
                    failed.push(label.name.as_str());
                }
            }
            failed
        });
        if failed.is_empty() {
            Ok(())
        } else {
            Err(format!("could not create labels: {}", failed.join(", ")).into())
        }
    }

    fn verify_access(&self) -> bool {
        let request = self.request();
        self.runtime.block_on(async {
            match request.builder(reqwest::Method::GET, "").send().await {
                Ok(response) => response.status().is_success(),
                Err(e) => {
                    tracing::warn!("access check failed: {e}");
                    false
                }
            }
        })
    }
}
