//! Side-by-side rendering of a conflicting pair.

use std::collections::BTreeSet;
use std::fmt::Write;

use similar::TextDiff;

use crate::mapper::FieldMapper;
use crate::sync::plan::PlannedItem;
use crate::task::frontmatter::normalize_body;
use crate::task::Metadata;

/// Renders every contested field of a conflict.
#[must_use]
pub fn render(mapper: &FieldMapper, item: &PlannedItem) -> String {
    let local = mapper.to_remote(&item.doc);
    let (remote_meta, remote_body) = mapper.from_remote(&item.record, Some(&item.doc.frontmatter));
    let remote_title = mapper.normalize_title(&item.record.title);

    let mut out = String::new();
    let _ = writeln!(out, "Conflict on #{}: {}", item.number, local.title);
    let _ = writeln!(out, "  local:  {}", item.doc.filepath.display());

    if local.title != remote_title {
        let _ = writeln!(out, "\nTitle\n  local:  {}\n  remote: {remote_title}", local.title);
    }

    let local_body = normalize_body(&item.doc.body);
    if let Some(diff) = body_diff(&remote_body, &local_body) {
        let _ = write!(out, "\nBody\n{diff}");
    }

    let local_labels: BTreeSet<&str> = local.labels.iter().map(String::as_str).collect();
    let remote_labels: BTreeSet<&str> = item.record.labels.iter().map(String::as_str).collect();
    if local_labels != remote_labels {
        let _ = writeln!(out, "\nLabels");
        for label in local_labels.difference(&remote_labels) {
            let _ = writeln!(out, "  + {label} (local only)");
        }
        for label in remote_labels.difference(&local_labels) {
            let _ = writeln!(out, "  - {label} (remote only)");
        }
    }

    if local.state != item.record.state {
        let _ = writeln!(out, "\nState\n  local:  {}\n  remote: {}", local.state, item.record.state);
    }

    let fields = metadata_diff(&item.doc.frontmatter, &remote_meta);
    if !fields.is_empty() {
        let _ = writeln!(out, "\nMetadata");
        for (name, l, r) in fields {
            let _ = writeln!(out, "  {name}: {l} -> {r}");
        }
    }
    out
}

/// Unified diff from remote to local, or `None` when equal.
fn body_diff(remote: &str, local: &str) -> Option<String> {
    if remote == local {
        return None;
    }
    let remote = format!("{remote}\n");
    let local = format!("{local}\n");
    let diff = TextDiff::from_lines(&remote, &local);
    let unified = diff.unified_diff().context_radius(3).header("remote", "local").to_string();
    (!unified.is_empty()).then_some(unified)
}

fn show<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "(none)".to_string(), |v| v.to_string())
}

/// Fields whose local and remote values differ: `(name, local, remote)`.
fn metadata_diff(local: &Metadata, remote: &Metadata) -> Vec<(&'static str, String, String)> {
    let pairs = [
        ("assignee", show(local.assignee.as_deref()), show(remote.assignee.as_deref())),
        ("priority", local.priority.to_string(), remote.priority.to_string()),
        ("severity", local.severity.to_string(), remote.severity.to_string()),
        ("type", show(local.issue_type.as_deref()), show(remote.issue_type.as_deref())),
        ("status", show(local.status), show(remote.status)),
        ("components", local.components.join(", "), remote.components.join(", ")),
        ("reporter", local.reporter.clone(), remote.reporter.clone()),
        ("due", show(local.due_date.as_deref()), show(remote.due_date.as_deref())),
        ("epic", show(local.parent.as_deref()), show(remote.parent.as_deref())),
        ("commit", show(local.related_commit.as_deref()), show(remote.related_commit.as_deref())),
    ];
    pairs.into_iter().filter(|(_, l, r)| l != r).collect()
}
