//! Issue body decoration.
//!
//! Fields without a label carrier travel in a hidden comment block at the top
//! of the issue body; a footer marks the issue as managed. [`decode`] is the
//! exact inverse of [`encode`].
//!
//! ```text
//! <!-- tasksync
//! **Reporter:** alice
//! **Due:** 2025-03-01
//! -->
//!
//! Body text.
//!
//! ---
//! _Synced from local tasks by tasksync_
//! ```

use crate::task::frontmatter::normalize_body;

const BLOCK_START: &str = "<!-- tasksync";
const BLOCK_END: &str = "-->";
const FOOTER: &str = "---\n_Synced from local tasks by tasksync_";

const REPORTER: &str = "Reporter";
const DUE: &str = "Due";
const EPIC: &str = "Epic";
const COMMIT: &str = "Commit";

/// Fields carried in the comment block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyFields {
    /// Who reported the task.
    pub reporter: Option<String>,
    /// Due date, verbatim.
    pub due_date: Option<String>,
    /// Parent or epic reference.
    pub epic: Option<String>,
    /// Related commit.
    pub related_commit: Option<String>,
}

impl BodyFields {
    fn entries(&self) -> [(&'static str, Option<&str>); 4] {
        [
            (REPORTER, self.reporter.as_deref()),
            (DUE, self.due_date.as_deref()),
            (EPIC, self.epic.as_deref()),
            (COMMIT, self.related_commit.as_deref()),
        ]
    }

    /// Returns `true` if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().iter().all(|(_, v)| v.is_none())
    }
}

/// Renders the outgoing issue body.
#[must_use]
pub fn encode(fields: &BodyFields, body: &str) -> String {
    let mut parts = Vec::new();
    if !fields.is_empty() {
        let mut block = String::from(BLOCK_START);
        for (key, value) in fields.entries() {
            if let Some(value) = value {
                block.push_str(&format!("\n**{key}:** {value}"));
            }
        }
        block.push('\n');
        block.push_str(BLOCK_END);
        parts.push(block);
    }
    let body = normalize_body(body);
    if !body.is_empty() {
        parts.push(body);
    }
    parts.push(FOOTER.to_string());
    parts.join("\n\n")
}

/// Splits an incoming issue body into block fields and clean text.
#[must_use]
pub fn decode(text: &str) -> (BodyFields, String) {
    let text = text.replace("\r\n", "\n");
    let mut fields = BodyFields::default();
    let mut rest = text.trim_start();

    if let Some(after_start) = rest.strip_prefix(BLOCK_START) {
        if let Some(end) = after_start.find(BLOCK_END) {
            for line in after_start[..end].lines() {
                parse_line(line, &mut fields);
            }
            rest = &after_start[end + BLOCK_END.len()..];
        }
    }

    let trimmed = rest.trim_end();
    let rest = trimmed.strip_suffix(FOOTER).unwrap_or(trimmed);
    (fields, normalize_body(rest))
}

fn parse_line(line: &str, fields: &mut BodyFields) {
    let Some((key, value)) = line.trim().strip_prefix("**").and_then(|l| l.split_once(":**")) else {
        return;
    };
    let value = value.trim();
    if value.is_empty() {
        return;
    }
    let slot = match key.trim() {
        REPORTER => &mut fields.reporter,
        DUE => &mut fields.due_date,
        EPIC => &mut fields.epic,
        COMMIT => &mut fields.related_commit,
        _ => return,
    };
    *slot = Some(value.to_string());
}
