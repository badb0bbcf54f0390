//! YAML front-matter codec for task documents.
//!
//! ```text
//! ---
//! title: Fix login
//! ...
//! ---
//!
//! Body text.
//! ```

use crate::error::DocumentError;

use super::document::Metadata;

const FENCE: &str = "---";

/// Splits raw text into its YAML block and body.
///
/// Returns `Ok(None)` when the text has no front matter at all.
///
/// # Errors
///
/// Returns [`DocumentError::UnterminatedFrontMatter`] when the opening fence
/// is never closed.
pub fn split(text: &str) -> Result<Option<(&str, &str)>, DocumentError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let Some(rest) = text.strip_prefix(FENCE) else {
        return Ok(None);
    };
    let Some(rest) = rest.strip_prefix('\n').or_else(|| rest.strip_prefix("\r\n")) else {
        return Ok(None);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FENCE {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Ok(Some((yaml, body)));
        }
        offset += line.len();
    }
    Err(DocumentError::UnterminatedFrontMatter)
}

/// Parses a document into its metadata and normalized body.
///
/// # Errors
///
/// Returns an error if the front matter is missing, unterminated, or does
/// not contain the required fields.
pub fn parse(text: &str) -> Result<(Metadata, String), DocumentError> {
    let (yaml, body) = split(text)?.ok_or(DocumentError::MissingFrontMatter)?;
    let metadata: Metadata = serde_yaml::from_str(yaml)?;
    Ok((metadata, normalize_body(body)))
}

/// Serializes metadata and body back into document text.
///
/// # Errors
///
/// Returns an error if the metadata cannot be serialized.
pub fn render(metadata: &Metadata, body: &str) -> Result<String, DocumentError> {
    let yaml = serde_yaml::to_string(metadata)?;
    let body = normalize_body(body);
    if body.is_empty() {
        Ok(format!("{FENCE}\n{yaml}{FENCE}\n"))
    } else {
        Ok(format!("{FENCE}\n{yaml}{FENCE}\n\n{body}\n"))
    }
}

/// Trims the blank lines around a body and normalizes line endings.
#[must_use]
pub fn normalize_body(body: &str) -> String {
    body.replace("\r\n", "\n").trim_matches('\n').trim_end().to_string()
}
