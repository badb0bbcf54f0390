//! File-name slugs and the `NNN-slug.md` naming scheme.

/// Maximum slug length, in characters.
const MAX_SLUG_LEN: usize = 50;

/// Width of the zero-padded number prefix.
pub const NUMBER_WIDTH: usize = 3;

/// Extension of task documents.
pub const EXTENSION: &str = "md";

/// Turns a title into a lowercase, hyphen-separated slug.
///
/// A leading `[#NNN]` marker is dropped so renumbered titles do not leak
/// into file names.
#[must_use]
pub fn slugify(title: &str) -> String {
    let title = strip_number_marker(title);
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}

/// Removes a leading `[#NNN]` marker (and the whitespace after it).
#[must_use]
pub fn strip_number_marker(title: &str) -> &str {
    let trimmed = title.trim_start();
    let Some(rest) = trimmed.strip_prefix("[#") else {
        return title.trim();
    };
    let digits = rest.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return title.trim();
    }
    match rest[digits..].strip_prefix(']') {
        Some(after) => after.trim(),
        None => title.trim(),
    }
}

/// Builds `NNN-slug.md`.
#[must_use]
pub fn numbered_filename(number: u64, slug: &str) -> String {
    format!("{number:0width$}-{slug}.{EXTENSION}", width = NUMBER_WIDTH)
}

/// Splits `NNN-slug` (with or without extension) into its number and slug.
///
/// Only prefixes of at least [`NUMBER_WIDTH`] digits count, so a slug that
/// merely starts with a digit (`2fa-support`) stays unnumbered.
#[must_use]
pub fn parse_numbered(name: &str) -> Option<(u64, &str)> {
    let stem = name.strip_suffix(".md").unwrap_or(name);
    let digits = stem.chars().take_while(char::is_ascii_digit).count();
    if digits < NUMBER_WIDTH {
        return None;
    }
    let number = stem[..digits].parse().ok()?;
    let slug = stem[digits..].strip_prefix('-').unwrap_or(&stem[digits..]);
    Some((number, slug))
}

/// Returns the name with any numeric prefix removed.
#[must_use]
pub fn strip_numbered(name: &str) -> &str {
    let digits = name.chars().take_while(char::is_ascii_digit).count();
    if digits < NUMBER_WIDTH {
        return name;
    }
    let rest = &name[digits..];
    let rest = rest.strip_prefix('-').unwrap_or(rest);
    if rest.is_empty() || rest == ".md" {
        name
    } else {
        rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("Fix: login   redirect (again)!"), "fix-login-redirect-again");
    }

    #[test]
    fn slugify_drops_number_marker() {
        assert_eq!(slugify("[#012] Fix X"), "fix-x");
    }

    #[test]
    fn slugify_never_returns_empty() {
        assert_eq!(slugify("!!!"), "untitled");
    }

    #[test]
    fn strip_marker_requires_digits_and_bracket() {
        assert_eq!(strip_number_marker("[#001] Fix X"), "Fix X");
        assert_eq!(strip_number_marker("[#] Fix X"), "[#] Fix X");
        assert_eq!(strip_number_marker("[#12 Fix X"), "[#12 Fix X");
    }

    #[test]
    fn numbered_filename_pads_to_three_digits() {
        assert_eq!(numbered_filename(7, "fix-x"), "007-fix-x.md");
        assert_eq!(numbered_filename(1234, "fix-x"), "1234-fix-x.md");
    }

    #[test]
    fn parse_numbered_recovers_number_and_slug() {
        assert_eq!(parse_numbered("007-fix-x.md"), Some((7, "fix-x")));
        assert_eq!(parse_numbered("2fa-support.md"), None);
        assert_eq!(strip_numbered("007-fix-x.md"), "fix-x.md");
        assert_eq!(strip_numbered("fix-x.md"), "fix-x.md");
    }
}
