//! Structured labels.
//!
//! Every label is `key:value`. The keys below carry front-matter fields;
//! any other key is kept as a free-form label.

use crate::ports::issues::LabelSpec;

/// Prefix carrying the priority.
pub const PRIORITY: &str = "priority";
/// Prefix carrying the severity.
pub const SEVERITY: &str = "severity";
/// Prefix carrying the issue type.
pub const TYPE: &str = "type";
/// Prefix carrying one component tag.
pub const COMPONENT: &str = "component";
/// Prefix carrying a non-completed status.
pub const STATUS: &str = "status";

/// Returns `true` if `label` is `key:value` with both sides non-empty.
///
/// Only the first colon counts: it must be neither the first nor the last
/// character.
#[must_use]
pub fn is_valid(label: &str) -> bool {
    match label.find(':') {
        Some(idx) => idx > 0 && idx < label.len() - 1,
        None => false,
    }
}

/// Splits a valid label into key and value.
#[must_use]
pub fn split(label: &str) -> Option<(&str, &str)> {
    if !is_valid(label) {
        return None;
    }
    label.split_once(':')
}

/// Builds `key:value`.
#[must_use]
pub fn join(key: &str, value: &str) -> String {
    format!("{key}:{value}")
}

/// Colour used when creating a label, chosen by prefix.
#[must_use]
pub fn color(label: &str) -> &'static str {
    match split(label) {
        Some((PRIORITY, "p0" | "p1")) => "b60205",
        Some((PRIORITY, _)) => "d93f0b",
        Some((SEVERITY, "critical" | "high")) => "e11d21",
        Some((SEVERITY, _)) => "fbca04",
        Some((TYPE, _)) => "0075ca",
        Some((COMPONENT, _)) => "c5def5",
        Some((STATUS, _)) => "0e8a16",
        _ => "ededed",
    }
}

/// Label specs for every label in `names`.
#[must_use]
pub fn specs(names: &[String]) -> Vec<LabelSpec> {
    names
        .iter()
        .map(|name| LabelSpec { name: name.clone(), color: color(name).to_string() })
        .collect()
}
