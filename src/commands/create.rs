//! `tasksync create` command.

use crate::sync::{SyncEngine, SyncOptions};

/// Create issues for unnumbered documents and print the result.
///
/// # Errors
///
/// Returns an error string if the run aborts or any creation failed.
pub fn run(engine: &SyncEngine<'_>, options: &SyncOptions) -> Result<(), String> {
    let report = engine.run(options).map_err(|e| e.to_string())?;
    if report.created.is_empty() && !report.has_errors() {
        println!("No new tasks to create.");
        return Ok(());
    }
    println!("{}", report.format());
    if report.has_errors() {
        return Err(format!("{} item(s) failed", report.errors.len()));
    }
    Ok(())
}
