//! `tasksync sync`, `push` and `pull` commands.

use crate::sync::{SyncEngine, SyncOptions};

/// Execute a reconciliation run and print its summary.
///
/// # Errors
///
/// Returns an error string if the run aborts or any item failed.
pub fn run(engine: &SyncEngine<'_>, options: &SyncOptions) -> Result<(), String> {
    let report = engine.run(options).map_err(|e| e.to_string())?;
    println!("Sync complete:");
    println!("{}", report.format());
    if report.has_errors() {
        return Err(format!("{} item(s) failed", report.errors.len()));
    }
    Ok(())
}
