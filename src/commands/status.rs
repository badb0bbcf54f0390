//! `tasksync status` command.

use crate::sync::{SyncEngine, SyncOptions};

/// Print what a sync would do. Nothing is written.
///
/// # Errors
///
/// Returns an error string if the state file or a backend cannot be read.
pub fn run(engine: &SyncEngine<'_>, options: &SyncOptions) -> Result<(), String> {
    let state = engine.load_state().map_err(|e| e.to_string())?;
    let plan = engine.plan(options, &state).map_err(|e| e.to_string())?;
    println!("Dry run, would perform:");
    println!("{}", plan.format());
    Ok(())
}
