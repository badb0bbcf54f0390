//! Service context bundling all port trait objects.

use crate::adapters::live::{
    GithubIssueTracker, LiveClock, LiveFileSystem, LiveShellExecutor, TerminalPrompt,
};
use crate::adapters::memory::{
    FixedClock, MemoryFileSystem, MemoryIssueTracker, ScriptedPrompt, ScriptedShell,
};
use crate::config::Config;
use crate::ports::clock::Clock;
use crate::ports::filesystem::FileSystem;
use crate::ports::issues::IssueTracker;
use crate::ports::prompt::Prompt;
use crate::ports::shell::ShellExecutor;

/// Bundles all port trait objects into a single context.
///
/// Each field provides access to one external boundary. Constructors wire up
/// either real adapters or the in-memory doubles used by tests.
pub struct ServiceContext {
    /// Clock for obtaining the current time.
    pub clock: Box<dyn Clock>,
    /// Filesystem holding task documents and the sync state.
    pub fs: Box<dyn FileSystem>,
    /// Runner for the external issue-creation command.
    pub shell: Box<dyn ShellExecutor>,
    /// Remote issue tracker.
    pub issues: Box<dyn IssueTracker>,
    /// Operator prompt for conflicts and cleanup.
    pub prompt: Box<dyn Prompt>,
}

impl ServiceContext {
    /// Creates a live context talking to the configured repository.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or its runtime cannot be built.
    pub fn live(config: &Config) -> Result<Self, String> {
        let tracker = GithubIssueTracker::new(&config.api_url, &config.repository, &config.token)
            .map_err(|e| format!("Failed to initialize issue tracker: {e}"))?;
        Ok(Self {
            clock: Box::new(LiveClock),
            fs: Box::new(LiveFileSystem),
            shell: Box::new(LiveShellExecutor),
            issues: Box::new(tracker),
            prompt: Box::new(TerminalPrompt),
        })
    }

    /// Creates a fully in-memory context.
    ///
    /// The adapters are shared handles: keep a clone of any of them to seed
    /// data or inspect effects after the context has been used.
    #[must_use]
    pub fn in_memory(
        fs: &MemoryFileSystem,
        issues: &MemoryIssueTracker,
        shell: &ScriptedShell,
        prompt: &ScriptedPrompt,
        clock: &FixedClock,
    ) -> Self {
        Self {
            clock: Box::new(clock.clone()),
            fs: Box::new(fs.clone()),
            shell: Box::new(shell.clone()),
            issues: Box::new(issues.clone()),
            prompt: Box::new(prompt.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn in_memory_context_shares_adapter_state() {
        let fs = MemoryFileSystem::new();
        let ctx = ServiceContext::in_memory(
            &fs,
            &MemoryIssueTracker::new(),
            &ScriptedShell::new(),
            &ScriptedPrompt::new(),
            &FixedClock::default(),
        );
        ctx.fs.write(Path::new("/p/a.md"), "hello").unwrap();
        assert_eq!(fs.read_to_string(Path::new("/p/a.md")).unwrap(), "hello");
    }

    #[test]
    fn live_context_builds_from_config() {
        let config = Config::from_lookup(|key| match key {
            "GITHUB_TOKEN" => Some("t".to_string()),
            "GITHUB_REPOSITORY" => Some("o/r".to_string()),
            _ => None,
        })
        .unwrap();
        assert!(ServiceContext::live(&config).is_ok());
    }
}
