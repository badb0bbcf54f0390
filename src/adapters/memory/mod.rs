//! In-memory adapters for tests and dry runs.
//!
//! Every adapter is a cheap clone around shared state, so a test can keep a
//! handle while the [`crate::context::ServiceContext`] owns another.

pub mod clock;
pub mod filesystem;
pub mod issues;
pub mod prompt;
pub mod shell;

pub use clock::FixedClock;
pub use filesystem::MemoryFileSystem;
pub use issues::MemoryIssueTracker;
pub use prompt::ScriptedPrompt;
pub use shell::ScriptedShell;
