//! Live adapters for real external interactions.

pub mod clock;
pub mod filesystem;
pub mod issues;
pub mod prompt;
pub mod shell;

pub use clock::LiveClock;
pub use filesystem::LiveFileSystem;
pub use issues::GithubIssueTracker;
pub use prompt::TerminalPrompt;
pub use shell::LiveShellExecutor;
