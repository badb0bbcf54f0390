//! Port traits defining external boundaries.
//!
//! Each trait represents a boundary between the sync core and an external
//! system (time, disk, subprocesses, the remote tracker, the operator).
//! Implementations live in `src/adapters/`.

pub mod clock;
pub mod filesystem;
pub mod issues;
pub mod prompt;
pub mod shell;

pub use clock::Clock;
pub use filesystem::FileSystem;
pub use issues::{IssueState, IssueTracker, IssueUpdate, LabelSpec, NewIssue, RemoteIssue};
pub use prompt::Prompt;
pub use shell::{ShellExecutor, ShellOutput};
