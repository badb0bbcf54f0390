//! Bidirectional reconciliation between local task documents and remote issues.

mod create;
pub mod engine;
mod orphans;
pub mod plan;
pub mod report;
pub mod state;

pub use create::parse_issue_number;
pub use engine::{Creator, Mode, SyncEngine, SyncOptions, Target};
pub use plan::{PlannedItem, SyncAction, SyncPlan};
pub use report::{ItemKey, SyncReport};
pub use state::{StateEntry, SyncState};
