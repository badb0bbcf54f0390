//! Persisted sync state.
//!
//! ```json
//! {
//!   "lastSync": "2025-06-01T12:00:00Z",
//!   "issues": {
//!     "7": { "localHash": "…", "remoteHash": "…", "lastSyncedAt": "2025-06-01T12:00:00Z" }
//!   }
//! }
//! ```
//!
//! Read once at the start of a run and written at the end of each phase.
//! Entries are replaced whole, never merged.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StateError;
use crate::ports::filesystem::FileSystem;
use crate::task::timestamp;

/// Hash pair recorded after the last reconciliation of one issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateEntry {
    /// Hash of the local document.
    pub local_hash: String,
    /// Hash of the remote issue.
    pub remote_hash: String,
    /// When the pair was recorded.
    #[serde(with = "timestamp")]
    pub last_synced_at: DateTime<Utc>,
}

/// All recorded hash pairs, keyed by issue number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    /// End of the last run that saved state.
    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<DateTime<Utc>>,
    /// Per-issue entries.
    #[serde(default)]
    pub issues: BTreeMap<u64, StateEntry>,
}

impl SyncState {
    /// Loads state from `path`. A missing file is an empty state.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(fs: &dyn FileSystem, path: &Path) -> Result<Self, StateError> {
        if !fs.exists(path) {
            return Ok(Self::default());
        }
        let contents = fs
            .read_to_string(path)
            .map_err(|e| StateError::Read { path: path.to_path_buf(), message: e.to_string() })?;
        serde_json::from_str(&contents)
            .map_err(|source| StateError::Corrupt { path: path.to_path_buf(), source })
    }

    /// Stamps `last_sync` and writes the state to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&mut self, fs: &dyn FileSystem, path: &Path, at: DateTime<Utc>) -> Result<(), StateError> {
        self.last_sync = Some(at);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| StateError::Write { path: path.to_path_buf(), message: e.to_string() })?;
        fs.write(path, &format!("{json}\n"))
            .map_err(|e| StateError::Write { path: path.to_path_buf(), message: e.to_string() })
    }

    /// Returns the entry for `number`.
    #[must_use]
    pub fn entry(&self, number: u64) -> Option<&StateEntry> {
        self.issues.get(&number)
    }

    /// Replaces the entry for `number`.
    pub fn record(&mut self, number: u64, local_hash: String, remote_hash: String, at: DateTime<Utc>) {
        self.issues.insert(number, StateEntry { local_hash, remote_hash, last_synced_at: at });
    }

    /// Drops the entry for `number`. Only operator-confirmed cleanup calls this.
    pub fn forget(&mut self, number: u64) -> Option<StateEntry> {
        self.issues.remove(&number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryFileSystem;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn missing_file_is_empty_state() {
        let fs = MemoryFileSystem::new();
        let state = SyncState::load(&fs, Path::new("/p/state.json")).unwrap();
        assert_eq!(state, SyncState::default());
    }

    #[test]
    fn save_uses_camel_case_and_string_keys() {
        let fs = MemoryFileSystem::new();
        let path = Path::new("/p/.tasksync/state.json");
        let mut state = SyncState::default();
        state.record(7, "l".into(), "r".into(), at());
        state.save(&fs, path, at()).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs.read_to_string(path).unwrap()).unwrap();
        assert_eq!(json["lastSync"], "2025-06-01T12:00:00Z");
        assert_eq!(json["issues"]["7"]["localHash"], "l");
        assert_eq!(json["issues"]["7"]["lastSyncedAt"], "2025-06-01T12:00:00Z");

        assert_eq!(SyncState::load(&fs, path).unwrap(), state);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let fs = MemoryFileSystem::new();
        let path = Path::new("/p/state.json");
        fs.write(path, "{").unwrap();
        assert!(matches!(SyncState::load(&fs, path), Err(StateError::Corrupt { .. })));
    }

    #[test]
    fn record_replaces_whole_entry() {
        let mut state = SyncState::default();
        state.record(1, "a".into(), "b".into(), at());
        state.record(1, "c".into(), "d".into(), at());
        let entry = state.entry(1).unwrap();
        assert_eq!((entry.local_hash.as_str(), entry.remote_hash.as_str()), ("c", "d"));
        assert!(state.forget(1).is_some());
        assert!(state.entry(1).is_none());
    }
}
