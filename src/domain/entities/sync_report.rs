use serde::{Deserialize, Serialize};

/// Counters for one engine run, returned by `trigger_sync` / `sync_on_login`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncReport {
    /// A drain was already in progress; this call was coalesced into a no-op.
    pub already_running: bool,
    pub processed: u32,
    pub succeeded: u32,
    pub skipped: u32,
    pub failed: u32,
    /// Records fetched by a full or incremental pull.
    pub pulled: u32,
}

impl SyncReport {
    pub fn already_running() -> Self {
        Self {
            already_running: true,
            ..Self::default()
        }
    }

    pub fn merge(&mut self, other: &SyncReport) {
        self.processed += other.processed;
        self.succeeded += other.succeeded;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.pulled += other.pulled;
    }
}
