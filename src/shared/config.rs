use std::time::Duration;

/// Retry policy for the sync engine.
///
/// An operation is attempted at most `max_retries` times after its first
/// failure; between attempts it is held back for `backoff * retries`.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff: Duration::from_secs(30),
        }
    }
}

impl SyncConfig {
    pub fn backoff_ms(&self) -> i64 {
        self.backoff.as_millis() as i64
    }
}
