use crate::application::ports::DeltaTracker;
use crate::domain::value_objects::EntityKind;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory delta counts, written by the host's polling collaborator and
/// read by the sync engine.
#[derive(Default)]
pub struct SharedDeltaTracker {
    counts: RwLock<HashMap<EntityKind, u32>>,
}

impl SharedDeltaTracker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeltaTracker for SharedDeltaTracker {
    fn get_count(&self, kind: EntityKind) -> u32 {
        self.counts
            .read()
            .map(|counts| counts.get(&kind).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn set_count(&self, kind: EntityKind, count: u32) {
        if let Ok(mut counts) = self.counts.write() {
            counts.insert(kind, count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_default_to_zero_and_update() {
        let tracker = SharedDeltaTracker::new();
        assert_eq!(tracker.get_count(EntityKind::Actor), 0);
        tracker.set_count(EntityKind::Actor, 7);
        assert_eq!(tracker.get_count(EntityKind::Actor), 7);
        assert_eq!(tracker.get_count(EntityKind::Calendar), 0);
    }
}
