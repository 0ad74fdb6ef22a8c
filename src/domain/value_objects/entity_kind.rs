use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain record families tracked by the local store and the sync queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Actor,
    Calendar,
}

impl EntityKind {
    pub const ALL: [EntityKind; 2] = [EntityKind::Actor, EntityKind::Calendar];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Actor => "actor",
            EntityKind::Calendar => "calendar",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "actor" => Ok(EntityKind::Actor),
            "calendar" => Ok(EntityKind::Calendar),
            other => Err(format!("Unknown entity kind: {other}")),
        }
    }

    /// Collection segment used in remote API paths.
    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::Actor => "actors",
            EntityKind::Calendar => "calendars",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
