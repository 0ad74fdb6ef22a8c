use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(value: String) -> Result<Self, String> {
        if value.trim().is_empty() {
            return Err("User ID cannot be empty".to_string());
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Roles recognized by the per-domain sync allow-lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    Admin,
    Coordinator,
    FieldAgent,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Coordinator => "coordinator",
            UserRole::FieldAgent => "field_agent",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "admin" => Ok(UserRole::Admin),
            "coordinator" => Ok(UserRole::Coordinator),
            "field_agent" => Ok(UserRole::FieldAgent),
            other => Err(format!("Unknown user role: {other}")),
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Authenticated user as reported by the session collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub id: UserId,
    pub role: UserRole,
}

impl SessionUser {
    pub fn new(id: UserId, role: UserRole) -> Self {
        Self { id, role }
    }
}
