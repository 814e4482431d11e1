//! Actor and role model.
//!
//! Actors are created by the identity provider and are read-only here.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of an authenticated caller.
pub type ActorId = Uuid;

/// Caller role as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Superadmin,
    Admin,
    Teacher,
    /// Any other role string, kept verbatim (e.g. `student`).
    Other(String),
}

impl Role {
    /// Parses a role string. Never fails: unknown values map to `Other`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "superadmin" => Self::Superadmin,
            "admin" => Self::Admin,
            "teacher" => Self::Teacher,
            _ => Self::Other(value.trim().to_string()),
        }
    }

    /// Stable string form used in storage and headers.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Superadmin => "superadmin",
            Self::Admin => "admin",
            Self::Teacher => "teacher",
            Self::Other(value) => value.as_str(),
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Self::parse(value.as_str())
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.as_str().to_string()
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authenticated caller attempting an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: ActorId, role: Role) -> Self {
        Self { id, role }
    }
}

#[cfg(test)]
mod tests {
    use super::Role;

    #[test]
    fn parse_is_case_insensitive_for_known_roles() {
        assert_eq!(Role::parse("SuperAdmin"), Role::Superadmin);
        assert_eq!(Role::parse(" admin "), Role::Admin);
        assert_eq!(Role::parse("teacher"), Role::Teacher);
    }

    #[test]
    fn unknown_roles_are_kept_verbatim() {
        assert_eq!(Role::parse("student"), Role::Other("student".to_string()));
        assert_eq!(Role::parse("student").as_str(), "student");
    }
}
