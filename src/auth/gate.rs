use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The three kinds of principal that can hold a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Doctor,
    Patient,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Doctor => "doctor",
            Role::Patient => "patient",
        }
    }

    /// Where a freshly logged-in principal lands.
    pub fn dashboard(&self) -> &'static str {
        match self {
            Role::Admin => "/admin/dashboard",
            Role::Doctor => "/doctor/dashboard",
            Role::Patient => "/patient/dashboard",
        }
    }

    /// Admins have no lifecycle; doctors and patients can be deactivated.
    pub fn has_lifecycle(&self) -> bool {
        !matches!(self, Role::Admin)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("{0:?} is not a known role")]
pub struct UnknownRole(pub String);

impl std::str::FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "admin" => Ok(Role::Admin),
            "doctor" => Ok(Role::Doctor),
            "patient" => Ok(Role::Patient),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authenticated actor, as carried by the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
    pub username: String,
}

/// What a protected operation demands of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Authenticated,
    Role(Role),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AccessDenied {
    #[error("No principal is logged in")]
    Anonymous,
    #[error("A {actual} may not perform an operation reserved for a {required}")]
    WrongRole { required: Role, actual: Role },
}

pub fn authorize(
    principal: Option<Principal>,
    requirement: Requirement,
) -> Result<Principal, AccessDenied> {
    let principal = principal.ok_or(AccessDenied::Anonymous)?;
    match requirement {
        Requirement::Authenticated => Ok(principal),
        Requirement::Role(required) if principal.role == required => Ok(principal),
        Requirement::Role(required) => Err(AccessDenied::WrongRole {
            required,
            actual: principal.role,
        }),
    }
}
