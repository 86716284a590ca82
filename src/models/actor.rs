use serde::{Deserialize, Serialize};
use std::fmt;

/// LMS role of an authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Root,
    Admin,
    Moderator,
    MiniAdmin,
    Trainer,
    Student,
    Other(String),
}

impl Role {
    pub fn parse(raw: &str) -> Self {
        let normalized: String = raw
            .trim()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "root" => Role::Root,
            "admin" => Role::Admin,
            "moderator" => Role::Moderator,
            "miniadmin" => Role::MiniAdmin,
            "trainer" => Role::Trainer,
            "student" => Role::Student,
            _ => Role::Other(raw.trim().to_string()),
        }
    }

    /// Roles allowed to read, mark, return and override assessments.
    pub fn is_evaluator(&self) -> bool {
        matches!(
            self,
            Role::Root | Role::Admin | Role::Moderator | Role::MiniAdmin | Role::Trainer
        )
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Root => f.write_str("Root"),
            Role::Admin => f.write_str("Admin"),
            Role::Moderator => f.write_str("Moderator"),
            Role::MiniAdmin => f.write_str("Mini Admin"),
            Role::Trainer => f.write_str("Trainer"),
            Role::Student => f.write_str("Student"),
            Role::Other(name) => f.write_str(name),
        }
    }
}

/// The authenticated caller every workflow operation acts on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: i64,
    pub role: Role,
}

impl Actor {
    pub fn new(id: i64, role: Role) -> Self {
        Self { id, role }
    }
}
