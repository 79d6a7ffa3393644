//! User accounts and roles

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::Record;

/// Account role, decides visibility and mutation rights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// External customer: sees only their own projects and issues
    #[default]
    Client,
    /// Internal team member: sees everything, works issues
    Team,
    /// Full control, including team management
    Admin,
}

impl Role {
    /// Team members and admins
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Team | Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl std::str::FromStr for Role {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "client" => Ok(Role::Client),
            "team" => Ok(Role::Team),
            "admin" => Ok(Role::Admin),
            _ => Err(crate::Error::InvalidRole(s.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Client => write!(f, "client"),
            Role::Team => write!(f, "team"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// User account record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier (usr-xxxxxxxx, or the identity provider's id)
    pub id: String,

    pub email: String,

    pub display_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,

    /// Exactly one role at a time; changed only through team management
    pub role: Role,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: String, email: String, display_name: String, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id,
            email,
            display_name,
            avatar_url: None,
            role,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply self-service profile edits
    pub fn apply_profile(&mut self, patch: ProfilePatch) {
        if let Some(name) = patch.display_name {
            self.display_name = name;
        }
        if let Some(url) = patch.avatar_url {
            self.avatar_url = Some(url);
        }
        self.updated_at = Utc::now();
    }
}

impl Record for User {
    const COLLECTION: &'static str = "users";
    const ID_PREFIX: &'static str = "usr";

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl std::fmt::Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}> [{}]", self.display_name, self.email, self.role)
    }
}

/// Self-service profile edits (never touches role or email)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}
