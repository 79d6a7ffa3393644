//! Projects owned by client accounts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::Record;

/// Project status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Active,
    Completed,
    OnHold,
    Cancelled,
}

impl std::str::FromStr for ProjectStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(ProjectStatus::Active),
            "completed" => Ok(ProjectStatus::Completed),
            "on_hold" | "on-hold" | "onhold" => Ok(ProjectStatus::OnHold),
            "cancelled" | "canceled" => Ok(ProjectStatus::Cancelled),
            _ => Err(crate::Error::InvalidProjectStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectStatus::Active => write!(f, "active"),
            ProjectStatus::Completed => write!(f, "completed"),
            ProjectStatus::OnHold => write!(f, "on_hold"),
            ProjectStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Project record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Unique identifier (prj-xxxxxxxx)
    pub id: String,

    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Owning client's user id. Must reference a user with role=client.
    pub client_id: String,

    pub status: ProjectStatus,

    /// Who created the project
    pub user_id: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(id: String, draft: NewProject, creator_id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: draft.name,
            description: draft.description,
            client_id: draft.client_id,
            status: draft.status.unwrap_or_default(),
            user_id: creator_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge a patch onto the record
    pub fn apply(&mut self, patch: ProjectPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        self.updated_at = Utc::now();
    }
}

impl Record for Project {
    const COLLECTION: &'static str = "projects";
    const ID_PREFIX: &'static str = "prj";

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Caller-supplied payload for project creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub client_id: String,
    #[serde(default)]
    pub status: Option<ProjectStatus>,
}

/// Partial update for a project
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<ProjectStatus>,
}
