//! Issue data model and lifecycle
//!
//! The status machine is deliberately non-strict: any of the four states
//! may follow any other, including reopening a closed issue. The only
//! fixed point is that new issues always start open.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::Record;

/// Issue status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl Status {
    /// Statuses still needing attention
    pub fn is_open(&self) -> bool {
        matches!(self, Status::Open | Status::InProgress)
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Status::Resolved | Status::Closed)
    }

    pub const ALL: [Status; 4] = [
        Status::Open,
        Status::InProgress,
        Status::Resolved,
        Status::Closed,
    ];
}

impl std::str::FromStr for Status {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(Status::Open),
            "in_progress" | "in-progress" | "inprogress" => Ok(Status::InProgress),
            "resolved" => Ok(Status::Resolved),
            "closed" => Ok(Status::Closed),
            _ => Err(crate::Error::InvalidStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Open => write!(f, "open"),
            Status::InProgress => write!(f, "in_progress"),
            Status::Resolved => write!(f, "resolved"),
            Status::Closed => write!(f, "closed"),
        }
    }
}

/// Issue priority, orthogonal to status
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl std::str::FromStr for Priority {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            _ => Err(crate::Error::InvalidPriority(s.to_string())),
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
            Priority::Critical => write!(f, "critical"),
        }
    }
}

/// Core issue record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// Unique identifier (iss-xxxxxxxx)
    pub id: String,

    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub status: Status,

    pub priority: Priority,

    pub project_id: String,

    /// Who filed the issue
    pub reporter_id: String,

    /// Who is responsible for it, if anyone yet
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,

    /// Owner for client visibility filtering. Set to the reporter at
    /// creation and never changed afterwards.
    pub user_id: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Issue {
    /// Build a new issue from a draft. Status is always open regardless
    /// of what the caller might want.
    pub fn new(id: String, draft: NewIssue, reporter_id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: draft.title,
            description: draft.description,
            status: Status::Open,
            priority: draft.priority.unwrap_or_default(),
            project_id: draft.project_id,
            reporter_id: reporter_id.clone(),
            assignee_id: draft.assignee_id,
            user_id: reporter_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge a patch onto the record. `updated_at` is always refreshed,
    /// even for an empty patch.
    pub fn apply(&mut self, patch: IssuePatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(assignee_id) = patch.assignee_id {
            self.assignee_id = assignee_id;
        }
        self.updated_at = Utc::now();
    }
}

impl Record for Issue {
    const COLLECTION: &'static str = "issues";
    const ID_PREFIX: &'static str = "iss";

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] [{}] {}",
            self.id, self.priority, self.status, self.title
        )
    }
}

/// Caller-supplied payload for issue creation
///
/// No id, no timestamps, no status: those are stamped by the façade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewIssue {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    pub project_id: String,
    #[serde(default)]
    pub assignee_id: Option<String>,
}

/// Partial update for an issue
///
/// `assignee_id` is doubly optional so a patch can distinguish "leave
/// alone" (None) from "unassign" (Some(None)).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssuePatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(
        default,
        with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub assignee_id: Option<Option<String>>,
}

/// Serde helper for Option<Option<T>> fields: a missing key deserializes
/// to None, an explicit null to Some(None).
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S, T>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(title: &str) -> NewIssue {
        NewIssue {
            title: title.to_string(),
            description: None,
            priority: None,
            project_id: "prj-1".to_string(),
            assignee_id: None,
        }
    }

    #[test]
    fn test_new_issue_starts_open() {
        let issue = Issue::new("iss-1".into(), draft("broken login"), "usr-1".into());
        assert_eq!(issue.status, Status::Open);
        assert_eq!(issue.priority, Priority::Medium);
        assert_eq!(issue.reporter_id, "usr-1");
        assert_eq!(issue.user_id, "usr-1");
    }

    #[test]
    fn test_apply_refreshes_updated_at() {
        let mut issue = Issue::new("iss-1".into(), draft("a"), "usr-1".into());
        let before = issue.updated_at;
        issue.apply(IssuePatch {
            status: Some(Status::Resolved),
            ..Default::default()
        });
        assert_eq!(issue.status, Status::Resolved);
        assert!(issue.updated_at >= before);
    }

    #[test]
    fn test_apply_can_unassign() {
        let mut issue = Issue::new("iss-1".into(), draft("a"), "usr-1".into());
        issue.assignee_id = Some("usr-2".into());
        issue.apply(IssuePatch {
            assignee_id: Some(None),
            ..Default::default()
        });
        assert_eq!(issue.assignee_id, None);
    }

    #[test]
    fn test_status_round_trip_strings() {
        for status in Status::ALL {
            let parsed: Status = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("tombstone".parse::<Status>().is_err());
    }
}
