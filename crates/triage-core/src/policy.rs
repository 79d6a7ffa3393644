//! Role-based access policy
//!
//! One table, consumed uniformly by every façade entry point. Rules are
//! never re-derived per call site: anything role-gated goes through
//! [`allows`] / [`authorize`], anything record-gated through the
//! `can_view_*` / `can_delete_*` predicates.

use serde::{Deserialize, Serialize};

use crate::attachment::Attachment;
use crate::issue::Issue;
use crate::project::Project;
use crate::user::Role;
use crate::{Error, Result};

/// Role-gated operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    CreateIssue,
    EditIssue,
    EditIssueStatus,
    DeleteIssue,
    ManageProjects,
    ViewTeam,
    ManageTeam,
    ViewSettings,
    ModerateComments,
    DeleteAttachment,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Action::CreateIssue => "create issues",
            Action::EditIssue => "edit issues",
            Action::EditIssueStatus => "change issue status",
            Action::DeleteIssue => "delete issues",
            Action::ManageProjects => "manage projects",
            Action::ViewTeam => "view the team",
            Action::ManageTeam => "manage the team",
            Action::ViewSettings => "view settings",
            Action::ModerateComments => "moderate comments",
            Action::DeleteAttachment => "delete this attachment",
        };
        write!(f, "{}", name)
    }
}

/// The policy table: which roles may perform which actions
pub fn allows(role: Role, action: Action) -> bool {
    match action {
        Action::CreateIssue | Action::EditIssue => true,
        Action::EditIssueStatus
        | Action::ManageProjects
        | Action::ViewTeam
        | Action::ViewSettings => role.is_staff(),
        // DeleteAttachment has an uploader exception on top of this
        // floor, handled by can_delete_attachment.
        Action::DeleteIssue
        | Action::ManageTeam
        | Action::ModerateComments
        | Action::DeleteAttachment => role.is_admin(),
    }
}

/// Like [`allows`], but an insufficient role is a hard error rather
/// than a silent no-op.
pub fn authorize(role: Role, action: Action) -> Result<()> {
    if allows(role, action) {
        Ok(())
    } else {
        Err(Error::Forbidden { role, action })
    }
}

/// Clients see only projects they own; staff see all
pub fn can_view_project(role: Role, principal_id: &str, project: &Project) -> bool {
    match role {
        Role::Client => project.client_id == principal_id,
        Role::Team | Role::Admin => true,
    }
}

/// Clients see only issues they reported; staff see all
pub fn can_view_issue(role: Role, principal_id: &str, issue: &Issue) -> bool {
    match role {
        Role::Client => issue.user_id == principal_id,
        Role::Team | Role::Admin => true,
    }
}

/// Attachments are removed by whoever uploaded them, or an admin
pub fn can_delete_attachment(role: Role, principal_id: &str, attachment: &Attachment) -> bool {
    role.is_admin() || attachment.uploaded_by == principal_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::NewIssue;

    fn issue_owned_by(user_id: &str) -> Issue {
        Issue::new(
            "iss-1".into(),
            NewIssue {
                title: "t".into(),
                description: None,
                priority: None,
                project_id: "prj-1".into(),
                assignee_id: None,
            },
            user_id.to_string(),
        )
    }

    #[test]
    fn test_status_edits_are_staff_only() {
        assert!(!allows(Role::Client, Action::EditIssueStatus));
        assert!(allows(Role::Team, Action::EditIssueStatus));
        assert!(allows(Role::Admin, Action::EditIssueStatus));
    }

    #[test]
    fn test_team_management_is_admin_only() {
        assert!(!allows(Role::Client, Action::ManageTeam));
        assert!(!allows(Role::Team, Action::ManageTeam));
        assert!(allows(Role::Admin, Action::ManageTeam));
        // team may look but not touch
        assert!(allows(Role::Team, Action::ViewTeam));
        assert!(!allows(Role::Client, Action::ViewTeam));
    }

    #[test]
    fn test_settings_unreachable_for_clients() {
        assert!(!allows(Role::Client, Action::ViewSettings));
        assert!(allows(Role::Team, Action::ViewSettings));
    }

    #[test]
    fn test_authorize_is_an_error_not_a_noop() {
        let err = authorize(Role::Client, Action::EditIssueStatus).unwrap_err();
        assert!(matches!(err, Error::Forbidden { .. }));
    }

    #[test]
    fn test_client_issue_visibility() {
        let mine = issue_owned_by("usr-me");
        let theirs = issue_owned_by("usr-other");
        assert!(can_view_issue(Role::Client, "usr-me", &mine));
        assert!(!can_view_issue(Role::Client, "usr-me", &theirs));
        assert!(can_view_issue(Role::Team, "usr-me", &theirs));
        assert!(can_view_issue(Role::Admin, "usr-me", &theirs));
    }

    #[test]
    fn test_client_project_visibility() {
        let project = Project::new(
            "prj-1".into(),
            crate::project::NewProject {
                name: "Site".into(),
                description: None,
                client_id: "usr-client".into(),
                status: None,
            },
            "usr-admin".into(),
        );
        assert!(can_view_project(Role::Client, "usr-client", &project));
        assert!(!can_view_project(Role::Client, "usr-stranger", &project));
        assert!(can_view_project(Role::Team, "usr-stranger", &project));
    }
}
