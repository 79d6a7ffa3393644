//! Data access façade
//!
//! The sole path by which anything reads or writes entities. Every
//! operation takes an explicit [`Context`] (who is calling, as which
//! role), runs the access policy, then delegates to the record store.
//! Nothing here trusts a UI to have filtered anything.

use std::sync::Arc;

use chrono::Utc;

use crate::attachment::{Attachment, AttachmentUpload, FileUpload};
use crate::blob::BlobStore;
use crate::comment::Comment;
use crate::id::generate_id;
use crate::identity::IdentityProvider;
use crate::issue::{Issue, IssuePatch, NewIssue};
use crate::policy::{self, Action};
use crate::project::{NewProject, Project, ProjectPatch};
use crate::stats::DashboardStats;
use crate::store::{Record, Store};
use crate::user::{ProfilePatch, Role, User};
use crate::{Error, Result};

/// Who is calling, and as which role
///
/// Built from a stored user rather than looked up ambiently, so
/// authorization stays testable without a simulated session.
#[derive(Debug, Clone)]
pub struct Context {
    pub user_id: String,
    pub role: Role,
}

impl Context {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn for_user(user: &User) -> Self {
        Self::new(user.id.clone(), user.role)
    }
}

/// The data access façade
pub struct DataService {
    store: Store,
    identity: Arc<dyn IdentityProvider>,
    blobs: Arc<dyn BlobStore>,
}

impl DataService {
    pub fn new(
        store: Store,
        identity: Arc<dyn IdentityProvider>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            store,
            identity,
            blobs,
        }
    }

    // ---- identity -------------------------------------------------------

    /// The signed-in user's record
    ///
    /// A principal without a record yet gets one provisioned on the
    /// spot, with role=client. That missing lookup is "no result",
    /// not an error.
    pub async fn current_user(&self) -> Result<User> {
        let principal = self.identity.current().await?;

        if let Some(user) = self.store.users.get(&principal.id).await? {
            return Ok(user);
        }

        let mut user = User::new(
            principal.id.clone(),
            principal.email.clone(),
            principal.name_or_email().to_string(),
            Role::Client,
        );
        user.avatar_url = principal.avatar_url.clone();

        let user = self.store.users.insert(user).await?;
        tracing::info!(user = %user.id, "provisioned account for new principal");
        Ok(user)
    }

    /// Context for the signed-in user
    pub async fn context(&self) -> Result<Context> {
        Ok(Context::for_user(&self.current_user().await?))
    }

    /// Context for an already-known user id (transport-level auth,
    /// e.g. a request header). Unknown ids are unauthenticated, not
    /// not-found: there is no session to speak for them.
    pub async fn context_for_user(&self, user_id: &str) -> Result<Context> {
        let user = self
            .store
            .users
            .get(user_id)
            .await?
            .ok_or(Error::Unauthenticated)?;
        Ok(Context::for_user(&user))
    }

    /// The caller's own record
    pub async fn profile(&self, ctx: &Context) -> Result<User> {
        self.store
            .users
            .get(&ctx.user_id)
            .await?
            .ok_or_else(|| Error::NotFound(ctx.user_id.clone()))
    }

    /// Self-service profile edits
    pub async fn update_profile(&self, ctx: &Context, patch: ProfilePatch) -> Result<User> {
        let mut user = self
            .store
            .users
            .get(&ctx.user_id)
            .await?
            .ok_or_else(|| Error::NotFound(ctx.user_id.clone()))?;
        user.apply_profile(patch);
        self.store.users.replace(user).await
    }

    // ---- team -----------------------------------------------------------

    /// All accounts, newest first
    pub async fn list_team(&self, ctx: &Context) -> Result<Vec<User>> {
        policy::authorize(ctx.role, Action::ViewTeam)?;
        let mut users = self.store.users.list().await?;
        sort_newest_first(&mut users);
        Ok(users)
    }

    /// Create an account for an invited address
    pub async fn invite_user(&self, ctx: &Context, email: &str, role: Role) -> Result<User> {
        policy::authorize(ctx.role, Action::ManageTeam)?;

        let email = email.trim();
        if email.is_empty() {
            return Err(Error::validation("An email address is required"));
        }

        let display_name = email.split('@').next().unwrap_or(email).to_string();
        let user = User::new(
            generate_id(User::ID_PREFIX),
            email.to_string(),
            display_name,
            role,
        );
        self.store.users.insert(user).await
    }

    pub async fn set_user_role(&self, ctx: &Context, user_id: &str, role: Role) -> Result<User> {
        policy::authorize(ctx.role, Action::ManageTeam)?;

        let mut user = self
            .store
            .users
            .get(user_id)
            .await?
            .ok_or_else(|| Error::NotFound(user_id.to_string()))?;
        user.role = role;
        user.updated_at = Utc::now();
        self.store.users.replace(user).await
    }

    pub async fn remove_user(&self, ctx: &Context, user_id: &str) -> Result<()> {
        policy::authorize(ctx.role, Action::ManageTeam)?;
        self.store.users.delete(user_id).await
    }

    // ---- projects -------------------------------------------------------

    pub async fn create_project(&self, ctx: &Context, draft: NewProject) -> Result<Project> {
        policy::authorize(ctx.role, Action::ManageProjects)?;

        let mut draft = draft;
        draft.name = draft.name.trim().to_string();
        if draft.name.is_empty() {
            return Err(Error::validation("Project name must not be empty"));
        }

        // Projects are run for a client account
        match self.store.users.get(&draft.client_id).await? {
            Some(owner) if owner.role == Role::Client => {}
            _ => {
                return Err(Error::validation(
                    "client_id must reference an account with the client role",
                ));
            }
        }

        let project = Project::new(generate_id(Project::ID_PREFIX), draft, ctx.user_id.clone());
        self.store.projects.insert(project).await
    }

    /// Projects visible to the caller, newest first
    pub async fn list_projects(&self, ctx: &Context) -> Result<Vec<Project>> {
        let mut projects = self.store.projects.list().await?;
        projects.retain(|p| policy::can_view_project(ctx.role, &ctx.user_id, p));
        sort_newest_first(&mut projects);
        Ok(projects)
    }

    /// Absent and not-visible both come back as None
    pub async fn get_project(&self, ctx: &Context, id: &str) -> Result<Option<Project>> {
        Ok(self
            .store
            .projects
            .get(id)
            .await?
            .filter(|p| policy::can_view_project(ctx.role, &ctx.user_id, p)))
    }

    pub async fn update_project(
        &self,
        ctx: &Context,
        id: &str,
        patch: ProjectPatch,
    ) -> Result<Project> {
        policy::authorize(ctx.role, Action::ManageProjects)?;

        let mut project = self
            .store
            .projects
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        project.apply(patch);
        self.store.projects.replace(project).await
    }

    // ---- issues ---------------------------------------------------------

    pub async fn create_issue(&self, ctx: &Context, draft: NewIssue) -> Result<Issue> {
        policy::authorize(ctx.role, Action::CreateIssue)?;
        let draft = validated_issue_draft(draft)?;

        let issue = Issue::new(generate_id(Issue::ID_PREFIX), draft, ctx.user_id.clone());
        self.store.issues.insert(issue).await
    }

    /// The composite report flow: upload files first, then create the
    /// issue, then record each successful upload as an attachment.
    ///
    /// A failed upload is logged and skipped; it never sinks the issue
    /// or the other attachments. There is no rollback: partial
    /// completion is the accepted outcome.
    pub async fn report_issue(
        &self,
        ctx: &Context,
        draft: NewIssue,
        files: Vec<FileUpload>,
    ) -> Result<(Issue, Vec<Attachment>)> {
        policy::authorize(ctx.role, Action::CreateIssue)?;
        let draft = validated_issue_draft(draft)?;

        let mut uploaded = Vec::new();
        for file in files {
            let path = format!(
                "issues/attachments/{}-{}",
                Utc::now().timestamp_millis(),
                file.filename
            );
            match self.blobs.upload(&file.bytes, &path, true).await {
                Ok(blob) => uploaded.push(AttachmentUpload {
                    filename: file.filename,
                    file_url: blob.public_url,
                    file_size: Some(file.bytes.len() as u64),
                    mime_type: file.mime_type,
                }),
                Err(e) => {
                    tracing::warn!(file = %file.filename, error = %e, "attachment upload failed, skipping");
                }
            }
        }

        let issue = Issue::new(generate_id(Issue::ID_PREFIX), draft, ctx.user_id.clone());
        let issue = self.store.issues.insert(issue).await?;

        let mut attachments = Vec::new();
        for upload in uploaded {
            let attachment = Attachment::new(
                generate_id(Attachment::ID_PREFIX),
                issue.id.clone(),
                upload,
                ctx.user_id.clone(),
            );
            match self.store.attachments.insert(attachment).await {
                Ok(attachment) => attachments.push(attachment),
                Err(e) => {
                    tracing::warn!(issue = %issue.id, error = %e, "attachment record creation failed, skipping");
                }
            }
        }

        Ok((issue, attachments))
    }

    /// Issues visible to the caller, newest first. No matches is an
    /// empty list, not an error.
    pub async fn list_issues(&self, ctx: &Context) -> Result<Vec<Issue>> {
        let mut issues = self.store.issues.list().await?;
        issues.retain(|i| policy::can_view_issue(ctx.role, &ctx.user_id, i));
        sort_newest_first(&mut issues);
        Ok(issues)
    }

    /// Absent and not-visible both come back as None
    pub async fn get_issue(&self, ctx: &Context, id: &str) -> Result<Option<Issue>> {
        Ok(self
            .store
            .issues
            .get(id)
            .await?
            .filter(|i| policy::can_view_issue(ctx.role, &ctx.user_id, i)))
    }

    pub async fn update_issue(&self, ctx: &Context, id: &str, patch: IssuePatch) -> Result<Issue> {
        policy::authorize(ctx.role, Action::EditIssue)?;
        if patch.status.is_some() {
            policy::authorize(ctx.role, Action::EditIssueStatus)?;
        }

        let mut issue = self.require_issue(ctx, id).await?;
        issue.apply(patch);
        self.store.issues.replace(issue).await
    }

    pub async fn delete_issue(&self, ctx: &Context, id: &str) -> Result<()> {
        policy::authorize(ctx.role, Action::DeleteIssue)?;
        self.store.issues.delete(id).await
    }

    // ---- comments -------------------------------------------------------

    pub async fn add_comment(
        &self,
        ctx: &Context,
        issue_id: &str,
        content: &str,
    ) -> Result<Comment> {
        let issue = self.require_issue(ctx, issue_id).await?;

        let content = content.trim();
        if content.is_empty() {
            return Err(Error::validation("A comment needs some text"));
        }

        let comment = Comment::new(
            generate_id(Comment::ID_PREFIX),
            issue.id,
            ctx.user_id.clone(),
            content.to_string(),
        );
        self.store.comments.insert(comment).await
    }

    /// Comments on an issue, oldest first
    pub async fn list_comments(&self, ctx: &Context, issue_id: &str) -> Result<Vec<Comment>> {
        self.require_issue(ctx, issue_id).await?;

        let mut comments = self.store.comments.list().await?;
        comments.retain(|c| c.issue_id == issue_id);
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(comments)
    }

    pub async fn delete_comment(&self, ctx: &Context, id: &str) -> Result<()> {
        policy::authorize(ctx.role, Action::ModerateComments)?;
        self.store.comments.delete(id).await
    }

    // ---- attachments ----------------------------------------------------

    /// Record an already-uploaded blob against an issue
    pub async fn add_attachment(
        &self,
        ctx: &Context,
        issue_id: &str,
        upload: AttachmentUpload,
    ) -> Result<Attachment> {
        let issue = self.require_issue(ctx, issue_id).await?;

        let attachment = Attachment::new(
            generate_id(Attachment::ID_PREFIX),
            issue.id,
            upload,
            ctx.user_id.clone(),
        );
        self.store.attachments.insert(attachment).await
    }

    /// Attachments on an issue, newest first
    pub async fn list_attachments(&self, ctx: &Context, issue_id: &str) -> Result<Vec<Attachment>> {
        self.require_issue(ctx, issue_id).await?;

        let mut attachments = self.store.attachments.list().await?;
        attachments.retain(|a| a.issue_id == issue_id);
        sort_newest_first(&mut attachments);
        Ok(attachments)
    }

    pub async fn delete_attachment(&self, ctx: &Context, id: &str) -> Result<()> {
        let Some(attachment) = self.store.attachments.get(id).await? else {
            // already gone; deletion is idempotent
            return Ok(());
        };

        if !policy::can_delete_attachment(ctx.role, &ctx.user_id, &attachment) {
            return Err(Error::Forbidden {
                role: ctx.role,
                action: Action::DeleteAttachment,
            });
        }
        self.store.attachments.delete(id).await
    }

    /// Push bytes to the blob store and hand back the public URL.
    /// Turning that URL into an attachment record is a second,
    /// independent step.
    pub async fn upload_file(&self, _ctx: &Context, bytes: &[u8], path: &str) -> Result<String> {
        let blob = self.blobs.upload(bytes, path, true).await?;
        Ok(blob.public_url)
    }

    // ---- dashboard ------------------------------------------------------

    /// Recomputed from the caller's visible sets on every call
    pub async fn dashboard_stats(&self, ctx: &Context) -> Result<DashboardStats> {
        let issues = self.list_issues(ctx).await?;
        let projects = self.list_projects(ctx).await?;
        Ok(DashboardStats::compute(&issues, &projects))
    }

    // ---- internals ------------------------------------------------------

    /// Fetch an issue the caller may act on. Absent and not-visible
    /// are both NotFound so existence is never leaked across the
    /// visibility boundary.
    async fn require_issue(&self, ctx: &Context, id: &str) -> Result<Issue> {
        self.store
            .issues
            .get(id)
            .await?
            .filter(|i| policy::can_view_issue(ctx.role, &ctx.user_id, i))
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }
}

fn validated_issue_draft(mut draft: NewIssue) -> Result<NewIssue> {
    draft.title = draft.title.trim().to_string();
    if draft.title.is_empty() {
        return Err(Error::validation("Issue title must not be empty"));
    }
    if draft.project_id.trim().is_empty() {
        return Err(Error::validation("An issue must belong to a project"));
    }
    if let Some(description) = draft.description.take() {
        let description = description.trim().to_string();
        if !description.is_empty() {
            draft.description = Some(description);
        }
    }
    Ok(draft)
}

fn sort_newest_first<T: Record>(records: &mut [T]) {
    records.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::UploadedBlob;
    use crate::identity::{Principal, Session};
    use crate::issue::{Priority, Status};
    use async_trait::async_trait;

    /// Blob stub: succeeds unless the path contains `fail_on`
    struct StubBlob {
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl BlobStore for StubBlob {
        async fn upload(&self, _bytes: &[u8], path: &str, _overwrite: bool) -> Result<UploadedBlob> {
            if let Some(fragment) = self.fail_on
                && path.contains(fragment)
            {
                return Err(Error::Blob("upload refused".into()));
            }
            Ok(UploadedBlob {
                public_url: format!("https://files.test/{path}"),
            })
        }
    }

    fn principal(id: &str) -> Principal {
        Principal {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            display_name: Some(id.to_string()),
            avatar_url: None,
        }
    }

    fn service(identity: Session) -> DataService {
        DataService::new(
            Store::in_memory(),
            Arc::new(identity),
            Arc::new(StubBlob { fail_on: None }),
        )
    }

    async fn seed_user(svc: &DataService, id: &str, role: Role) -> Context {
        let user = User::new(id.into(), format!("{id}@example.com"), id.into(), role);
        svc.store.users.insert(user.clone()).await.unwrap();
        Context::for_user(&user)
    }

    fn draft(title: &str) -> NewIssue {
        NewIssue {
            title: title.into(),
            description: None,
            priority: None,
            project_id: "prj-1".into(),
            assignee_id: None,
        }
    }

    #[tokio::test]
    async fn test_first_sign_in_provisions_client_account() {
        let svc = service(Session::signed_in(principal("ext-alice")));

        let user = svc.current_user().await.unwrap();
        assert_eq!(user.id, "ext-alice");
        assert_eq!(user.role, Role::Client);
        assert_eq!(user.email, "ext-alice@example.com");

        // second call finds the record instead of re-provisioning
        let again = svc.current_user().await.unwrap();
        assert_eq!(again.created_at, user.created_at);
        assert_eq!(svc.store.users.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_signed_out_blocks_everything() {
        let svc = service(Session::new());
        assert!(matches!(
            svc.current_user().await.unwrap_err(),
            Error::Unauthenticated
        ));
        assert!(matches!(
            svc.context_for_user("usr-nobody").await.unwrap_err(),
            Error::Unauthenticated
        ));
    }

    #[tokio::test]
    async fn test_client_sees_only_their_issues() {
        let svc = service(Session::new());
        let client = seed_user(&svc, "usr-client", Role::Client).await;
        let other = seed_user(&svc, "usr-other", Role::Client).await;
        let team = seed_user(&svc, "usr-team", Role::Team).await;

        for title in ["a", "b", "c"] {
            svc.create_issue(&client, draft(title)).await.unwrap();
        }
        for title in ["d", "e"] {
            svc.create_issue(&other, draft(title)).await.unwrap();
        }

        let mine = svc.list_issues(&client).await.unwrap();
        assert_eq!(mine.len(), 3);
        assert!(mine.iter().all(|i| i.user_id == "usr-client"));

        assert_eq!(svc.list_issues(&team).await.unwrap().len(), 5);
        assert_eq!(svc.list_issues(&other).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_list_issues_newest_first() {
        let svc = service(Session::new());
        let team = seed_user(&svc, "usr-team", Role::Team).await;

        for title in ["first", "second", "third"] {
            svc.create_issue(&team, draft(title)).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let issues = svc.list_issues(&team).await.unwrap();
        let titles: Vec<_> = issues.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, ["third", "second", "first"]);
    }

    #[tokio::test]
    async fn test_blank_title_is_a_validation_error() {
        let svc = service(Session::new());
        let ctx = seed_user(&svc, "usr-1", Role::Client).await;

        let err = svc.create_issue(&ctx, draft("   ")).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        // nothing persisted
        assert!(svc.store.issues.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_project_is_a_validation_error() {
        let svc = service(Session::new());
        let ctx = seed_user(&svc, "usr-1", Role::Client).await;

        let mut d = draft("broken");
        d.project_id = "".into();
        assert!(matches!(
            svc.create_issue(&ctx, d).await.unwrap_err(),
            Error::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_client_cannot_change_status() {
        let svc = service(Session::new());
        let client = seed_user(&svc, "usr-client", Role::Client).await;
        let team = seed_user(&svc, "usr-team", Role::Team).await;

        let issue = svc.create_issue(&client, draft("broken")).await.unwrap();

        let patch = IssuePatch {
            status: Some(Status::Resolved),
            ..Default::default()
        };
        let err = svc
            .update_issue(&client, &issue.id, patch.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden { .. }));

        // status untouched, and staff can do what the client could not
        let stored = svc.get_issue(&team, &issue.id).await.unwrap().unwrap();
        assert_eq!(stored.status, Status::Open);
        let updated = svc.update_issue(&team, &issue.id, patch).await.unwrap();
        assert_eq!(updated.status, Status::Resolved);
    }

    #[tokio::test]
    async fn test_client_can_edit_their_issue_without_status() {
        let svc = service(Session::new());
        let client = seed_user(&svc, "usr-client", Role::Client).await;

        let issue = svc.create_issue(&client, draft("typo")).await.unwrap();
        let updated = svc
            .update_issue(
                &client,
                &issue.id,
                IssuePatch {
                    title: Some("typo on landing page".into()),
                    priority: Some(Priority::High),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "typo on landing page");
        assert_eq!(updated.priority, Priority::High);
        assert!(updated.updated_at >= issue.updated_at);
    }

    #[tokio::test]
    async fn test_invisible_issue_is_not_found_for_mutation() {
        let svc = service(Session::new());
        let owner = seed_user(&svc, "usr-owner", Role::Client).await;
        let stranger = seed_user(&svc, "usr-stranger", Role::Client).await;

        let issue = svc.create_issue(&owner, draft("private")).await.unwrap();

        assert!(svc.get_issue(&stranger, &issue.id).await.unwrap().is_none());
        let err = svc
            .update_issue(&stranger, &issue.id, IssuePatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_create_then_get_round_trip() {
        let svc = service(Session::new());
        let ctx = seed_user(&svc, "usr-1", Role::Client).await;

        let mut d = draft("  roundtrip  ");
        d.description = Some("details".into());
        d.priority = Some(Priority::Critical);
        let created = svc.create_issue(&ctx, d).await.unwrap();

        assert_eq!(created.title, "roundtrip");
        assert!(created.id.starts_with("iss-"));
        assert_eq!(created.reporter_id, "usr-1");
        assert_eq!(created.user_id, "usr-1");
        assert_eq!(created.status, Status::Open);

        let fetched = svc.get_issue(&ctx, &created.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.title, created.title);
        assert_eq!(fetched.created_at, created.created_at);
    }

    #[tokio::test]
    async fn test_delete_issue_is_admin_only_and_idempotent() {
        let svc = service(Session::new());
        let team = seed_user(&svc, "usr-team", Role::Team).await;
        let admin = seed_user(&svc, "usr-admin", Role::Admin).await;

        let issue = svc.create_issue(&team, draft("to delete")).await.unwrap();

        assert!(matches!(
            svc.delete_issue(&team, &issue.id).await.unwrap_err(),
            Error::Forbidden { .. }
        ));
        svc.delete_issue(&admin, &issue.id).await.unwrap();
        // second delete of the same id is fine
        svc.delete_issue(&admin, &issue.id).await.unwrap();
        assert!(svc.get_issue(&admin, &issue.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_comments_validate_and_order_ascending() {
        let svc = service(Session::new());
        let team = seed_user(&svc, "usr-team", Role::Team).await;

        let issue = svc.create_issue(&team, draft("discuss")).await.unwrap();

        assert!(matches!(
            svc.add_comment(&team, &issue.id, "  ").await.unwrap_err(),
            Error::Validation(_)
        ));
        assert!(matches!(
            svc.add_comment(&team, "iss-missing", "hi").await.unwrap_err(),
            Error::NotFound(_)
        ));

        svc.add_comment(&team, &issue.id, "first").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        svc.add_comment(&team, &issue.id, "second").await.unwrap();

        let comments = svc.list_comments(&team, &issue.id).await.unwrap();
        let texts: Vec<_> = comments.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(texts, ["first", "second"]);
    }

    #[tokio::test]
    async fn test_attachment_delete_gate() {
        let svc = service(Session::new());
        let uploader = seed_user(&svc, "usr-up", Role::Team).await;
        let colleague = seed_user(&svc, "usr-col", Role::Team).await;
        let admin = seed_user(&svc, "usr-admin", Role::Admin).await;

        let issue = svc.create_issue(&uploader, draft("screenshots")).await.unwrap();
        let upload = AttachmentUpload {
            filename: "shot.png".into(),
            file_url: "https://files.test/shot.png".into(),
            file_size: Some(1024),
            mime_type: Some("image/png".into()),
        };
        let att = svc.add_attachment(&uploader, &issue.id, upload).await.unwrap();

        assert!(matches!(
            svc.delete_attachment(&colleague, &att.id).await.unwrap_err(),
            Error::Forbidden { .. }
        ));
        svc.delete_attachment(&uploader, &att.id).await.unwrap();
        // gone already: idempotent for anyone
        svc.delete_attachment(&admin, &att.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_report_issue_tolerates_failed_upload() {
        let svc = DataService::new(
            Store::in_memory(),
            Arc::new(Session::new()),
            Arc::new(StubBlob {
                fail_on: Some("crash.log"),
            }),
        );
        let ctx = seed_user(&svc, "usr-1", Role::Client).await;

        let files = vec![
            FileUpload {
                filename: "shot.png".into(),
                bytes: vec![1, 2, 3],
                mime_type: Some("image/png".into()),
            },
            FileUpload {
                filename: "crash.log".into(),
                bytes: vec![4, 5],
                mime_type: Some("text/plain".into()),
            },
        ];

        let (issue, attachments) = svc
            .report_issue(&ctx, draft("crashes on save"), files)
            .await
            .unwrap();

        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].filename, "shot.png");
        assert_eq!(attachments[0].file_size, Some(3));
        assert!(attachments[0].file_url.starts_with("https://files.test/"));

        let listed = svc.list_attachments(&ctx, &issue.id).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_dashboard_stats_are_role_scoped() {
        let svc = service(Session::new());
        let client = seed_user(&svc, "usr-client", Role::Client).await;
        let other = seed_user(&svc, "usr-other", Role::Client).await;
        let team = seed_user(&svc, "usr-team", Role::Team).await;

        let statuses = [Status::Open, Status::Open, Status::InProgress, Status::Resolved];
        for status in statuses {
            let issue = svc.create_issue(&client, draft("mine")).await.unwrap();
            if status != Status::Open {
                svc.update_issue(
                    &team,
                    &issue.id,
                    IssuePatch {
                        status: Some(status),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            }
        }
        svc.create_issue(&other, draft("not mine")).await.unwrap();

        let stats = svc.dashboard_stats(&client).await.unwrap();
        assert_eq!(stats.total_issues, 4);
        assert_eq!(stats.open_issues, 2);
        assert_eq!(stats.in_progress_issues, 1);
        assert_eq!(stats.resolved_issues, 1);
        assert_eq!(stats.completion_rate, 25);

        let all = svc.dashboard_stats(&team).await.unwrap();
        assert_eq!(all.total_issues, 5);
    }

    #[tokio::test]
    async fn test_team_management_requires_admin() {
        let svc = service(Session::new());
        let client = seed_user(&svc, "usr-client", Role::Client).await;
        let team = seed_user(&svc, "usr-team", Role::Team).await;
        let admin = seed_user(&svc, "usr-admin", Role::Admin).await;

        // clients can't even look
        assert!(matches!(
            svc.list_team(&client).await.unwrap_err(),
            Error::Forbidden { .. }
        ));
        // team may look but not mutate
        assert!(svc.list_team(&team).await.is_ok());
        assert!(matches!(
            svc.invite_user(&team, "new@example.com", Role::Team)
                .await
                .unwrap_err(),
            Error::Forbidden { .. }
        ));

        let invited = svc
            .invite_user(&admin, "dana@example.com", Role::Team)
            .await
            .unwrap();
        assert_eq!(invited.display_name, "dana");
        assert_eq!(invited.role, Role::Team);

        let demoted = svc
            .set_user_role(&admin, &invited.id, Role::Client)
            .await
            .unwrap();
        assert_eq!(demoted.role, Role::Client);

        svc.remove_user(&admin, &invited.id).await.unwrap();
        svc.remove_user(&admin, &invited.id).await.unwrap();
        assert!(matches!(
            svc.set_user_role(&admin, &invited.id, Role::Team)
                .await
                .unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_projects_gate_and_client_check() {
        let svc = service(Session::new());
        let client = seed_user(&svc, "usr-client", Role::Client).await;
        let other = seed_user(&svc, "usr-other", Role::Client).await;
        let team = seed_user(&svc, "usr-team", Role::Team).await;

        let new = |client_id: &str| NewProject {
            name: "Website relaunch".into(),
            description: None,
            client_id: client_id.into(),
            status: None,
        };

        assert!(matches!(
            svc.create_project(&client, new("usr-client")).await.unwrap_err(),
            Error::Forbidden { .. }
        ));
        // the owning account must actually be a client
        assert!(matches!(
            svc.create_project(&team, new("usr-team")).await.unwrap_err(),
            Error::Validation(_)
        ));

        let project = svc.create_project(&team, new("usr-client")).await.unwrap();
        assert_eq!(project.user_id, "usr-team");

        assert_eq!(svc.list_projects(&client).await.unwrap().len(), 1);
        assert_eq!(svc.list_projects(&other).await.unwrap().len(), 0);
        assert!(svc.get_project(&other, &project.id).await.unwrap().is_none());

        let updated = svc
            .update_project(
                &team,
                &project.id,
                ProjectPatch {
                    status: Some(crate::project::ProjectStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, crate::project::ProjectStatus::Completed);
        assert!(updated.updated_at >= project.updated_at);
    }

    #[tokio::test]
    async fn test_update_profile_touches_only_self() {
        let svc = service(Session::new());
        let ctx = seed_user(&svc, "usr-1", Role::Client).await;

        let updated = svc
            .update_profile(
                &ctx,
                ProfilePatch {
                    display_name: Some("Avery".into()),
                    avatar_url: Some("https://img.test/a.png".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.display_name, "Avery");
        assert_eq!(updated.role, Role::Client);
    }

    #[tokio::test]
    async fn test_upload_file_returns_public_url() {
        let svc = service(Session::new());
        let ctx = seed_user(&svc, "usr-1", Role::Client).await;

        let url = svc
            .upload_file(&ctx, b"bytes", "issues/attachments/x.bin")
            .await
            .unwrap();
        assert_eq!(url, "https://files.test/issues/attachments/x.bin");
    }
}
