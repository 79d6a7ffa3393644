//! triage-api: REST API server for the triage issue tracker
//!
//! Thin transport over the core façade: resolves the caller from the
//! x-user-id header, hands every request to DataService, and maps the
//! core error taxonomy onto HTTP statuses. No policy lives here.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, patch, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use triage_core::{
    Attachment, AttachmentUpload, Comment, Context, DashboardStats, DataService, Error,
    FsBlobStore, Issue, IssuePatch, NewIssue, NewProject, Priority, ProfilePatch, Project,
    ProjectPatch, Role, Session, Status, User, Workspace,
};

/// Shared application state
struct AppState {
    service: DataService,
}

/// Query parameters for listing issues
#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default)]
    status: Option<Status>,
    #[serde(default)]
    priority: Option<Priority>,
    /// Substring match on title/description
    #[serde(default)]
    q: Option<String>,
}

/// Request to add a comment
#[derive(Debug, Deserialize)]
struct AddCommentRequest {
    content: String,
}

/// Query parameters for the attachment upload
#[derive(Debug, Deserialize)]
struct UploadQuery {
    filename: String,
    #[serde(default)]
    mime_type: Option<String>,
}

/// Request to invite a team member
#[derive(Debug, Deserialize)]
struct InviteRequest {
    email: String,
    role: Role,
}

/// Request to change a member's role
#[derive(Debug, Deserialize)]
struct SetRoleRequest {
    role: Role,
}

/// API response wrapper
#[derive(Debug, Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

fn error_status(err: &Error) -> StatusCode {
    match err {
        Error::Unauthenticated => StatusCode::UNAUTHORIZED,
        Error::Forbidden { .. } => StatusCode::FORBIDDEN,
        Error::Validation(_)
        | Error::InvalidRole(_)
        | Error::InvalidStatus(_)
        | Error::InvalidPriority(_)
        | Error::InvalidProjectStatus(_) => StatusCode::BAD_REQUEST,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::AlreadyExists(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn fail<T>(err: Error) -> (StatusCode, Json<ApiResponse<T>>) {
    (error_status(&err), Json(ApiResponse::err(err.to_string())))
}

fn ok<T>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::OK, Json(ApiResponse::ok(data)))
}

/// Resolve the caller from the x-user-id header
async fn auth(state: &AppState, headers: &HeaderMap) -> Result<Context, Error> {
    let user_id = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .ok_or(Error::Unauthenticated)?;
    state.service.context_for_user(user_id).await
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// The caller's own account
async fn me(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    let ctx = match auth(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(e) => return fail::<User>(e),
    };
    match state.service.profile(&ctx).await {
        Ok(user) => ok(user),
        Err(e) => fail(e),
    }
}

/// Self-service profile edits
async fn update_me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(patch): Json<ProfilePatch>,
) -> impl IntoResponse {
    let ctx = match auth(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(e) => return fail::<User>(e),
    };
    match state.service.update_profile(&ctx, patch).await {
        Ok(user) => ok(user),
        Err(e) => fail(e),
    }
}

/// List issues visible to the caller
async fn list_issues(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let ctx = match auth(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(e) => return fail::<Vec<Issue>>(e),
    };

    match state.service.list_issues(&ctx).await {
        Ok(mut issues) => {
            if let Some(status) = query.status {
                issues.retain(|i| i.status == status);
            }
            if let Some(priority) = query.priority {
                issues.retain(|i| i.priority == priority);
            }
            if let Some(q) = &query.q {
                let needle = q.to_lowercase();
                issues.retain(|i| {
                    i.title.to_lowercase().contains(&needle)
                        || i.description
                            .as_deref()
                            .is_some_and(|d| d.to_lowercase().contains(&needle))
                });
            }
            ok(issues)
        }
        Err(e) => fail(e),
    }
}

/// Create a new issue
async fn create_issue(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(draft): Json<NewIssue>,
) -> impl IntoResponse {
    let ctx = match auth(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(e) => return fail::<Issue>(e),
    };
    match state.service.create_issue(&ctx, draft).await {
        Ok(issue) => (StatusCode::CREATED, Json(ApiResponse::ok(issue))),
        Err(e) => fail(e),
    }
}

/// Get a single issue by ID
async fn get_issue(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let ctx = match auth(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(e) => return fail::<Issue>(e),
    };
    match state.service.get_issue(&ctx, &id).await {
        Ok(Some(issue)) => ok(issue),
        Ok(None) => fail(Error::NotFound(id)),
        Err(e) => fail(e),
    }
}

/// Update an existing issue
async fn update_issue(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<IssuePatch>,
) -> impl IntoResponse {
    let ctx = match auth(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(e) => return fail::<Issue>(e),
    };
    match state.service.update_issue(&ctx, &id, patch).await {
        Ok(issue) => ok(issue),
        Err(e) => fail(e),
    }
}

/// Delete an issue (admin only)
async fn delete_issue(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let ctx = match auth(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(e) => return fail::<serde_json::Value>(e),
    };
    match state.service.delete_issue(&ctx, &id).await {
        Ok(()) => ok(serde_json::json!({ "deleted": id })),
        Err(e) => fail(e),
    }
}

/// List comments on an issue, oldest first
async fn list_comments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let ctx = match auth(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(e) => return fail::<Vec<Comment>>(e),
    };
    match state.service.list_comments(&ctx, &id).await {
        Ok(comments) => ok(comments),
        Err(e) => fail(e),
    }
}

/// Add a comment to an issue
async fn add_comment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<AddCommentRequest>,
) -> impl IntoResponse {
    let ctx = match auth(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(e) => return fail::<Comment>(e),
    };
    match state.service.add_comment(&ctx, &id, &req.content).await {
        Ok(comment) => (StatusCode::CREATED, Json(ApiResponse::ok(comment))),
        Err(e) => fail(e),
    }
}

/// Delete a comment (admin moderation)
async fn delete_comment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let ctx = match auth(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(e) => return fail::<serde_json::Value>(e),
    };
    match state.service.delete_comment(&ctx, &id).await {
        Ok(()) => ok(serde_json::json!({ "deleted": id })),
        Err(e) => fail(e),
    }
}

/// List attachments on an issue, newest first
async fn list_attachments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let ctx = match auth(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(e) => return fail::<Vec<Attachment>>(e),
    };
    match state.service.list_attachments(&ctx, &id).await {
        Ok(attachments) => ok(attachments),
        Err(e) => fail(e),
    }
}

/// Upload a file and record it as an attachment: two sequential steps,
/// the record is only created once the blob store accepted the bytes.
async fn upload_attachment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> impl IntoResponse {
    let ctx = match auth(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(e) => return fail::<Attachment>(e),
    };

    let path = format!(
        "issues/attachments/{}-{}",
        chrono::Utc::now().timestamp_millis(),
        query.filename
    );
    let file_url = match state.service.upload_file(&ctx, &body, &path).await {
        Ok(url) => url,
        Err(e) => return fail::<Attachment>(e),
    };

    let upload = AttachmentUpload {
        filename: query.filename,
        file_url,
        file_size: Some(body.len() as u64),
        mime_type: query.mime_type,
    };
    match state.service.add_attachment(&ctx, &id, upload).await {
        Ok(attachment) => (StatusCode::CREATED, Json(ApiResponse::ok(attachment))),
        Err(e) => fail(e),
    }
}

/// Delete an attachment (uploader or admin)
async fn delete_attachment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let ctx = match auth(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(e) => return fail::<serde_json::Value>(e),
    };
    match state.service.delete_attachment(&ctx, &id).await {
        Ok(()) => ok(serde_json::json!({ "deleted": id })),
        Err(e) => fail(e),
    }
}

/// List projects visible to the caller
async fn list_projects(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    let ctx = match auth(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(e) => return fail::<Vec<Project>>(e),
    };
    match state.service.list_projects(&ctx).await {
        Ok(projects) => ok(projects),
        Err(e) => fail(e),
    }
}

/// Create a project (staff only)
async fn create_project(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(draft): Json<NewProject>,
) -> impl IntoResponse {
    let ctx = match auth(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(e) => return fail::<Project>(e),
    };
    match state.service.create_project(&ctx, draft).await {
        Ok(project) => (StatusCode::CREATED, Json(ApiResponse::ok(project))),
        Err(e) => fail(e),
    }
}

/// Get a single project by ID
async fn get_project(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let ctx = match auth(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(e) => return fail::<Project>(e),
    };
    match state.service.get_project(&ctx, &id).await {
        Ok(Some(project)) => ok(project),
        Ok(None) => fail(Error::NotFound(id)),
        Err(e) => fail(e),
    }
}

/// Update a project (staff only)
async fn update_project(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<ProjectPatch>,
) -> impl IntoResponse {
    let ctx = match auth(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(e) => return fail::<Project>(e),
    };
    match state.service.update_project(&ctx, &id, patch).await {
        Ok(project) => ok(project),
        Err(e) => fail(e),
    }
}

/// List all accounts (staff only)
async fn list_team(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    let ctx = match auth(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(e) => return fail::<Vec<User>>(e),
    };
    match state.service.list_team(&ctx).await {
        Ok(users) => ok(users),
        Err(e) => fail(e),
    }
}

/// Invite a new member (admin only)
async fn invite_member(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<InviteRequest>,
) -> impl IntoResponse {
    let ctx = match auth(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(e) => return fail::<User>(e),
    };
    match state.service.invite_user(&ctx, &req.email, req.role).await {
        Ok(user) => (StatusCode::CREATED, Json(ApiResponse::ok(user))),
        Err(e) => fail(e),
    }
}

/// Change a member's role (admin only)
async fn set_member_role(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<SetRoleRequest>,
) -> impl IntoResponse {
    let ctx = match auth(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(e) => return fail::<User>(e),
    };
    match state.service.set_user_role(&ctx, &id, req.role).await {
        Ok(user) => ok(user),
        Err(e) => fail(e),
    }
}

/// Remove a member (admin only)
async fn remove_member(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let ctx = match auth(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(e) => return fail::<serde_json::Value>(e),
    };
    match state.service.remove_user(&ctx, &id).await {
        Ok(()) => ok(serde_json::json!({ "removed": id })),
        Err(e) => fail(e),
    }
}

/// Dashboard statistics for the caller's role
async fn stats(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    let ctx = match auth(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(e) => return fail::<DashboardStats>(e),
    };
    match state.service.dashboard_stats(&ctx).await {
        Ok(stats) => ok(stats),
        Err(e) => fail(e),
    }
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    // Open the workspace storage
    let workspace =
        Workspace::discover().map_err(|e| anyhow::anyhow!("Failed to open workspace: {}", e))?;
    let config = workspace.load_config()?;
    let store = workspace.store()?;

    let blob_root = config
        .blob
        .root
        .clone()
        .map(Into::into)
        .unwrap_or_else(|| workspace.blob_dir());
    let mut blobs = FsBlobStore::new(blob_root);
    if let Some(base) = &config.blob.public_base_url {
        blobs = blobs.with_public_base(base.clone());
    }

    // The API authenticates per request via x-user-id; there is no
    // process-wide session.
    let service = DataService::new(store, Arc::new(Session::new()), Arc::new(blobs));
    let state = Arc::new(AppState { service });

    // Build router
    let app = Router::new()
        .route("/health", get(health))
        .route("/me", get(me).patch(update_me))
        .route("/issues", get(list_issues).post(create_issue))
        .route(
            "/issues/{id}",
            get(get_issue).patch(update_issue).delete(delete_issue),
        )
        .route(
            "/issues/{id}/comments",
            get(list_comments).post(add_comment),
        )
        .route(
            "/issues/{id}/attachments",
            get(list_attachments).post(upload_attachment),
        )
        .route("/comments/{id}", delete(delete_comment))
        .route("/attachments/{id}", delete(delete_attachment))
        .route("/projects", get(list_projects).post(create_project))
        .route("/projects/{id}", get(get_project).patch(update_project))
        .route("/team", get(list_team))
        .route("/team/invite", post(invite_member))
        .route("/team/{id}/role", patch(set_member_role))
        .route("/team/{id}", delete(remove_member))
        .route("/stats", get(stats))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Get port from env or config
    let port: u16 = std::env::var("TRIAGE_API_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(config.api.port);

    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
    tracing::info!("Starting triage-api on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
