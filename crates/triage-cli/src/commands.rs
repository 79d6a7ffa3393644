//! CLI command implementations

use anyhow::{Result, bail};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabled::{Table, Tabled, settings::Style};
use triage_core::{
    AttachmentUpload, Config, Context, DataService, FileUpload, FsBlobStore, IssuePatch, NewIssue,
    NewProject, Principal, Priority, ProjectPatch, Record, Role, Session, Status, User, Workspace,
    generate_id,
};

/// An opened workspace: storage, config, façade
struct App {
    config: Config,
    service: DataService,
}

fn open() -> Result<App> {
    let workspace = Workspace::discover()?;
    let config = workspace.load_config()?;

    if !config.display.colors {
        colored::control::set_override(false);
    }

    let store = workspace.store()?;

    let blob_root = config
        .blob
        .root
        .clone()
        .map(PathBuf::from)
        .unwrap_or_else(|| workspace.blob_dir());
    let mut blobs = FsBlobStore::new(blob_root);
    if let Some(base) = &config.blob.public_base_url {
        blobs = blobs.with_public_base(base.clone());
    }

    let session = match &config.session.user_id {
        Some(user_id) => Session::signed_in(Principal {
            id: user_id.clone(),
            email: config.session.email.clone().unwrap_or_default(),
            display_name: config.session.display_name.clone(),
            avatar_url: None,
        }),
        None => Session::new(),
    };

    let service = DataService::new(store, Arc::new(session), Arc::new(blobs));
    Ok(App { config, service })
}

impl App {
    /// Context for the signed-in user, optionally previewing another
    /// role. Only admins get the preview; the façade authorizes with
    /// whatever role ends up in the context.
    async fn context(&self, as_role: Option<&str>) -> Result<Context> {
        let user = self.service.current_user().await?;
        let mut ctx = Context::for_user(&user);

        if let Some(role) = as_role {
            let role: Role = role.parse()?;
            if role != user.role && user.role != Role::Admin {
                bail!("Only admins can preview another role's view");
            }
            ctx.role = role;
        }

        Ok(ctx)
    }
}

pub fn init() -> Result<()> {
    let root = std::env::current_dir()?;
    let workspace = Workspace::init(&root)?;
    println!(
        "{} Initialized triage in {}",
        "✓".green(),
        workspace.triage_dir().display()
    );
    println!("  Sign in with: triage login <email>");
    Ok(())
}

pub async fn login(email: &str, name: Option<String>) -> Result<()> {
    let workspace = Workspace::discover()?;
    let mut config = workspace.load_config()?;
    let store = workspace.store()?;

    // Reuse an existing account for this address, or mint a fresh id
    // and let the façade provision the record.
    let existing = store
        .users
        .list()
        .await?
        .into_iter()
        .find(|u| u.email == email);
    let user_id = match &existing {
        Some(user) => user.id.clone(),
        None => generate_id(User::ID_PREFIX),
    };

    config.session.user_id = Some(user_id);
    config.session.email = Some(email.to_string());
    config.session.display_name = name;
    config.save(&workspace.config_path())?;

    let app = open()?;
    let user = app.service.current_user().await?;
    println!("{} Signed in as {}", "✓".green(), user);
    Ok(())
}

pub async fn whoami(json: bool) -> Result<()> {
    let app = open()?;
    let user = app.service.current_user().await?;

    if json {
        println!("{}", serde_json::to_string(&user)?);
    } else {
        println!("{}", user);
        println!("  id: {}", user.id.cyan());
        println!("  role: {}", role_colored(user.role));
    }
    Ok(())
}

pub async fn issue_create(
    title: &str,
    project: &str,
    priority: Option<String>,
    description: Option<String>,
    assignee: Option<String>,
    json: bool,
) -> Result<()> {
    let app = open()?;
    let ctx = app.context(None).await?;

    let priority = match priority {
        Some(p) => p.parse::<Priority>()?,
        None => app.config.default_priority,
    };

    let issue = app
        .service
        .create_issue(
            &ctx,
            NewIssue {
                title: title.to_string(),
                description,
                priority: Some(priority),
                project_id: project.to_string(),
                assignee_id: assignee,
            },
        )
        .await?;

    if json {
        println!("{}", serde_json::to_string(&issue)?);
    } else {
        println!("{} Created issue: {}", "✓".green(), issue.id);
        println!("  Title: {}", issue.title);
        println!("  Priority: {}", priority_colored(issue.priority));
    }

    Ok(())
}

pub async fn issue_report(
    title: &str,
    project: &str,
    priority: Option<String>,
    description: Option<String>,
    files: Vec<PathBuf>,
    json: bool,
) -> Result<()> {
    let app = open()?;
    let ctx = app.context(None).await?;

    let priority = match priority {
        Some(p) => p.parse::<Priority>()?,
        None => app.config.default_priority,
    };

    let mut uploads = Vec::new();
    for path in &files {
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("attachment")
            .to_string();
        let mime_type = guess_mime(path).map(str::to_string);
        uploads.push(FileUpload {
            filename,
            bytes,
            mime_type,
        });
    }

    let (issue, attachments) = app
        .service
        .report_issue(
            &ctx,
            NewIssue {
                title: title.to_string(),
                description,
                priority: Some(priority),
                project_id: project.to_string(),
                assignee_id: None,
            },
            uploads,
        )
        .await?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "issue": issue, "attachments": attachments })
        );
    } else {
        println!("{} Created issue: {}", "✓".green(), issue.id);
        for attachment in &attachments {
            println!("  Attached: {} ({})", attachment.filename, attachment.file_url);
        }
        let failed = files.len() - attachments.len();
        if failed > 0 {
            println!("{} {} attachment(s) failed to upload", "!".yellow(), failed);
        }
    }

    Ok(())
}

pub async fn issue_list(
    status: Option<String>,
    priority: Option<String>,
    all: bool,
    as_role: Option<&str>,
    json: bool,
) -> Result<()> {
    let app = open()?;
    let ctx = app.context(as_role).await?;

    let mut issues = app.service.list_issues(&ctx).await?;

    if !(all || app.config.show_closed) {
        issues.retain(|i| i.status.is_open());
    }
    if let Some(ref s) = status {
        let status: Status = s.parse()?;
        issues.retain(|i| i.status == status);
    }
    if let Some(ref p) = priority {
        let priority: Priority = p.parse()?;
        issues.retain(|i| i.priority == priority);
    }

    if json {
        println!("{}", serde_json::to_string(&issues)?);
    } else if issues.is_empty() {
        println!("No issues found");
    } else {
        let max_len = app.config.display.max_title_length;
        for issue in issues {
            println!(
                "{} [{}] [{}] {}",
                issue.id.cyan(),
                priority_colored(issue.priority),
                status_colored(issue.status),
                truncate(&issue.title, max_len)
            );
        }
    }

    Ok(())
}

pub async fn issue_show(id: &str, as_role: Option<&str>, json: bool) -> Result<()> {
    let app = open()?;
    let ctx = app.context(as_role).await?;

    let Some(issue) = app.service.get_issue(&ctx, id).await? else {
        bail!("Issue not found: {}", id);
    };
    let comments = app.service.list_comments(&ctx, id).await?;
    let attachments = app.service.list_attachments(&ctx, id).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "issue": issue,
                "comments": comments,
                "attachments": attachments,
            })
        );
        return Ok(());
    }

    let date_format = &app.config.display.date_format;
    println!("{} {}", issue.id.cyan().bold(), issue.title.bold());
    println!("  Status:   {}", status_colored(issue.status));
    println!("  Priority: {}", priority_colored(issue.priority));
    println!("  Project:  {}", issue.project_id);
    println!("  Reporter: {}", issue.reporter_id);
    if let Some(ref assignee) = issue.assignee_id {
        println!("  Assignee: {}", assignee);
    }
    println!("  Created:  {}", issue.created_at.format(date_format));
    println!("  Updated:  {}", issue.updated_at.format(date_format));
    if let Some(ref description) = issue.description {
        println!();
        println!("{}", description);
    }

    if !attachments.is_empty() {
        println!();
        println!("{}", "Attachments:".bold());
        for attachment in attachments {
            println!("  {} ({})", attachment.filename, attachment.file_url);
        }
    }

    if !comments.is_empty() {
        println!();
        println!("{}", "Comments:".bold());
        for comment in comments {
            println!(
                "  {} {}:",
                comment.created_at.format(date_format),
                comment.user_id.cyan()
            );
            println!("    {}", comment.content);
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn issue_update(
    id: &str,
    title: Option<String>,
    description: Option<String>,
    status: Option<String>,
    priority: Option<String>,
    assignee: Option<String>,
    unassign: bool,
    json: bool,
) -> Result<()> {
    let app = open()?;
    let ctx = app.context(None).await?;

    let patch = IssuePatch {
        title,
        description,
        status: status.map(|s| s.parse()).transpose()?,
        priority: priority.map(|p| p.parse()).transpose()?,
        assignee_id: if unassign {
            Some(None)
        } else {
            assignee.map(Some)
        },
    };

    let issue = app.service.update_issue(&ctx, id, patch).await?;

    if json {
        println!("{}", serde_json::to_string(&issue)?);
    } else {
        println!("{} Updated issue: {}", "✓".green(), issue.id);
        println!("  {}", issue);
    }

    Ok(())
}

pub async fn issue_delete(id: &str, json: bool) -> Result<()> {
    let app = open()?;
    let ctx = app.context(None).await?;

    app.service.delete_issue(&ctx, id).await?;

    if json {
        println!(r#"{{"deleted": "{}"}}"#, id);
    } else {
        println!("{} Deleted issue: {}", "✓".green(), id);
    }
    Ok(())
}

pub async fn comment_add(issue: &str, content: &str, json: bool) -> Result<()> {
    let app = open()?;
    let ctx = app.context(None).await?;

    let comment = app.service.add_comment(&ctx, issue, content).await?;

    if json {
        println!("{}", serde_json::to_string(&comment)?);
    } else {
        println!("{} Commented on {}", "✓".green(), issue);
    }
    Ok(())
}

pub async fn comment_list(issue: &str, as_role: Option<&str>, json: bool) -> Result<()> {
    let app = open()?;
    let ctx = app.context(as_role).await?;

    let comments = app.service.list_comments(&ctx, issue).await?;

    if json {
        println!("{}", serde_json::to_string(&comments)?);
    } else if comments.is_empty() {
        println!("No comments");
    } else {
        let date_format = &app.config.display.date_format;
        for comment in comments {
            println!(
                "{} {}: {}",
                comment.created_at.format(date_format),
                comment.user_id.cyan(),
                comment.content
            );
        }
    }
    Ok(())
}

pub async fn attach_add(issue: &str, path: &Path, json: bool) -> Result<()> {
    let app = open()?;
    let ctx = app.context(None).await?;

    let bytes = std::fs::read(path)?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("attachment")
        .to_string();

    // Two steps: the bytes go to the blob store first, the record only
    // exists once that succeeded.
    let storage_path = format!(
        "issues/attachments/{}-{}",
        chrono::Utc::now().timestamp_millis(),
        filename
    );
    let file_url = app.service.upload_file(&ctx, &bytes, &storage_path).await?;
    let attachment = app
        .service
        .add_attachment(
            &ctx,
            issue,
            AttachmentUpload {
                filename,
                file_url,
                file_size: Some(bytes.len() as u64),
                mime_type: guess_mime(path).map(str::to_string),
            },
        )
        .await?;

    if json {
        println!("{}", serde_json::to_string(&attachment)?);
    } else {
        println!("{} Attached {} to {}", "✓".green(), attachment.filename, issue);
        println!("  {}", attachment.file_url);
    }
    Ok(())
}

pub async fn attach_list(issue: &str, as_role: Option<&str>, json: bool) -> Result<()> {
    let app = open()?;
    let ctx = app.context(as_role).await?;

    let attachments = app.service.list_attachments(&ctx, issue).await?;

    if json {
        println!("{}", serde_json::to_string(&attachments)?);
    } else if attachments.is_empty() {
        println!("No attachments");
    } else {
        for attachment in attachments {
            let size = attachment
                .file_size
                .map(format_file_size)
                .unwrap_or_else(|| "?".to_string());
            println!(
                "{} {} ({}) {}",
                attachment.id.cyan(),
                attachment.filename,
                size,
                attachment.file_url.dimmed()
            );
        }
    }
    Ok(())
}

pub async fn project_create(
    name: &str,
    client: &str,
    description: Option<String>,
    json: bool,
) -> Result<()> {
    let app = open()?;
    let ctx = app.context(None).await?;

    let project = app
        .service
        .create_project(
            &ctx,
            NewProject {
                name: name.to_string(),
                description,
                client_id: client.to_string(),
                status: None,
            },
        )
        .await?;

    if json {
        println!("{}", serde_json::to_string(&project)?);
    } else {
        println!("{} Created project: {}", "✓".green(), project.id);
        println!("  Name: {}", project.name);
        println!("  Client: {}", project.client_id);
    }
    Ok(())
}

pub async fn project_list(as_role: Option<&str>, json: bool) -> Result<()> {
    let app = open()?;
    let ctx = app.context(as_role).await?;

    let projects = app.service.list_projects(&ctx).await?;

    if json {
        println!("{}", serde_json::to_string(&projects)?);
    } else if projects.is_empty() {
        println!("No projects found");
    } else {
        for project in projects {
            println!(
                "{} [{}] {} (client: {})",
                project.id.cyan(),
                project.status,
                project.name,
                project.client_id
            );
        }
    }
    Ok(())
}

pub async fn project_update(
    id: &str,
    name: Option<String>,
    description: Option<String>,
    status: Option<String>,
    json: bool,
) -> Result<()> {
    let app = open()?;
    let ctx = app.context(None).await?;

    let patch = ProjectPatch {
        name,
        description,
        status: status.map(|s| s.parse()).transpose()?,
    };
    let project = app.service.update_project(&ctx, id, patch).await?;

    if json {
        println!("{}", serde_json::to_string(&project)?);
    } else {
        println!("{} Updated project: {}", "✓".green(), project.id);
    }
    Ok(())
}

#[derive(Tabled)]
struct MemberRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Email")]
    email: String,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Joined")]
    joined: String,
}

pub async fn team_list(json: bool) -> Result<()> {
    let app = open()?;
    let ctx = app.context(None).await?;

    let users = app.service.list_team(&ctx).await?;

    if json {
        println!("{}", serde_json::to_string(&users)?);
    } else {
        let date_format = &app.config.display.date_format;
        let rows: Vec<MemberRow> = users
            .iter()
            .map(|u| MemberRow {
                id: u.id.clone(),
                name: u.display_name.clone(),
                email: u.email.clone(),
                role: u.role.to_string(),
                joined: u.created_at.format(date_format).to_string(),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{}", table);
    }
    Ok(())
}

pub async fn team_invite(email: &str, role: &str, json: bool) -> Result<()> {
    let app = open()?;
    let ctx = app.context(None).await?;

    let role: Role = role.parse()?;
    let user = app.service.invite_user(&ctx, email, role).await?;

    if json {
        println!("{}", serde_json::to_string(&user)?);
    } else {
        println!("{} Invited {} as {}", "✓".green(), user.email, role_colored(user.role));
        println!("  id: {}", user.id.cyan());
    }
    Ok(())
}

pub async fn team_set_role(id: &str, role: &str, json: bool) -> Result<()> {
    let app = open()?;
    let ctx = app.context(None).await?;

    let role: Role = role.parse()?;
    let user = app.service.set_user_role(&ctx, id, role).await?;

    if json {
        println!("{}", serde_json::to_string(&user)?);
    } else {
        println!(
            "{} {} is now {}",
            "✓".green(),
            user.display_name,
            role_colored(user.role)
        );
    }
    Ok(())
}

pub async fn team_remove(id: &str, json: bool) -> Result<()> {
    let app = open()?;
    let ctx = app.context(None).await?;

    app.service.remove_user(&ctx, id).await?;

    if json {
        println!(r#"{{"removed": "{}"}}"#, id);
    } else {
        println!("{} Removed {}", "✓".green(), id);
    }
    Ok(())
}

pub async fn stats(as_role: Option<&str>, json: bool) -> Result<()> {
    let app = open()?;
    let ctx = app.context(as_role).await?;

    let stats = app.service.dashboard_stats(&ctx).await?;

    if json {
        println!("{}", serde_json::to_string(&stats)?);
    } else {
        println!("{}", "Dashboard".bold());
        println!("  Issues:      {}", stats.total_issues);
        println!("    open:        {}", stats.open_issues.to_string().red());
        println!(
            "    in progress: {}",
            stats.in_progress_issues.to_string().yellow()
        );
        println!(
            "    resolved:    {}",
            stats.resolved_issues.to_string().green()
        );
        println!(
            "    critical:    {}",
            stats.critical_issues.to_string().red().bold()
        );
        println!("  Projects:    {}", stats.total_projects);
        println!("  Completion:  {}%", stats.completion_rate);
    }
    Ok(())
}

/// Show current configuration
pub fn config_show(json: bool) -> Result<()> {
    let workspace = Workspace::discover()?;
    let config = workspace.load_config()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        println!("{}", "Current configuration:".bold());
        println!();
        println!("default_priority = \"{}\"", config.default_priority);
        println!("show_closed = {}", config.show_closed);
        println!();
        println!("[display]");
        println!("colors = {}", config.display.colors);
        println!("date_format = \"{}\"", config.display.date_format);
        println!("max_title_length = {}", config.display.max_title_length);
        println!();
        println!("[api]");
        println!("port = {}", config.api.port);
        println!();
        println!("[blob]");
        if let Some(ref root) = config.blob.root {
            println!("root = \"{}\"", root);
        }
        if let Some(ref base) = config.blob.public_base_url {
            println!("public_base_url = \"{}\"", base);
        }
        println!();
        println!("[session]");
        if let Some(ref user_id) = config.session.user_id {
            println!("user_id = \"{}\"", user_id);
        }
        if let Some(ref email) = config.session.email {
            println!("email = \"{}\"", email);
        }
    }

    Ok(())
}

/// Get a specific config value
pub fn config_get(key: &str, json: bool) -> Result<()> {
    let workspace = Workspace::discover()?;
    let config = workspace.load_config()?;

    // Convert config to JSON for key lookup
    let config_json = serde_json::to_value(&config)?;

    // Parse key path (e.g., "display.colors" -> ["display", "colors"])
    let parts: Vec<&str> = key.split('.').collect();
    let mut value = &config_json;

    for part in &parts {
        value = value
            .get(part)
            .ok_or_else(|| anyhow::anyhow!("Config key not found: {}", key))?;
    }

    if json {
        println!("{}", serde_json::to_string(value)?);
    } else {
        match value {
            serde_json::Value::String(s) => println!("{}", s),
            serde_json::Value::Bool(b) => println!("{}", b),
            serde_json::Value::Number(n) => println!("{}", n),
            serde_json::Value::Null => println!("null"),
            _ => println!("{}", serde_json::to_string_pretty(value)?),
        }
    }

    Ok(())
}

/// Set a config value
pub fn config_set(key: &str, value: &str) -> Result<()> {
    let workspace = Workspace::discover()?;
    let mut config = workspace.load_config()?;

    match key {
        "default_priority" => {
            config.default_priority = value
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid priority value: {}", value))?;
        }
        "show_closed" => {
            config.show_closed = value
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid boolean value: {}", value))?;
        }
        "display.colors" => {
            config.display.colors = value
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid boolean value: {}", value))?;
        }
        "display.date_format" => config.display.date_format = value.to_string(),
        "display.max_title_length" => {
            config.display.max_title_length = value
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid integer value: {}", value))?;
        }
        "api.port" => {
            config.api.port = value
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid port value: {}", value))?;
        }
        "blob.root" => config.blob.root = Some(value.to_string()),
        "blob.public_base_url" => config.blob.public_base_url = Some(value.to_string()),
        _ => bail!("Unknown config key: {}", key),
    }

    config.save(&workspace.config_path())?;
    println!("{} Set {} = {}", "✓".green(), key, value);

    Ok(())
}

fn status_colored(status: Status) -> colored::ColoredString {
    match status {
        Status::Open => "open".red(),
        Status::InProgress => "in_progress".yellow(),
        Status::Resolved => "resolved".green(),
        Status::Closed => "closed".dimmed(),
    }
}

fn priority_colored(priority: Priority) -> colored::ColoredString {
    match priority {
        Priority::Low => "low".blue(),
        Priority::Medium => "medium".yellow(),
        Priority::High => "high".magenta(),
        Priority::Critical => "critical".red().bold(),
    }
}

fn role_colored(role: Role) -> colored::ColoredString {
    match role {
        Role::Client => "client".blue(),
        Role::Team => "team".green(),
        Role::Admin => "admin".red(),
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

fn guess_mime(path: &Path) -> Option<&'static str> {
    match path
        .extension()
        .and_then(|e| e.to_str())?
        .to_lowercase()
        .as_str()
    {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "pdf" => Some("application/pdf"),
        "txt" | "log" => Some("text/plain"),
        "md" => Some("text/markdown"),
        "json" => Some("application/json"),
        _ => None,
    }
}
