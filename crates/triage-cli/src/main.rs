//! triage - Role-aware issue tracker
//!
//! Local JSONL storage in .triage/, same data model as triage-api.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "triage")]
#[command(about = "Role-aware issue tracker")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Preview another role's view (admins only)
    #[arg(long, global = true, value_name = "ROLE")]
    as_role: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new triage workspace
    Init,

    /// Sign in locally as the given email
    Login {
        email: String,

        /// Display name for a freshly provisioned account
        #[arg(long)]
        name: Option<String>,
    },

    /// Show the signed-in account
    Whoami,

    /// Work with issues
    Issue {
        #[command(subcommand)]
        command: IssueCommands,
    },

    /// Work with comments
    Comment {
        #[command(subcommand)]
        command: CommentCommands,
    },

    /// Work with attachments
    Attach {
        #[command(subcommand)]
        command: AttachCommands,
    },

    /// Work with projects
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },

    /// Manage the team
    Team {
        #[command(subcommand)]
        command: TeamCommands,
    },

    /// Dashboard statistics for your role
    Stats,

    /// Show or edit configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum IssueCommands {
    /// Create a new issue
    Create {
        /// Issue title
        title: String,

        /// Project the issue belongs to
        #[arg(short = 'P', long)]
        project: String,

        /// Priority (low, medium, high, critical)
        #[arg(short, long)]
        priority: Option<String>,

        /// Description
        #[arg(short, long)]
        description: Option<String>,

        /// Assignee user id
        #[arg(long)]
        assignee: Option<String>,
    },

    /// Create an issue with file attachments
    Report {
        /// Issue title
        title: String,

        /// Project the issue belongs to
        #[arg(short = 'P', long)]
        project: String,

        /// Priority (low, medium, high, critical)
        #[arg(short, long)]
        priority: Option<String>,

        /// Description
        #[arg(short, long)]
        description: Option<String>,

        /// Files to attach (repeatable)
        #[arg(short, long = "file")]
        files: Vec<PathBuf>,
    },

    /// List issues visible to you
    List {
        /// Filter by status
        #[arg(short, long)]
        status: Option<String>,

        /// Filter by priority
        #[arg(short, long)]
        priority: Option<String>,

        /// Include resolved and closed issues
        #[arg(short, long)]
        all: bool,
    },

    /// Show issue details
    Show {
        /// Issue ID
        id: String,
    },

    /// Update an issue
    Update {
        /// Issue ID
        id: String,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New description
        #[arg(short, long)]
        description: Option<String>,

        /// New status (staff only)
        #[arg(short, long)]
        status: Option<String>,

        /// New priority
        #[arg(short, long)]
        priority: Option<String>,

        /// New assignee user id
        #[arg(long)]
        assignee: Option<String>,

        /// Clear the assignee
        #[arg(long, conflicts_with = "assignee")]
        unassign: bool,
    },

    /// Delete an issue (admins only)
    Delete {
        /// Issue ID
        id: String,
    },
}

#[derive(Subcommand)]
enum CommentCommands {
    /// Comment on an issue
    Add {
        /// Issue ID
        issue: String,

        /// Comment text
        content: String,
    },

    /// List comments on an issue, oldest first
    List {
        /// Issue ID
        issue: String,
    },
}

#[derive(Subcommand)]
enum AttachCommands {
    /// Upload a file and attach it to an issue
    Add {
        /// Issue ID
        issue: String,

        /// File to upload
        path: PathBuf,
    },

    /// List attachments on an issue, newest first
    List {
        /// Issue ID
        issue: String,
    },
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// Create a project (staff only)
    Create {
        /// Project name
        name: String,

        /// Owning client's user id
        #[arg(short, long)]
        client: String,

        /// Description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// List projects visible to you
    List,

    /// Update a project (staff only)
    Update {
        /// Project ID
        id: String,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New description
        #[arg(short, long)]
        description: Option<String>,

        /// New status (active, completed, on_hold, cancelled)
        #[arg(short, long)]
        status: Option<String>,
    },
}

#[derive(Subcommand)]
enum TeamCommands {
    /// List all accounts (staff only)
    List,

    /// Invite a new member (admins only)
    Invite {
        /// Email address
        email: String,

        /// Role for the new account (client, team, admin)
        #[arg(short, long, default_value = "team")]
        role: String,
    },

    /// Change a member's role (admins only)
    SetRole {
        /// User ID
        id: String,

        /// New role (client, team, admin)
        role: String,
    },

    /// Remove a member (admins only)
    Remove {
        /// User ID
        id: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Get a specific config value
    Get {
        /// Config key (e.g., "show_closed", "display.colors")
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// New value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let as_role = cli.as_role.as_deref();

    match cli.command {
        Commands::Init => commands::init(),
        Commands::Login { email, name } => commands::login(&email, name).await,
        Commands::Whoami => commands::whoami(cli.json).await,
        Commands::Issue { command } => match command {
            IssueCommands::Create {
                title,
                project,
                priority,
                description,
                assignee,
            } => commands::issue_create(&title, &project, priority, description, assignee, cli.json).await,
            IssueCommands::Report {
                title,
                project,
                priority,
                description,
                files,
            } => commands::issue_report(&title, &project, priority, description, files, cli.json).await,
            IssueCommands::List {
                status,
                priority,
                all,
            } => commands::issue_list(status, priority, all, as_role, cli.json).await,
            IssueCommands::Show { id } => commands::issue_show(&id, as_role, cli.json).await,
            IssueCommands::Update {
                id,
                title,
                description,
                status,
                priority,
                assignee,
                unassign,
            } => {
                commands::issue_update(&id, title, description, status, priority, assignee, unassign, cli.json)
                    .await
            }
            IssueCommands::Delete { id } => commands::issue_delete(&id, cli.json).await,
        },
        Commands::Comment { command } => match command {
            CommentCommands::Add { issue, content } => {
                commands::comment_add(&issue, &content, cli.json).await
            }
            CommentCommands::List { issue } => commands::comment_list(&issue, as_role, cli.json).await,
        },
        Commands::Attach { command } => match command {
            AttachCommands::Add { issue, path } => commands::attach_add(&issue, &path, cli.json).await,
            AttachCommands::List { issue } => commands::attach_list(&issue, as_role, cli.json).await,
        },
        Commands::Project { command } => match command {
            ProjectCommands::Create {
                name,
                client,
                description,
            } => commands::project_create(&name, &client, description, cli.json).await,
            ProjectCommands::List => commands::project_list(as_role, cli.json).await,
            ProjectCommands::Update {
                id,
                name,
                description,
                status,
            } => commands::project_update(&id, name, description, status, cli.json).await,
        },
        Commands::Team { command } => match command {
            TeamCommands::List => commands::team_list(cli.json).await,
            TeamCommands::Invite { email, role } => commands::team_invite(&email, &role, cli.json).await,
            TeamCommands::SetRole { id, role } => commands::team_set_role(&id, &role, cli.json).await,
            TeamCommands::Remove { id } => commands::team_remove(&id, cli.json).await,
        },
        Commands::Stats => commands::stats(as_role, cli.json).await,
        Commands::Config { command } => match command {
            Some(ConfigCommands::Show) => commands::config_show(cli.json),
            Some(ConfigCommands::Get { key }) => commands::config_get(&key, cli.json),
            Some(ConfigCommands::Set { key, value }) => commands::config_set(&key, &value),
            None => commands::config_show(cli.json),
        },
    }
}
