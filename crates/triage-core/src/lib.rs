//! triage-core: Core library for the triage issue tracker
//!
//! Role-aware data access for users, projects, issues, comments and
//! attachments. Everything flows through [`DataService`], which runs
//! the access policy before touching the record store; identity and
//! blob storage are collaborators behind traits.

pub mod attachment;
pub mod blob;
pub mod comment;
pub mod config;
pub mod error;
pub mod id;
pub mod identity;
pub mod issue;
pub mod jsonl_store;
pub mod policy;
pub mod project;
pub mod service;
pub mod stats;
pub mod store;
pub mod user;

pub use attachment::{Attachment, AttachmentUpload, FileUpload};
pub use blob::{BlobStore, FsBlobStore, UploadedBlob};
pub use comment::Comment;
pub use config::Config;
pub use error::Error;
pub use id::generate_id;
pub use identity::{IdentityProvider, Principal, Session};
pub use issue::{Issue, IssuePatch, NewIssue, Priority, Status};
pub use jsonl_store::Workspace;
pub use policy::Action;
pub use project::{NewProject, Project, ProjectPatch, ProjectStatus};
pub use service::{Context, DataService};
pub use stats::DashboardStats;
pub use store::{Collection, Record, Store};
pub use user::{ProfilePatch, Role, User};

/// Result type for triage operations
pub type Result<T> = std::result::Result<T, Error>;
