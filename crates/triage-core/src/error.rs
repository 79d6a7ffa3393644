//! Error types for triage

use thiserror::Error;

use crate::policy::Action;
use crate::user::Role;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Not signed in")]
    Unauthenticated,

    #[error("Role '{role}' is not allowed to {action}")]
    Forbidden { role: Role, action: Action },

    #[error("{0}")]
    Validation(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Invalid priority: {0}")]
    InvalidPriority(String),

    #[error("Invalid project status: {0}")]
    InvalidProjectStatus(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Blob store error: {0}")]
    Blob(String),

    #[error("Store not initialized. Run 'triage init' first.")]
    NotInitialized,

    #[error("Store already initialized at {0}")]
    AlreadyInitialized(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for caller-input failures surfaced back to the user.
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
