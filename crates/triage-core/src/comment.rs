//! Comments on issues
//!
//! Append-only: comments are created and occasionally deleted by an
//! admin, never edited. Display order is creation time ascending.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::Record;

/// Comment record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    /// Unique identifier (cmt-xxxxxxxx)
    pub id: String,

    /// Parent issue
    pub issue_id: String,

    /// Author
    pub user_id: String,

    /// Non-empty text
    pub content: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(id: String, issue_id: String, user_id: String, content: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            issue_id,
            user_id,
            content,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for Comment {
    const COLLECTION: &'static str = "comments";
    const ID_PREFIX: &'static str = "cmt";

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
