//! File attachments on issues
//!
//! An attachment record only points at a blob the blob store already
//! accepted; creating one is always the second step after an upload.
//! Records are never mutated, only deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::Record;

/// Attachment record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    /// Unique identifier (att-xxxxxxxx)
    pub id: String,

    /// Parent issue
    pub issue_id: String,

    pub filename: String,

    /// Public URL produced by the blob store
    pub file_url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// Who uploaded the file
    pub uploaded_by: String,

    pub created_at: DateTime<Utc>,
}

impl Attachment {
    pub fn new(id: String, issue_id: String, upload: AttachmentUpload, uploaded_by: String) -> Self {
        Self {
            id,
            issue_id,
            filename: upload.filename,
            file_url: upload.file_url,
            file_size: upload.file_size,
            mime_type: upload.mime_type,
            uploaded_by,
            created_at: Utc::now(),
        }
    }
}

impl Record for Attachment {
    const COLLECTION: &'static str = "attachments";
    const ID_PREFIX: &'static str = "att";

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Metadata for an already-uploaded blob, ready to become a record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentUpload {
    pub filename: String,
    pub file_url: String,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// Raw file bytes going into the composite issue-report flow
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}
