//! JSONL-backed record store
//!
//! One `<collection>.jsonl` file per entity under `.triage/`, rewritten
//! whole on every mutation. No daemon, no SQLite - just files that
//! diff and merge well.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;

use async_trait::async_trait;

use crate::config::Config;
use crate::store::{Collection, Record, Store};
use crate::{Error, Result};

pub const TRIAGE_DIR: &str = ".triage";
pub const CONFIG_FILE: &str = "config.toml";
pub const BLOB_DIR: &str = "blobs";

/// A project directory holding a `.triage/` data dir
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Find the workspace for the current directory by walking up until
    /// a `.triage/` directory appears.
    pub fn discover() -> Result<Self> {
        let mut current = std::env::current_dir()?;
        loop {
            if current.join(TRIAGE_DIR).exists() {
                return Ok(Self { root: current });
            }
            if !current.pop() {
                return Err(Error::NotInitialized);
            }
        }
    }

    /// Initialize a new workspace in the given directory
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let triage_dir = root.join(TRIAGE_DIR);

        if triage_dir.exists() {
            return Err(Error::AlreadyInitialized(triage_dir.display().to_string()));
        }

        fs::create_dir_all(triage_dir.join(BLOB_DIR))?;
        fs::write(triage_dir.join(CONFIG_FILE), Config::default_with_comments())?;

        for collection in ["users", "projects", "issues", "comments", "attachments"] {
            fs::write(triage_dir.join(format!("{collection}.jsonl")), "")?;
        }

        Ok(Self { root })
    }

    /// Open an existing workspace rooted at the given directory
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.join(TRIAGE_DIR).exists() {
            return Err(Error::NotInitialized);
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the .triage directory
    pub fn triage_dir(&self) -> PathBuf {
        self.root.join(TRIAGE_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.triage_dir().join(CONFIG_FILE)
    }

    pub fn blob_dir(&self) -> PathBuf {
        self.triage_dir().join(BLOB_DIR)
    }

    pub fn load_config(&self) -> Result<Config> {
        Config::load(&self.config_path())
    }

    /// Open the JSONL-backed record store for this workspace
    pub fn store(&self) -> Result<Store> {
        let dir = self.triage_dir();
        Ok(Store {
            users: Arc::new(JsonlCollection::<crate::user::User>::open(&dir)?),
            projects: Arc::new(JsonlCollection::<crate::project::Project>::open(&dir)?),
            issues: Arc::new(JsonlCollection::<crate::issue::Issue>::open(&dir)?),
            comments: Arc::new(JsonlCollection::<crate::comment::Comment>::open(&dir)?),
            attachments: Arc::new(JsonlCollection::<crate::attachment::Attachment>::open(&dir)?),
        })
    }
}

/// JSONL-file collection: full load on open, full rewrite on mutation
pub struct JsonlCollection<T> {
    path: PathBuf,
    records: RwLock<HashMap<String, T>>,
}

impl<T: Record> JsonlCollection<T> {
    /// Open (or lazily create) `<dir>/<collection>.jsonl`
    pub fn open(dir: &Path) -> Result<Self> {
        let path = dir.join(format!("{}.jsonl", T::COLLECTION));
        let records = Self::load(&path)?;
        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    fn load(path: &Path) -> Result<HashMap<String, T>> {
        let mut records = HashMap::new();
        if !path.exists() {
            return Ok(records);
        }

        let file = File::open(path)?;
        let reader = BufReader::new(file);

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: T = serde_json::from_str(&line)?;
            records.insert(record.id().to_string(), record);
        }

        Ok(records)
    }

    fn save(&self, records: &HashMap<String, T>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&self.path)?;
        let mut writer = BufWriter::new(file);

        for record in records.values() {
            serde_json::to_writer(&mut writer, record)?;
            writeln!(writer)?;
        }

        writer.flush()?;
        Ok(())
    }
}

#[async_trait]
impl<T: Record> Collection<T> for JsonlCollection<T> {
    async fn insert(&self, record: T) -> Result<T> {
        let mut records = self.records.write().await;
        if records.contains_key(record.id()) {
            return Err(Error::AlreadyExists(record.id().to_string()));
        }
        records.insert(record.id().to_string(), record.clone());
        self.save(&records)?;
        Ok(record)
    }

    async fn get(&self, id: &str) -> Result<Option<T>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<T>> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn replace(&self, record: T) -> Result<T> {
        let mut records = self.records.write().await;
        if !records.contains_key(record.id()) {
            return Err(Error::NotFound(record.id().to_string()));
        }
        records.insert(record.id().to_string(), record.clone());
        self.save(&records)?;
        Ok(record)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut records = self.records.write().await;
        if records.remove(id).is_some() {
            self.save(&records)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::{Issue, NewIssue};

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
    async fn test_round_trip_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::init(dir.path()).unwrap();

        {
            let coll: JsonlCollection<Issue> = JsonlCollection::open(&ws.triage_dir()).unwrap();
            coll.insert(Issue::new("iss-1".into(), draft("first"), "usr-1".into()))
                .await
                .unwrap();
            coll.insert(Issue::new("iss-2".into(), draft("second"), "usr-1".into()))
                .await
                .unwrap();
            coll.delete("iss-2").await.unwrap();
        }

        let coll: JsonlCollection<Issue> = JsonlCollection::open(&ws.triage_dir()).unwrap();
        let issues = coll.list().await.unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].id, "iss-1");
        assert_eq!(issues[0].title, "first");
    }

    #[tokio::test]
    async fn test_init_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        Workspace::init(dir.path()).unwrap();
        let err = Workspace::init(dir.path()).unwrap_err();
        assert!(matches!(err, Error::AlreadyInitialized(_)));
    }

    #[tokio::test]
    async fn test_open_uninitialized_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Workspace::open(dir.path()).unwrap_err(),
            Error::NotInitialized
        ));
    }

    #[tokio::test]
    async fn test_delete_absent_does_not_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::init(dir.path()).unwrap();
        let coll: JsonlCollection<Issue> = JsonlCollection::open(&ws.triage_dir()).unwrap();
        coll.delete("iss-missing").await.unwrap();
        coll.delete("iss-missing").await.unwrap();
    }
}
