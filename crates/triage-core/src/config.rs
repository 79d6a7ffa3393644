//! Configuration for triage
//!
//! Stored in .triage/config.toml

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::issue::Priority;

/// triage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Priority for new issues whose draft sets none
    pub default_priority: Priority,

    /// Include resolved/closed issues in list output by default
    pub show_closed: bool,

    /// Display settings
    #[serde(default)]
    pub display: DisplayConfig,

    /// API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Blob storage settings
    #[serde(default)]
    pub blob: BlobConfig,

    /// Local session (CLI sign-in state)
    #[serde(default)]
    pub session: SessionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_priority: Priority::Medium,
            show_closed: false,
            display: DisplayConfig::default(),
            api: ApiConfig::default(),
            blob: BlobConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

/// Display configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Use colors in output
    pub colors: bool,

    /// Date format for display
    pub date_format: String,

    /// Maximum title length before truncation
    pub max_title_length: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            colors: true,
            date_format: "%Y-%m-%d %H:%M".to_string(),
            max_title_length: 80,
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Port to bind (TRIAGE_API_PORT overrides)
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { port: 3864 }
    }
}

/// Blob storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BlobConfig {
    /// Blob root directory (defaults to .triage/blobs)
    pub root: Option<String>,

    /// Public base URL for uploaded files; file:// paths when unset
    pub public_base_url: Option<String>,
}

/// Local CLI session
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SessionConfig {
    /// Signed-in user id
    pub user_id: Option<String>,

    pub email: Option<String>,

    pub display_name: Option<String>,
}

impl Config {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Other(format!("Invalid config: {}", e)))?;
        Ok(config)
    }

    /// Save config to a TOML file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::Error::Other(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Generate a default config file with comments
    pub fn default_with_comments() -> String {
        r#"# triage configuration

# Priority for new issues that don't set one (low, medium, high, critical)
default_priority = "medium"

# Include resolved/closed issues in list output by default
show_closed = false

[display]
# Use colors in output
colors = true

# Date format for display (strftime format)
date_format = "%Y-%m-%d %H:%M"

# Maximum title length before truncation
max_title_length = 80

[api]
# Port for the triage-api server (TRIAGE_API_PORT overrides)
port = 3864

[blob]
# Blob root directory (defaults to .triage/blobs)
# root = "/var/lib/triage/blobs"

# Public base URL for uploaded files; file:// paths when unset
# public_base_url = "https://files.example.com"

[session]
# Filled in by 'triage login'
# user_id = "usr-xxxxxxxx"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_default() {
        let config = Config::load(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_priority, Priority::Medium);
        assert!(!config.show_closed);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.default_priority = Priority::High;
        config.session.user_id = Some("usr-1".into());
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.default_priority, Priority::High);
        assert_eq!(loaded.session.user_id.as_deref(), Some("usr-1"));
    }

    #[test]
    fn test_commented_default_parses() {
        let config: Config = toml::from_str(&Config::default_with_comments()).unwrap();
        assert_eq!(config.api.port, 3864);
    }
}
