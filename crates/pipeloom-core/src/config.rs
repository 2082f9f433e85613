//! Configuration parsing and validation
//!
//! This module handles loading the `pipeloom.yaml` project file.
//!
//! # Configuration Files
//!
//! - `pipeloom.yaml` - Project root configuration
//! - `<state_dir>/workspace.json` - Connections, schemas and the pipeline graph
//! - `<state_dir>/preferences.json` - CORS proxy and login flag

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Name of the project file
pub const CONFIG_FILE: &str = "pipeloom.yaml";

/// Backend used when the project file does not name one
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Root project configuration from `pipeloom.yaml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name
    pub name: String,

    /// Backend configuration
    #[serde(default)]
    pub backend: BackendConfig,

    /// Maximum rows fetched by a table preview
    #[serde(default = "default_preview_limit")]
    pub preview_limit: usize,

    /// Directory (relative to the project) holding workspace state
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
}

fn default_preview_limit() -> usize {
    50
}

fn default_state_dir() -> String {
    ".pipeloom".to_string()
}

/// Which backend answers connection requests
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// Real HTTP backend
    #[default]
    Live,
    /// Built-in simulated backend with demo data
    Demo,
}

/// Backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend mode
    #[serde(default)]
    pub mode: BackendMode,

    /// Base URL of the HTTP backend
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout for connection tests, in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Timeout for every other request, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            mode: BackendMode::default(),
            base_url: default_base_url(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl BackendConfig {
    /// Connection test timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    30
}

impl ProjectConfig {
    /// Configuration with defaults for everything but the name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            backend: BackendConfig::default(),
            preview_limit: default_preview_limit(),
            state_dir: default_state_dir(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::ConfigInvalid {
                message: "project name must not be empty".to_string(),
            });
        }
        if self.preview_limit == 0 {
            return Err(Error::ConfigInvalid {
                message: "preview_limit must be at least 1".to_string(),
            });
        }
        if self.backend.mode == BackendMode::Live
            && !(self.backend.base_url.starts_with("http://")
                || self.backend.base_url.starts_with("https://"))
        {
            return Err(Error::ConfigInvalid {
                message: format!(
                    "backend.base_url must be an http(s) URL, got '{}'",
                    self.backend.base_url
                ),
            });
        }
        Ok(())
    }
}

/// Main configuration container
#[derive(Debug, Clone)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Base path of the project
    pub base_path: PathBuf,
}

impl Config {
    /// Load configuration from a directory
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the project directory or pipeloom.yaml file
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let config = Config::load("./my-project")?;
    /// println!("Project: {}", config.project.name);
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let (config_path, base_path) = if path.is_dir() {
            (path.join(CONFIG_FILE), path.to_path_buf())
        } else {
            (
                path.to_path_buf(),
                path.parent().unwrap_or(Path::new(".")).to_path_buf(),
            )
        };

        if !config_path.exists() {
            return Err(Error::ConfigNotFound {
                path: config_path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(&config_path)?;
        let project: ProjectConfig = serde_yaml::from_str(&contents)?;
        project.validate()?;

        Ok(Self { project, base_path })
    }

    /// Directory holding workspace state
    pub fn state_dir(&self) -> PathBuf {
        self.base_path.join(&self.project.state_dir)
    }

    /// Path of the persisted workspace
    pub fn workspace_path(&self) -> PathBuf {
        self.state_dir().join("workspace.json")
    }

    /// Path of the persisted preferences
    pub fn preferences_path(&self) -> PathBuf {
        self.state_dir().join("preferences.json")
    }
}
