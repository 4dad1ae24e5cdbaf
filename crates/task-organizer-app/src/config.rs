//! Project configuration stored under `.task-organizer/`.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use task_organizer_store::validate_collection;
use tracing::info;

const CONFIG_DIR: &str = ".task-organizer";
const CONFIG_FILE: &str = "config.toml";
const DEFAULT_COLLECTION: &str = "tasks";
const DEFAULT_DATA_FILE: &str = ".task-organizer/tasks.json";

/// Template written by `init`.
pub const DEFAULT_CONFIG: &str = r#"# Collection holding the task records.
collection = "tasks"

[store]
# One of "memory", "file" or "firebase".
backend = "file"
path = ".task-organizer/tasks.json"
# url = "https://example.firebaseio.com"
"#;

/// Top-level project configuration loaded from `.task-organizer/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProjectConfig {
    #[serde(default = "default_collection")]
    collection: String,
    #[serde(default)]
    store: StoreConfig,
}

/// Which record store backs the task list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Process-local store; nothing survives exit.
    Memory,
    /// JSON document on disk.
    File {
        /// Data file, relative to the project directory unless absolute.
        #[serde(default = "default_data_file")]
        path: PathBuf,
    },
    /// Hosted realtime database.
    Firebase {
        /// Database root, e.g. `https://example.firebaseio.com`.
        url: String,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::File {
            path: default_data_file(),
        }
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
            store: StoreConfig::default(),
        }
    }
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_owned()
}

fn default_data_file() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_FILE)
}

impl ProjectConfig {
    /// Load configuration from a project directory. A missing file yields defaults.
    ///
    /// # Errors
    /// Fails when the file cannot be read, parsed or validated.
    pub fn load(project_dir: impl AsRef<Path>) -> Result<Self> {
        let config_path = Self::path_in(project_dir);
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let config = Self::parse(&contents)
            .with_context(|| format!("failed to load {}", config_path.display()))?;
        Ok(config)
    }

    /// Parse and validate configuration text.
    ///
    /// # Errors
    /// Fails on malformed TOML or invalid values.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).context("failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Write [`DEFAULT_CONFIG`] into `project_dir`, returning its path.
    ///
    /// # Errors
    /// Fails when a configuration exists and `force` is not set, or on I/O errors.
    pub fn init(project_dir: impl AsRef<Path>, force: bool) -> Result<PathBuf> {
        let config_path = Self::path_in(&project_dir);
        if config_path.exists() && !force {
            bail!(
                "{} already exists; pass --force to overwrite",
                config_path.display()
            );
        }
        let config_dir = project_dir.as_ref().join(CONFIG_DIR);
        fs::create_dir_all(&config_dir)
            .with_context(|| format!("failed to create {}", config_dir.display()))?;
        fs::write(&config_path, DEFAULT_CONFIG)
            .with_context(|| format!("failed to write {}", config_path.display()))?;
        info!(path = %config_path.display(), "Wrote default configuration");
        Ok(config_path)
    }

    /// Location of the configuration file inside `project_dir`.
    pub fn path_in(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Collection holding the task records.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Store backend settings.
    pub const fn store(&self) -> &StoreConfig {
        &self.store
    }

    /// Data file for the file backend, resolved against `project_dir`.
    pub fn data_file(&self, project_dir: impl AsRef<Path>) -> Option<PathBuf> {
        match &self.store {
            StoreConfig::File { path } if path.is_absolute() => Some(path.clone()),
            StoreConfig::File { path } => Some(project_dir.as_ref().join(path)),
            StoreConfig::Memory | StoreConfig::Firebase { .. } => None,
        }
    }

    fn validate(&self) -> Result<()> {
        validate_collection(&self.collection)
            .with_context(|| format!("invalid collection '{}'", self.collection))?;
        match &self.store {
            StoreConfig::Firebase { url } => ensure_http_url(url),
            StoreConfig::File { path } if path.as_os_str().is_empty() => {
                bail!("file backend needs a non-empty path")
            }
            StoreConfig::File { .. } | StoreConfig::Memory => Ok(()),
        }
    }
}

fn ensure_http_url(url: &str) -> Result<()> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match rest {
        Some(host) if !host.trim_matches('/').is_empty() => Ok(()),
        _ => bail!("firebase url must be an http(s) url with a host, got '{url}'"),
    }
}
