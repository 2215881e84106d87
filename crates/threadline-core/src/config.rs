//! Store layout and configuration.
//!
//! A threadline store lives in a `.threadline/` directory:
//! - `.threadline/threadline.db`: the comment database
//! - `.threadline/config.json`: depth limits and pagination settings
//!
//! Every config field has a default, so a missing or partial file is fine.
//! Environment variables override the file:
//! - `THREADLINE_DB`: database path
//! - `THREADLINE_PAGE_SIZE`, `THREADLINE_ORPHANS`: pagination

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::paginate::PageSettings;
use crate::policy::StaticPolicy;

/// The directory name for threadline data
pub const STORE_DIR: &str = ".threadline";

/// The configuration filename
pub const CONFIG_FILE: &str = "config.json";

/// The database filename
pub const DB_FILE: &str = "threadline.db";

const DB_VAR: &str = "THREADLINE_DB";
const PAGE_SIZE_VAR: &str = "THREADLINE_PAGE_SIZE";
const ORPHANS_VAR: &str = "THREADLINE_ORPHANS";

/// Settings loaded from `config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Deepest reply level for target types without an override.
    pub max_thread_level: i64,
    /// Per target type depth overrides.
    pub max_thread_level_by_target: HashMap<String, i64>,
    /// Nominal comments per page; 0 disables pagination.
    pub page_size: i64,
    /// Slack above `page_size` tolerated on the last page.
    pub orphans: i64,
    pub allow_empty_first_page: bool,
    /// How long a writer waits for the database lock.
    pub busy_timeout_ms: u64,
    /// Placement attempts before a conflict is surfaced.
    pub placement_attempts: u32,
    /// Database path; relative paths resolve against the store root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_thread_level: 0,
            max_thread_level_by_target: HashMap::new(),
            page_size: 25,
            orphans: 0,
            allow_empty_first_page: true,
            busy_timeout_ms: 5000,
            placement_attempts: 3,
            db_path: None,
        }
    }
}

impl Config {
    /// Load the config for a store root, then apply environment overrides.
    pub fn load(root: &Path) -> Result<Self> {
        let mut config = Self::read_file(&config_path(root))?;
        config.apply_overrides(|name| env::var(name).ok())?;
        Ok(config)
    }

    /// Read a config file, falling back to defaults when it doesn't exist.
    pub fn read_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Write the config as pretty JSON.
    pub fn write_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content + "\n")
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Apply overrides from a variable lookup (the process environment in `load`).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(path) = lookup(DB_VAR).filter(|v| !v.is_empty()) {
            self.db_path = Some(PathBuf::from(path));
        }
        if let Some(value) = lookup(PAGE_SIZE_VAR) {
            self.page_size = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid {PAGE_SIZE_VAR}: {value}"))?;
        }
        if let Some(value) = lookup(ORPHANS_VAR) {
            self.orphans = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid {ORPHANS_VAR}: {value}"))?;
        }
        Ok(())
    }

    /// Resolve the database path for a store root.
    #[must_use]
    pub fn resolve_db_path(&self, root: &Path) -> PathBuf {
        match &self.db_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => root.join(path),
            None => store_dir(root).join(DB_FILE),
        }
    }

    /// The depth policy described by this config.
    #[must_use]
    pub fn policy(&self) -> StaticPolicy {
        StaticPolicy::new(self.max_thread_level, self.max_thread_level_by_target.clone())
    }

    #[must_use]
    pub const fn page_settings(&self) -> PageSettings {
        PageSettings {
            page_size: self.page_size,
            orphans: self.orphans,
            allow_empty_first_page: self.allow_empty_first_page,
        }
    }

    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Path to the store directory under a root.
#[must_use]
pub fn store_dir(root: &Path) -> PathBuf {
    root.join(STORE_DIR)
}

/// Path to the config file under a root.
#[must_use]
pub fn config_path(root: &Path) -> PathBuf {
    store_dir(root).join(CONFIG_FILE)
}

/// Check if a store is initialized under the given root.
#[must_use]
pub fn is_initialized(root: &Path) -> bool {
    config_path(root).exists()
}
