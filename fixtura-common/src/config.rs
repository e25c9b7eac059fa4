//! Harness configuration loading
//!
//! Resolution order (highest priority first):
//! 1. Explicit config file path passed by the caller
//! 2. File named by the `FIXTURA_CONFIG` environment variable
//! 3. `./fixtura.toml` in the working directory
//! 4. `<config_dir>/fixtura/config.toml`
//! 5. Compiled defaults
//!
//! Environment overrides (`FIXTURA_DATABASE_URL`, `FIXTURA_PREPARE_TIMEOUT_MS`)
//! are applied on top of whichever source won.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable naming a config file
pub const CONFIG_ENV_VAR: &str = "FIXTURA_CONFIG";
/// Environment variable overriding `database.url`
pub const DATABASE_URL_ENV_VAR: &str = "FIXTURA_DATABASE_URL";
/// Environment variable overriding `lifecycle.prepare_timeout_ms`
pub const PREPARE_TIMEOUT_ENV_VAR: &str = "FIXTURA_PREPARE_TIMEOUT_MS";

const LOCAL_CONFIG_FILE: &str = "fixtura.toml";

/// Full harness configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub database: DatabaseConfig,
    pub reset: ResetPolicy,
    pub lifecycle: LifecycleConfig,
}

/// Connection settings for the store under test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection URL, e.g. `sqlite://target/test.db` or `sqlite::memory:`
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
    /// SQLite busy timeout applied to every connection
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 5,
            acquire_timeout_ms: 5000,
            busy_timeout_ms: 5000,
        }
    }
}

impl DatabaseConfig {
    /// Config pointing at `url` with default pool settings
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Config for a database file, created on first connect
    pub fn for_file(path: &Path) -> Self {
        Self::with_url(format!("sqlite://{}", path.display()))
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// True for URLs whose database lives only as long as its connection
    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

/// How `prepare` reconciles the store with the managed schema.
///
/// Immutable for the life of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetPolicy {
    /// Drop and recreate every structure unconditionally.
    ///
    /// When false, missing tables and columns are added and existing data is kept.
    pub destructive: bool,
}

impl ResetPolicy {
    /// Drop and recreate everything
    pub const FORCE: ResetPolicy = ResetPolicy { destructive: true };
    /// Create what is missing, keep what exists
    pub const ADDITIVE: ResetPolicy = ResetPolicy { destructive: false };
}

impl Default for ResetPolicy {
    fn default() -> Self {
        Self::FORCE
    }
}

/// How the runner schedules the tests of one suite
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Sequential,
    Concurrent,
}

/// Suite boundary timeouts and scheduling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub prepare_timeout_ms: u64,
    pub dispose_timeout_ms: u64,
    pub execution: ExecutionMode,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            prepare_timeout_ms: 30_000,
            dispose_timeout_ms: 10_000,
            execution: ExecutionMode::Sequential,
        }
    }
}

impl LifecycleConfig {
    pub fn prepare_timeout(&self) -> Duration {
        Duration::from_millis(self.prepare_timeout_ms)
    }

    pub fn dispose_timeout(&self) -> Duration {
        Duration::from_millis(self.dispose_timeout_ms)
    }
}

impl HarnessConfig {
    /// Resolve configuration following the documented priority order
    pub fn resolve(explicit_file: Option<&Path>) -> Result<Self> {
        let mut config = match find_config_file(explicit_file)? {
            Some(path) => {
                info!("Loading harness config from {}", path.display());
                Self::load_file(&path)?
            }
            None => {
                debug!("No harness config file found, using compiled defaults");
                Self::default()
            }
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Read and parse a TOML config file
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))
    }

    /// Apply `FIXTURA_*` environment overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var(DATABASE_URL_ENV_VAR) {
            debug!("{} overrides database url", DATABASE_URL_ENV_VAR);
            self.database.url = url;
        }

        if let Ok(raw) = std::env::var(PREPARE_TIMEOUT_ENV_VAR) {
            self.lifecycle.prepare_timeout_ms = raw.trim().parse().map_err(|_| {
                Error::Config(format!(
                    "{} must be a number of milliseconds, got '{}'",
                    PREPARE_TIMEOUT_ENV_VAR, raw
                ))
            })?;
        }

        Ok(())
    }

    /// Reject values the harness cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.database.url.trim().is_empty() {
            return Err(Error::Config("database.url must not be empty".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(Error::Config(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.lifecycle.prepare_timeout_ms == 0 || self.lifecycle.dispose_timeout_ms == 0 {
            return Err(Error::Config(
                "lifecycle timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Locate the config file to load, if any.
///
/// Explicitly requested files (argument or `FIXTURA_CONFIG`) must exist.
fn find_config_file(explicit_file: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit_file {
        return require_exists(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return require_exists(PathBuf::from(path));
    }

    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.exists() {
        return Ok(Some(local));
    }

    let user = dirs::config_dir().map(|d| d.join("fixtura").join("config.toml"));
    Ok(user.filter(|p| p.exists()))
}

fn require_exists(path: PathBuf) -> Result<Option<PathBuf>> {
    if path.exists() {
        Ok(Some(path))
    } else {
        Err(Error::Config(format!("Config file not found: {:?}", path)))
    }
}
