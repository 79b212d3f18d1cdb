//! Configuration loading
//!
//! Config file resolution priority:
//! 1. Command-line `--config` argument (missing file is an error)
//! 2. `PWE_CONFIG` environment variable
//! 3. User config file (`~/.config/pwe/config.toml` on Linux)
//! 4. Compiled defaults (fallback, with a warning)
//!
//! Selected environment variables then override individual settings.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::pricing::MarkupTable;
use crate::{Error, Result};

pub const CONFIG_ENV: &str = "PWE_CONFIG";
pub const EMULATOR_HOST_ENV: &str = "FIRESTORE_EMULATOR_HOST";
pub const ACCESS_TOKEN_ENV: &str = "PWE_ACCESS_TOKEN";
pub const PROJECT_ENV: &str = "GOOGLE_CLOUD_PROJECT";
pub const BIND_ENV: &str = "PWE_BIND";

/// Which document store the procedures talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Local SQLite file
    #[default]
    Sqlite,
    /// Firestore REST API (production or emulator)
    Firestore,
}

impl std::str::FromStr for StoreBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(StoreBackend::Sqlite),
            "firestore" => Ok(StoreBackend::Firestore),
            other => Err(Error::Config(format!("unknown store backend: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// SQLite database file (default: `<data dir>/pwe/menu.db`)
    pub sqlite_path: Option<PathBuf>,
    /// Firestore project id
    pub project_id: Option<String>,
    /// Firestore database id
    pub database: String,
    /// `host:port` of a local Firestore emulator; takes precedence over
    /// production when set
    pub emulator_host: Option<String>,
    /// Bearer token for production Firestore
    pub access_token: Option<String>,
    /// Override of the production API endpoint
    pub endpoint: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            sqlite_path: None,
            project_id: None,
            database: "(default)".to_string(),
            emulator_host: None,
            access_token: None,
            endpoint: None,
        }
    }
}

impl StoreConfig {
    pub fn sqlite_path(&self) -> PathBuf {
        self.sqlite_path.clone().unwrap_or_else(default_sqlite_path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Prebuilt single-page application
    pub dist_dir: PathBuf,
    /// Directory holding `admin.html` and `menu-admin.html`
    pub admin_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            dist_dir: PathBuf::from("dist"),
            admin_dir: PathBuf::from("public"),
        }
    }
}

/// Contents of `config.toml`
///
/// A `[pricing]` section replaces the whole standard markup table, so
/// platforms left out of it get no display price.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub store: StoreConfig,
    pub pricing: MarkupTable,
    pub server: ServerConfig,
}

impl TomlConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Apply environment overrides using `lookup` as the environment
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(host) = lookup(EMULATOR_HOST_ENV).filter(|h| !h.is_empty()) {
            self.store.emulator_host = Some(host);
        }
        if let Some(token) = lookup(ACCESS_TOKEN_ENV).filter(|t| !t.is_empty()) {
            self.store.access_token = Some(token);
        }
        if self.store.project_id.is_none() {
            self.store.project_id = lookup(PROJECT_ENV).filter(|p| !p.is_empty());
        }
        if let Some(bind) = lookup(BIND_ENV) {
            self.server.bind = bind
                .parse()
                .map_err(|e| Error::Config(format!("{}={}: {}", BIND_ENV, bind, e)))?;
        }
        Ok(())
    }
}

/// Load configuration following the resolution priority
pub fn load_config(cli_path: Option<&Path>) -> Result<TomlConfig> {
    let mut config = match cli_path {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            info!("Loading config from {}", path.display());
            TomlConfig::from_file(path)?
        }
        None => match resolve_config_path() {
            Some(path) if path.exists() => {
                info!("Loading config from {}", path.display());
                TomlConfig::from_file(&path)?
            }
            Some(path) => {
                warn!("Config file {} not found, using defaults", path.display());
                TomlConfig::default()
            }
            None => {
                warn!("No config file found, using defaults");
                TomlConfig::default()
            }
        },
    };

    config.apply_overrides(|key| std::env::var(key).ok())?;
    Ok(config)
}

/// Config file path from `PWE_CONFIG` or the platform config dir
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    dirs::config_dir().map(|d| d.join("pwe").join("config.toml"))
}

fn default_sqlite_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("pwe").join("menu.db"))
        .unwrap_or_else(|| PathBuf::from("./pwe_data/menu.db"))
}
