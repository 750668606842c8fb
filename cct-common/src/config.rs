//! Configuration loading and root folder resolution
//!
//! Resolution priority for every setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable config file never aborts startup; it is logged
//! and the compiled defaults apply.

use crate::analysis::Chamber;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ENV_ROOT_FOLDER: &str = "CCT_ROOT_FOLDER";

/// Environment variable pointing at an explicit TOML config file
pub const ENV_CONFIG_FILE: &str = "CCT_CONFIG";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "cct.db";

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TomlConfig {
    /// Folder holding the database
    pub root_folder: Option<PathBuf>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Congress used by endpoints that take no explicit congress
    pub default_congress: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 5000,
            default_congress: 119,
        }
    }
}

/// Analysis cache and refresh schedule settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of cached analysis reports (6 hours)
    pub analysis_ttl_secs: u64,
    /// Lifetime of the cached bill listing (5 minutes)
    pub bills_ttl_secs: u64,
    /// Interval between in-process refresh passes; 0 disables the scheduler
    pub refresh_interval_secs: u64,
    /// Targets recomputed on every pass, as "congress:chamber"
    pub refresh_targets: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            analysis_ttl_secs: 6 * 60 * 60,
            bills_ttl_secs: 5 * 60,
            refresh_interval_secs: 60 * 60,
            refresh_targets: vec!["119:house".to_string()],
        }
    }
}

impl CacheConfig {
    /// Parse `refresh_targets`, skipping (and logging) malformed entries
    pub fn targets(&self) -> Vec<RefreshTarget> {
        self.refresh_targets
            .iter()
            .filter_map(|raw| match raw.parse::<RefreshTarget>() {
                Ok(target) => Some(target),
                Err(e) => {
                    warn!("Ignoring refresh target '{}': {}", raw, e);
                    None
                }
            })
            .collect()
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// One (congress, chamber) pair the refresher keeps warm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RefreshTarget {
    pub congress: u32,
    pub chamber: Chamber,
}

impl fmt::Display for RefreshTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.congress, self.chamber)
    }
}

impl FromStr for RefreshTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (congress, chamber) = s
            .split_once(':')
            .ok_or_else(|| Error::Config(format!("expected 'congress:chamber', got '{}'", s)))?;
        let congress = congress
            .trim()
            .parse::<u32>()
            .map_err(|e| Error::Config(format!("invalid congress '{}': {}", congress, e)))?;
        Ok(Self {
            congress,
            chamber: chamber.parse()?,
        })
    }
}

impl TomlConfig {
    /// Parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }

    /// Locate and load the config file, falling back to defaults
    pub fn load_or_default() -> Self {
        match locate_config_file() {
            Some(path) => match Self::load(&path) {
                Ok(config) => {
                    info!("Loaded configuration from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("{}; using compiled defaults", e);
                    Self::default()
                }
            },
            None => {
                info!("No config file found; using compiled defaults");
                Self::default()
            }
        }
    }
}

/// Config file search order: $CCT_CONFIG, ~/.config/cct/config.toml, /etc/cct/config.toml
fn locate_config_file() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(ENV_CONFIG_FILE) {
        return Some(PathBuf::from(path));
    }

    let user_config = dirs::config_dir().map(|d| d.join("cct").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/cct/config.toml");
    if system_config.exists() {
        return Some(system_config);
    }

    None
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("cct"))
        .unwrap_or_else(|| PathBuf::from("./cct_data"))
}

/// Resolves the root folder following the CLI → ENV → TOML → default order
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_value: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            toml_value: None,
        }
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_toml(mut self, config: &TomlConfig) -> Self {
        self.toml_value = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            info!("[{}] Root folder from command line: {}", self.module_name, path.display());
            return path.clone();
        }

        if let Ok(path) = std::env::var(ENV_ROOT_FOLDER) {
            if !path.trim().is_empty() {
                info!("[{}] Root folder from {}: {}", self.module_name, ENV_ROOT_FOLDER, path);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_value {
            info!("[{}] Root folder from config file: {}", self.module_name, path.display());
            return path.clone();
        }

        let path = default_root_folder();
        info!("[{}] Root folder (default): {}", self.module_name, path.display());
        path
    }
}

/// Creates the root folder and derives file paths within it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }
}
