//! Application configuration for Hunter.
//!
//! User config lives at `~/.hunter/hunter.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HunterError, Result};
use crate::types::DEFAULT_PURPOSE;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "hunter.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".hunter";

/// Credential keys with this suffix name an environment variable.
const ENV_SUFFIX: &str = "_env";

// ---------------------------------------------------------------------------
// Config structs (matching hunter.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Dispatch coordinator settings.
    #[serde(default)]
    pub dispatch: DispatchSection,

    /// Shared HTTP client settings for scouts.
    #[serde(default)]
    pub http: HttpConfig,

    /// Triage settings.
    #[serde(default)]
    pub triage: TriageConfig,

    /// Opaque credential bags keyed by domain name or agent type.
    #[serde(default)]
    pub credentials: BTreeMap<String, BTreeMap<String, String>>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Path of the libSQL database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Source purpose dispatched by `hunt` when none is given.
    #[serde(default = "default_purpose")]
    pub purpose: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            purpose: default_purpose(),
        }
    }
}

fn default_database_path() -> String {
    "~/.hunter/hunter.db".into()
}
fn default_purpose() -> String {
    DEFAULT_PURPOSE.into()
}

/// `[dispatch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchSection {
    /// Deadline for a single scout call, in seconds.
    #[serde(default = "default_scout_timeout")]
    pub scout_timeout_secs: u64,
}

impl Default for DispatchSection {
    fn default() -> Self {
        Self {
            scout_timeout_secs: default_scout_timeout(),
        }
    }
}

fn default_scout_timeout() -> u64 {
    120
}

/// `[http]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent sent by HTTP scouts.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_http_timeout(),
        }
    }
}

fn default_user_agent() -> String {
    concat!("hunter/", env!("CARGO_PKG_VERSION")).into()
}
fn default_http_timeout() -> u64 {
    30
}

/// `[triage]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriageConfig {
    /// Where to export triaged text for classifier training. Disabled when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_export_dir: Option<String>,
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime dispatch configuration.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Deadline around each scout invocation.
    pub scout_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for DispatchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            scout_timeout: Duration::from_secs(config.dispatch.scout_timeout_secs),
        }
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// An opaque credential bag handed to a scout unchanged.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials(HashMap<String, String>);

impl Credentials {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self(values)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Keys only; values are secrets.
        let mut keys: Vec<&String> = self.0.keys().collect();
        keys.sort();
        f.debug_struct("Credentials").field("keys", &keys).finish()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Credentials {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

/// Resolves credential bags from the `[credentials.*]` tables.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    entries: BTreeMap<String, BTreeMap<String, String>>,
}

impl CredentialStore {
    pub fn new(entries: BTreeMap<String, BTreeMap<String, String>>) -> Self {
        Self { entries }
    }

    /// Credentials for a source: the domain's entry first, then the agent type's.
    pub fn lookup(&self, domain_name: &str, agent_type: &str) -> Option<Credentials> {
        self.resolve(domain_name).or_else(|| self.resolve(agent_type))
    }

    fn resolve(&self, key: &str) -> Option<Credentials> {
        let table = self.entries.get(key)?;
        let mut values = HashMap::with_capacity(table.len());
        for (name, value) in table {
            match name.strip_suffix(ENV_SUFFIX) {
                Some(stripped) => match std::env::var(value) {
                    Ok(secret) if !secret.is_empty() => {
                        values.insert(stripped.to_string(), secret);
                    }
                    _ => {
                        tracing::warn!(credentials = key, var = %value, "credential env var not set");
                    }
                },
                None => {
                    values.insert(name.clone(), value.clone());
                }
            }
        }
        Some(Credentials(values))
    }
}

impl From<&AppConfig> for CredentialStore {
    fn from(config: &AppConfig) -> Self {
        Self::new(config.credentials.clone())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.hunter/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| HunterError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.hunter/hunter.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| HunterError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| HunterError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| HunterError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content = toml::to_string_pretty(&config).map_err(|e| HunterError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| HunterError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~/` against the home directory.
pub fn expand_path(raw: &str) -> Result<PathBuf> {
    match raw.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| HunterError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(raw)),
    }
}
