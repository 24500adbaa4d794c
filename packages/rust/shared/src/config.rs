//! Application configuration for ProfileCrawl.
//!
//! User config lives at `~/.profilecrawl/profilecrawl.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ProfileCrawlError, Result};
use crate::types::Subject;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "profilecrawl.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".profilecrawl";

// ---------------------------------------------------------------------------
// Config structs (matching profilecrawl.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Page-reading agent settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Agent bridge subprocess settings.
    #[serde(default)]
    pub bridge: BridgeProcessConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Root directory for per-strategy outputs and the merged report.
    #[serde(default = "default_out_dir")]
    pub out_dir: String,

    /// Number of browser sessions in the pool (bounds parallel agents).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Upper bound applied to every strategy's step budget.
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Global run deadline in seconds; 0 disables it.
    #[serde(default)]
    pub run_timeout_secs: u64,

    /// Write agent history and conversation logs next to each extraction.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            out_dir: default_out_dir(),
            concurrency: default_concurrency(),
            max_steps: default_max_steps(),
            run_timeout_secs: 0,
            verbose: false,
        }
    }
}

fn default_out_dir() -> String {
    "out".into()
}
fn default_concurrency() -> usize {
    3
}
fn default_max_steps() -> u32 {
    250
}

/// `[agent]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Name of the env var holding the model id.
    #[serde(default = "default_model_env")]
    pub model_env: String,

    /// Model used when the env var is unset.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Sampling temperature handed to the agent's LLM.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Run browsers without a visible window.
    #[serde(default)]
    pub headless: bool,

    /// Browser auth-state file (cookies) loaded into every session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_state: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model_env: default_model_env(),
            default_model: default_model(),
            temperature: default_temperature(),
            headless: false,
            storage_state: None,
        }
    }
}

fn default_model_env() -> String {
    "MODEL".into()
}
fn default_model() -> String {
    "gemini-2.5-flash".into()
}
fn default_temperature() -> f32 {
    0.3
}

/// `[bridge]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeProcessConfig {
    /// Program that starts one agent bridge (one browser session).
    #[serde(default = "default_bridge_command")]
    pub command: String,

    /// Arguments passed to `command`.
    #[serde(default = "default_bridge_args")]
    pub args: Vec<String>,

    /// Working directory for the bridge subprocess.
    #[serde(default = "default_working_dir")]
    pub working_dir: String,

    /// Seconds to wait for a freshly spawned bridge to report ready.
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_secs: u64,

    /// Seconds to wait for a bridge to acknowledge a session reset.
    #[serde(default = "default_reset_timeout")]
    pub reset_timeout_secs: u64,
}

impl Default for BridgeProcessConfig {
    fn default() -> Self {
        Self {
            command: default_bridge_command(),
            args: default_bridge_args(),
            working_dir: default_working_dir(),
            ready_timeout_secs: default_ready_timeout(),
            reset_timeout_secs: default_reset_timeout(),
        }
    }
}

fn default_bridge_command() -> String {
    "uv".into()
}
fn default_bridge_args() -> Vec<String> {
    vec!["run".into(), "bridge/agent_bridge.py".into()]
}
fn default_working_dir() -> String {
    ".".into()
}
fn default_ready_timeout() -> u64 {
    60
}
fn default_reset_timeout() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// Run config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime orchestration settings, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Root directory for outputs.
    pub out_dir: PathBuf,
    /// Session pool size.
    pub concurrency: usize,
    /// Cap applied to strategy step budgets.
    pub max_steps: u32,
    /// Global deadline for the whole run.
    pub run_timeout: Option<Duration>,
    /// Write agent history diagnostics.
    pub verbose: bool,
}

impl From<&AppConfig> for RunConfig {
    fn from(config: &AppConfig) -> Self {
        let timeout = config.defaults.run_timeout_secs;
        Self {
            out_dir: PathBuf::from(&config.defaults.out_dir),
            concurrency: config.defaults.concurrency,
            max_steps: config.defaults.max_steps,
            run_timeout: (timeout > 0).then(|| Duration::from_secs(timeout)),
            verbose: config.defaults.verbose,
        }
    }
}

impl RunConfig {
    /// Reject settings the orchestrator cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(ProfileCrawlError::config("concurrency must be at least 1"));
        }
        if self.max_steps == 0 {
            return Err(ProfileCrawlError::config("max_steps must be at least 1"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.profilecrawl/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ProfileCrawlError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.profilecrawl/profilecrawl.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| ProfileCrawlError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ProfileCrawlError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ProfileCrawlError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ProfileCrawlError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ProfileCrawlError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Resolve the agent model id: the configured env var wins over the default.
pub fn resolve_model(config: &AgentConfig) -> String {
    match std::env::var(&config.model_env) {
        Ok(val) if !val.trim().is_empty() => val,
        _ => config.default_model.clone(),
    }
}

/// Load and validate a subject file.
///
/// ```toml
/// name = "Ada Lovelace"
///
/// [[links]]
/// url = "https://github.com/ada"
///
/// [[links]]
/// url = "https://ada.example.org"
/// description = "personal website"
/// ```
pub fn load_subject(path: &Path) -> Result<Subject> {
    let content = std::fs::read_to_string(path).map_err(|e| ProfileCrawlError::io(path, e))?;

    let subject: Subject = toml::from_str(&content).map_err(|e| {
        ProfileCrawlError::validation(format!("failed to parse {}: {e}", path.display()))
    })?;
    subject.validate()?;

    Ok(subject)
}
