//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/recobra/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/recobra/` (~/.config/recobra/)
//! - Data: `$XDG_DATA_HOME/recobra/` (~/.local/share/recobra/)
//! - State/Logs: `$XDG_STATE_HOME/recobra/` (~/.local/state/recobra/)

use crate::error::{Error, Result};
use crate::validator::EnumConstraint;
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// LLM configuration for lead summarization (optional)
    #[serde(default)]
    pub llm: Option<LlmConfig>,

    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Enumerated-field validation rules
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// LLM provider configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// Provider type
    pub provider: LlmProvider,
    /// Model to use
    pub model: String,
    /// API endpoint (optional, uses default for provider)
    pub endpoint: Option<String>,
    /// API key (can also use env var)
    pub api_key: Option<String>,
    /// HTTP request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_llm_timeout() -> u64 {
    30
}

/// Supported LLM providers
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Ollama,
    Claude,
    OpenAI,
}

impl LlmProvider {
    /// Returns the default endpoint for this provider
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            LlmProvider::Ollama => "http://localhost:11434",
            LlmProvider::Claude => "https://api.anthropic.com",
            LlmProvider::OpenAI => "https://api.openai.com",
        }
    }
}

/// Cache configuration
#[derive(Debug, Deserialize, Default)]
pub struct CacheConfig {
    /// Override path for the cache database
    pub path: Option<PathBuf>,
}

impl CacheConfig {
    /// Resolved cache database path
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(Config::cache_path)
    }
}

/// One enumerated output field and its repair policy.
///
/// The default is per-field configuration, not a hard-coded field-name check;
/// when omitted it falls back to the conventional "N/A" escape value.
#[derive(Debug, Deserialize, Clone)]
pub struct FieldRule {
    /// Output field name
    pub name: String,
    /// Allowed values
    pub allowed: Vec<String>,
    /// Escape value for unrepairable input
    #[serde(default = "default_field_default")]
    pub default: String,
}

fn default_field_default() -> String {
    "N/A".to_string()
}

/// Validation rules for enumerated output fields
#[derive(Debug, Deserialize, Default)]
pub struct ValidationConfig {
    /// Per-field rules, loaded once per analysis run and immutable for its
    /// duration
    #[serde(default)]
    pub fields: Vec<FieldRule>,
}

impl ValidationConfig {
    /// Convert configured rules into validator constraints
    pub fn constraints(&self) -> Vec<EnumConstraint> {
        self.fields
            .iter()
            .map(|f| EnumConstraint::new(f.name.clone(), f.allowed.clone(), f.default.clone()))
            .collect()
    }

    /// Built-in rules for the sales-recovery recipe: the dashboard's
    /// `next_action` enumeration.
    pub fn sales_recovery_defaults() -> Self {
        Self {
            fields: vec![FieldRule {
                name: "next_action".to_string(),
                allowed: vec![
                    "llamar".to_string(),
                    "esperar".to_string(),
                    "enviar_plantilla".to_string(),
                    "cerrar".to_string(),
                ],
                default: default_field_default(),
            }],
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/recobra/config.toml` (~/.config/recobra/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("recobra").join("config.toml")
    }

    /// Returns the data directory path (for the cache database)
    ///
    /// `$XDG_DATA_HOME/recobra/` (~/.local/share/recobra/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("recobra")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/recobra/` (~/.local/state/recobra/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("recobra")
    }

    /// Returns the cache database file path
    ///
    /// `$XDG_DATA_HOME/recobra/cache.db` (~/.local/share/recobra/cache.db)
    pub fn cache_path() -> PathBuf {
        Self::data_dir().join("cache.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/recobra/recobra.log` (~/.local/state/recobra/recobra.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("recobra.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.llm.is_none());
        assert!(config.cache.path.is_none());
        assert!(config.validation.fields.is_empty());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[llm]
provider = "ollama"
model = "llama3.2"

[cache]
path = "/tmp/recobra-cache.db"

[logging]
level = "debug"

[[validation.fields]]
name = "next_action"
allowed = ["llamar", "esperar", "enviar_plantilla", "cerrar"]

[[validation.fields]]
name = "estatus"
allowed = ["activo", "cerrado"]
default = "desconocido"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        let llm = config.llm.unwrap();
        assert_eq!(llm.provider, LlmProvider::Ollama);
        assert_eq!(llm.model, "llama3.2");
        assert_eq!(llm.timeout_secs, 30);
        assert_eq!(config.logging.level, "debug");

        let constraints = config.validation.constraints();
        assert_eq!(constraints.len(), 2);
        // Omitted default falls back to "N/A"
        assert_eq!(constraints[0].default_value, "N/A");
        // Explicit per-field default is honored
        assert_eq!(constraints[1].default_value, "desconocido");
    }

    #[test]
    fn test_llm_provider_endpoints() {
        assert_eq!(
            LlmProvider::Ollama.default_endpoint(),
            "http://localhost:11434"
        );
        assert_eq!(
            LlmProvider::Claude.default_endpoint(),
            "https://api.anthropic.com"
        );
    }

    #[test]
    fn test_sales_recovery_defaults() {
        let validation = ValidationConfig::sales_recovery_defaults();
        let constraints = validation.constraints();
        assert_eq!(constraints.len(), 1);
        assert_eq!(constraints[0].field_name, "next_action");
        assert!(constraints[0].allowed_values.contains(&"llamar".to_string()));
    }
}
