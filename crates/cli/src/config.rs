//! # Application Configuration
//!
//! Loads [`AppConfig`] in layers: built-in defaults, then an optional YAML
//! file (with `${VAR}` substitution), then `HANDELINGEN__`-prefixed
//! environment variables. A nested key such as `fetch.max_retries` is
//! overridden by `HANDELINGEN__FETCH__MAX_RETRIES`.

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use handelingen::analysis::{DEFAULT_FINDING_FIELDS, DEFAULT_PARSE_TIMEOUT};
use handelingen::constants::{
    DEFAULT_BACKOFF_SECS, DEFAULT_DATA_DIR, DEFAULT_GROUPS, DEFAULT_MAX_RETRIES,
    DEFAULT_POLITENESS_MAX_MS, DEFAULT_POLITENESS_MIN_MS, DEFAULT_RETRYABLE_STATUS,
    DEFAULT_TIMEOUT_SECS,
};
use handelingen::providers::ai::completions::{DEFAULT_COMPLETIONS_MODEL, DEFAULT_COMPLETIONS_URL};
use handelingen::providers::ai::CompletionsConfig;
use handelingen::{ArchiveConfig, RetryPolicy};
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// The file read when no `--config` path is given. Missing is fine.
pub const DEFAULT_CONFIG_FILE: &str = "config.yml";

/// Environment variable holding the completions API key.
pub const API_KEY_VAR: &str = "FIREWORKS_API_KEY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    General(String),
    #[error("Config file not found at '{0}'")]
    NotFound(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::General(err.to_string())
    }
}

/// Retry policy settings, in plain numbers so they survive YAML and env.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    pub max_retries: u32,
    pub backoff_secs: u64,
    pub timeout_secs: u64,
    pub retryable_status: Vec<u16>,
    pub politeness_min_ms: u64,
    pub politeness_max_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_secs: DEFAULT_BACKOFF_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retryable_status: DEFAULT_RETRYABLE_STATUS.to_vec(),
            politeness_min_ms: DEFAULT_POLITENESS_MIN_MS,
            politeness_max_ms: DEFAULT_POLITENESS_MAX_MS,
        }
    }
}

impl FetchConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries.max(1),
            backoff_base: Duration::from_secs(self.backoff_secs),
            timeout_per_attempt: Duration::from_secs(self.timeout_secs),
            retryable_status: self.retryable_status.iter().copied().collect(),
            politeness_min: Duration::from_millis(self.politeness_min_ms),
            politeness_max: Duration::from_millis(self.politeness_max_ms),
        }
    }
}

/// The slower policy `meta-retry` uses for documents that failed once.
///
/// Keys left out of a partial `retry_fetch` section keep these values, not
/// the regular fetch defaults.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RetryFetchConfig {
    pub max_retries: u32,
    pub backoff_secs: u64,
    pub timeout_secs: u64,
    pub retryable_status: Vec<u16>,
    pub politeness_min_ms: u64,
    pub politeness_max_ms: u64,
}

impl Default for RetryFetchConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_secs: 2,
            timeout_secs: 30,
            retryable_status: DEFAULT_RETRYABLE_STATUS.to_vec(),
            politeness_min_ms: DEFAULT_POLITENESS_MIN_MS,
            politeness_max_ms: DEFAULT_POLITENESS_MAX_MS,
        }
    }
}

impl From<RetryFetchConfig> for FetchConfig {
    fn from(retry: RetryFetchConfig) -> Self {
        Self {
            max_retries: retry.max_retries,
            backoff_secs: retry.backoff_secs,
            timeout_secs: retry.timeout_secs,
            retryable_status: retry.retryable_status,
            politeness_min_ms: retry.politeness_min_ms,
            politeness_max_ms: retry.politeness_max_ms,
        }
    }
}

impl RetryFetchConfig {
    pub fn policy(&self) -> RetryPolicy {
        FetchConfig::from(self.clone()).policy()
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    pub api_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub api_timeout_secs: u64,
    pub parse_timeout_secs: u64,
    pub prompt_path: PathBuf,
    pub output_dir: PathBuf,
    pub finding_fields: Vec<String>,
    /// Usually left unset and taken from `FIREWORKS_API_KEY`.
    pub api_key: Option<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_COMPLETIONS_URL.to_string(),
            model: DEFAULT_COMPLETIONS_MODEL.to_string(),
            max_tokens: 2048,
            temperature: 0.1,
            top_p: 1.0,
            top_k: 40,
            api_timeout_secs: 30,
            parse_timeout_secs: DEFAULT_PARSE_TIMEOUT.as_secs(),
            prompt_path: PathBuf::from("prompts/delegitimatie.yaml"),
            output_dir: PathBuf::from("analysis_output"),
            finding_fields: DEFAULT_FINDING_FIELDS.iter().map(|f| f.to_string()).collect(),
            api_key: None,
        }
    }
}

impl AnalysisConfig {
    pub fn completions(&self) -> CompletionsConfig {
        CompletionsConfig {
            api_url: self.api_url.clone(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            top_k: self.top_k,
            request_timeout: Duration::from_secs(self.api_timeout_secs),
        }
    }

    pub fn parse_timeout(&self) -> Duration {
        Duration::from_secs(self.parse_timeout_secs)
    }
}

/// The root configuration structure, mapping directly to `config.yml`.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Session years in processing order.
    #[serde(default = "default_groups")]
    pub groups: Vec<String>,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub retry_fetch: RetryFetchConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

fn default_groups() -> Vec<String> {
    DEFAULT_GROUPS.iter().map(|g| g.to_string()).collect()
}

// Reads a file and expands `${VAR}` from the environment. Unset vars become "".
// Returns Ok(None) if the file does not exist.
fn read_and_substitute(path: &Path) -> Result<Option<String>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path).map_err(|e| {
        ConfigError::General(format!(
            "Failed to read config file '{}': {e}",
            path.display()
        ))
    })?;

    let re = Regex::new(r"\$\{(?P<var>[A-Z0-9_]+)\}")
        .map_err(|e| ConfigError::General(e.to_string()))?;
    let expanded = re.replace_all(&content, |caps: &regex::Captures| {
        env::var(&caps["var"]).unwrap_or_default()
    });

    Ok(Some(expanded.into_owned()))
}

/// Loads the configuration.
///
/// An explicit `config_path` must exist; without one, `config.yml` in the
/// working directory is used when present.
pub fn get_config(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = ConfigBuilder::builder();

    let (path, required) = match config_path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    match read_and_substitute(&path)? {
        Some(content) => {
            info!("Loading configuration from '{}'.", path.display());
            builder = builder.add_source(File::from_str(&content, FileFormat::Yaml));
        }
        None if required => return Err(ConfigError::NotFound(path.display().to_string())),
        None => info!("No '{}' found; using built-in defaults.", path.display()),
    }

    let settings = builder
        .add_source(
            Environment::with_prefix("HANDELINGEN")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("groups")
                .with_list_parse_key("fetch.retryable_status")
                .with_list_parse_key("retry_fetch.retryable_status")
                .with_list_parse_key("analysis.finding_fields"),
        )
        .build()?;

    let mut config: AppConfig = settings.try_deserialize()?;

    if config.analysis.api_key.as_deref().is_none_or(str::is_empty) {
        config.analysis.api_key = env::var(API_KEY_VAR).ok().filter(|k| !k.is_empty());
    }

    Ok(config)
}
