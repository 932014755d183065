//! Runtime configuration.
//!
//! Settings are layered, highest precedence first: CLI flags, environment
//! variables, a TOML config file, built-in defaults. Nothing secret lives in
//! the file itself; the API key is read from the environment variable named by
//! `lm.api_key_env`.
//!
//! ```toml
//! schema_version = 1
//!
//! [lm]
//! backend = "http"
//! endpoint = "https://api.openai.com/v1/chat/completions"
//! model = "gpt-4o"
//!
//! [lm.headers]
//! AI-Resource-Group = "default"
//!
//! [retry]
//! max_attempts = 4
//! ```
use crate::documents::OutputFormat;
use crate::lm::retry::RetryPolicy;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_SCHEMA_VERSION: u32 = 1;

pub const ENV_CONFIG: &str = "SAPDOC_CONFIG";
pub const ENV_LM_COMMAND: &str = "SAPDOC_LM_COMMAND";
pub const ENV_LM_ENDPOINT: &str = "SAPDOC_LM_ENDPOINT";
pub const ENV_MODEL: &str = "SAPDOC_MODEL";
pub const ENV_OUTPUT_DIR: &str = "SAPDOC_OUTPUT_DIR";
pub const DEFAULT_API_KEY_ENV: &str = "SAPDOC_API_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub schema_version: u32,
    pub lm: LmConfig,
    pub retry: RetryConfig,
    pub validation: ValidationConfig,
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION,
            lm: LmConfig::default(),
            retry: RetryConfig::default(),
            validation: ValidationConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LmBackend {
    Http,
    Command,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LmConfig {
    pub backend: LmBackend,
    /// Chat-completions URL for the `http` backend.
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the bearer token.
    pub api_key_env: String,
    /// Unset by default so the provider's own limit applies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub timeout_secs: u64,
    /// Command line for the `command` backend, split with shell quoting rules.
    pub command: String,
    /// Extra request headers, e.g. `AI-Resource-Group`.
    pub headers: BTreeMap<String, String>,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            backend: LmBackend::Http,
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o".to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            max_tokens: None,
            temperature: None,
            timeout_secs: 120,
            command: String::new(),
            headers: BTreeMap::new(),
        }
    }
}

impl LmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub multiplier: u32,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay_ms: 1000,
            multiplier: 2,
            max_delay_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationConfig {
    /// Total generate + review cycles before validation gives up.
    pub max_cycles: u32,
    pub self_review: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_cycles: 2,
            self_review: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            format: OutputFormat::Markdown,
        }
    }
}

/// Values supplied on the command line; `None` leaves the lower layer alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub lm_command: Option<String>,
    pub model: Option<String>,
    pub out_dir: Option<PathBuf>,
    pub format: Option<OutputFormat>,
    pub no_self_review: bool,
    pub max_cycles: Option<u32>,
}

impl Config {
    /// Build the effective config from every layer and validate it.
    ///
    /// `env` looks up an environment variable; `main` passes
    /// `std::env::var`, tests pass a map.
    pub fn resolve<E>(explicit: Option<&Path>, overrides: &Overrides, env: E) -> Result<Self>
    where
        E: Fn(&str) -> Option<String>,
    {
        let mut config = match config_path(explicit, &env)? {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config file");
                load_config(&path)?
            }
            None => Config::default(),
        };
        config.apply_env(&env);
        config.apply_overrides(overrides);
        validate_config(&config)?;
        Ok(config)
    }

    pub fn apply_env<E>(&mut self, env: E)
    where
        E: Fn(&str) -> Option<String>,
    {
        let set = |name: &str| env(name).filter(|value| !value.trim().is_empty());
        if let Some(command) = set(ENV_LM_COMMAND) {
            self.lm.backend = LmBackend::Command;
            self.lm.command = command;
        }
        if let Some(endpoint) = set(ENV_LM_ENDPOINT) {
            self.lm.endpoint = endpoint;
        }
        if let Some(model) = set(ENV_MODEL) {
            self.lm.model = model;
        }
        if let Some(dir) = set(ENV_OUTPUT_DIR) {
            self.output.dir = PathBuf::from(dir);
        }
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(command) = &overrides.lm_command {
            self.lm.backend = LmBackend::Command;
            self.lm.command = command.clone();
        }
        if let Some(model) = &overrides.model {
            self.lm.model = model.clone();
        }
        if let Some(dir) = &overrides.out_dir {
            self.output.dir = dir.clone();
        }
        if let Some(format) = overrides.format {
            self.output.format = format;
        }
        if overrides.no_self_review {
            self.validation.self_review = false;
        }
        if let Some(cycles) = overrides.max_cycles {
            self.validation.max_cycles = cycles;
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            initial_delay: Duration::from_millis(self.retry.initial_delay_ms),
            multiplier: self.retry.multiplier,
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }
}

/// Locate the config file.
///
/// An explicit `--config` or `SAPDOC_CONFIG` path must exist; the per-user
/// default is used only when present.
pub fn config_path<E>(explicit: Option<&Path>, env: E) -> Result<Option<PathBuf>>
where
    E: Fn(&str) -> Option<String>,
{
    let requested = explicit
        .map(Path::to_path_buf)
        .or_else(|| env(ENV_CONFIG).filter(|v| !v.trim().is_empty()).map(PathBuf::from));
    if let Some(path) = requested {
        if !path.is_file() {
            return Err(anyhow!("config file {} not found", path.display()));
        }
        return Ok(Some(path));
    }
    Ok(default_config_path().filter(|path| path.is_file()))
}

/// `<config dir>/sapdoc/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sapdoc").join("config.toml"))
}

pub fn load_config(path: &Path) -> Result<Config> {
    let text =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let config: Config =
        toml::from_str(&text).with_context(|| format!("parse config {}", path.display()))?;
    Ok(config)
}

pub fn validate_config(config: &Config) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {}",
            config.schema_version
        ));
    }
    config.retry_policy().validate()?;
    if config.validation.max_cycles == 0 {
        return Err(anyhow!("validation.max_cycles must be at least 1"));
    }
    let lm = &config.lm;
    if lm.timeout_secs == 0 {
        return Err(anyhow!("lm.timeout_secs must be positive"));
    }
    if let Some(temperature) = lm.temperature {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(anyhow!(
                "lm.temperature must be between 0 and 2 (got {temperature})"
            ));
        }
    }
    match lm.backend {
        LmBackend::Http => {
            if lm.endpoint.trim().is_empty() {
                return Err(anyhow!("lm.endpoint must be non-empty for the http backend"));
            }
            if lm.model.trim().is_empty() {
                return Err(anyhow!("lm.model must be non-empty for the http backend"));
            }
            if lm.api_key_env.trim().is_empty() {
                return Err(anyhow!("lm.api_key_env must name an environment variable"));
            }
        }
        LmBackend::Command => {
            if lm.command.trim().is_empty() {
                return Err(anyhow!(
                    "lm.command must be non-empty for the command backend (or pass --lm)"
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
