//! Launch configuration parsing, validation, and credential loading.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::protocol::SessionOptions;
use crate::{AppError, Result};

/// Agent binary launched when the configuration names none.
pub const DEFAULT_PROGRAM: &str = "codex";

/// API-key variable used when the provider declares no `env_key`.
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

fn default_program() -> String {
    DEFAULT_PROGRAM.into()
}

/// How to launch and configure the agent process.
///
/// The API key is loaded at runtime from the environment
/// ([`LaunchConfig::load_credentials`]), never from the TOML file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct LaunchConfig {
    /// Agent binary (looked up on `PATH` when not absolute).
    #[serde(default = "default_program")]
    pub program: String,
    /// Arguments placed before the protocol flags.
    #[serde(default)]
    pub program_args: Vec<String>,
    /// Working directory of the agent; the caller's directory when unset.
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// Complete environment for the agent. When unset the caller's
    /// environment is inherited.
    #[serde(default)]
    pub env: Option<HashMap<String, String>>,
    /// Session description used for launch arguments and `configure_session`.
    #[serde(default)]
    pub session: SessionOptions,
    /// Provider API key (populated at runtime).
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            program_args: Vec::new(),
            cwd: None,
            env: None,
            session: SessionOptions::default(),
            api_key: None,
        }
    }
}

impl LaunchConfig {
    /// Configuration launching `program` with every other field defaulted.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read, contains
    /// invalid TOML, or fails validation.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and normalize paths.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Name of the environment variable carrying the API key.
    #[must_use]
    pub fn api_key_env(&self) -> &str {
        self.session.api_key_env().unwrap_or(DEFAULT_API_KEY_ENV)
    }

    /// Load the API key from the process environment.
    pub fn load_credentials(&mut self) {
        self.load_credentials_with(|key| env::var(key).ok());
    }

    /// Load the API key through `lookup`, which maps a variable name to its
    /// value.
    ///
    /// A missing or empty value leaves `api_key` unset; the agent may still
    /// find a key in its inherited environment.
    pub fn load_credentials_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let key_env = self.api_key_env().to_owned();
        match lookup(&key_env).filter(|value| !value.is_empty()) {
            Some(value) => {
                debug!(env = %key_env, "api key loaded");
                self.api_key = Some(value);
            }
            None => {
                warn!(env = %key_env, "api key not set");
                self.api_key = None;
            }
        }
    }

    /// Working directory the agent runs in.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `cwd` is unset and the caller's current
    /// directory cannot be determined.
    pub fn working_dir(&self) -> Result<PathBuf> {
        match &self.cwd {
            Some(cwd) => Ok(cwd.clone()),
            None => env::current_dir()
                .map_err(|err| AppError::Config(format!("cannot determine current dir: {err}"))),
        }
    }

    fn validate(&mut self) -> Result<()> {
        if self.program.trim().is_empty() {
            return Err(AppError::Config("program must not be empty".into()));
        }

        if let Some(cwd) = &self.cwd {
            let canonical = cwd
                .canonicalize()
                .map_err(|err| AppError::Config(format!("cwd invalid: {err}")))?;
            self.cwd = Some(canonical);
        }

        Ok(())
    }
}
