//! Global configuration parsing and validation.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::models::launch::LaunchMode;
use crate::models::phase::Phase;
use crate::prompt::default_template;
use crate::{AppError, Result};

/// Directory name used under the platform config directory.
const APP_DIR_NAME: &str = "issue-conductor";

/// Result files live in this subdirectory of the configuration root.
const RESULTS_DIR_NAME: &str = "agent-results";

/// Session ledger file name under the configuration root.
const LEDGER_FILE_NAME: &str = "enrichment.json";

fn default_config_root() -> PathBuf {
    dirs::config_dir().map_or_else(|| PathBuf::from("."), |dir| dir.join(APP_DIR_NAME))
}

fn default_agent_executable() -> String {
    "claude".into()
}

fn default_background_args() -> Vec<String> {
    vec![
        "--output-format".into(),
        "stream-json".into(),
        "--verbose".into(),
    ]
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Root holding the result directory and the session ledger.
    #[serde(default = "default_config_root")]
    pub config_root: PathBuf,
    /// Agent binary looked up on the execution path.
    #[serde(default = "default_agent_executable")]
    pub agent_executable: String,
    /// Arguments appended to background runs to request streaming output.
    #[serde(default = "default_background_args")]
    pub background_args: Vec<String>,
    /// Default interactive launch mode.
    #[serde(default)]
    pub launch_mode: LaunchMode,
    /// Terminal application overriding environment detection.
    #[serde(default)]
    pub terminal_app: Option<String>,
    /// Prompt template overrides keyed by phase name.
    #[serde(default)]
    pub templates: HashMap<String, String>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            config_root: default_config_root(),
            agent_executable: default_agent_executable(),
            background_args: default_background_args(),
            launch_mode: LaunchMode::default(),
            terminal_app: None,
            templates: HashMap::new(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Directory holding one result file per (repo, issue, phase).
    #[must_use]
    pub fn results_dir(&self) -> PathBuf {
        self.config_root.join(RESULTS_DIR_NAME)
    }

    /// Path of the session ledger.
    #[must_use]
    pub fn ledger_path(&self) -> PathBuf {
        self.config_root.join(LEDGER_FILE_NAME)
    }

    /// Template for a phase: configured override, else the built-in default.
    #[must_use]
    pub fn template_for(&self, phase: &str) -> Option<&str> {
        self.templates
            .get(phase)
            .map(String::as_str)
            .or_else(|| default_template(phase))
    }

    fn validate(&self) -> Result<()> {
        if self.agent_executable.trim().is_empty() {
            return Err(AppError::Config(
                "agent_executable must not be empty".into(),
            ));
        }

        for phase in self.templates.keys() {
            Phase::from_str(phase).map_err(|_| {
                AppError::Config(format!("template override for unknown phase: {phase}"))
            })?;
        }

        Ok(())
    }
}
