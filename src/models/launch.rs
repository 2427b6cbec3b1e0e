//! Launch request values constructed by callers and consumed once.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::AppError;

/// Where an interactive agent should be opened.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LaunchMode {
    /// Multiplexer when already inside one, otherwise a terminal app.
    #[default]
    Auto,
    /// Always open a multiplexer window.
    Tmux,
    /// Always open a terminal application window.
    Terminal,
}

impl FromStr for LaunchMode {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "auto" => Ok(Self::Auto),
            "tmux" => Ok(Self::Tmux),
            "terminal" => Ok(Self::Terminal),
            other => Err(AppError::Config(format!("unknown launch mode: {other}"))),
        }
    }
}

/// One interactive launch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Local checkout the agent runs in.
    pub local_path: PathBuf,
    /// Issue number.
    pub issue_number: u64,
    /// Issue title.
    pub issue_title: String,
    /// Issue URL.
    pub issue_url: String,
    /// Issue body, substituted into `{body}`.
    pub issue_body: Option<String>,
    /// Workflow phase name.
    pub phase: String,
    /// Repository full name (`owner/repo`).
    pub repo_full_name: String,
    /// Command line replacing the bare agent executable.
    pub start_command: Option<String>,
    /// Prompt template overriding the phase default.
    pub prompt_template: Option<String>,
    /// Launch mode.
    pub launch_mode: LaunchMode,
    /// Terminal application name overriding detection.
    pub terminal_app: Option<String>,
}

/// One headless spawn request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnOptions {
    /// Local checkout the agent runs in.
    pub local_path: PathBuf,
    /// Repository full name (`owner/repo`).
    pub repo_full_name: String,
    /// Issue number.
    pub issue_number: u64,
    /// Issue title.
    pub issue_title: String,
    /// Issue URL.
    pub issue_url: String,
    /// Issue body, substituted into `{body}`.
    pub issue_body: Option<String>,
    /// Workflow phase name.
    pub phase: String,
    /// Prompt template overriding the phase default.
    pub template: Option<String>,
    /// Slug for `{slug}`; derived from the title when absent.
    pub slug: Option<String>,
}
