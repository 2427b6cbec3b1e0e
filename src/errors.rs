//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering ambient failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// File-system or I/O operation failure.
    Io(String),
    /// Result-file or ledger write failure.
    Persistence(String),
    /// An interactive launch or background spawn was refused or failed.
    Launch(LaunchError),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::Persistence(msg) => write!(f, "persistence: {msg}"),
            Self::Launch(err) => write!(f, "launch: {err}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<LaunchError> for AppError {
    fn from(err: LaunchError) -> Self {
        Self::Launch(err)
    }
}

/// Tagged failure returned by the launch and spawn entry points.
///
/// Every variant carries a short message for the user; [`LaunchError::kind`]
/// returns the stable tag that callers match on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchError {
    /// The issue's working directory does not exist.
    DirectoryNotFound(String),
    /// The agent executable is not on the execution path.
    ClaudeNotFound(String),
    /// The multiplexer window could not be created while tmux mode was forced.
    TmuxFailed(String),
    /// Every terminal-application strategy failed to spawn.
    TerminalFailed(String),
    /// The configured terminal application name is not supported.
    TerminalAppNotFound(String),
    /// Remote shell without an active multiplexer.
    SshNoTmux(String),
    /// The OS refused to create the background agent process.
    SpawnFailed(String),
}

impl LaunchError {
    /// Stable tag identifying the failure kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DirectoryNotFound(_) => "directory-not-found",
            Self::ClaudeNotFound(_) => "claude-not-found",
            Self::TmuxFailed(_) => "tmux-failed",
            Self::TerminalFailed(_) => "terminal-failed",
            Self::TerminalAppNotFound(_) => "terminal-app-not-found",
            Self::SshNoTmux(_) => "ssh-no-tmux",
            Self::SpawnFailed(_) => "spawn-failed",
        }
    }

    /// Human-readable message paired with the tag.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::DirectoryNotFound(msg)
            | Self::ClaudeNotFound(msg)
            | Self::TmuxFailed(msg)
            | Self::TerminalFailed(msg)
            | Self::TerminalAppNotFound(msg)
            | Self::SshNoTmux(msg)
            | Self::SpawnFailed(msg) => msg,
        }
    }
}

impl Display for LaunchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind(), self.message())
    }
}

impl std::error::Error for LaunchError {}
