//! Agent orchestration modules.
//!
//! Covers interactive launches into tmux or a terminal app, supervised
//! background runs with stream monitoring, completion recording, and
//! reconciliation of work finished while no controller was running.

use std::path::{Path, PathBuf};

use crate::config::GlobalConfig;
use crate::errors::LaunchError;
use crate::models::launch::{LaunchSpec, SpawnOptions};

pub mod codec;
pub mod completion;
pub mod interactive;
pub mod launcher;
pub mod liveness;
pub mod reconcile;
pub mod shell;
pub mod stream;
pub mod supervisor;
pub mod terminal;

pub use interactive::LaunchTarget;
pub use supervisor::BackgroundLaunch;

/// Environment variable carrying the repository full name.
pub const ENV_REPO: &str = "CONDUCTOR_REPO";

/// Environment variable carrying the issue number.
pub const ENV_ISSUE: &str = "CONDUCTOR_ISSUE";

/// Environment variable carrying the phase name.
pub const ENV_PHASE: &str = "CONDUCTOR_PHASE";

/// A fire-and-forget launch; the process is never observed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetachedLaunch {
    /// Where the agent was opened.
    pub target: LaunchTarget,
    /// Pid of the launching helper process, when the OS reported one.
    pub pid: Option<u32>,
}

/// Result of any launch: detached and forgotten, or supervised.
#[derive(Debug)]
pub enum LaunchOutcome {
    /// Interactive launch into a visible window.
    Detached(DetachedLaunch),
    /// Headless child with piped output.
    Supervised(BackgroundLaunch),
}

/// A launch request of either kind.
#[derive(Debug, Clone)]
pub enum LaunchRequest {
    /// Open an interactive window.
    Interactive(LaunchSpec),
    /// Spawn a headless agent.
    Background(SpawnOptions),
}

/// Launch an agent, interactive or background.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns the tagged [`LaunchError`] from the selected path.
pub fn launch(
    request: &LaunchRequest,
    config: &GlobalConfig,
) -> Result<LaunchOutcome, LaunchError> {
    match request {
        LaunchRequest::Interactive(spec) => {
            interactive::launch_interactive(spec, config).map(LaunchOutcome::Detached)
        }
        LaunchRequest::Background(options) => {
            supervisor::spawn_background_agent(options, config).map(LaunchOutcome::Supervised)
        }
    }
}

/// The working directory must exist.
///
/// # Errors
///
/// Returns `LaunchError::DirectoryNotFound` otherwise.
pub fn ensure_directory(path: &Path) -> Result<(), LaunchError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(LaunchError::DirectoryNotFound(format!(
            "directory not found: {}",
            path.display()
        )))
    }
}

/// The agent executable must be discoverable on the execution path.
///
/// # Errors
///
/// Returns `LaunchError::ClaudeNotFound` otherwise.
pub fn ensure_agent_executable(executable: &str) -> Result<PathBuf, LaunchError> {
    which::which(executable).map_err(|err| {
        LaunchError::ClaudeNotFound(format!("{executable} not found on PATH: {err}"))
    })
}
