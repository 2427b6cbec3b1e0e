//! Fire-and-forget process spawning for interactive launches.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

/// A fully composed process invocation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program to execute.
    pub program: String,
    /// Arguments passed verbatim (no shell parsing).
    pub args: Vec<String>,
    /// Extra environment variables.
    pub env: BTreeMap<String, String>,
    /// Working directory for the process.
    pub working_dir: Option<PathBuf>,
}

impl CommandSpec {
    /// A spec for `program` with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// Spawns detached processes. The launch chain never waits on them.
pub trait ProcessLauncher: Send + Sync {
    /// Start `spec` without waiting; returns the child's pid when known.
    ///
    /// # Errors
    ///
    /// Returns the OS error when the process cannot be created.
    fn spawn_detached(&self, spec: &CommandSpec) -> std::io::Result<Option<u32>>;
}

/// Launcher backed by real OS processes.
///
/// Must be used from within a Tokio runtime; dropped children are reaped by
/// the runtime in the background.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl ProcessLauncher for SystemLauncher {
    fn spawn_detached(&self, spec: &CommandSpec) -> std::io::Result<Option<u32>> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false);
        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn()?;
        let pid = child.id();
        debug!(program = spec.program, pid = ?pid, "detached process spawned");
        Ok(pid)
    }
}
