//! Headless agent supervision.
//!
//! Spawns the agent with structured streaming output, captures stdout and
//! stderr, and folds the decoded stream into a live [`AgentMonitor`] that a
//! UI layer can poll. No kill or timeout is applied here: a background agent
//! runs until it exits on its own or is killed externally.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tracing::{debug, info, info_span, warn};

use crate::config::GlobalConfig;
use crate::errors::LaunchError;
use crate::models::launch::SpawnOptions;
use crate::models::monitor::{AgentMonitor, StreamEvent};
use crate::orchestrator::codec::StreamCodec;
use crate::orchestrator::stream::parse_stream_line;
use crate::orchestrator::{
    ensure_agent_executable, ensure_directory, ENV_ISSUE, ENV_PHASE, ENV_REPO,
};
use crate::persistence::result_store::ResultStore;
use crate::prompt::{build_prompt, slugify, IssueContext, PromptVariables};

/// Exit code reported for signal-terminated or unobservable exits.
pub const FAILURE_EXIT_CODE: i32 = 1;

/// Callback invoked for every decoded stream event.
pub type EventCallback = Box<dyn FnMut(&StreamEvent) + Send>;

/// Callback invoked once with the exit code when the child exits.
pub type ExitCallback = Box<dyn FnOnce(i32) + Send>;

/// A spawned background agent.
#[derive(Debug)]
pub struct BackgroundLaunch {
    /// Live child handle with piped stdout and stderr.
    pub child: Child,
    /// OS process id.
    pub pid: u32,
    /// Where the run's result file belongs once it completes.
    pub result_file_path: PathBuf,
    /// Spawn timestamp.
    pub started_at: DateTime<Utc>,
}

/// Spawn a headless agent for one (repo, issue, phase).
///
/// Must be called from within a Tokio runtime. The child is not killed when
/// its handle is dropped, so runs survive a controller restart.
///
/// # Errors
///
/// - `LaunchError::DirectoryNotFound` if the working directory is missing.
/// - `LaunchError::ClaudeNotFound` if the agent executable is not on PATH.
/// - `LaunchError::SpawnFailed` if the OS could not create the process.
pub fn spawn_background_agent(
    options: &SpawnOptions,
    config: &GlobalConfig,
) -> Result<BackgroundLaunch, LaunchError> {
    let span = info_span!(
        "spawn_background_agent",
        repo = options.repo_full_name,
        issue = options.issue_number,
        phase = options.phase
    );
    let _guard = span.enter();

    ensure_directory(&options.local_path)?;
    let executable = ensure_agent_executable(&config.agent_executable)?;

    let prompt = background_prompt(options, config);
    let results = ResultStore::new(config.results_dir());
    let result_file_path =
        results.path_for(&options.repo_full_name, options.issue_number, &options.phase);

    let mut cmd = Command::new(&executable);
    cmd.arg("-p")
        .arg(&prompt)
        .args(&config.background_args)
        .env(ENV_REPO, &options.repo_full_name)
        .env(ENV_ISSUE, options.issue_number.to_string())
        .env(ENV_PHASE, &options.phase)
        .current_dir(&options.local_path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(false);

    let child = cmd
        .spawn()
        .map_err(|err| LaunchError::SpawnFailed(format!("failed to spawn agent: {err}")))?;
    let pid = child
        .id()
        .ok_or_else(|| LaunchError::SpawnFailed("agent exited before reporting a pid".into()))?;

    info!(
        pid,
        executable = %executable.display(),
        result_file = %result_file_path.display(),
        "background agent spawned"
    );

    Ok(BackgroundLaunch {
        child,
        pid,
        result_file_path,
        started_at: Utc::now(),
    })
}

/// Prompt for a background run: option template, else configured phase template.
#[must_use]
pub fn background_prompt(options: &SpawnOptions, config: &GlobalConfig) -> String {
    let issue = IssueContext {
        number: options.issue_number,
        title: options.issue_title.clone(),
        url: options.issue_url.clone(),
    };
    let variables = PromptVariables {
        body: options.issue_body.clone(),
        slug: Some(
            options
                .slug
                .clone()
                .unwrap_or_else(|| slugify(&options.issue_title)),
        ),
        phase: Some(options.phase.clone()),
        repo: Some(options.repo_full_name.clone()),
    };
    let template = options
        .template
        .as_deref()
        .or_else(|| config.template_for(&options.phase));
    build_prompt(&issue, template, &variables)
}

/// Live handle on a monitored child.
#[derive(Debug)]
pub struct MonitorHandle {
    state: watch::Receiver<AgentMonitor>,
    task: JoinHandle<i32>,
}

impl MonitorHandle {
    /// Current monitor state.
    #[must_use]
    pub fn snapshot(&self) -> AgentMonitor {
        self.state.borrow().clone()
    }

    /// Receiver notified on every monitor change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AgentMonitor> {
        self.state.clone()
    }

    /// Wait for the child to exit and return its exit code.
    pub async fn wait(self) -> i32 {
        match self.task.await {
            Ok(code) => code,
            Err(err) => {
                warn!(%err, "stream monitor task failed");
                FAILURE_EXIT_CODE
            }
        }
    }
}

/// Subscribe to a child's output and track it in an [`AgentMonitor`].
///
/// Stdout is split on newlines and each line decoded; a trailing partial
/// line is flushed when the stream closes. Stderr lines are folded into
/// `last_text`. Once the child exits the monitor stops running and
/// `on_exit` receives the exit code, with signal termination reported as
/// [`FAILURE_EXIT_CODE`].
///
/// Must be called from within a Tokio runtime.
#[must_use]
pub fn attach_stream_monitor(
    mut child: Child,
    mut on_event: Option<EventCallback>,
    on_exit: Option<ExitCallback>,
) -> MonitorHandle {
    let (tx, rx) = watch::channel(AgentMonitor::running());
    let tx = Arc::new(tx);
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let pid = child.id();

    let task = tokio::spawn(async move {
        let stderr_task =
            stderr.map(|stderr| tokio::spawn(read_stderr(stderr, Arc::clone(&tx))));

        if let Some(stdout) = stdout {
            read_stdout(stdout, &tx, &mut on_event).await;
        }
        if let Some(handle) = stderr_task {
            if let Err(err) = handle.await {
                warn!(%err, "stderr reader failed");
            }
        }

        let code = match child.wait().await {
            Ok(status) => status.code().unwrap_or(FAILURE_EXIT_CODE),
            Err(err) => {
                warn!(%err, "failed to wait for agent process");
                FAILURE_EXIT_CODE
            }
        };

        tx.send_modify(|monitor| monitor.is_running = false);
        info!(pid = ?pid, exit_code = code, "background agent exited");

        if let Some(on_exit) = on_exit {
            on_exit(code);
        }
        code
    });

    MonitorHandle { state: rx, task }
}

async fn read_stdout<R>(
    stdout: R,
    tx: &watch::Sender<AgentMonitor>,
    on_event: &mut Option<EventCallback>,
) where
    R: AsyncRead + Unpin,
{
    let mut framed = FramedRead::new(stdout, StreamCodec::new());
    while let Some(item) = framed.next().await {
        match item {
            Ok(line) => {
                let Some(event) = parse_stream_line(&line) else {
                    debug!(raw_line = %line, "skipping undecodable stream line");
                    continue;
                };
                tx.send_modify(|monitor| monitor.apply(&event));
                if let Some(callback) = on_event.as_mut() {
                    callback(&event);
                }
            }
            Err(err) => {
                warn!(%err, "agent stdout read failed, stopping");
                break;
            }
        }
    }
}

async fn read_stderr<R>(stderr: R, tx: Arc<watch::Sender<AgentMonitor>>)
where
    R: AsyncRead + Unpin,
{
    let mut framed = FramedRead::new(stderr, StreamCodec::new());
    while let Some(item) = framed.next().await {
        match item {
            Ok(line) => {
                if !line.trim().is_empty() {
                    debug!(stderr = %line, "agent diagnostic output");
                    tx.send_modify(|monitor| monitor.record_diagnostic(&line));
                }
            }
            Err(err) => {
                warn!(%err, "agent stderr read failed, stopping");
                break;
            }
        }
    }
}
