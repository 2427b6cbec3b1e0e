//! Interactive launches into a multiplexer window or a terminal app.
//!
//! Evaluated as an ordered chain: preconditions first (directory, agent
//! executable, remote-session guard), then the launch strategies in order.
//! In `auto` mode a failed multiplexer launch falls through to the terminal
//! app; a forced mode surfaces its own failure. Every launched process is
//! detached and never observed again.

use std::path::Path;

use tracing::{info, info_span, warn};

use crate::config::GlobalConfig;
use crate::errors::LaunchError;
use crate::models::launch::{LaunchMode, LaunchSpec};
use crate::orchestrator::launcher::{CommandSpec, ProcessLauncher, SystemLauncher};
use crate::orchestrator::shell::shell_quote;
use crate::orchestrator::terminal::{TerminalApp, TerminalEnvironment, TerminalLaunch};
use crate::orchestrator::{
    ensure_agent_executable, ensure_directory, DetachedLaunch, ENV_ISSUE, ENV_PHASE, ENV_REPO,
};
use crate::prompt::{build_prompt, slugify, IssueContext, PromptVariables};

/// One step of the launch chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchStrategy {
    /// New tmux window in the current server.
    Multiplexer,
    /// New terminal application window.
    TerminalApp,
}

/// Where a detached launch ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchTarget {
    /// A tmux window.
    Multiplexer,
    /// A window of this terminal application.
    Terminal(TerminalApp),
}

/// Ordered strategies for a launch mode in the given environment.
#[must_use]
pub fn plan_strategies(mode: LaunchMode, environment: &TerminalEnvironment) -> Vec<LaunchStrategy> {
    match mode {
        LaunchMode::Tmux => vec![LaunchStrategy::Multiplexer],
        LaunchMode::Auto if environment.in_tmux => {
            vec![LaunchStrategy::Multiplexer, LaunchStrategy::TerminalApp]
        }
        LaunchMode::Auto | LaunchMode::Terminal => vec![LaunchStrategy::TerminalApp],
    }
}

/// Launch an interactive agent using the live environment.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns the tagged [`LaunchError`] for the first failing precondition or
/// once every strategy has failed.
pub fn launch_interactive(
    spec: &LaunchSpec,
    config: &GlobalConfig,
) -> Result<DetachedLaunch, LaunchError> {
    launch_interactive_with(
        spec,
        config,
        &TerminalEnvironment::from_env(),
        &SystemLauncher,
    )
}

/// Launch an interactive agent with an explicit environment and launcher.
///
/// # Errors
///
/// See [`launch_interactive`].
pub fn launch_interactive_with(
    spec: &LaunchSpec,
    config: &GlobalConfig,
    environment: &TerminalEnvironment,
    launcher: &dyn ProcessLauncher,
) -> Result<DetachedLaunch, LaunchError> {
    let span = info_span!(
        "launch_interactive",
        repo = spec.repo_full_name,
        issue = spec.issue_number,
        phase = spec.phase
    );
    let _guard = span.enter();

    ensure_directory(&spec.local_path)?;
    ensure_agent_executable(&config.agent_executable)?;

    if environment.remote && !environment.in_tmux && spec.launch_mode != LaunchMode::Tmux {
        return Err(LaunchError::SshNoTmux(
            "remote session without tmux: start tmux to launch interactive agents".into(),
        ));
    }

    let prompt = interactive_prompt(spec, config);
    let agent_command = agent_command_line(spec, config, &prompt);
    let strategies = plan_strategies(spec.launch_mode, environment);

    for strategy in strategies {
        match strategy {
            LaunchStrategy::Multiplexer => {
                let command = tmux_command(spec, &agent_command);
                match launcher.spawn_detached(&command) {
                    Ok(pid) => {
                        info!(strategy = "tmux", pid = ?pid, "interactive agent launched");
                        return Ok(DetachedLaunch {
                            target: LaunchTarget::Multiplexer,
                            pid,
                        });
                    }
                    Err(err) if spec.launch_mode == LaunchMode::Tmux => {
                        return Err(LaunchError::TmuxFailed(format!(
                            "failed to open tmux window: {err}"
                        )));
                    }
                    Err(err) => {
                        warn!(%err, "tmux launch failed, falling back to terminal app");
                    }
                }
            }
            LaunchStrategy::TerminalApp => {
                let configured = spec
                    .terminal_app
                    .as_deref()
                    .or(config.terminal_app.as_deref());
                let app = TerminalApp::resolve(configured, environment)?;
                let launch = TerminalLaunch {
                    title: window_title(spec),
                    working_dir: spec.local_path.clone(),
                    shell_command: terminal_shell_command(spec, &agent_command),
                };
                let command = app.command_for(&launch);
                return match launcher.spawn_detached(&command) {
                    Ok(pid) => {
                        info!(strategy = app.name(), pid = ?pid, "interactive agent launched");
                        Ok(DetachedLaunch {
                            target: LaunchTarget::Terminal(app),
                            pid,
                        })
                    }
                    Err(err) => Err(LaunchError::TerminalFailed(format!(
                        "failed to open {}: {err}",
                        app.name()
                    ))),
                };
            }
        }
    }

    Err(LaunchError::TerminalFailed(
        "no launch strategy succeeded".into(),
    ))
}

/// Prompt for an interactive launch: launch template, else configured phase template.
#[must_use]
pub fn interactive_prompt(spec: &LaunchSpec, config: &GlobalConfig) -> String {
    let issue = IssueContext {
        number: spec.issue_number,
        title: spec.issue_title.clone(),
        url: spec.issue_url.clone(),
    };
    let variables = PromptVariables {
        body: spec.issue_body.clone(),
        slug: Some(slugify(&spec.issue_title)),
        phase: Some(spec.phase.clone()),
        repo: Some(spec.repo_full_name.clone()),
    };
    let template = spec
        .prompt_template
        .as_deref()
        .or_else(|| config.template_for(&spec.phase));
    build_prompt(&issue, template, &variables)
}

/// `<start command> '<prompt>'`, where a configured start command is trusted
/// verbatim and the bare executable is quoted.
#[must_use]
pub fn agent_command_line(spec: &LaunchSpec, config: &GlobalConfig, prompt: &str) -> String {
    let start = spec
        .start_command
        .as_deref()
        .map(str::trim)
        .filter(|cmd| !cmd.is_empty())
        .map_or_else(|| shell_quote(&config.agent_executable), str::to_owned);
    format!("{start} {}", shell_quote(prompt))
}

/// `tmux new-window` in the target directory without switching to it.
#[must_use]
pub fn tmux_command(spec: &LaunchSpec, agent_command: &str) -> CommandSpec {
    let mut command = CommandSpec::new("tmux")
        .arg("new-window")
        .arg("-d")
        .arg("-n")
        .arg(window_title(spec))
        .arg("-c")
        .arg(spec.local_path.display().to_string());
    for (key, value) in issue_env(spec) {
        command = command.arg("-e").arg(format!("{key}={value}"));
    }
    command.arg(agent_command)
}

/// Shell command run inside a new terminal window.
///
/// Path, identifiers, and title are each quoted before concatenation.
#[must_use]
pub fn terminal_shell_command(spec: &LaunchSpec, agent_command: &str) -> String {
    let exports = issue_env(spec)
        .into_iter()
        .map(|(key, value)| format!("{key}={}", shell_quote(&value)))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "cd {} && export {exports} && printf '\\033]0;%s\\007' {} && {agent_command}",
        shell_quote(&path_text(&spec.local_path)),
        shell_quote(&window_title(spec)),
    )
}

/// Short window title: `<repo name>#<issue> <phase>`.
#[must_use]
pub fn window_title(spec: &LaunchSpec) -> String {
    let repo_name = spec
        .repo_full_name
        .rsplit('/')
        .next()
        .unwrap_or(&spec.repo_full_name);
    format!("{repo_name}#{} {}", spec.issue_number, spec.phase)
}

fn issue_env(spec: &LaunchSpec) -> [(&'static str, String); 3] {
    [
        (ENV_REPO, spec.repo_full_name.clone()),
        (ENV_ISSUE, spec.issue_number.to_string()),
        (ENV_PHASE, spec.phase.clone()),
    ]
}

fn path_text(path: &Path) -> String {
    path.display().to_string()
}
