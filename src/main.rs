#![forbid(unsafe_code)]

//! `issue-conductor`: launches coding agents against tracked issues.
//!
//! Interactive launches open a tmux window or terminal app and return at
//! once. Background runs are supervised until the agent exits, then their
//! result is recorded for later reconciliation.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use issue_conductor::config::GlobalConfig;
use issue_conductor::models::launch::{LaunchMode, LaunchSpec, SpawnOptions};
use issue_conductor::models::monitor::StreamEvent;
use issue_conductor::models::session::{AgentSession, SessionDraft, SessionMode};
use issue_conductor::orchestrator::completion::run_to_completion;
use issue_conductor::orchestrator::interactive::launch_interactive;
use issue_conductor::orchestrator::reconcile::reconcile_stores;
use issue_conductor::orchestrator::supervisor::EventCallback;
use issue_conductor::persistence::result_store::ResultStore;
use issue_conductor::persistence::session_store::{
    find_latest_session, find_sessions, SessionStore,
};
use issue_conductor::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "issue-conductor", about = "Agent launcher for tracked issues", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Open an interactive agent in tmux or a terminal window.
    Launch {
        #[command(flatten)]
        issue: IssueArgs,
        /// Launch mode override (auto, tmux, terminal).
        #[arg(long)]
        mode: Option<LaunchMode>,
        /// Terminal application override.
        #[arg(long)]
        terminal_app: Option<String>,
        /// Command line used instead of the bare agent executable.
        #[arg(long)]
        start_command: Option<String>,
    },
    /// Run a headless agent and wait for it to finish.
    Run {
        #[command(flatten)]
        issue: IssueArgs,
        /// Slug substituted for `{slug}`.
        #[arg(long)]
        slug: Option<String>,
    },
    /// Adopt result files written while no controller was running.
    Reconcile,
    /// List ledger sessions for an issue.
    Sessions {
        /// Repository full name (`owner/repo`).
        #[arg(long)]
        repo: String,
        /// Issue number.
        #[arg(long)]
        issue: u64,
        /// Only print the latest session, optionally for one phase.
        #[arg(long)]
        latest: bool,
        /// Phase filter used with `--latest`.
        #[arg(long)]
        phase: Option<String>,
    },
}

#[derive(Debug, Args)]
struct IssueArgs {
    /// Repository full name (`owner/repo`).
    #[arg(long)]
    repo: String,
    /// Issue number.
    #[arg(long)]
    issue: u64,
    /// Issue title.
    #[arg(long)]
    title: String,
    /// Issue URL.
    #[arg(long, default_value = "")]
    url: String,
    /// Issue body.
    #[arg(long)]
    body: Option<String>,
    /// Workflow phase.
    #[arg(long)]
    phase: String,
    /// Local checkout the agent runs in.
    #[arg(long)]
    path: PathBuf,
    /// Prompt template overriding the phase default.
    #[arg(long)]
    template: Option<String>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let config = match &args.config {
        Some(path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    };
    let sessions = SessionStore::new(config.ledger_path());
    let results = ResultStore::new(config.results_dir());

    match args.command {
        Command::Launch {
            issue,
            mode,
            terminal_app,
            start_command,
        } => {
            let spec = LaunchSpec {
                local_path: issue.path,
                issue_number: issue.issue,
                issue_title: issue.title,
                issue_url: issue.url,
                issue_body: issue.body,
                phase: issue.phase,
                repo_full_name: issue.repo,
                start_command,
                prompt_template: issue.template,
                launch_mode: mode.unwrap_or(config.launch_mode),
                terminal_app,
            };
            let detached = launch_interactive(&spec, &config)?;
            let session = sessions.record(SessionDraft::started(
                &spec.repo_full_name,
                spec.issue_number,
                &spec.phase,
                SessionMode::Interactive,
            ))?;
            info!(session = session.id, target = ?detached.target, "interactive session recorded");
        }
        Command::Run { issue, slug } => {
            let options = SpawnOptions {
                local_path: issue.path,
                repo_full_name: issue.repo,
                issue_number: issue.issue,
                issue_title: issue.title,
                issue_url: issue.url,
                issue_body: issue.body,
                phase: issue.phase,
                template: issue.template,
                slug,
            };
            run_background(&options, &config, &sessions, &results).await?;
        }
        Command::Reconcile => {
            let report = reconcile_stores(&sessions, &results)?;
            for session in &report.adopted {
                println!("adopted  {}", describe(session));
            }
            for session in &report.orphaned {
                println!("orphaned {}", describe(session));
            }
        }
        Command::Sessions {
            repo,
            issue,
            latest,
            phase,
        } => {
            let ledger = sessions.load();
            let selected = if latest {
                find_latest_session(&ledger.sessions, &repo, issue, phase.as_deref())
                    .into_iter()
                    .collect()
            } else {
                find_sessions(&ledger.sessions, &repo, issue)
            };
            for session in selected {
                let line = serde_json::to_string(session).map_err(|err| {
                    AppError::Persistence(format!("failed to render session: {err}"))
                })?;
                println!("{line}");
            }
        }
    }

    Ok(())
}

async fn run_background(
    options: &SpawnOptions,
    config: &GlobalConfig,
    sessions: &SessionStore,
    results: &ResultStore,
) -> Result<()> {
    let on_event: EventCallback = Box::new(|event: &StreamEvent| {
        if let StreamEvent::ToolUse { tool_name, .. } = event {
            info!(tool = tool_name, "agent tool use");
        }
    });
    let record = run_to_completion(options, config, results, sessions, Some(on_event)).await?;
    info!(
        exit_code = record.exit_code,
        artifacts = record.artifacts.len(),
        "background run finished"
    );
    Ok(())
}

fn describe(session: &AgentSession) -> String {
    format!(
        "{} {}#{} {}",
        session.id, session.repo, session.issue_number, session.phase
    )
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
