//! Recording a finished background run.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::GlobalConfig;
use crate::models::launch::SpawnOptions;
use crate::models::monitor::AgentMonitor;
use crate::models::result::{format_issue_ref, AgentResultFile};
use crate::models::session::{SessionDraft, SessionMode};
use crate::orchestrator::supervisor::{
    attach_stream_monitor, spawn_background_agent, EventCallback,
};
use crate::persistence::result_store::{session_from_result, ResultStore};
use crate::persistence::session_store::{upsert_session, SessionStore};
use crate::Result;

/// Identity and outcome of one background run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedRun {
    /// Ledger entry opened at launch, if one was recorded.
    pub ledger_id: Option<String>,
    /// Repository full name (`owner/repo`).
    pub repo_full_name: String,
    /// Issue number.
    pub issue_number: u64,
    /// Phase name.
    pub phase: String,
    /// Launch timestamp.
    pub started_at: DateTime<Utc>,
    /// Deterministic result file path chosen at spawn time.
    pub result_file_path: PathBuf,
    /// Process exit code.
    pub exit_code: i32,
}

/// Write the result file for `run` and close its ledger session.
///
/// The ledger entry named by `run.ledger_id` is closed in place; when it is
/// missing a new background entry is appended from the result record.
///
/// # Errors
///
/// Returns `AppError::Persistence` if either file cannot be written.
pub fn record_completion(
    run: &CompletedRun,
    monitor: &AgentMonitor,
    results: &ResultStore,
    sessions: &SessionStore,
) -> Result<AgentResultFile> {
    let record = AgentResultFile {
        session_id: monitor.session_id.clone().unwrap_or_default(),
        phase: run.phase.clone(),
        issue_ref: format_issue_ref(&run.repo_full_name, run.issue_number),
        started_at: run.started_at,
        completed_at: Utc::now(),
        exit_code: run.exit_code,
        artifacts: monitor.artifacts.clone(),
        summary: monitor.last_text.clone(),
    };
    results.write(&run.result_file_path, &record)?;

    let mut enrichment = sessions.load();
    let existing = run
        .ledger_id
        .as_deref()
        .and_then(|id| enrichment.sessions.iter().find(|s| s.id == id))
        .cloned();

    let draft = match existing {
        Some(session) => Some(SessionDraft {
            claude_session_id: monitor.session_id.clone().or(session.claude_session_id.clone()),
            exited_at: Some(record.completed_at),
            exit_code: Some(record.exit_code),
            result_file: Some(run.result_file_path.display().to_string()),
            ..SessionDraft::from(session)
        }),
        None => session_from_result(&record, &run.result_file_path),
    };

    match draft {
        Some(draft) => {
            let session = upsert_session(&mut enrichment.sessions, draft);
            sessions.save(&enrichment)?;
            info!(
                session = session.id,
                issue_ref = record.issue_ref,
                exit_code = record.exit_code,
                "run completion recorded"
            );
        }
        None => warn!(
            issue_ref = record.issue_ref,
            "result written but issue reference is not ledger-addressable"
        ),
    }

    Ok(record)
}

/// Spawn a background agent, supervise it until it exits, and record the run.
///
/// The monitor is attached before the launch is written to the ledger. A
/// failed ledger write is logged and supervision continues; the completion
/// then appends the session from the result record.
///
/// # Errors
///
/// - `AppError::Launch` if the agent cannot be spawned.
/// - `AppError::Persistence` if the result file or the final ledger save fails.
pub async fn run_to_completion(
    options: &SpawnOptions,
    config: &GlobalConfig,
    results: &ResultStore,
    sessions: &SessionStore,
    on_event: Option<EventCallback>,
) -> Result<AgentResultFile> {
    let spawned = spawn_background_agent(options, config)?;
    let pid = spawned.pid;
    let monitor = attach_stream_monitor(spawned.child, on_event, None);

    let mut draft = SessionDraft::started(
        &options.repo_full_name,
        options.issue_number,
        &options.phase,
        SessionMode::Background,
    );
    draft.pid = Some(pid);
    draft.started_at = spawned.started_at;
    let ledger_id = match sessions.record(draft) {
        Ok(session) => Some(session.id),
        Err(err) => {
            warn!(%err, pid, "failed to record launched session, still supervising");
            None
        }
    };

    let state = monitor.subscribe();
    let exit_code = monitor.wait().await;
    let final_state = state.borrow().clone();

    let run = CompletedRun {
        ledger_id,
        repo_full_name: options.repo_full_name.clone(),
        issue_number: options.issue_number,
        phase: options.phase.clone(),
        started_at: spawned.started_at,
        result_file_path: spawned.result_file_path,
        exit_code,
    };
    record_completion(&run, &final_state, results, sessions)
}
