//! Integration tests for recording completions and reconciling after restart.
//!
//! Validates:
//! - a finished run writes its result file and closes its ledger session
//! - result files written while no controller ran are adopted exactly once
//! - sessions whose process died without a result are marked orphaned
//! - a run keeps being supervised when its launch cannot be written to the ledger

use std::fs;
use std::time::Duration;

use chrono::Utc;
use issue_conductor::models::monitor::AgentMonitor;
use issue_conductor::models::result::AgentResultFile;
use issue_conductor::models::session::{SessionDraft, SessionMode};
use issue_conductor::orchestrator::completion::{record_completion, run_to_completion, CompletedRun};
use issue_conductor::orchestrator::reconcile::reconcile_stores;
use issue_conductor::orchestrator::supervisor::{attach_stream_monitor, spawn_background_agent};
use issue_conductor::persistence::result_store::ResultStore;
use issue_conductor::persistence::session_store::SessionStore;
use issue_conductor::AppError;
use tokio::time::timeout;

use super::test_helpers::{fake_agent, spawn_options, test_config};

fn finished_monitor() -> AgentMonitor {
    AgentMonitor {
        session_id: Some("sess-9".into()),
        last_tool_use: Some("Edit".into()),
        last_text: Some("Implemented the fix".into()),
        is_running: false,
        artifacts: vec!["src/login.rs".into()],
    }
}

fn completed_run(results: &ResultStore, ledger_id: Option<String>) -> CompletedRun {
    CompletedRun {
        ledger_id,
        repo_full_name: "octo/cat".into(),
        issue_number: 7,
        phase: "implement".into(),
        started_at: Utc::now(),
        result_file_path: results.path_for("octo/cat", 7, "implement"),
        exit_code: 0,
    }
}

#[test]
fn completion_closes_open_session() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let results = ResultStore::new(tmp.path().join("agent-results"));
    let sessions = SessionStore::new(tmp.path().join("enrichment.json"));
    let mut draft = SessionDraft::started("octo/cat", 7, "implement", SessionMode::Background);
    draft.pid = Some(555);
    let open = sessions.record(draft).expect("record launch");

    let run = completed_run(&results, Some(open.id.clone()));
    let record = record_completion(&run, &finished_monitor(), &results, &sessions)
        .expect("record completion");

    assert_eq!(record.session_id, "sess-9");
    assert_eq!(record.issue_ref, "octo/cat#7");
    assert_eq!(record.summary.as_deref(), Some("Implemented the fix"));
    assert_eq!(record.artifacts, vec!["src/login.rs"]);
    assert_eq!(results.read(&run.result_file_path), Some(record.clone()));

    let ledger = sessions.load();
    assert_eq!(ledger.sessions.len(), 1);
    let closed = &ledger.sessions[0];
    assert_eq!(closed.id, open.id);
    assert_eq!(closed.pid, Some(555));
    assert_eq!(closed.exit_code, Some(0));
    assert_eq!(closed.exited_at, Some(record.completed_at));
    assert_eq!(closed.claude_session_id.as_deref(), Some("sess-9"));
    assert_eq!(
        closed.result_file.as_deref(),
        Some(run.result_file_path.to_str().expect("utf8 path"))
    );
}

#[test]
fn completion_without_ledger_entry_appends_one() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let results = ResultStore::new(tmp.path().join("agent-results"));
    let sessions = SessionStore::new(tmp.path().join("enrichment.json"));

    let run = completed_run(&results, Some("forgotten".into()));
    record_completion(&run, &AgentMonitor::default(), &results, &sessions)
        .expect("record completion");

    let ledger = sessions.load();
    assert_eq!(ledger.sessions.len(), 1);
    assert_eq!(ledger.sessions[0].mode, SessionMode::Background);
    assert!(ledger.sessions[0].claude_session_id.is_none());
    assert!(!ledger.sessions[0].is_active());
}

#[test]
fn restart_adopts_results_once() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let results = ResultStore::new(tmp.path().join("agent-results"));
    let sessions = SessionStore::new(tmp.path().join("enrichment.json"));
    fs::write(sessions.path(), r#"{"nudges":{"octo/cat#7":true}}"#).expect("seed ledger");

    let run = completed_run(&results, None);
    let record = AgentResultFile {
        session_id: "sess-offline".into(),
        phase: run.phase.clone(),
        issue_ref: "octo/cat#7".into(),
        started_at: run.started_at,
        completed_at: run.started_at + chrono::Duration::minutes(40),
        exit_code: 0,
        artifacts: Vec::new(),
        summary: None,
    };
    results.write(&run.result_file_path, &record).expect("write result");

    let first = reconcile_stores(&sessions, &results).expect("first pass");
    let second = reconcile_stores(&sessions, &results).expect("second pass");

    assert_eq!(first.adopted.len(), 1);
    assert!(second.is_empty());
    let ledger = sessions.load();
    assert_eq!(ledger.sessions.len(), 1);
    assert_eq!(ledger.sessions[0].claude_session_id.as_deref(), Some("sess-offline"));
    assert_eq!(ledger.other["nudges"]["octo/cat#7"], true);
}

#[test]
fn dead_process_without_result_is_orphaned() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let results = ResultStore::new(tmp.path().join("agent-results"));
    let sessions = SessionStore::new(tmp.path().join("enrichment.json"));

    let mut child = std::process::Command::new("true").spawn().expect("spawn true");
    let pid = child.id();
    child.wait().expect("reap true");

    let mut draft = SessionDraft::started("octo/cat", 7, "implement", SessionMode::Background);
    draft.pid = Some(pid);
    sessions.record(draft).expect("record launch");

    let report = reconcile_stores(&sessions, &results).expect("reconcile");

    assert_eq!(report.orphaned.len(), 1);
    let ledger = sessions.load();
    assert!(!ledger.sessions[0].is_active());
    assert_eq!(ledger.sessions[0].exit_code, None);
}

#[tokio::test]
async fn supervised_run_is_recorded_and_not_readopted() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let agent = fake_agent(
        tmp.path(),
        r#"echo '{"type":"system","session_id":"sess-live"}'
echo '{"type":"assistant","message":{"content":[{"type":"text","text":"all green"}]}}'"#,
    );
    let config = test_config(tmp.path(), &agent);
    let results = ResultStore::new(config.results_dir());
    let sessions = SessionStore::new(config.ledger_path());
    let options = spawn_options(tmp.path());

    let launched = spawn_background_agent(&options, &config).expect("spawn");
    let mut draft = SessionDraft::started("octo/cat", 7, "implement", SessionMode::Background);
    draft.pid = Some(launched.pid);
    draft.started_at = launched.started_at;
    let open = sessions.record(draft).expect("record launch");

    let handle = attach_stream_monitor(launched.child, None, None);
    let state = handle.subscribe();
    let exit_code = timeout(Duration::from_secs(15), handle.wait())
        .await
        .expect("agent exits");
    let monitor = state.borrow().clone();

    let run = CompletedRun {
        ledger_id: Some(open.id),
        repo_full_name: options.repo_full_name.clone(),
        issue_number: options.issue_number,
        phase: options.phase.clone(),
        started_at: launched.started_at,
        result_file_path: launched.result_file_path,
        exit_code,
    };
    let record = record_completion(&run, &monitor, &results, &sessions).expect("record");
    assert_eq!(record.session_id, "sess-live");
    assert_eq!(record.summary.as_deref(), Some("all green"));

    let report = reconcile_stores(&sessions, &results).expect("reconcile");
    assert!(report.is_empty());
    assert_eq!(sessions.load().sessions.len(), 1);
}

#[tokio::test]
async fn run_to_completion_records_launch_and_outcome() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let agent = fake_agent(
        tmp.path(),
        r#"echo '{"type":"system","session_id":"sess-run"}'
exit 2"#,
    );
    let config = test_config(tmp.path(), &agent);
    let results = ResultStore::new(config.results_dir());
    let sessions = SessionStore::new(config.ledger_path());

    let record = timeout(
        Duration::from_secs(15),
        run_to_completion(&spawn_options(tmp.path()), &config, &results, &sessions, None),
    )
    .await
    .expect("agent exits")
    .expect("run recorded");

    assert_eq!(record.exit_code, 2);
    assert_eq!(record.session_id, "sess-run");
    let ledger = sessions.load().sessions;
    assert_eq!(ledger.len(), 1);
    assert!(ledger[0].pid.is_some());
    assert_eq!(ledger[0].exit_code, Some(2));
    assert_eq!(ledger[0].claude_session_id.as_deref(), Some("sess-run"));
}

#[tokio::test]
async fn unwritable_ledger_does_not_abandon_the_run() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let agent = fake_agent(
        tmp.path(),
        r#"echo '{"type":"assistant","message":{"content":[{"type":"text","text":"finished anyway"}]}}'"#,
    );
    let config = test_config(tmp.path(), &agent);
    fs::create_dir_all(config.ledger_path()).expect("block ledger path with a directory");
    let results = ResultStore::new(config.results_dir());
    let sessions = SessionStore::new(config.ledger_path());

    let outcome = timeout(
        Duration::from_secs(15),
        run_to_completion(&spawn_options(tmp.path()), &config, &results, &sessions, None),
    )
    .await
    .expect("agent exits");

    assert!(matches!(outcome, Err(AppError::Persistence(_))));
    let record = results
        .read(&results.path_for("octo/cat", 7, "implement"))
        .expect("result file written after supervision");
    assert_eq!(record.exit_code, 0);
    assert_eq!(record.summary.as_deref(), Some("finished anyway"));
}
