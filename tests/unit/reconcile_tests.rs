//! Unit tests for reconciling the ledger with on-disk result files.

use chrono::{DateTime, Duration, TimeZone, Utc};
use issue_conductor::models::result::AgentResultFile;
use issue_conductor::models::session::{AgentSession, SessionMode};
use issue_conductor::orchestrator::reconcile::{processed_results, reconcile, superseded_results};
use issue_conductor::persistence::result_store::ResultStore;

fn launched(id: &str, issue: u64, phase: &str, pid: Option<u32>) -> AgentSession {
    AgentSession {
        id: id.into(),
        repo: "octo/cat".into(),
        issue_number: issue,
        phase: phase.into(),
        mode: SessionMode::Background,
        claude_session_id: None,
        pid,
        started_at: Utc.with_ymd_and_hms(2026, 6, 1, 23, 0, 0).unwrap(),
        exited_at: None,
        exit_code: None,
        result_file: None,
    }
}

fn write_result(store: &ResultStore, issue: u64, phase: &str, exit_code: i32) -> std::path::PathBuf {
    let started_at = Utc.with_ymd_and_hms(2026, 6, 1, 23, 0, 5).unwrap();
    write_result_at(store, issue, phase, exit_code, started_at)
}

fn write_result_at(
    store: &ResultStore,
    issue: u64,
    phase: &str,
    exit_code: i32,
    started_at: DateTime<Utc>,
) -> std::path::PathBuf {
    let record = AgentResultFile {
        session_id: format!("agent-{issue}"),
        phase: phase.into(),
        issue_ref: format!("octo/cat#{issue}"),
        started_at,
        completed_at: started_at + Duration::hours(2),
        exit_code,
        artifacts: Vec::new(),
        summary: Some("done".into()),
    };
    let path = store.path_for("octo/cat", issue, phase);
    store.write(&path, &record).unwrap();
    path
}

fn never_alive(_pid: u32) -> bool {
    false
}

fn always_alive(_pid: u32) -> bool {
    true
}

#[test]
fn unmatched_result_is_appended() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ResultStore::new(tmp.path().to_path_buf());
    let path = write_result(&store, 7, "plan", 0);
    let mut sessions = Vec::new();

    let report = reconcile(&mut sessions, &store, &never_alive);

    assert_eq!(report.adopted.len(), 1);
    assert!(report.orphaned.is_empty());
    assert_eq!(sessions.len(), 1);
    let adopted = &sessions[0];
    assert_eq!(adopted.issue_number, 7);
    assert_eq!(adopted.mode, SessionMode::Background);
    assert_eq!(adopted.exit_code, Some(0));
    assert_eq!(adopted.claude_session_id.as_deref(), Some("agent-7"));
    assert_eq!(adopted.result_file.as_deref(), Some(path.to_str().unwrap()));
}

#[test]
fn matching_active_session_is_closed_in_place() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ResultStore::new(tmp.path().to_path_buf());
    write_result(&store, 7, "implement", 2);
    let mut sessions = vec![launched("run-1", 7, "implement", Some(4321))];

    let report = reconcile(&mut sessions, &store, &never_alive);

    assert_eq!(report.adopted.len(), 1);
    assert!(report.orphaned.is_empty(), "a session with a result is not orphaned");
    assert_eq!(sessions.len(), 1);
    let closed = &sessions[0];
    assert_eq!(closed.id, "run-1");
    assert_eq!(closed.pid, Some(4321));
    assert_eq!(closed.exit_code, Some(2));
    assert!(!closed.is_active());
    assert_eq!(closed.started_at, launched("x", 7, "implement", None).started_at);
}

#[test]
fn other_phase_session_is_not_closed() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ResultStore::new(tmp.path().to_path_buf());
    write_result(&store, 7, "plan", 0);
    let mut sessions = vec![launched("run-1", 7, "review", Some(4321))];

    reconcile(&mut sessions, &store, &always_alive);

    assert_eq!(sessions.len(), 2);
    assert!(sessions[0].is_active());
}

#[test]
fn processed_results_are_not_adopted_twice() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ResultStore::new(tmp.path().to_path_buf());
    write_result(&store, 7, "plan", 0);
    write_result(&store, 8, "plan", 0);
    let mut sessions = Vec::new();

    let first = reconcile(&mut sessions, &store, &never_alive);
    let second = reconcile(&mut sessions, &store, &never_alive);

    assert_eq!(first.adopted.len(), 2);
    assert!(second.is_empty());
    assert_eq!(sessions.len(), 2);
    assert_eq!(processed_results(&sessions).len(), 2);
}

#[test]
fn malformed_result_files_are_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ResultStore::new(tmp.path().to_path_buf());
    std::fs::write(tmp.path().join("broken.json"), "{").unwrap();
    let mut sessions = Vec::new();

    let report = reconcile(&mut sessions, &store, &never_alive);

    assert!(report.is_empty());
    assert!(sessions.is_empty());
}

#[test]
fn dead_pid_without_result_is_orphaned() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ResultStore::new(tmp.path().to_path_buf());
    let mut sessions = vec![launched("run-1", 7, "plan", Some(999))];

    let report = reconcile(&mut sessions, &store, &never_alive);

    assert_eq!(report.orphaned.len(), 1);
    assert!(!sessions[0].is_active());
    assert_eq!(sessions[0].exit_code, None);
}

#[test]
fn live_or_untracked_sessions_are_left_alone() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ResultStore::new(tmp.path().to_path_buf());
    let mut interactive = launched("tty", 9, "plan", None);
    interactive.mode = SessionMode::Interactive;
    let mut sessions = vec![
        launched("alive", 7, "plan", Some(999)),
        launched("no-pid", 8, "plan", None),
        interactive,
    ];

    let report = reconcile(&mut sessions, &store, &always_alive);

    assert!(report.is_empty());
    assert!(sessions.iter().all(AgentSession::is_active));
}

#[test]
fn processed_results_reads_result_file_fields() {
    let mut with_file = launched("a", 1, "plan", None);
    with_file.result_file = Some("/results/octo-cat-1-plan.json".into());
    let sessions = vec![with_file, launched("b", 2, "plan", None)];

    let processed = processed_results(&sessions);

    assert_eq!(processed.len(), 1);
    assert!(processed.contains(std::path::Path::new("/results/octo-cat-1-plan.json")));
}

/// Ledger after one finished plan run for #7, plus a second plan run
/// launched later that is still marked active.
fn rerun_ledger(store: &ResultStore) -> Vec<AgentSession> {
    let first_path = write_result(store, 7, "plan", 0);
    let first_record = store.read(&first_path).unwrap();
    let mut first = launched("run-1", 7, "plan", Some(111));
    first.exited_at = Some(first_record.completed_at);
    first.exit_code = Some(0);
    first.result_file = Some(first_path.display().to_string());

    let mut second = launched("run-2", 7, "plan", Some(222));
    second.started_at = first_record.completed_at + Duration::hours(1);
    vec![first, second]
}

#[test]
fn rerun_with_only_a_stale_result_is_orphaned() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ResultStore::new(tmp.path().to_path_buf());
    let mut sessions = rerun_ledger(&store);

    let report = reconcile(&mut sessions, &store, &never_alive);

    assert!(report.adopted.is_empty(), "the earlier run's result is already recorded");
    assert_eq!(report.orphaned.len(), 1);
    assert_eq!(report.orphaned[0].id, "run-2");
    assert!(!sessions[1].is_active());
    assert_eq!(sessions[1].exit_code, None);
    assert_eq!(sessions[1].result_file, None);
}

#[test]
fn rerun_result_overwriting_a_processed_path_is_adopted() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ResultStore::new(tmp.path().to_path_buf());
    let mut sessions = rerun_ledger(&store);
    let rerun_started = sessions[1].started_at;
    write_result_at(&store, 7, "plan", 4, rerun_started + Duration::seconds(5));

    assert_eq!(superseded_results(&sessions, &store).len(), 1);
    let report = reconcile(&mut sessions, &store, &never_alive);

    assert_eq!(report.adopted.len(), 1);
    assert!(report.orphaned.is_empty());
    assert_eq!(sessions.len(), 2);
    let second = &sessions[1];
    assert_eq!(second.id, "run-2");
    assert_eq!(second.pid, Some(222));
    assert_eq!(second.started_at, rerun_started);
    assert_eq!(second.exit_code, Some(4));
    assert!(!second.is_active());
    assert_eq!(sessions[0].exit_code, Some(0), "the first run keeps its outcome");

    let again = reconcile(&mut sessions, &store, &never_alive);
    assert!(again.is_empty());
    assert!(superseded_results(&sessions, &store).is_empty());
}
