//! Unit tests for the on-disk result file store.

use std::collections::HashSet;
use std::fs;

use chrono::{Duration, TimeZone, Utc};
use issue_conductor::models::result::AgentResultFile;
use issue_conductor::models::session::SessionMode;
use issue_conductor::persistence::result_store::{
    result_file_name, session_from_result, ResultStore,
};

fn sample_record() -> AgentResultFile {
    let started_at = Utc.with_ymd_and_hms(2026, 3, 1, 22, 0, 0).unwrap();
    AgentResultFile {
        session_id: "sess-1".into(),
        phase: "plan".into(),
        issue_ref: "octo/cat#7".into(),
        started_at,
        completed_at: started_at + Duration::minutes(30),
        exit_code: 0,
        artifacts: vec!["docs/plans/fix.md".into()],
        summary: Some("Plan written".into()),
    }
}

#[test]
fn file_name_flattens_repo() {
    assert_eq!(result_file_name("octo/cat", 7, "plan"), "octo-cat-7-plan.json");
}

#[test]
fn path_for_is_deterministic() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ResultStore::new(tmp.path().join("agent-results"));
    let first = store.path_for("octo/cat", 7, "plan");
    let second = store.path_for("octo/cat", 7, "plan");
    assert_eq!(first, second);
    assert_eq!(first, tmp.path().join("agent-results/octo-cat-7-plan.json"));
}

#[test]
fn write_creates_directory_and_reads_back() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ResultStore::new(tmp.path().join("nested/results"));
    let path = store.path_for("octo/cat", 7, "plan");

    store.write(&path, &sample_record()).unwrap();

    assert_eq!(store.read(&path), Some(sample_record()));
    let raw: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    assert_eq!(raw["issueRef"], "octo/cat#7");
    assert_eq!(raw["exitCode"], 0);
}

#[cfg(unix)]
#[test]
fn written_files_are_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let tmp = tempfile::tempdir().unwrap();
    let store = ResultStore::new(tmp.path().to_path_buf());
    let path = store.path_for("octo/cat", 7, "plan");
    store.write(&path, &sample_record()).unwrap();

    let mode = fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn rewrite_replaces_previous_result() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ResultStore::new(tmp.path().to_path_buf());
    let path = store.path_for("octo/cat", 7, "plan");
    store.write(&path, &sample_record()).unwrap();

    let mut second = sample_record();
    second.exit_code = 2;
    store.write(&path, &second).unwrap();

    assert_eq!(store.read(&path).map(|r| r.exit_code), Some(2));
    assert_eq!(store.list().len(), 1);
}

#[test]
fn read_tolerates_missing_and_malformed_files() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ResultStore::new(tmp.path().to_path_buf());
    assert_eq!(store.read(&tmp.path().join("absent.json")), None);

    let broken = tmp.path().join("broken.json");
    fs::write(&broken, "{ not json").unwrap();
    assert_eq!(store.read(&broken), None);
}

#[test]
fn list_returns_sorted_json_files_only() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ResultStore::new(tmp.path().to_path_buf());
    fs::write(tmp.path().join("b.json"), "{}").unwrap();
    fs::write(tmp.path().join("a.json"), "{}").unwrap();
    fs::write(tmp.path().join("notes.txt"), "x").unwrap();
    fs::create_dir(tmp.path().join("dir.json")).unwrap();

    let listed = store.list();
    assert_eq!(
        listed,
        vec![tmp.path().join("a.json"), tmp.path().join("b.json")]
    );
}

#[test]
fn list_of_missing_directory_is_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ResultStore::new(tmp.path().join("never-created"));
    assert!(store.list().is_empty());
}

#[test]
fn find_unprocessed_excludes_known_paths() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ResultStore::new(tmp.path().to_path_buf());
    let done = store.path_for("octo/cat", 1, "plan");
    let fresh = store.path_for("octo/cat", 2, "plan");
    store.write(&done, &sample_record()).unwrap();
    store.write(&fresh, &sample_record()).unwrap();

    let processed: HashSet<_> = [done].into_iter().collect();
    assert_eq!(store.find_unprocessed(&processed), vec![fresh]);
}

#[test]
fn session_from_result_builds_background_draft() {
    let record = sample_record();
    let path = std::path::Path::new("/results/octo-cat-7-plan.json");
    let draft = session_from_result(&record, path).expect("draft");

    assert!(draft.id.is_none());
    assert_eq!(draft.repo, "octo/cat");
    assert_eq!(draft.issue_number, 7);
    assert_eq!(draft.phase, "plan");
    assert_eq!(draft.mode, SessionMode::Background);
    assert_eq!(draft.claude_session_id.as_deref(), Some("sess-1"));
    assert_eq!(draft.started_at, record.started_at);
    assert_eq!(draft.exited_at, Some(record.completed_at));
    assert_eq!(draft.exit_code, Some(0));
    assert_eq!(
        draft.result_file.as_deref(),
        Some("/results/octo-cat-7-plan.json")
    );
}

#[test]
fn session_from_result_rejects_bad_issue_ref() {
    let mut record = sample_record();
    record.issue_ref = "octo/cat".into();
    assert!(session_from_result(&record, std::path::Path::new("x.json")).is_none());

    record.issue_ref = "octo/cat#seven".into();
    assert!(session_from_result(&record, std::path::Path::new("x.json")).is_none());
}

#[test]
fn empty_agent_session_id_is_dropped() {
    let mut record = sample_record();
    record.session_id = String::new();
    let draft = session_from_result(&record, std::path::Path::new("x.json")).unwrap();
    assert!(draft.claude_session_id.is_none());
}
