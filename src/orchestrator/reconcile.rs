//! Catching the ledger up with work done while no controller was running.
//!
//! Result files are the source of truth for completed background runs. Any
//! file not yet referenced by a ledger session is adopted, as is a referenced
//! file that a later run of the same phase has overwritten. Any active
//! background session whose process is gone and left no result of its own is
//! closed as orphaned with no exit code.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::models::session::{AgentSession, SessionMode};
use crate::orchestrator::liveness::is_process_alive;
use crate::persistence::result_store::{session_from_result, ResultStore};
use crate::persistence::session_store::{upsert_session, SessionStore};
use crate::Result;

/// What a reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Sessions created or closed from unprocessed result files.
    pub adopted: Vec<AgentSession>,
    /// Active background sessions closed because their process died.
    pub orphaned: Vec<AgentSession>,
}

impl ReconcileReport {
    /// Whether the pass changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adopted.is_empty() && self.orphaned.is_empty()
    }
}

/// Result files already referenced by a ledger session.
#[must_use]
pub fn processed_results(sessions: &[AgentSession]) -> HashSet<PathBuf> {
    sessions
        .iter()
        .filter_map(|s| s.result_file.as_deref())
        .map(PathBuf::from)
        .collect()
}

/// Referenced result files rewritten after every session that references them
/// had already exited.
///
/// Result paths are shared by every run of a (repo, issue, phase), so a
/// processed path can hold a newer run's record.
#[must_use]
pub fn superseded_results(sessions: &[AgentSession], results: &ResultStore) -> Vec<PathBuf> {
    let mut covered: BTreeMap<PathBuf, DateTime<Utc>> = BTreeMap::new();
    for session in sessions {
        let Some(path) = session.result_file.as_deref() else {
            continue;
        };
        let seen = session.exited_at.unwrap_or(session.started_at);
        covered
            .entry(PathBuf::from(path))
            .and_modify(|latest| *latest = (*latest).max(seen))
            .or_insert(seen);
    }

    covered
        .into_iter()
        .filter(|(path, seen)| {
            results
                .read(path)
                .is_some_and(|record| record.completed_at > *seen)
        })
        .map(|(path, _)| path)
        .collect()
}

/// Reconcile `sessions` against the result directory.
///
/// An adopted result closes the first active background session for the
/// same (repo, issue, phase) that started no later than the result
/// completed; otherwise it is appended as a new session.
pub fn reconcile(
    sessions: &mut Vec<AgentSession>,
    results: &ResultStore,
    is_alive: &dyn Fn(u32) -> bool,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    let processed = processed_results(sessions);
    let mut pending = results.find_unprocessed(&processed);
    pending.extend(superseded_results(sessions, results));

    for path in pending {
        let Some(record) = results.read(&path) else {
            continue;
        };
        let Some(mut draft) = session_from_result(&record, &path) else {
            warn!(
                path = %path.display(),
                issue_ref = record.issue_ref,
                "result file has no usable issue reference"
            );
            continue;
        };

        let open = sessions.iter().find(|s| {
            s.mode == SessionMode::Background
                && s.is_active()
                && s.is_for(&draft.repo, draft.issue_number)
                && s.phase == draft.phase
                && s.started_at <= record.completed_at
        });
        if let Some(open) = open {
            draft.id = Some(open.id.clone());
            draft.pid = open.pid;
            draft.started_at = open.started_at;
        }

        let session = upsert_session(sessions, draft);
        debug!(session = session.id, path = %path.display(), "result file adopted");
        report.adopted.push(session);
    }

    let now = Utc::now();
    for session in sessions.iter_mut() {
        if session.mode != SessionMode::Background || !session.is_active() {
            continue;
        }
        let Some(pid) = session.pid else {
            continue;
        };
        if is_alive(pid) {
            continue;
        }
        let own_result = results
            .read(&results.path_for(&session.repo, session.issue_number, &session.phase))
            .is_some_and(|record| record.completed_at >= session.started_at);
        if own_result {
            continue;
        }
        session.exited_at = Some(now);
        session.exit_code = None;
        warn!(session = session.id, pid, "background session orphaned");
        report.orphaned.push(session.clone());
    }

    report
}

/// Load the ledger, reconcile it with live process probes, and save it if
/// anything changed.
///
/// # Errors
///
/// Returns `AppError::Persistence` if the updated ledger cannot be saved.
pub fn reconcile_stores(store: &SessionStore, results: &ResultStore) -> Result<ReconcileReport> {
    let mut enrichment = store.load();
    let report = reconcile(&mut enrichment.sessions, results, &is_process_alive);
    if !report.is_empty() {
        store.save(&enrichment)?;
    }
    info!(
        adopted = report.adopted.len(),
        orphaned = report.orphaned.len(),
        "reconciliation finished"
    );
    Ok(report)
}
