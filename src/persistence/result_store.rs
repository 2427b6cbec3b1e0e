//! On-disk result files, one per (repo, issue, phase).
//!
//! Paths are deterministic, so re-running a phase overwrites the previous
//! result for that phase. Files are never deleted here.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::models::result::{parse_issue_ref, AgentResultFile};
use crate::models::session::{SessionDraft, SessionMode};
use crate::{AppError, Result};

use super::write_atomic_private;

/// Read/write access to the result directory.
#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Directory holding the result files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deterministic path for a (repo, issue, phase) result.
    #[must_use]
    pub fn path_for(&self, repo_full_name: &str, issue_number: u64, phase: &str) -> PathBuf {
        self.dir
            .join(result_file_name(repo_full_name, issue_number, phase))
    }

    /// Persist `record` at `path` with owner-only permissions.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Persistence` if serialization or the write fails.
    pub fn write(&self, path: &Path, record: &AgentResultFile) -> Result<()> {
        let body = serde_json::to_vec_pretty(record).map_err(|err| {
            AppError::Persistence(format!("failed to serialize result file: {err}"))
        })?;
        write_atomic_private(path, &body)?;
        debug!(path = %path.display(), issue_ref = record.issue_ref, "result file written");
        Ok(())
    }

    /// Read a result file; any I/O or parse failure yields `None`.
    #[must_use]
    pub fn read(&self, path: &Path) -> Option<AgentResultFile> {
        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(err) => {
                debug!(path = %path.display(), %err, "result file unreadable");
                return None;
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(path = %path.display(), %err, "ignoring malformed result file");
                None
            }
        }
    }

    /// Result files on disk, sorted by path. A missing directory is empty.
    #[must_use]
    pub fn list(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut paths: Vec<PathBuf> = entries
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file() && path.extension().is_some_and(|ext| ext == "json")
            })
            .collect();
        paths.sort();
        paths
    }

    /// Result files present on disk but absent from `processed`.
    #[must_use]
    pub fn find_unprocessed(&self, processed: &HashSet<PathBuf>) -> Vec<PathBuf> {
        self.list()
            .into_iter()
            .filter(|path| !processed.contains(path))
            .collect()
    }
}

/// File name for a (repo, issue, phase) result: `owner-repo-N-phase.json`.
#[must_use]
pub fn result_file_name(repo_full_name: &str, issue_number: u64, phase: &str) -> String {
    format!(
        "{}-{issue_number}-{phase}.json",
        repo_full_name.replace('/', "-")
    )
}

/// Convert a result record into a background session draft.
///
/// Returns `None` when `issue_ref` is not of the form `owner/repo#N`.
#[must_use]
pub fn session_from_result(record: &AgentResultFile, path: &Path) -> Option<SessionDraft> {
    let (repo, issue_number) = parse_issue_ref(&record.issue_ref)?;
    Some(SessionDraft {
        id: None,
        repo,
        issue_number,
        phase: record.phase.clone(),
        mode: SessionMode::Background,
        claude_session_id: Some(record.session_id.clone()).filter(|id| !id.is_empty()),
        pid: None,
        started_at: record.started_at,
        exited_at: Some(record.completed_at),
        exit_code: Some(record.exit_code),
        result_file: Some(path.display().to_string()),
    })
}
