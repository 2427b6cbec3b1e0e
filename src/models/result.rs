//! Durable record of one completed background run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Written once when a background agent exits; never modified afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgentResultFile {
    /// Agent-native session id reported on the stream.
    pub session_id: String,
    /// Workflow phase name.
    pub phase: String,
    /// Issue reference in `owner/repo#N` form.
    pub issue_ref: String,
    /// Launch timestamp.
    pub started_at: DateTime<Utc>,
    /// Exit timestamp.
    pub completed_at: DateTime<Utc>,
    /// Process exit code; signal-terminated runs record a failure code.
    pub exit_code: i32,
    /// Files the agent wrote or edited.
    #[serde(default)]
    pub artifacts: Vec<String>,
    /// Last text the agent produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Format an `owner/repo#N` issue reference.
#[must_use]
pub fn format_issue_ref(repo_full_name: &str, issue_number: u64) -> String {
    format!("{repo_full_name}#{issue_number}")
}

/// Split an `owner/repo#N` reference into repo and issue number.
///
/// The number must be the trailing run of ASCII digits after the last `#`
/// and the repo part must be non-empty; anything else yields `None`.
#[must_use]
pub fn parse_issue_ref(issue_ref: &str) -> Option<(String, u64)> {
    let (repo, digits) = issue_ref.rsplit_once('#')?;
    if repo.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let number = digits.parse().ok()?;
    Some((repo.to_owned(), number))
}
