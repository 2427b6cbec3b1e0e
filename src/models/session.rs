//! Session ledger entries correlating a launch with its outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How the agent was launched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Attached to a visible terminal window or multiplexer pane.
    Interactive,
    /// Headless, supervised child process.
    Background,
}

/// One attempt to run an agent against a (repo, issue, phase).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgentSession {
    /// Ledger-unique identifier.
    pub id: String,
    /// Repository full name (`owner/repo`).
    pub repo: String,
    /// Issue number within the repository.
    pub issue_number: u64,
    /// Workflow phase name.
    pub phase: String,
    /// Launch mode.
    pub mode: SessionMode,
    /// Agent-native resumable session id, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claude_session_id: Option<String>,
    /// OS process id of the agent (background runs only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// Launch timestamp.
    pub started_at: DateTime<Utc>,
    /// Exit timestamp; absent while the session is active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exited_at: Option<DateTime<Utc>>,
    /// Process exit code, when observed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Result file this session was reconciled from or wrote.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_file: Option<String>,
}

impl AgentSession {
    /// Whether the session has no recorded exit.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.exited_at.is_none()
    }

    /// Whether the session belongs to the given repo and issue.
    #[must_use]
    pub fn is_for(&self, repo: &str, issue_number: u64) -> bool {
        self.repo == repo && self.issue_number == issue_number
    }
}

/// A session record whose id may not have been assigned yet.
///
/// Upserting a draft without an id appends a new ledger entry; a draft with
/// a known id replaces that entry in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDraft {
    /// Existing identifier, or `None` to allocate one.
    pub id: Option<String>,
    /// Repository full name (`owner/repo`).
    pub repo: String,
    /// Issue number within the repository.
    pub issue_number: u64,
    /// Workflow phase name.
    pub phase: String,
    /// Launch mode.
    pub mode: SessionMode,
    /// Agent-native resumable session id.
    pub claude_session_id: Option<String>,
    /// OS process id.
    pub pid: Option<u32>,
    /// Launch timestamp.
    pub started_at: DateTime<Utc>,
    /// Exit timestamp.
    pub exited_at: Option<DateTime<Utc>>,
    /// Process exit code.
    pub exit_code: Option<i32>,
    /// Source or destination result file.
    pub result_file: Option<String>,
}

impl SessionDraft {
    /// Start a draft for a launch happening now.
    #[must_use]
    pub fn started(repo: &str, issue_number: u64, phase: &str, mode: SessionMode) -> Self {
        Self {
            id: None,
            repo: repo.to_owned(),
            issue_number,
            phase: phase.to_owned(),
            mode,
            claude_session_id: None,
            pid: None,
            started_at: Utc::now(),
            exited_at: None,
            exit_code: None,
            result_file: None,
        }
    }

    /// Attach the resolved identifier, producing a ledger entry.
    #[must_use]
    pub fn into_session(self, id: String) -> AgentSession {
        AgentSession {
            id,
            repo: self.repo,
            issue_number: self.issue_number,
            phase: self.phase,
            mode: self.mode,
            claude_session_id: self.claude_session_id,
            pid: self.pid,
            started_at: self.started_at,
            exited_at: self.exited_at,
            exit_code: self.exit_code,
            result_file: self.result_file,
        }
    }
}

impl From<AgentSession> for SessionDraft {
    fn from(session: AgentSession) -> Self {
        Self {
            id: Some(session.id),
            repo: session.repo,
            issue_number: session.issue_number,
            phase: session.phase,
            mode: session.mode,
            claude_session_id: session.claude_session_id,
            pid: session.pid,
            started_at: session.started_at,
            exited_at: session.exited_at,
            exit_code: session.exit_code,
            result_file: session.result_file,
        }
    }
}
