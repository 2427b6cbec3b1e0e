//! Session ledger stored in `enrichment.json`.
//!
//! The ledger file also carries unrelated state (nudges, snoozes) owned by
//! other parts of the application. That state is kept verbatim across a
//! load/save cycle. Loading never fails: a missing or unreadable file yields
//! an empty ledger, and entries that do not parse as sessions are skipped
//! without discarding the rest of the file.
//!
//! Concurrent writers from two controller instances are not serialized; the
//! last rename wins.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::session::{AgentSession, SessionDraft};
use crate::{AppError, Result};

use super::write_atomic_private;

/// Contents of the enrichment file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Enrichment {
    /// Session ledger entries in insertion order.
    #[serde(default)]
    pub sessions: Vec<AgentSession>,
    /// Every other top-level field, preserved untouched.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// File-backed access to the enrichment file.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Create a store for the ledger at `path`.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Path of the ledger file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the ledger, falling back to empty on any failure.
    #[must_use]
    pub fn load(&self) -> Enrichment {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no ledger yet, starting empty");
                return Enrichment::default();
            }
            Err(err) => {
                warn!(path = %self.path.display(), %err, "ledger unreadable, starting empty");
                return Enrichment::default();
            }
        };

        let mut other = match serde_json::from_slice::<Value>(&raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                warn!(path = %self.path.display(), "ledger is not a JSON object, starting empty");
                return Enrichment::default();
            }
            Err(err) => {
                warn!(path = %self.path.display(), %err, "ledger invalid, starting empty");
                return Enrichment::default();
            }
        };

        let sessions = match other.remove("sessions") {
            Some(Value::Array(entries)) => entries
                .into_iter()
                .filter_map(|entry| self.parse_entry(entry))
                .collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(_) => {
                warn!(
                    path = %self.path.display(),
                    "ledger sessions field is not a list, ignoring it"
                );
                Vec::new()
            }
        };

        Enrichment { sessions, other }
    }

    fn parse_entry(&self, entry: Value) -> Option<AgentSession> {
        match serde_json::from_value::<AgentSession>(entry) {
            Ok(session) => Some(session),
            Err(err) => {
                warn!(path = %self.path.display(), %err, "dropping invalid ledger entry");
                None
            }
        }
    }

    /// Atomically persist the ledger with owner-only permissions.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Persistence` if serialization or the write fails.
    pub fn save(&self, enrichment: &Enrichment) -> Result<()> {
        let body = serde_json::to_vec_pretty(enrichment)
            .map_err(|err| AppError::Persistence(format!("failed to serialize ledger: {err}")))?;
        write_atomic_private(&self.path, &body)?;
        debug!(
            path = %self.path.display(),
            sessions = enrichment.sessions.len(),
            "ledger saved"
        );
        Ok(())
    }

    /// Load, upsert one session, and save.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Persistence` if the save fails.
    pub fn record(&self, draft: SessionDraft) -> Result<AgentSession> {
        let mut enrichment = self.load();
        let session = upsert_session(&mut enrichment.sessions, draft);
        self.save(&enrichment)?;
        Ok(session)
    }
}

/// Generate a ledger id from the current time plus a random suffix.
#[must_use]
pub fn generate_session_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().timestamp_millis(), &suffix[..8])
}

/// Insert or replace a session.
///
/// A draft without an id gets a generated one and is appended. A draft whose
/// id is already in the ledger replaces that entry in place; an unknown id is
/// appended as-is.
pub fn upsert_session(sessions: &mut Vec<AgentSession>, draft: SessionDraft) -> AgentSession {
    let id = draft.id.clone().unwrap_or_else(generate_session_id);
    let session = draft.into_session(id);

    match sessions.iter_mut().find(|existing| existing.id == session.id) {
        Some(slot) => slot.clone_from(&session),
        None => sessions.push(session.clone()),
    }
    session
}

/// First session for exactly this (repo, issue, phase).
#[must_use]
pub fn find_session<'a>(
    sessions: &'a [AgentSession],
    repo: &str,
    issue_number: u64,
    phase: &str,
) -> Option<&'a AgentSession> {
    sessions
        .iter()
        .find(|s| s.is_for(repo, issue_number) && s.phase == phase)
}

/// Every session for a (repo, issue), across phases.
#[must_use]
pub fn find_sessions<'a>(
    sessions: &'a [AgentSession],
    repo: &str,
    issue_number: u64,
) -> Vec<&'a AgentSession> {
    sessions
        .iter()
        .filter(|s| s.is_for(repo, issue_number))
        .collect()
}

/// First session for a (repo, issue) that has not exited.
#[must_use]
pub fn find_active_session<'a>(
    sessions: &'a [AgentSession],
    repo: &str,
    issue_number: u64,
) -> Option<&'a AgentSession> {
    sessions
        .iter()
        .find(|s| s.is_for(repo, issue_number) && s.is_active())
}

/// Most recently started session for a (repo, issue), optionally one phase.
///
/// Ties keep the earliest ledger entry.
#[must_use]
pub fn find_latest_session<'a>(
    sessions: &'a [AgentSession],
    repo: &str,
    issue_number: u64,
    phase: Option<&str>,
) -> Option<&'a AgentSession> {
    sessions
        .iter()
        .filter(|s| s.is_for(repo, issue_number))
        .filter(|s| phase.is_none_or(|phase| s.phase == phase))
        .fold(None, |latest: Option<&AgentSession>, candidate| match latest {
            Some(current) if current.started_at >= candidate.started_at => Some(current),
            _ => Some(candidate),
        })
}
