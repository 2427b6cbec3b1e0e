//! Live view of a background agent, driven by its output stream.

use serde::Serialize;
use serde_json::Value;

/// Tool names whose `file_path` input counts as an artifact of the run.
const FILE_WRITING_TOOLS: &[&str] = &["Write", "Edit", "MultiEdit", "NotebookEdit"];

/// One decoded record from the agent's structured output stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Session initialisation record.
    System {
        /// Agent-native session id.
        session_id: String,
    },
    /// Assistant message whose first tool block invoked a tool.
    ToolUse {
        /// Session id carried on the record, if any.
        session_id: Option<String>,
        /// Invoked tool name.
        tool_name: String,
        /// Tool input payload.
        input: Value,
    },
    /// Assistant message containing only text.
    Text {
        /// Session id carried on the record, if any.
        session_id: Option<String>,
        /// Concatenated text blocks.
        text: String,
    },
    /// Final result record.
    Result {
        /// Agent-native session id.
        session_id: String,
        /// Result text, when reported.
        result: Option<String>,
        /// Whether the agent reported the run as an error.
        is_error: bool,
    },
    /// Error record.
    Error {
        /// Error message; `"Unknown error"` when none was given.
        message: String,
    },
    /// A well-formed record this parser does not map.
    Unknown {
        /// The record's `type` field, or empty.
        kind: String,
    },
}

impl StreamEvent {
    /// Session id carried by the event, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::System { session_id } | Self::Result { session_id, .. } => Some(session_id),
            Self::ToolUse { session_id, .. } | Self::Text { session_id, .. } => {
                session_id.as_deref()
            }
            Self::Error { .. } | Self::Unknown { .. } => None,
        }
    }
}

/// In-memory state of one live agent process. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMonitor {
    /// Agent-native session id; once set it is never cleared.
    pub session_id: Option<String>,
    /// Name of the most recently invoked tool.
    pub last_tool_use: Option<String>,
    /// Most recent assistant text or diagnostic output.
    pub last_text: Option<String>,
    /// Whether the child process is still running.
    pub is_running: bool,
    /// Files written or edited so far, in first-touch order.
    pub artifacts: Vec<String>,
}

impl AgentMonitor {
    /// A monitor for a process that has just started.
    #[must_use]
    pub fn running() -> Self {
        Self {
            is_running: true,
            ..Self::default()
        }
    }

    /// Fold one stream event into the monitor.
    pub fn apply(&mut self, event: &StreamEvent) {
        if let Some(session_id) = event.session_id() {
            self.session_id = Some(session_id.to_owned());
        }

        match event {
            StreamEvent::ToolUse {
                tool_name, input, ..
            } => {
                self.last_tool_use = Some(tool_name.clone());
                if FILE_WRITING_TOOLS.contains(&tool_name.as_str()) {
                    self.record_artifact(input);
                }
            }
            StreamEvent::Text { text, .. } => {
                self.last_text = Some(text.clone());
            }
            StreamEvent::Error { message } => {
                self.last_text = Some(message.clone());
            }
            StreamEvent::System { .. } | StreamEvent::Result { .. } | StreamEvent::Unknown { .. } => {}
        }
    }

    /// Fold captured stderr output into `last_text` as diagnostic text.
    pub fn record_diagnostic(&mut self, text: &str) {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            self.last_text = Some(trimmed.to_owned());
        }
    }

    fn record_artifact(&mut self, input: &Value) {
        let path = input
            .get("file_path")
            .or_else(|| input.get("notebook_path"))
            .and_then(Value::as_str);
        if let Some(path) = path {
            if !self.artifacts.iter().any(|known| known == path) {
                self.artifacts.push(path.to_owned());
            }
        }
    }
}
