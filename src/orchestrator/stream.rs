//! Decoding of the agent's structured streaming output.
//!
//! Each line is an independent JSON record. Lines that are blank or not
//! valid JSON objects decode to `None`; the parser never fails, so one
//! corrupt line cannot abort the stream.
//!
//! | Record                                   | Event                  |
//! |------------------------------------------|------------------------|
//! | `system` with `session_id`               | [`StreamEvent::System`]  |
//! | `assistant` with a `tool_use` block      | [`StreamEvent::ToolUse`] |
//! | `assistant` with only `text` blocks      | [`StreamEvent::Text`]    |
//! | `result` with `session_id`               | [`StreamEvent::Result`]  |
//! | `error`                                  | [`StreamEvent::Error`]   |
//! | *(any other object)*                     | [`StreamEvent::Unknown`] |

use serde_json::{Map, Value};

use crate::models::monitor::StreamEvent;

/// Message used when an error record carries no message.
const UNKNOWN_ERROR: &str = "Unknown error";

/// Decode one line of agent stdout.
///
/// Fields of the wrong JSON type are treated as absent, so a well-formed
/// object always decodes to some event.
#[must_use]
pub fn parse_stream_line(line: &str) -> Option<StreamEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let value: Value = serde_json::from_str(line).ok()?;
    let record = value.as_object()?;
    let kind = string_field(record, "type").unwrap_or_default();
    let session_id = string_field(record, "session_id");

    let event = match kind.as_str() {
        "system" => session_id.map(|session_id| StreamEvent::System { session_id }),
        "assistant" => parse_assistant(session_id, record.get("message")),
        "result" => session_id.map(|session_id| StreamEvent::Result {
            session_id,
            result: string_field(record, "result"),
            is_error: record
                .get("is_error")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }),
        "error" => Some(StreamEvent::Error {
            message: error_message(record.get("error"), record.get("message")),
        }),
        _ => None,
    };

    Some(event.unwrap_or(StreamEvent::Unknown { kind }))
}

fn string_field(record: &Map<String, Value>, key: &str) -> Option<String> {
    record.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn parse_assistant(session_id: Option<String>, message: Option<&Value>) -> Option<StreamEvent> {
    let blocks = message?.get("content")?.as_array()?;

    if let Some(tool) = blocks
        .iter()
        .find(|block| block_type(block) == Some("tool_use"))
    {
        let tool_name = tool.get("name").and_then(Value::as_str)?.to_owned();
        return Some(StreamEvent::ToolUse {
            session_id,
            tool_name,
            input: tool.get("input").cloned().unwrap_or(Value::Null),
        });
    }

    let texts: Vec<&str> = blocks
        .iter()
        .filter(|block| block_type(block) == Some("text"))
        .filter_map(|block| block.get("text").and_then(Value::as_str))
        .collect();
    if texts.is_empty() {
        return None;
    }
    Some(StreamEvent::Text {
        session_id,
        text: texts.join("\n"),
    })
}

fn block_type(block: &Value) -> Option<&str> {
    block.get("type").and_then(Value::as_str)
}

/// Error text from `error` (string or `{message}`) or a top-level `message`.
fn error_message(error: Option<&Value>, message: Option<&Value>) -> String {
    let from_error = error.and_then(|err| {
        err.as_str()
            .or_else(|| err.get("message").and_then(Value::as_str))
    });
    from_error
        .or_else(|| message.and_then(Value::as_str))
        .filter(|text| !text.is_empty())
        .unwrap_or(UNKNOWN_ERROR)
        .to_owned()
}
