//! Quoting helpers for composed shell and `AppleScript` commands.

/// Shell-quote a value using POSIX single-quote escaping.
#[must_use]
pub fn shell_quote(value: &str) -> String {
    let escaped = value.replace('\'', "'\"'\"'");
    format!("'{escaped}'")
}

/// Escape a value for use inside an `AppleScript` double-quoted string.
#[must_use]
pub fn applescript_quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}
