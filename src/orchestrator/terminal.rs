//! Terminal applications and the environment they are detected from.
//!
//! Each supported app has one launch recipe turning a composed shell command
//! into a [`CommandSpec`]. Adding an app means adding a variant, a row in
//! [`APP_NAMES`], and a recipe arm.

use std::env;
use std::path::PathBuf;

use crate::errors::LaunchError;
use crate::orchestrator::launcher::CommandSpec;
use crate::orchestrator::shell::applescript_quote;

/// Environment signals read for auto-detection. Never written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerminalEnvironment {
    /// Inside a tmux session (`TMUX`).
    pub in_tmux: bool,
    /// Running over a remote shell (`SSH_CONNECTION`, `SSH_CLIENT`, `SSH_TTY`).
    pub remote: bool,
    /// Terminal program marker (`TERM_PROGRAM`).
    pub term_program: Option<String>,
    /// kitty window id marker (`KITTY_WINDOW_ID`).
    pub kitty_window_id: Option<String>,
}

impl TerminalEnvironment {
    /// Snapshot the current process environment.
    #[must_use]
    pub fn from_env() -> Self {
        let present = |key: &str| env::var_os(key).is_some_and(|value| !value.is_empty());
        Self {
            in_tmux: present("TMUX"),
            remote: ["SSH_CONNECTION", "SSH_CLIENT", "SSH_TTY"]
                .into_iter()
                .any(present),
            term_program: env::var("TERM_PROGRAM").ok().filter(|v| !v.is_empty()),
            kitty_window_id: env::var("KITTY_WINDOW_ID").ok().filter(|v| !v.is_empty()),
        }
    }
}

/// Closed set of supported terminal applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalApp {
    /// macOS Terminal.app, driven by `AppleScript`.
    AppleTerminal,
    /// `iTerm2`, driven by `AppleScript`.
    ITerm2,
    /// Ghostty; via `open` on macOS, direct spawn elsewhere.
    Ghostty,
    /// `WezTerm`.
    WezTerm,
    /// kitty.
    Kitty,
    /// Alacritty.
    Alacritty,
    /// GNOME Terminal.
    GnomeTerminal,
    /// Konsole.
    Konsole,
    /// Debian-style generic `x-terminal-emulator` launcher.
    XTerminalEmulator,
}

/// Accepted configuration names per app, matched case-insensitively.
const APP_NAMES: &[(TerminalApp, &[&str])] = &[
    (
        TerminalApp::AppleTerminal,
        &["terminal", "terminal.app", "apple_terminal"],
    ),
    (TerminalApp::ITerm2, &["iterm", "iterm2", "iterm.app"]),
    (TerminalApp::Ghostty, &["ghostty"]),
    (TerminalApp::WezTerm, &["wezterm"]),
    (TerminalApp::Kitty, &["kitty"]),
    (TerminalApp::Alacritty, &["alacritty"]),
    (TerminalApp::GnomeTerminal, &["gnome-terminal", "gnome"]),
    (TerminalApp::Konsole, &["konsole"]),
    (
        TerminalApp::XTerminalEmulator,
        &["x-terminal-emulator", "default"],
    ),
];

/// A composed launch handed to a recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalLaunch {
    /// Window title.
    pub title: String,
    /// Directory the window opens in.
    pub working_dir: PathBuf,
    /// Shell command line; every embedded value is already quoted.
    pub shell_command: String,
}

impl TerminalApp {
    /// Look up an app by configured name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = name.trim().to_ascii_lowercase();
        APP_NAMES
            .iter()
            .find(|(_, names)| names.contains(&wanted.as_str()))
            .map(|(app, _)| *app)
    }

    /// Canonical configuration name.
    #[must_use]
    pub fn name(self) -> &'static str {
        APP_NAMES
            .iter()
            .find(|(app, _)| *app == self)
            .and_then(|(_, names)| names.first().copied())
            .unwrap_or("default")
    }

    /// App hosting the current process, if recognisable.
    #[must_use]
    pub fn detect(environment: &TerminalEnvironment) -> Option<Self> {
        if environment.kitty_window_id.is_some() {
            return Some(Self::Kitty);
        }
        match environment.term_program.as_deref()? {
            "Apple_Terminal" => Some(Self::AppleTerminal),
            "iTerm.app" => Some(Self::ITerm2),
            "ghostty" => Some(Self::Ghostty),
            "WezTerm" => Some(Self::WezTerm),
            _ => None,
        }
    }

    /// Platform fallback when nothing is configured or detected.
    #[must_use]
    pub fn os_default() -> Self {
        if cfg!(target_os = "macos") {
            Self::AppleTerminal
        } else {
            Self::XTerminalEmulator
        }
    }

    /// Resolve the app: explicit name, then detection, then OS default.
    ///
    /// # Errors
    ///
    /// Returns `LaunchError::TerminalAppNotFound` for an unknown name.
    pub fn resolve(
        configured: Option<&str>,
        environment: &TerminalEnvironment,
    ) -> Result<Self, LaunchError> {
        match configured.filter(|name| !name.trim().is_empty()) {
            Some(name) => Self::from_name(name).ok_or_else(|| {
                LaunchError::TerminalAppNotFound(format!("unsupported terminal app: {name}"))
            }),
            None => Ok(Self::detect(environment).unwrap_or_else(Self::os_default)),
        }
    }

    /// Launch recipe for this app.
    #[must_use]
    pub fn command_for(self, launch: &TerminalLaunch) -> CommandSpec {
        let dir = launch.working_dir.display().to_string();
        let script = launch.shell_command.as_str();
        match self {
            Self::AppleTerminal => osascript(&[
                "tell application \"Terminal\"".into(),
                "activate".into(),
                format!("set newTab to do script {}", applescript_quote(script)),
                format!(
                    "set custom title of newTab to {}",
                    applescript_quote(&launch.title)
                ),
                "end tell".into(),
            ]),
            Self::ITerm2 => osascript(&[
                "tell application \"iTerm\"".into(),
                "activate".into(),
                "set newWindow to (create window with default profile)".into(),
                format!(
                    "tell current session of newWindow to write text {}",
                    applescript_quote(script)
                ),
                "end tell".into(),
            ]),
            Self::Ghostty if cfg!(target_os = "macos") => CommandSpec::new("open")
                .arg("-na")
                .arg("Ghostty.app")
                .arg("--args")
                .arg(format!("--working-directory={dir}"))
                .arg(format!("--title={}", launch.title))
                .arg("-e")
                .arg("sh")
                .arg("-c")
                .arg(script),
            Self::Ghostty => CommandSpec::new("ghostty")
                .arg(format!("--working-directory={dir}"))
                .arg(format!("--title={}", launch.title))
                .arg("-e")
                .arg("sh")
                .arg("-c")
                .arg(script),
            Self::WezTerm => CommandSpec::new("wezterm")
                .arg("start")
                .arg("--cwd")
                .arg(dir)
                .arg("--")
                .arg("sh")
                .arg("-c")
                .arg(script),
            Self::Kitty => CommandSpec::new("kitty")
                .arg("--directory")
                .arg(dir)
                .arg("--title")
                .arg(&launch.title)
                .arg("sh")
                .arg("-c")
                .arg(script),
            Self::Alacritty => CommandSpec::new("alacritty")
                .arg("--working-directory")
                .arg(dir)
                .arg("--title")
                .arg(&launch.title)
                .arg("-e")
                .arg("sh")
                .arg("-c")
                .arg(script),
            Self::GnomeTerminal => CommandSpec::new("gnome-terminal")
                .arg(format!("--working-directory={dir}"))
                .arg(format!("--title={}", launch.title))
                .arg("--")
                .arg("sh")
                .arg("-c")
                .arg(script),
            Self::Konsole => CommandSpec::new("konsole")
                .arg("--workdir")
                .arg(dir)
                .arg("-p")
                .arg(format!("tabtitle={}", launch.title))
                .arg("-e")
                .arg("sh")
                .arg("-c")
                .arg(script),
            Self::XTerminalEmulator => CommandSpec::new("x-terminal-emulator")
                .arg("-T")
                .arg(&launch.title)
                .arg("-e")
                .arg("sh")
                .arg("-c")
                .arg(script),
        }
    }
}

fn osascript(lines: &[String]) -> CommandSpec {
    lines
        .iter()
        .fold(CommandSpec::new("osascript"), |spec, line| {
            spec.arg("-e").arg(line)
        })
}
