//! Workflow phases an agent can be launched for.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::AppError;

/// Named workflow stage with its own default prompt template.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Investigate the codebase and gather context.
    Research,
    /// Explore candidate approaches.
    Brainstorm,
    /// Produce an implementation plan.
    Plan,
    /// Write the change.
    Implement,
    /// Review the change.
    Review,
    /// Capture reusable learnings.
    Compound,
    /// Verify the issue is actually done.
    CompletionCheck,
}

impl Phase {
    /// Every phase in workflow order.
    pub const ALL: [Self; 7] = [
        Self::Research,
        Self::Brainstorm,
        Self::Plan,
        Self::Implement,
        Self::Review,
        Self::Compound,
        Self::CompletionCheck,
    ];

    /// Wire name of the phase.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Research => "research",
            Self::Brainstorm => "brainstorm",
            Self::Plan => "plan",
            Self::Implement => "implement",
            Self::Review => "review",
            Self::Compound => "compound",
            Self::CompletionCheck => "completion-check",
        }
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|phase| phase.as_str() == raw)
            .ok_or_else(|| AppError::Config(format!("unknown phase: {raw}")))
    }
}
