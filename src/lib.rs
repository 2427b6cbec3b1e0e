#![forbid(unsafe_code)]

//! Agent orchestration for tracked issues.
//!
//! Builds agent prompts, launches agents interactively (tmux or a terminal
//! app) or as supervised background processes, and keeps a session ledger
//! in step with the result files those background runs leave behind.

pub mod config;
pub mod errors;
pub mod models;
pub mod orchestrator;
pub mod persistence;
pub mod prompt;

pub use config::GlobalConfig;
pub use errors::{AppError, LaunchError, Result};
