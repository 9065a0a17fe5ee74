//! CLI support for pipeline-rules
//!
//! Provides programmatic access to the `rules` CLI functionality for
//! embedding in other tools.

mod check;
mod convert;
mod functions;

pub use check::{execute_check, CheckOptions, CheckResult};
pub use convert::{json_to_message, json_to_value, message_to_json, value_to_json};
pub use functions::list_functions;

use std::io;

use thiserror::Error;

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Parse error: {0}")]
    Parse(#[from] crate::ParseError),

    #[error("Config error: {0}")]
    Config(#[from] crate::ConfigError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The input was valid JSON but not a JSON object
    #[error("Input message must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("No input provided. Use --input or pipe a JSON message to stdin.")]
    NoInput,
}
