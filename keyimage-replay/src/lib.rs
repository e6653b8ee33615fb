//! # Key Image Replay
//!
//! Replays a scripted sequence of pointer, touch, and text-entry steps against
//! the key image tool on the headless host, and reports what the tool did.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p keyimage-replay -- --config tool.json --script gestures.json
//! ```
//!
//! ## Architecture
//!
//! - `CliArgs` - Command-line arguments parsed with clap
//! - `ReplayConfig` - Resolved paths and output options
//! - `Script` - The JSON gesture script
//! - `Replay` - Drives the tool step by step and builds a `ReplayReport`

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]

mod runner;
mod script;

pub use runner::{Replay, ReplayReport, ScriptedPrompt, StepRejection};
pub use script::{PreloadAnnotation, Script, Step};

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use keyimage_core::ToolError;
use thiserror::Error;

/// Errors raised while loading or replaying a script.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The tool rejected a step or its configuration.
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// A step addressed an annotation index the store does not have.
    #[error("No annotation at index {0}")]
    NoSuchAnnotation(usize),

    /// The script is not valid JSON.
    #[error("Script error: {0}")]
    Script(#[from] serde_json::Error),

    /// Reading the script or writing the report failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for replay operations.
pub type ReplayResult<T> = Result<T, ReplayError>;

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Command-line arguments for keyimage-replay.
#[derive(Debug, Clone, Parser)]
#[command(name = "keyimage-replay")]
#[command(about = "Replay scripted gestures against the key image tool")]
#[command(version)]
pub struct CliArgs {
    /// Tool configuration file (JSON)
    #[arg(long, env = "KEYIMAGE_TOOL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Gesture script file (JSON)
    #[arg(long, env = "KEYIMAGE_SCRIPT")]
    pub script: PathBuf,

    /// Write the report here instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Tool group used for style lookup
    #[arg(long, default_value = "default")]
    pub tool_group: String,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Replay run configuration.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Tool configuration file; defaults apply when absent.
    pub config: Option<PathBuf>,
    /// Gesture script file.
    pub script: PathBuf,
    /// Report destination; stdout when absent.
    pub output: Option<PathBuf>,
    /// Tool group used for style lookup.
    pub tool_group: String,
    /// Log line format.
    pub log_format: LogFormat,
}

impl From<CliArgs> for ReplayConfig {
    fn from(args: CliArgs) -> Self {
        Self {
            config: args.config,
            script: args.script,
            output: args.output,
            tool_group: args.tool_group,
            log_format: args.log_format,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_args_into_config() {
        let args = CliArgs::parse_from([
            "keyimage-replay",
            "--script",
            "gestures.json",
            "--config",
            "tool.json",
            "--log-format",
            "json",
        ]);
        let config = ReplayConfig::from(args);

        assert_eq!(config.script, PathBuf::from("gestures.json"));
        assert_eq!(config.config, Some(PathBuf::from("tool.json")));
        assert_eq!(config.output, None);
        assert_eq!(config.tool_group, "default");
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            ReplayError::NoSuchAnnotation(3).to_string(),
            "No annotation at index 3"
        );
    }
}
