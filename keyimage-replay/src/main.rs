//! # Key Image Replay
//!
//! Replays a gesture script against the key image tool and prints the report.

use clap::Parser;
use keyimage_core::ToolConfig;
use keyimage_replay::{CliArgs, LogFormat, Replay, ReplayConfig, Script};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let config = ReplayConfig::from(args);

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "keyimage_replay=info,keyimage_core=warn".into());
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }

    let tool_config = match &config.config {
        Some(path) => {
            tracing::info!("Loading tool configuration from {}", path.display());
            ToolConfig::from_file(path)?
        }
        None => ToolConfig::default(),
    };
    tracing::debug!("Tool configuration: {:?}", tool_config);

    tracing::info!("Loading script from {}", config.script.display());
    let script = Script::from_file(&config.script)?;

    let report = Replay::new(tool_config, &script)?
        .with_tool_group(config.tool_group.clone())
        .run(&script.steps);

    if !report.rejected_steps.is_empty() {
        tracing::warn!("{} steps were rejected", report.rejected_steps.len());
    }

    let json = serde_json::to_string_pretty(&report)?;
    match &config.output {
        Some(path) => {
            std::fs::write(path, json)?;
            tracing::info!("Report written to {}", path.display());
        }
        None => println!("{json}"),
    }

    Ok(())
}
