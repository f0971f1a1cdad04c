// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Command-line argument parsing for the ingestion service process.
//!
//! Two run modes: `serve` watches the configured roots and runs until a
//! shutdown signal arrives; `once` drains whatever is currently admissible
//! and exits, useful for cron-style batch runs and smoke tests.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use thiserror::Error;

#[derive(Debug, Parser)]
#[command(name = "meta-core", about = "Media-file ingestion pipeline and plugin scheduler", version)]
pub struct Cli {
    /// Path to a TOML configuration file; defaults are used for anything it
    /// doesn't override.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Overrides the configured log level (error|warn|info|debug|trace).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Overrides the configured log format (pretty|json).
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Watch the configured roots and run until SIGTERM/SIGINT.
    Serve,
    /// Drain whatever is currently admissible, then exit.
    Once,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Serve,
    Once,
}

#[derive(Debug, Clone)]
pub struct ValidatedCli {
    pub mode: RunMode,
    pub config: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid --{arg}: {reason}")]
    InvalidValue { arg: String, reason: String },
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Parses and lightly validates CLI arguments. clap handles `--help`,
/// `--version`, and malformed flags on its own (it exits the process);
/// this layer only validates values clap can't express structurally.
pub fn parse_and_validate() -> Result<ValidatedCli, ParseError> {
    let cli = parse_cli();
    validate_cli(cli)
}

fn validate_cli(cli: Cli) -> Result<ValidatedCli, ParseError> {
    if let Some(ref level) = cli.log_level {
        let known = ["error", "warn", "info", "debug", "trace"];
        if !known.contains(&level.to_ascii_lowercase().as_str()) {
            return Err(ParseError::InvalidValue {
                arg: "log-level".to_string(),
                reason: format!("must be one of {known:?}"),
            });
        }
    }

    if let Some(ref format) = cli.log_format {
        if !["pretty", "json", "text"].contains(&format.to_ascii_lowercase().as_str()) {
            return Err(ParseError::InvalidValue {
                arg: "log-format".to_string(),
                reason: "must be 'pretty' or 'json'".to_string(),
            });
        }
    }

    let mode = match cli.command {
        Commands::Serve => RunMode::Serve,
        Commands::Once => RunMode::Once,
    };

    Ok(ValidatedCli {
        mode,
        config: cli.config,
        log_level: cli.log_level,
        log_format: cli.log_format,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_log_level() {
        let cli = Cli {
            config: None,
            log_level: Some("verbose".to_string()),
            log_format: None,
            command: Commands::Serve,
        };
        assert!(validate_cli(cli).is_err());
    }

    #[test]
    fn accepts_known_log_level_and_mode() {
        let cli = Cli {
            config: None,
            log_level: Some("debug".to_string()),
            log_format: Some("json".to_string()),
            command: Commands::Once,
        };
        let validated = validate_cli(cli).unwrap();
        assert_eq!(validated.mode, RunMode::Once);
        assert_eq!(validated.log_level.as_deref(), Some("debug"));
    }
}
