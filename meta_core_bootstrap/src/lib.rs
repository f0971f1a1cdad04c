// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Bootstrap Module
//!
//! The bootstrap crate sits **outside** the domain/application/infrastructure
//! layers of `meta-core` and provides everything that is process-level
//! rather than pipeline-specific:
//!
//! - **Entry point** — CLI argument parsing (`cli`)
//! - **Signal handling** — SIGTERM/SIGINT (`signals`)
//! - **Graceful shutdown** — cancellation token + grace period (`shutdown`)
//! - **Exit-code mapping** — Unix exit codes for fatal errors (`exit_code`)
//! - **Bootstrap logging** — pre-tracing-init diagnostics (`logger`)
//!
//! None of this crate has pipeline-specific logic; `meta-core`'s `main.rs`
//! is the composition root that wires these primitives to the application
//! layer.

pub mod cli;
pub mod exit_code;
pub mod logger;
pub mod shutdown;
pub mod signals;

pub use cli::{parse_and_validate, ParseError, RunMode, ValidatedCli};
pub use exit_code::{map_error_to_exit_code, result_to_exit_code, ExitCode};
pub use shutdown::{CancellationToken, ShutdownCoordinator};
pub use signals::wait_for_shutdown_signal;

/// Parses and validates CLI arguments. The main entry point for the
/// bootstrap layer; the caller runs application logic with the result and
/// maps it to a process exit code via [`result_to_exit_code`].
pub fn bootstrap_cli() -> Result<ValidatedCli, cli::ParseError> {
    cli::parse_and_validate()
}
