// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Unix exit-code mapping (sysexits.h subset): `0` on clean shutdown, `78`
//! (`EX_CONFIG`) for bad/missing configuration or plugin descriptor, `71`
//! (`EX_OSERR`) when the container engine is unavailable, `70`
//! (`EX_SOFTWARE`) for any other fatal error.

use meta_core_domain::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    Ok = 0,
    Software = 70,
    OsErr = 71,
    Config = 78,
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}

/// Maps a fatal `CoreError` to the process exit code it should produce.
pub fn map_error_to_exit_code(err: &CoreError) -> ExitCode {
    match err {
        CoreError::InvalidConfiguration(_) => ExitCode::Config,
        CoreError::ContainerError(_) => ExitCode::OsErr,
        _ => ExitCode::Software,
    }
}

pub fn result_to_exit_code(result: Result<(), CoreError>) -> std::process::ExitCode {
    match result {
        Ok(()) => ExitCode::Ok.into(),
        Err(err) => {
            tracing::error!(%err, "fatal error");
            map_error_to_exit_code(&err).into()
        }
    }
}
