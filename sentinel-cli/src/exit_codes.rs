//! Exit codes following sysexits.h conventions.
//!
//! Scripts and CI jobs can tell a red-flagged batch apart from a broken
//! invocation or an unreachable extraction service.

use sentinel_core::SentinelError;

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (invalid arguments or configuration).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Red flags raised under `--strict`, or malformed record input.
/// Maps to EX_DATAERR from sysexits.h.
pub const DATA_ERROR: i32 = 65;

/// Cannot open input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Extraction service unavailable (OCR engine, LLM API).
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const SERVICE_UNAVAILABLE: i32 = 69;

/// I/O error (cannot write the report).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Help text appended to `--help`.
pub const EXIT_CODES_HELP: &str = "Exit codes:
  0   Success
  1   General error
  64  Usage or configuration error
  65  Red flags raised (--strict) or malformed records
  66  Input file unreadable
  69  Extraction service unavailable
  74  Report could not be written";

/// Represents an exit code with optional error context.
#[derive(Debug)]
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        // Message context added by the commands wins over the error type:
        // "Failed to read file" wraps an Io error that is an input problem.
        let code = if message.contains("Failed to read file") {
            INPUT_ERROR
        } else if message.contains("Failed to write") {
            IO_ERROR
        } else if message.contains("Failed to parse records") {
            DATA_ERROR
        } else if let Some(core) = err.chain().find_map(|e| e.downcast_ref::<SentinelError>()) {
            Self::classify(core)
        } else {
            GENERAL_ERROR
        };

        Self {
            code,
            message: Some(message),
        }
    }

    fn classify(err: &SentinelError) -> i32 {
        match err {
            SentinelError::InvalidConfig(_) => USAGE_ERROR,
            SentinelError::ReportError(_) => IO_ERROR,
            SentinelError::UnsupportedDocument(_) => INPUT_ERROR,
            e if e.is_service_failure() => SERVICE_UNAVAILABLE,
            _ => GENERAL_ERROR,
        }
    }
}
