//! Exit codes following sysexits.h conventions.
//!
//! Scripts driving batch runs use these to tell bad input apart from an
//! unreachable catalog.

use sdcsync_core::SyncError;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Data format error (no identifier, image mismatch, unsupported fact).
/// Maps to EX_DATAERR from sysexits.h.
pub const VERIFICATION_FAILED: i32 = 65;

/// Cannot open input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Service unavailable (catalog API, image host).
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const NETWORK_ERROR: i32 = 69;

/// I/O error (cache database, output).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

pub const HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  65  Verification failed (no identifier, image mismatch, unusable record)
  66  Input file missing or unreadable
  69  Catalog or image host unavailable
  74  Cache database or output error";

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        let code = match err.chain().find_map(|e| e.downcast_ref::<SyncError>()) {
            Some(core) => Self::from_core(core),
            None if message.contains("Failed to read") => INPUT_ERROR,
            None if message.contains("Verification failed")
                || message.contains("Failed to parse") =>
            {
                VERIFICATION_FAILED
            }
            None if message.contains("Failed to write") => IO_ERROR,
            None => GENERAL_ERROR,
        };

        Self {
            code,
            message: Some(message),
        }
    }

    fn from_core(err: &SyncError) -> i32 {
        match err {
            SyncError::ParseFailure(_)
            | SyncError::ResolutionFailure(_)
            | SyncError::PolicyFailure(_)
            | SyncError::PerceptualHashError(_)
            | SyncError::SerializationError(_) => VERIFICATION_FAILED,
            SyncError::NetworkFailure(_) | SyncError::HttpError(_) => NETWORK_ERROR,
            SyncError::CacheError(_)
            | SyncError::CacheUrlMismatch { .. }
            | SyncError::Io(_) => IO_ERROR,
            SyncError::Config(_) => GENERAL_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_core_errors_classified() {
        let err = anyhow::Error::from(SyncError::NetworkFailure("timeout".into()));
        assert_eq!(ExitCode::from_anyhow(&err).code, NETWORK_ERROR);

        let err = Err::<(), _>(SyncError::ParseFailure("no id".into()))
            .context("Failed to extract")
            .unwrap_err();
        assert_eq!(ExitCode::from_anyhow(&err).code, VERIFICATION_FAILED);
    }

    #[test]
    fn test_message_fallback() {
        let err = anyhow::anyhow!("Failed to read page file: x.json");
        assert_eq!(ExitCode::from_anyhow(&err).code, INPUT_ERROR);

        let err = anyhow::anyhow!("Verification failed: images do not match");
        assert_eq!(ExitCode::from_anyhow(&err).code, VERIFICATION_FAILED);

        let err = anyhow::anyhow!("something else");
        assert_eq!(ExitCode::from_anyhow(&err).code, GENERAL_ERROR);
    }
}
