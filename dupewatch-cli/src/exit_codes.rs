//! Exit codes following sysexits.h conventions.
//!
//! Scripts can tell an unreadable input apart from an unreachable
//! marketplace without parsing stderr.

use dupewatch_core::DupewatchError;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Cannot open input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Service unavailable (marketplace or image host).
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const NETWORK_ERROR: i32 = 69;

/// Message emitted when a search produced nothing but errors.
pub const SEARCH_FAILED: &str = "Search failed";

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        let is_io = err
            .chain()
            .any(|cause| cause.downcast_ref::<std::io::Error>().is_some());
        let is_network = err.chain().any(|cause| {
            matches!(
                cause.downcast_ref::<DupewatchError>(),
                Some(DupewatchError::Transport(_) | DupewatchError::ImageFetchError(_))
            )
        });

        let code = if is_io || message.contains("Failed to read file") {
            INPUT_ERROR
        } else if is_network || message.contains(SEARCH_FAILED) {
            NETWORK_ERROR
        } else {
            GENERAL_ERROR
        };

        Self {
            code,
            message: Some(message),
        }
    }
}
