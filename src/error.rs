//! Error types shared across capture, the sheet store and the poll loop

use thiserror::Error;

/// Errors from the remote spreadsheet store
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SheetError {
    /// Rate limited or temporarily unavailable; worth retrying
    #[error("sheets API temporarily unavailable (HTTP {status}): {message}")]
    Transient { status: u16, message: String },

    /// Auth failure, malformed request, missing sheet and friends
    #[error("sheets API request rejected (HTTP {status}): {message}")]
    Permanent { status: u16, message: String },

    /// The request never produced an HTTP response
    #[error("sheets API transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded
    #[error("unexpected sheets API response: {0}")]
    Decode(String),

    #[error("invalid color '{0}', expected six hex digits like #00FF00")]
    InvalidColor(String),

    #[error("no access token found in environment variable {0}")]
    MissingCredentials(String),

    #[error("invalid sheets API base URL: {0}")]
    InvalidUrl(String),
}

impl SheetError {
    /// Whether the retry wrapper should try the call again
    pub fn is_transient(&self) -> bool {
        matches!(self, SheetError::Transient { .. })
    }
}

/// Errors from a single screen capture
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("invalid display index {index} ({available} available)")]
    InvalidDisplay { index: usize, available: usize },

    #[error("capture failed: {0}")]
    Backend(String),
}

/// Errors that end a poll loop
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PollError {
    #[error("sheet store failure: {0}")]
    Store(#[from] SheetError),
}

/// Errors from controlling a marking session
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("a marking session is already running")]
    AlreadyRunning,

    #[error("no marking session is running")]
    NotRunning,

    #[error("failed to spawn poll thread: {0}")]
    Spawn(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_errors_are_retryable() {
        let transient = SheetError::Transient { status: 429, message: "slow down".into() };
        let permanent = SheetError::Permanent { status: 403, message: "denied".into() };

        assert!(transient.is_transient());
        assert!(!permanent.is_transient());
        assert!(!SheetError::Transport("reset".into()).is_transient());
        assert!(!SheetError::InvalidColor("zz".into()).is_transient());
    }

    #[test]
    fn test_poll_error_wraps_store_error() {
        let err: PollError = SheetError::Decode("bad json".into()).into();
        assert!(err.to_string().contains("bad json"));
    }
}
