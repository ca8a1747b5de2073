//! Transfer error types.

use std::fmt;

/// Coarse error category surfaced on failure events.
///
/// The bridge layer forwards the string form to the caller, which only
/// distinguishes a missing source file, a user cancel, and everything
/// else (connect, DNS, I/O, malformed response).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    FileNotFound,
    Network,
    Cancelled,
}

impl ErrorKind {
    /// Stable string form used on the wire to the host app.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::FileNotFound => "file_not_found",
            ErrorKind::Network => "network_error",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by the transfer engine.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid header: {0}")]
    Header(String),

    #[error("server returned status {0}")]
    Status(u16),

    #[error("cancelled")]
    Cancelled,

    #[error("transfer already in progress: {0}")]
    DuplicateProcess(String),
}

impl TransferError {
    /// Maps the error onto the coarse category reported to callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransferError::FileNotFound(_) => ErrorKind::FileNotFound,
            TransferError::Cancelled => ErrorKind::Cancelled,
            _ => ErrorKind::Network,
        }
    }
}
