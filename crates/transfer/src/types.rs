//! Request and event types for the transfer engine.

use std::path::PathBuf;

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// One file upload, as handed over by the bridge layer.
///
/// `process_id` is a caller-chosen opaque key correlating the request
/// with its progress and terminal events. Callers must keep it unique
/// across concurrently running transfers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    #[serde(rename = "processID")]
    pub process_id: String,
    /// Local file to send: a plain path or a `file://` URI.
    pub source_path: String,
    /// Target HTTP endpoint.
    pub url: String,
    /// Caller-supplied headers, applied verbatim and in order before the
    /// engine's fixed headers. Keys must not collide with the fixed ones.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_headers: Vec<(String, String)>,
    /// Caller-computed integrity hash, sent as the hash header.
    pub content_hash: String,
    /// Logical destination on the storage server.
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

/// One file download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    #[serde(rename = "processID")]
    pub process_id: String,
    /// Source HTTP endpoint.
    pub url: String,
    /// Local file to write: a plain path or a `file://` URI. Parent
    /// directories are created as needed.
    pub destination: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_headers: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

/// Event emitted by a running transfer task.
///
/// Every task emits zero or more progress events followed by exactly one
/// terminal event (`UploadCompleted`, `UploadFailed`, `DownloadCompleted`
/// or `DownloadFailed`). Cancellation surfaces as a failure with
/// [`ErrorKind::Cancelled`] so the host UI can tell a user-initiated stop
/// from a real failure.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    /// Bytes handed to the transport so far.
    UploadProgress {
        process_id: String,
        sent_bytes: u64,
        total_bytes: u64,
    },
    /// Upload finished; carries the server's status code and response
    /// body regardless of whether the status indicates success.
    UploadCompleted {
        process_id: String,
        status: u16,
        body: String,
    },
    /// Upload ended without a server response.
    UploadFailed {
        process_id: String,
        kind: ErrorKind,
        message: String,
    },
    /// Bytes received and written so far. `expected_bytes` is the
    /// server-announced length, when it sent one.
    DownloadProgress {
        process_id: String,
        received_bytes: u64,
        expected_bytes: Option<u64>,
    },
    /// Download finished; the file is fully written at `path`.
    DownloadCompleted { process_id: String, path: String },
    /// Download ended early; any partial file has been removed.
    DownloadFailed {
        process_id: String,
        kind: ErrorKind,
        message: String,
    },
}

impl TransferEvent {
    /// Returns `true` for terminal events.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            TransferEvent::UploadProgress { .. } | TransferEvent::DownloadProgress { .. }
        )
    }

    /// The process ID this event belongs to.
    pub fn process_id(&self) -> &str {
        match self {
            TransferEvent::UploadProgress { process_id, .. }
            | TransferEvent::UploadCompleted { process_id, .. }
            | TransferEvent::UploadFailed { process_id, .. }
            | TransferEvent::DownloadProgress { process_id, .. }
            | TransferEvent::DownloadCompleted { process_id, .. }
            | TransferEvent::DownloadFailed { process_id, .. } => process_id,
        }
    }
}

/// Resolves a caller-supplied location into a filesystem path.
///
/// The bridge hands over whatever the host app had: usually a `file://`
/// URI with percent-escapes, sometimes a plain path. An authority
/// component (`file://localhost/...`) is dropped, keeping only the path.
/// Anything else is passed through untouched and fails later at open
/// time.
pub fn resolve_local_path(location: &str) -> PathBuf {
    match location.strip_prefix("file://") {
        Some(rest) => {
            let path = match rest.find('/') {
                Some(0) | None => rest,
                Some(slash) => &rest[slash..],
            };
            PathBuf::from(percent_decode_str(path).decode_utf8_lossy().into_owned())
        }
        None => PathBuf::from(location),
    }
}
