//! Streaming file transfer engine for MosquitoDB clients.
//!
//! This crate implements the **transfer logic** behind the storage API:
//! background HTTP uploads and downloads with per-chunk progress events
//! and cooperative cancellation. It is a library crate with no UI or
//! bridge dependencies — the host app wires [`TransferManager`] calls and
//! the [`TransferEvent`] stream to whatever eventing layer it uses.
//!
//! # Upload pipeline
//!
//! 1. **Register** — record the caller's process ID so a later cancel
//!    can reach the task
//! 2. **Open** — resolve the source path and read the file length
//! 3. **Stream** — POST the file body in fixed-size chunks, emitting
//!    progress after each chunk and checking for cancellation between
//!    chunks
//! 4. **Finish** — read the status code and response body, emit exactly
//!    one terminal event, and drop the registry entry
//!
//! Downloads follow the same shape in reverse, with an additional
//! pause/resume switch.

pub mod download;
pub mod error;
pub mod manager;
pub mod registry;
pub mod types;
pub mod upload;

// Re-export primary types for convenience.
pub use error::{ErrorKind, TransferError};
pub use manager::TransferManager;
pub use registry::{TaskHandle, TaskRegistry};
pub use types::{DownloadRequest, TransferEvent, UploadRequest};

/// Upload chunk size: 8 KiB.
///
/// Progress is reported and cancellation observed once per chunk, so this
/// bounds both the event cadence and the cancellation latency.
pub const UPLOAD_CHUNK_SIZE: usize = 8 * 1024;

/// Buffered event channel capacity.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Fixed `Content-Type` marker for raw binary uploads.
pub const UPLOAD_CONTENT_TYPE: &str = "buffer/upload";

/// Header carrying the caller-computed integrity hash of the file.
pub const HASH_HEADER: &str = "hash-upload";

/// Header identifying the logical destination on the storage server.
pub const DESTINATION_HEADER: &str = "Mosquito-Destination";

/// Header carrying the caller's auth token, sent only when one is set.
pub const TOKEN_HEADER: &str = "Mosquito-Token";
