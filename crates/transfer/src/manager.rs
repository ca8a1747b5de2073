//! Transfer manager: accepts transfers, routes cancels, owns the event
//! channel.
//!
//! One manager per host app. `start_*` calls are non-blocking: they
//! register the process ID, spawn the task on the tokio runtime and
//! return; results arrive on the event channel. `cancel_*` calls are
//! fire-and-forget and silently accepted for unknown or finished IDs.

use std::sync::Mutex;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::EVENT_CHANNEL_CAPACITY;
use crate::download::DownloadTask;
use crate::error::TransferError;
use crate::registry::{TaskHandle, TaskRegistry};
use crate::types::{DownloadRequest, TransferEvent, UploadRequest};
use crate::upload::UploadTask;

/// Owns the registries and the HTTP client shared by all transfer tasks.
///
/// Methods must be called from within a tokio runtime.
pub struct TransferManager {
    http: reqwest::Client,
    uploads: TaskRegistry,
    downloads: TaskRegistry,
    events_tx: mpsc::Sender<TransferEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<TransferEvent>>>,
}

impl Default for TransferManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferManager {
    /// Creates a manager with its own HTTP client.
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    /// Creates a manager reusing an existing HTTP client (shared pools).
    pub fn with_client(http: reqwest::Client) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            http,
            uploads: TaskRegistry::new(),
            downloads: TaskRegistry::new(),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&self) -> Option<mpsc::Receiver<TransferEvent>> {
        self.events_rx.lock().unwrap().take()
    }

    /// Starts an upload in the background.
    ///
    /// Returns an error only for a duplicate process ID; every failure
    /// after acceptance is delivered as a terminal event instead.
    pub fn start_upload(&self, request: UploadRequest) -> Result<(), TransferError> {
        let process_id = request.process_id.clone();
        let cancel = CancellationToken::new();
        self.uploads
            .insert(&process_id, TaskHandle::new(cancel.clone()))?;
        info!(process_id = %process_id, url = %request.url, "upload accepted");

        let task = UploadTask::new(request, self.http.clone(), cancel, self.events_tx.clone());
        let uploads = self.uploads.clone();
        tokio::spawn(async move {
            task.run().await;
            // Removed only after the terminal event is out; a cancel that
            // races the removal lands on a token nobody reads again.
            uploads.remove(&process_id);
        });
        Ok(())
    }

    /// Requests cancellation of a running upload. No-op for unknown IDs.
    pub fn cancel_upload(&self, process_id: &str) {
        self.uploads.cancel(process_id);
    }

    /// Starts a download in the background.
    pub fn start_download(&self, request: DownloadRequest) -> Result<(), TransferError> {
        let process_id = request.process_id.clone();
        let cancel = CancellationToken::new();
        let (pause_tx, pause_rx) = watch::channel(false);
        self.downloads
            .insert(&process_id, TaskHandle::with_pause(cancel.clone(), pause_tx))?;
        info!(process_id = %process_id, url = %request.url, "download accepted");

        let task = DownloadTask::new(
            request,
            self.http.clone(),
            cancel,
            pause_rx,
            self.events_tx.clone(),
        );
        let downloads = self.downloads.clone();
        tokio::spawn(async move {
            task.run().await;
            downloads.remove(&process_id);
        });
        Ok(())
    }

    /// Requests cancellation of a running download. No-op for unknown IDs.
    pub fn cancel_download(&self, process_id: &str) {
        self.downloads.cancel(process_id);
    }

    /// Holds a running download between chunks. No-op for unknown IDs.
    pub fn pause_download(&self, process_id: &str) {
        self.downloads.set_paused(process_id, true);
    }

    /// Resumes a paused download. No-op for unknown IDs.
    pub fn resume_download(&self, process_id: &str) {
        self.downloads.set_paused(process_id, false);
    }

    /// Number of uploads that have not yet reached a terminal event.
    pub fn active_uploads(&self) -> usize {
        self.uploads.len()
    }

    /// Number of downloads that have not yet reached a terminal event.
    pub fn active_downloads(&self) -> usize {
        self.downloads.len()
    }
}
