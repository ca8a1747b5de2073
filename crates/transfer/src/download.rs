//! The download task: streams an HTTP response body to a local file.
//!
//! Mirrors the upload task in reverse. The storage server expects a POST
//! for downloads as well; the response body is written to the destination
//! chunk by chunk with a progress event per chunk. Downloads additionally
//! carry a pause switch: while paused the task holds between chunks and
//! stays cancellable. A cancel or a mid-stream failure removes the
//! partial file.

use std::path::Path;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::TOKEN_HEADER;
use crate::error::{ErrorKind, TransferError};
use crate::types::{DownloadRequest, TransferEvent, resolve_local_path};
use crate::upload::{extra_header_map, header_pair};

/// A single in-flight download.
pub struct DownloadTask {
    request: DownloadRequest,
    http: reqwest::Client,
    cancel: CancellationToken,
    pause: watch::Receiver<bool>,
    events: mpsc::Sender<TransferEvent>,
}

impl DownloadTask {
    pub fn new(
        request: DownloadRequest,
        http: reqwest::Client,
        cancel: CancellationToken,
        pause: watch::Receiver<bool>,
        events: mpsc::Sender<TransferEvent>,
    ) -> Self {
        Self {
            request,
            http,
            cancel,
            pause,
            events,
        }
    }

    /// Runs the download to completion and emits exactly one terminal event.
    pub async fn run(mut self) {
        let process_id = self.request.process_id.clone();
        let event = match self.fetch_file().await {
            Ok(path) => {
                info!(process_id = %process_id, path = %path, "download completed");
                TransferEvent::DownloadCompleted { process_id, path }
            }
            Err(e) => {
                let kind = e.kind();
                if kind == ErrorKind::Cancelled {
                    info!(process_id = %process_id, "download cancelled");
                } else {
                    warn!(process_id = %process_id, error = %e, "download failed");
                }
                TransferEvent::DownloadFailed {
                    process_id,
                    kind,
                    message: e.to_string(),
                }
            }
        };
        let _ = self.events.send(event).await;
    }

    async fn fetch_file(&mut self) -> Result<String, TransferError> {
        let path = resolve_local_path(&self.request.destination);
        let mut headers = extra_header_map(&self.request.extra_headers)?;
        if let Some(token) = &self.request.auth_token {
            let (name, value) = header_pair(TOKEN_HEADER, token)?;
            headers.insert(name, value);
        }

        info!(
            process_id = %self.request.process_id,
            url = %self.request.url,
            "download started"
        );

        let response = self
            .http
            .post(&self.request.url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::Status(status.as_u16()));
        }

        match self.write_body(response, &path).await {
            Ok(()) => Ok(path.display().to_string()),
            Err(e) => {
                // Never leave a truncated file behind.
                let _ = tokio::fs::remove_file(&path).await;
                Err(e)
            }
        }
    }

    async fn write_body(
        &mut self,
        response: reqwest::Response,
        path: &Path,
    ) -> Result<(), TransferError> {
        let expected_bytes = response.content_length();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(path).await?;
        let mut stream = response.bytes_stream();
        let mut received_bytes: u64 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(TransferError::Cancelled);
            }
            // Hold between chunks while paused, staying cancellable. A
            // dropped pause switch counts as resumed.
            while *self.pause.borrow() {
                tokio::select! {
                    _ = self.cancel.cancelled() => return Err(TransferError::Cancelled),
                    res = self.pause.wait_for(|paused| !*paused) => {
                        if res.is_err() {
                            break;
                        }
                    }
                }
            }

            let chunk = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(TransferError::Cancelled),
                chunk = stream.next() => chunk,
            };
            match chunk {
                Some(Ok(bytes)) => {
                    file.write_all(&bytes).await?;
                    received_bytes += bytes.len() as u64;
                    let _ = self
                        .events
                        .send(TransferEvent::DownloadProgress {
                            process_id: self.request.process_id.clone(),
                            received_bytes,
                            expected_bytes,
                        })
                        .await;
                }
                Some(Err(e)) => return Err(e.into()),
                None => {
                    file.flush().await?;
                    return Ok(());
                }
            }
        }
    }

    fn classify(&self, e: reqwest::Error) -> TransferError {
        if self.cancel.is_cancelled() {
            TransferError::Cancelled
        } else {
            TransferError::Http(e)
        }
    }
}
