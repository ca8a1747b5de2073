//! The upload task: streams one local file to an HTTP endpoint.
//!
//! The file is read in [`UPLOAD_CHUNK_SIZE`] chunks and handed to the
//! transport through a streaming request body with an exact
//! `Content-Length`, so the whole file is never held in memory. Each
//! chunk is reported as progress as it is handed over, and the
//! cancellation token is observed between chunks; a cancel aborts the
//! body mid-flight and the server response is never read.

use bytes::Bytes;
use futures_util::Stream;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{ErrorKind, TransferError};
use crate::types::{TransferEvent, UploadRequest, resolve_local_path};
use crate::{DESTINATION_HEADER, HASH_HEADER, TOKEN_HEADER, UPLOAD_CHUNK_SIZE, UPLOAD_CONTENT_TYPE};

/// Parses one name/value pair into typed header parts.
pub(crate) fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), TransferError> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| TransferError::Header(format!("{name}: {e}")))?;
    let header_value =
        HeaderValue::from_str(value).map_err(|e| TransferError::Header(format!("{name}: {e}")))?;
    Ok((header_name, header_value))
}

/// Builds the caller-supplied headers, preserving their order.
pub(crate) fn extra_header_map(pairs: &[(String, String)]) -> Result<HeaderMap, TransferError> {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        let (header_name, header_value) = header_pair(name, value)?;
        headers.append(header_name, header_value);
    }
    Ok(headers)
}

/// A single in-flight upload.
pub struct UploadTask {
    request: UploadRequest,
    http: reqwest::Client,
    cancel: CancellationToken,
    events: mpsc::Sender<TransferEvent>,
}

impl UploadTask {
    pub fn new(
        request: UploadRequest,
        http: reqwest::Client,
        cancel: CancellationToken,
        events: mpsc::Sender<TransferEvent>,
    ) -> Self {
        Self {
            request,
            http,
            cancel,
            events,
        }
    }

    /// Runs the upload to completion and emits exactly one terminal event.
    ///
    /// All failures end here as a [`TransferEvent::UploadFailed`]; nothing
    /// propagates back to the caller that started the task.
    pub async fn run(self) {
        let process_id = self.request.process_id.clone();
        let event = match self.send_file().await {
            Ok((status, body)) => {
                info!(process_id = %process_id, status, "upload completed");
                TransferEvent::UploadCompleted {
                    process_id,
                    status,
                    body,
                }
            }
            Err(e) => {
                let kind = e.kind();
                if kind == ErrorKind::Cancelled {
                    info!(process_id = %process_id, "upload cancelled");
                } else {
                    warn!(process_id = %process_id, error = %e, "upload failed");
                }
                TransferEvent::UploadFailed {
                    process_id,
                    kind,
                    message: e.to_string(),
                }
            }
        };
        let _ = self.events.send(event).await;
    }

    async fn send_file(&self) -> Result<(u16, String), TransferError> {
        let path = resolve_local_path(&self.request.source_path);
        let file = tokio::fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TransferError::FileNotFound(path.display().to_string())
            } else {
                TransferError::Io(e)
            }
        })?;
        let meta = file.metadata().await?;
        if !meta.is_file() {
            return Err(TransferError::FileNotFound(path.display().to_string()));
        }
        let total_bytes = meta.len();
        let headers = self.build_headers()?;

        info!(
            process_id = %self.request.process_id,
            url = %self.request.url,
            bytes = total_bytes,
            "upload started"
        );

        let body = reqwest::Body::wrap_stream(chunk_stream(
            file,
            total_bytes,
            self.request.process_id.clone(),
            self.cancel.clone(),
            self.events.clone(),
        ));

        // Explicit Content-Length keeps the body fixed-length on the wire
        // instead of chunked transfer encoding.
        let response = self
            .http
            .post(&self.request.url)
            .headers(headers)
            .header(CONTENT_LENGTH, total_bytes)
            .body(body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| self.classify(e))?;
        Ok((status, body.trim().to_string()))
    }

    /// Extra headers first (verbatim), then the engine's fixed headers.
    fn build_headers(&self) -> Result<HeaderMap, TransferError> {
        let mut headers = extra_header_map(&self.request.extra_headers)?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(UPLOAD_CONTENT_TYPE));

        let (name, value) = header_pair(HASH_HEADER, &self.request.content_hash)?;
        headers.insert(name, value);
        let (name, value) = header_pair(DESTINATION_HEADER, &self.request.destination)?;
        headers.insert(name, value);
        if let Some(token) = &self.request.auth_token {
            let (name, value) = header_pair(TOKEN_HEADER, token)?;
            headers.insert(name, value);
        }
        Ok(headers)
    }

    /// A transport error after a cancel was requested is the cancel.
    fn classify(&self, e: reqwest::Error) -> TransferError {
        if self.cancel.is_cancelled() {
            TransferError::Cancelled
        } else {
            TransferError::Http(e)
        }
    }
}

/// Reads `file` in fixed-size chunks as a request body stream.
///
/// Each iteration checks the cancellation token, reads one chunk and
/// reports it as progress before handing it over. The progress event has
/// to precede the yield: once the transport has framed the final chunk
/// of a fixed-length body it never polls the stream again, so nothing
/// placed after the last yield would run. Yielding an error aborts the
/// request, which tears down the connection without reading a response.
fn chunk_stream(
    mut file: tokio::fs::File,
    total_bytes: u64,
    process_id: String,
    cancel: CancellationToken,
    events: mpsc::Sender<TransferEvent>,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
    async_stream::stream! {
        let mut buf = vec![0u8; UPLOAD_CHUNK_SIZE];
        let mut sent_bytes: u64 = 0;
        loop {
            if cancel.is_cancelled() {
                yield Err(std::io::Error::other("upload cancelled"));
                return;
            }
            let n = match file.read(&mut buf).await {
                Ok(n) => n,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            if n == 0 {
                break;
            }
            sent_bytes += n as u64;
            let _ = events
                .send(TransferEvent::UploadProgress {
                    process_id: process_id.clone(),
                    sent_bytes,
                    total_bytes,
                })
                .await;
            yield Ok(Bytes::copy_from_slice(&buf[..n]));
        }
    }
}
