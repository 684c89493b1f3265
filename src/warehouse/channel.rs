//! Resumable upload channel

use super::types::Job;
use super::WriteChannel;
use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestConfig};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::Response;
use std::sync::Arc;
use tracing::{debug, warn};

const OCTET_STREAM: &str = "application/octet-stream";

/// Status the upload endpoint uses for "chunk stored, send more"
const RESUME_INCOMPLETE: u16 = 308;

/// Write channel over an open resumable upload session
///
/// Full chunks are sent as soon as more data follows them; the last chunk
/// is held back so `close` can send it with the total size.
pub struct ResumableWriteChannel {
    http: Arc<HttpClient>,
    session_url: String,
    chunk_size: usize,
    buffer: BytesMut,
    /// Bytes the server has acknowledged
    offset: u64,
}

impl ResumableWriteChannel {
    /// Attach to an upload session
    pub fn new(http: Arc<HttpClient>, session_url: impl Into<String>, chunk_size: usize) -> Self {
        Self {
            http,
            session_url: session_url.into(),
            chunk_size,
            buffer: BytesMut::new(),
            offset: 0,
        }
    }

    /// Session URL returned by the upload start request
    pub fn session_url(&self) -> &str {
        &self.session_url
    }

    /// Send one intermediate chunk and drop whatever the server committed
    ///
    /// A chunk is never resent blind. After a transient failure the session
    /// is asked how far it got, and only bytes past that point go out again.
    async fn flush_chunk(&mut self) -> Result<()> {
        let max_retries = self.http.config().max_retries;
        let mut attempt = 0;

        loop {
            let error = match self.put_chunk().await {
                Ok(committed) if committed <= self.offset => {
                    return Err(Error::upload(format!(
                        "server made no progress past byte {}",
                        self.offset
                    )))
                }
                Ok(committed) => return self.commit(committed),
                Err(e) if e.is_retryable() && attempt < max_retries => e,
                Err(e) => return Err(e),
            };

            let delay = self.http.calculate_backoff(attempt);
            attempt += 1;
            warn!(
                "Chunk at byte {} failed ({error}), attempt {attempt}/{}, recovering in {delay:?}",
                self.offset,
                max_retries + 1
            );
            tokio::time::sleep(delay).await;

            let committed = self.query_committed().await?;
            self.commit(committed)?;
            if self.buffer.len() <= self.chunk_size {
                return Ok(());
            }
        }
    }

    /// PUT the next chunk once; returns the committed byte count
    async fn put_chunk(&self) -> Result<u64> {
        let chunk = Bytes::copy_from_slice(&self.buffer[..self.chunk_size]);
        let end = self.offset + chunk.len() as u64 - 1;
        let range = format!("bytes {}-{end}/*", self.offset);
        debug!("Uploading chunk {range}");

        let response = self
            .http
            .put_with_config(
                &self.session_url,
                RequestConfig::new()
                    .header("Content-Range", range)
                    .bytes(chunk, OCTET_STREAM)
                    .retries(0),
            )
            .await?;

        if response.status().as_u16() != RESUME_INCOMPLETE {
            return Err(Error::upload(format!(
                "expected 308 for intermediate chunk, got {}",
                response.status().as_u16()
            )));
        }
        Ok(committed_bytes(&response).unwrap_or(0))
    }

    /// Ask the session how many bytes it holds
    async fn query_committed(&self) -> Result<u64> {
        let response = self
            .http
            .put_with_config(
                &self.session_url,
                RequestConfig::new()
                    .header("Content-Range", "bytes */*")
                    .bytes(Bytes::new(), OCTET_STREAM),
            )
            .await?;

        if response.status().as_u16() != RESUME_INCOMPLETE {
            return Err(Error::upload(format!(
                "expected 308 for upload status, got {}",
                response.status().as_u16()
            )));
        }
        let committed = committed_bytes(&response).unwrap_or(0);
        debug!("Upload session holds {committed} bytes");
        Ok(committed)
    }

    /// Drop buffered bytes up to `committed`
    fn commit(&mut self, committed: u64) -> Result<()> {
        let buffered_end = self.offset + self.buffer.len() as u64;
        if committed < self.offset || committed > buffered_end {
            return Err(Error::upload(format!(
                "server reports {committed} bytes committed, expected {}..={buffered_end}",
                self.offset
            )));
        }

        let accepted = (committed - self.offset) as usize;
        let _ = self.buffer.split_to(accepted);
        self.offset = committed;
        Ok(())
    }
}

#[async_trait]
impl WriteChannel for ResumableWriteChannel {
    async fn write(&mut self, data: Bytes) -> Result<usize> {
        let len = data.len();
        self.buffer.extend_from_slice(&data);

        while self.buffer.len() > self.chunk_size {
            self.flush_chunk().await?;
        }

        Ok(len)
    }

    async fn close(mut self: Box<Self>) -> Result<Job> {
        let remaining = self.buffer.split().freeze();
        let total = self.offset + remaining.len() as u64;
        let range = if remaining.is_empty() {
            format!("bytes */{total}")
        } else {
            format!("bytes {}-{}/{total}", self.offset, total - 1)
        };
        debug!("Finalizing upload with {range}");

        let response = self
            .http
            .put_with_config(
                &self.session_url,
                RequestConfig::new()
                    .header("Content-Range", range)
                    .bytes(remaining, OCTET_STREAM),
            )
            .await?;

        if response.status().as_u16() == RESUME_INCOMPLETE {
            return Err(Error::upload(format!(
                "upload incomplete after {total} bytes"
            )));
        }

        response.json::<Job>().await.map_err(Error::Http)
    }
}

/// Parse `Range: bytes=0-N` into the count of committed bytes
fn committed_bytes(response: &Response) -> Option<u64> {
    let range = response.headers().get("range")?.to_str().ok()?;
    let end = range.strip_prefix("bytes=")?.split('-').nth(1)?;
    end.trim().parse::<u64>().ok().map(|n| n + 1)
}
