//! BigQuery REST client

use super::channel::ResumableWriteChannel;
use super::types::{Job, WriteChannelConfiguration};
use super::{WarehouseClient, WriteChannel};
use crate::error::{Error, Result};
use crate::http::{backoff_delay, HttpClient, RequestConfig};
use crate::types::BackoffType;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Upload chunks must be a multiple of this many bytes
pub const UPLOAD_CHUNK_ALIGNMENT: usize = 256 * 1024;

static JOB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Settings for the REST client
#[derive(Debug, Clone)]
pub struct BigQueryClientConfig {
    /// Bytes per upload chunk, a multiple of [`UPLOAD_CHUNK_ALIGNMENT`]
    pub chunk_size: usize,
    /// First delay between job status polls
    pub poll_initial: Duration,
    /// Longest delay between job status polls
    pub poll_max: Duration,
}

impl Default for BigQueryClientConfig {
    fn default() -> Self {
        Self {
            chunk_size: 8 * 1024 * 1024,
            poll_initial: Duration::from_millis(500),
            poll_max: Duration::from_secs(10),
        }
    }
}

impl BigQueryClientConfig {
    /// Round a requested chunk size up to the upload alignment
    pub fn aligned_chunk_size(requested: usize) -> usize {
        let chunks = requested.div_ceil(UPLOAD_CHUNK_ALIGNMENT).max(1);
        chunks * UPLOAD_CHUNK_ALIGNMENT
    }
}

/// Load-job client for the BigQuery REST API
///
/// The [`HttpClient`] carries the endpoint as its base URL together with
/// credentials and transport retries.
#[derive(Debug, Clone)]
pub struct BigQueryClient {
    http: Arc<HttpClient>,
    config: BigQueryClientConfig,
}

impl BigQueryClient {
    /// Create a client over an HTTP transport
    pub fn new(http: HttpClient, mut config: BigQueryClientConfig) -> Self {
        config.chunk_size = BigQueryClientConfig::aligned_chunk_size(config.chunk_size);
        Self {
            http: Arc::new(http),
            config,
        }
    }

    /// Client settings
    pub fn config(&self) -> &BigQueryClientConfig {
        &self.config
    }

    /// Open a resumable upload session for a load job
    pub async fn start_upload(&self, config: &WriteChannelConfiguration) -> Result<String> {
        let job_id = next_job_id();
        let path = format!(
            "/upload/bigquery/v2/projects/{}/jobs",
            config.table.project
        );
        info!("Starting load job {job_id} into {}", config.table);

        let response = self
            .http
            .post_with_config(
                &path,
                RequestConfig::new()
                    .query("uploadType", "resumable")
                    .json(config.to_job_resource(&job_id)),
            )
            .await?;

        response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| Error::upload("upload start response carried no Location header"))
    }

    /// Fetch the current state of a job
    pub async fn get_job(&self, project: &str, job_id: &str, location: Option<&str>) -> Result<Job> {
        let path = format!("/bigquery/v2/projects/{project}/jobs/{job_id}");
        let mut request = RequestConfig::new();
        if let Some(location) = location {
            request = request.query("location", location);
        }
        self.http.get_json_with_config(&path, request).await
    }
}

#[async_trait]
impl WarehouseClient for BigQueryClient {
    async fn writer(&self, config: &WriteChannelConfiguration) -> Result<Box<dyn WriteChannel>> {
        let session_url = self.start_upload(config).await?;
        debug!("Upload session opened at {session_url}");
        Ok(Box::new(ResumableWriteChannel::new(
            Arc::clone(&self.http),
            session_url,
            self.config.chunk_size,
        )))
    }

    async fn wait_for(&self, job: &Job) -> Result<Job> {
        if job.is_done() {
            return Ok(job.clone());
        }

        let reference = &job.job_reference;
        if reference.job_id.is_empty() {
            return Err(Error::warehouse("job has no id to poll"));
        }

        let mut attempt = 0;
        loop {
            let delay = backoff_delay(
                BackoffType::Exponential,
                self.config.poll_initial,
                self.config.poll_max,
                attempt,
            );
            tokio::time::sleep(delay).await;
            attempt += 1;

            match self
                .get_job(
                    &reference.project_id,
                    &reference.job_id,
                    reference.location.as_deref(),
                )
                .await
            {
                Ok(current) if current.is_done() => {
                    debug!("Job {} is DONE after {attempt} polls", reference.job_id);
                    return Ok(current);
                }
                Ok(current) => {
                    debug!("Job {} is {}", reference.job_id, current.status.state);
                }
                Err(e) if e.is_retryable() => {
                    warn!("Polling job {} failed, will retry: {e}", reference.job_id);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn next_job_id() -> String {
    let n = JOB_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!(
        "bq_batch_load_{}_{}_{n}",
        std::process::id(),
        Utc::now().timestamp_micros()
    )
}
