//! Warehouse client module
//!
//! The processor talks to the warehouse through two seams:
//!
//! - [`WarehouseClient`] opens write channels and waits for jobs
//! - [`WriteChannel`] streams one payload into a load job
//!
//! [`BigQueryClient`] implements both over the BigQuery REST API using the
//! resumable upload protocol:
//!
//! ```text
//! POST /upload/bigquery/v2/projects/{project}/jobs?uploadType=resumable
//!      body: job resource            -> 200, Location: <session url>
//! PUT  <session url>  Content-Range: bytes 0-262143/*      -> 308
//! PUT  <session url>  Content-Range: bytes 262144-300000/300001 -> 200 job
//! GET  /bigquery/v2/projects/{project}/jobs/{job}?location=  (until DONE)
//! ```

mod channel;
mod client;
mod types;

pub use channel::ResumableWriteChannel;
pub use client::{BigQueryClient, BigQueryClientConfig, UPLOAD_CHUNK_ALIGNMENT};
pub use types::{
    Job, JobError, JobReference, JobStatistics, JobStatus, TableId, WriteChannelConfiguration,
};

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// Access to the warehouse's load-job facilities
#[async_trait]
pub trait WarehouseClient: Send + Sync {
    /// Start a load job and return a channel for its payload
    async fn writer(&self, config: &WriteChannelConfiguration) -> Result<Box<dyn WriteChannel>>;

    /// Block until the job reaches its final state
    async fn wait_for(&self, job: &Job) -> Result<Job>;
}

/// Byte sink feeding one load job
#[async_trait]
pub trait WriteChannel: Send {
    /// Append bytes to the payload, returning how many were accepted
    async fn write(&mut self, data: Bytes) -> Result<usize>;

    /// Finish the payload and return the submitted job
    async fn close(self: Box<Self>) -> Result<Job>;
}
