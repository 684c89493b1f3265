//! Load job types
//!
//! Request side: [`WriteChannelConfiguration`] describes one load job and
//! renders the REST job resource. Response side: [`Job`] is the subset of
//! the job resource the processor reports on.

use crate::schema::TableSchema;
use crate::types::{CreateDisposition, SourceFormat, WriteDisposition};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Fully-qualified destination table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableId {
    /// Project id
    #[serde(rename = "projectId")]
    pub project: String,
    /// Dataset id
    #[serde(rename = "datasetId")]
    pub dataset: String,
    /// Table id
    #[serde(rename = "tableId")]
    pub table: String,
}

impl TableId {
    /// Create a table id
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}.{}", self.project, self.dataset, self.table)
    }
}

/// Configuration of a single load job
#[derive(Debug, Clone, PartialEq)]
pub struct WriteChannelConfiguration {
    /// Destination table
    pub table: TableId,
    /// Destination schema; `None` lets the warehouse infer or keep it
    pub schema: Option<TableSchema>,
    /// Payload format
    pub format: SourceFormat,
    /// Whether the table may be created
    pub create_disposition: CreateDisposition,
    /// How existing rows are treated
    pub write_disposition: WriteDisposition,
    /// Tolerated number of bad records
    pub max_bad_records: u32,
    /// Whether unknown values are ignored rather than rejected
    pub ignore_unknown_values: bool,
}

impl WriteChannelConfiguration {
    /// Configuration with default format and dispositions
    pub fn new(table: TableId) -> Self {
        Self {
            table,
            schema: None,
            format: SourceFormat::default(),
            create_disposition: CreateDisposition::default(),
            write_disposition: WriteDisposition::default(),
            max_bad_records: 0,
            ignore_unknown_values: false,
        }
    }

    /// Set the schema
    #[must_use]
    pub fn schema(mut self, schema: Option<TableSchema>) -> Self {
        self.schema = schema;
        self
    }

    /// Set the payload format
    #[must_use]
    pub fn format(mut self, format: SourceFormat) -> Self {
        self.format = format;
        self
    }

    /// Set both dispositions
    #[must_use]
    pub fn dispositions(mut self, create: CreateDisposition, write: WriteDisposition) -> Self {
        self.create_disposition = create;
        self.write_disposition = write;
        self
    }

    /// Set the bad-record tolerance
    #[must_use]
    pub fn max_bad_records(mut self, max: u32) -> Self {
        self.max_bad_records = max;
        self
    }

    /// Set whether unknown values are ignored
    #[must_use]
    pub fn ignore_unknown_values(mut self, ignore: bool) -> Self {
        self.ignore_unknown_values = ignore;
        self
    }

    /// Render the job resource sent when a load is started
    pub fn to_job_resource(&self, job_id: &str) -> Value {
        let resource = JobResource {
            job_reference: JobReference {
                project_id: self.table.project.clone(),
                job_id: job_id.to_string(),
                location: None,
            },
            configuration: JobConfiguration {
                load: JobConfigurationLoad {
                    destination_table: &self.table,
                    schema: self.schema.as_ref(),
                    source_format: self.format,
                    create_disposition: self.create_disposition,
                    write_disposition: self.write_disposition,
                    max_bad_records: self.max_bad_records,
                    ignore_unknown_values: self.ignore_unknown_values,
                },
            },
        };
        serde_json::to_value(resource).unwrap_or(Value::Null)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JobResource<'a> {
    job_reference: JobReference,
    configuration: JobConfiguration<'a>,
}

#[derive(Serialize)]
struct JobConfiguration<'a> {
    load: JobConfigurationLoad<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JobConfigurationLoad<'a> {
    destination_table: &'a TableId,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<&'a TableSchema>,
    source_format: SourceFormat,
    create_disposition: CreateDisposition,
    write_disposition: WriteDisposition,
    max_bad_records: u32,
    ignore_unknown_values: bool,
}

/// Reference identifying a job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReference {
    /// Project the job runs in
    #[serde(default)]
    pub project_id: String,
    /// Job id
    #[serde(default)]
    pub job_id: String,
    /// Processing location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Job error as reported in `status.errorResult`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JobError {
    /// Human-readable message
    #[serde(default)]
    pub message: String,
    /// Short error code
    #[serde(default)]
    pub reason: String,
    /// Where the error occurred, if known
    #[serde(default)]
    pub location: Option<String>,
}

/// Job status
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    /// PENDING, RUNNING or DONE
    #[serde(default)]
    pub state: String,
    /// Fatal error, present once a failed job is DONE
    #[serde(default)]
    pub error_result: Option<JobError>,
}

/// Job timing, epoch milliseconds
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatistics {
    /// When the job was created
    #[serde(default, deserialize_with = "millis")]
    pub creation_time: Option<i64>,
    /// When the job started
    #[serde(default, deserialize_with = "millis")]
    pub start_time: Option<i64>,
    /// When the job ended
    #[serde(default, deserialize_with = "millis")]
    pub end_time: Option<i64>,
}

/// A load job as returned by the warehouse
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Job reference
    #[serde(default)]
    pub job_reference: JobReference,
    /// URL of the job resource
    #[serde(default)]
    pub self_link: Option<String>,
    /// Current status
    #[serde(default)]
    pub status: JobStatus,
    /// Timing statistics
    #[serde(default)]
    pub statistics: JobStatistics,
}

impl Job {
    /// Whether the job has reached its final state
    pub fn is_done(&self) -> bool {
        self.status.state == "DONE"
    }

    /// Error result of a finished job
    pub fn error(&self) -> Option<&JobError> {
        self.status.error_result.as_ref()
    }

    /// Job id
    pub fn id(&self) -> &str {
        &self.job_reference.job_id
    }
}

// int64 fields arrive as JSON strings
fn millis<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Millis {
        Number(i64),
        Text(String),
    }

    match Option::<Millis>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Millis::Number(n)) => Ok(Some(n)),
        Some(Millis::Text(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}
