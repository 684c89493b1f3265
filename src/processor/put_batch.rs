//! Batch load processor
//!
//! `PutBigQueryBatch` streams each unit's payload into a BigQuery load job
//! and routes the unit on the job's outcome.

use super::attributes::{
    CREATE_DISPOSITION_ATTR, CREATE_DISPOSITION_DESC, DATASET_ATTR, DATASET_DESC, ERROR_ATTRS,
    IGNORE_UNKNOWN_ATTR, IGNORE_UNKNOWN_DESC, JOB_CREATE_TIME_ATTR, JOB_END_TIME_ATTR,
    JOB_ERROR_LOCATION_ATTR, JOB_ERROR_MSG_ATTR, JOB_ERROR_REASON_ATTR, JOB_LINK_ATTR,
    JOB_START_TIME_ATTR, MAX_BADRECORDS_ATTR, MAX_BADRECORDS_DESC, SOURCE_TYPE_ATTR,
    SOURCE_TYPE_DESC, TABLE_NAME_ATTR, TABLE_NAME_DESC, TABLE_SCHEMA_ATTR, TABLE_SCHEMA_DESC,
    WRITE_DISPOSITION_ATTR, WRITE_DISPOSITION_DESC,
};
use super::context::{ensure_valid, ProcessContext, PropertyDescriptor, PropertyValidator};
use super::flowfile::FlowFile;
use super::session::ProcessSession;
use super::{LoadOutcome, Processor, Relationship};
use crate::error::{Error, Result};
use crate::schema::{parse_schema, TableSchema};
use crate::types::{Attributes, CreateDisposition, SourceFormat, WriteDisposition};
use crate::warehouse::{Job, TableId, WarehouseClient, WriteChannelConfiguration};
use async_trait::async_trait;
use bytes::Bytes;
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

// ============================================================================
// Properties
// ============================================================================

pub const PROJECT_ID: PropertyDescriptor = PropertyDescriptor {
    name: "gcp.project.id",
    display_name: "Project ID",
    description: "Google Cloud project that runs the load job and owns the dataset",
    required: true,
    default_value: None,
    allowable_values: &[],
    supports_templates: true,
    validator: PropertyValidator::NonEmpty,
};

pub const DATASET: PropertyDescriptor = PropertyDescriptor {
    name: DATASET_ATTR,
    display_name: "Dataset",
    description: DATASET_DESC,
    required: true,
    default_value: Some("{{ bq.dataset }}"),
    allowable_values: &[],
    supports_templates: true,
    validator: PropertyValidator::NonEmpty,
};

pub const TABLE_NAME: PropertyDescriptor = PropertyDescriptor {
    name: TABLE_NAME_ATTR,
    display_name: "Table Name",
    description: TABLE_NAME_DESC,
    required: true,
    default_value: Some("{{ bq.table.name }}"),
    allowable_values: &[],
    supports_templates: true,
    validator: PropertyValidator::NonEmpty,
};

pub const TABLE_SCHEMA: PropertyDescriptor = PropertyDescriptor {
    name: TABLE_SCHEMA_ATTR,
    display_name: "Table Schema",
    description: TABLE_SCHEMA_DESC,
    required: false,
    default_value: None,
    allowable_values: &[],
    supports_templates: false,
    validator: PropertyValidator::NonEmpty,
};

pub const SOURCE_TYPE: PropertyDescriptor = PropertyDescriptor {
    name: SOURCE_TYPE_ATTR,
    display_name: "Load file type",
    description: SOURCE_TYPE_DESC,
    required: true,
    default_value: Some("AVRO"),
    allowable_values: &SourceFormat::ALLOWED,
    supports_templates: false,
    validator: PropertyValidator::NonEmpty,
};

pub const IGNORE_UNKNOWN: PropertyDescriptor = PropertyDescriptor {
    name: IGNORE_UNKNOWN_ATTR,
    display_name: "Ignore Unknown Values",
    description: IGNORE_UNKNOWN_DESC,
    required: true,
    default_value: Some("true"),
    allowable_values: &["true", "false"],
    supports_templates: false,
    validator: PropertyValidator::Boolean,
};

pub const CREATE_DISPOSITION: PropertyDescriptor = PropertyDescriptor {
    name: CREATE_DISPOSITION_ATTR,
    display_name: "Create Disposition",
    description: CREATE_DISPOSITION_DESC,
    required: true,
    default_value: Some("CREATE_IF_NEEDED"),
    allowable_values: &CreateDisposition::ALLOWED,
    supports_templates: false,
    validator: PropertyValidator::NonEmpty,
};

pub const WRITE_DISPOSITION: PropertyDescriptor = PropertyDescriptor {
    name: WRITE_DISPOSITION_ATTR,
    display_name: "Write Disposition",
    description: WRITE_DISPOSITION_DESC,
    required: true,
    default_value: Some("WRITE_EMPTY"),
    allowable_values: &WriteDisposition::ALLOWED,
    supports_templates: false,
    validator: PropertyValidator::NonEmpty,
};

pub const MAX_BAD_RECORDS: PropertyDescriptor = PropertyDescriptor {
    name: MAX_BADRECORDS_ATTR,
    display_name: "Max Bad Records",
    description: MAX_BADRECORDS_DESC,
    required: true,
    default_value: Some("0"),
    allowable_values: &[],
    supports_templates: false,
    validator: PropertyValidator::NonNegativeInteger,
};

pub const JOB_TIMEOUT: PropertyDescriptor = PropertyDescriptor {
    name: "bq.job.timeout",
    display_name: "Job Timeout",
    description: "Seconds to wait for a submitted load job to finish before the unit fails",
    required: true,
    default_value: Some("300"),
    allowable_values: &[],
    supports_templates: false,
    validator: PropertyValidator::PositiveInteger,
};

/// Declared properties, in listing order
pub static PROPERTIES: [PropertyDescriptor; 10] = [
    PROJECT_ID,
    DATASET,
    TABLE_NAME,
    TABLE_SCHEMA,
    SOURCE_TYPE,
    CREATE_DISPOSITION,
    WRITE_DISPOSITION,
    MAX_BAD_RECORDS,
    IGNORE_UNKNOWN,
    JOB_TIMEOUT,
];

// ============================================================================
// Resolved load settings
// ============================================================================

/// Property values resolved for one unit
#[derive(Debug, Clone)]
struct LoadSettings {
    table: TableId,
    schema_text: Option<String>,
    format: SourceFormat,
    create_disposition: CreateDisposition,
    write_disposition: WriteDisposition,
    max_bad_records: u32,
    ignore_unknown_values: bool,
    timeout: Duration,
}

impl LoadSettings {
    fn resolve(context: &ProcessContext, attributes: &Attributes) -> Result<Self> {
        let project = context.property(&PROJECT_ID).evaluate_required(Some(attributes))?;
        let dataset = context.property(&DATASET).evaluate_required(Some(attributes))?;
        let table = context.property(&TABLE_NAME).evaluate_required(Some(attributes))?;

        Ok(Self {
            table: TableId::new(project, dataset, table),
            schema_text: context.property(&TABLE_SCHEMA).evaluate(Some(attributes))?,
            format: context.property(&SOURCE_TYPE).parse()?,
            create_disposition: context.property(&CREATE_DISPOSITION).parse()?,
            write_disposition: context.property(&WRITE_DISPOSITION).parse()?,
            max_bad_records: context.property(&MAX_BAD_RECORDS).as_u32()?,
            ignore_unknown_values: context.property(&IGNORE_UNKNOWN).as_bool()?,
            timeout: Duration::from_secs(context.property(&JOB_TIMEOUT).as_u64()?),
        })
    }

    fn channel_config(&self, schema: Option<TableSchema>) -> WriteChannelConfiguration {
        WriteChannelConfiguration::new(self.table.clone())
            .schema(schema)
            .format(self.format)
            .dispositions(self.create_disposition, self.write_disposition)
            .max_bad_records(self.max_bad_records)
            .ignore_unknown_values(self.ignore_unknown_values)
    }

    /// Configuration attributes written on both terminal paths
    fn attributes(&self) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert(DATASET_ATTR.to_string(), self.table.dataset.clone());
        attrs.insert(TABLE_NAME_ATTR.to_string(), self.table.table.clone());
        if let Some(schema) = &self.schema_text {
            attrs.insert(TABLE_SCHEMA_ATTR.to_string(), schema.clone());
        }
        attrs.insert(SOURCE_TYPE_ATTR.to_string(), self.format.to_string());
        attrs.insert(
            IGNORE_UNKNOWN_ATTR.to_string(),
            self.ignore_unknown_values.to_string(),
        );
        attrs.insert(
            CREATE_DISPOSITION_ATTR.to_string(),
            self.create_disposition.to_string(),
        );
        attrs.insert(
            WRITE_DISPOSITION_ATTR.to_string(),
            self.write_disposition.to_string(),
        );
        attrs.insert(
            MAX_BADRECORDS_ATTR.to_string(),
            self.max_bad_records.to_string(),
        );
        attrs
    }
}

// ============================================================================
// Processor
// ============================================================================

/// Loads each unit's payload into a BigQuery table with a batch load job
pub struct PutBigQueryBatch {
    client: Arc<dyn WarehouseClient>,
    schema: OnceCell<Option<TableSchema>>,
    schema_parses: AtomicUsize,
}

impl PutBigQueryBatch {
    /// Create a processor over a warehouse client
    pub fn new(client: Arc<dyn WarehouseClient>) -> Self {
        Self {
            client,
            schema: OnceCell::new(),
            schema_parses: AtomicUsize::new(0),
        }
    }

    /// The cached schema, once parsed
    pub fn cached_schema(&self) -> Option<Option<&TableSchema>> {
        self.schema.get().map(Option::as_ref)
    }

    /// How many times the configured schema has been parsed
    pub fn schema_parses(&self) -> usize {
        self.schema_parses.load(Ordering::Relaxed)
    }

    /// Parse the configured schema once per scheduling lifecycle
    fn schema(&self, context: &ProcessContext) -> Result<Option<&TableSchema>> {
        self.schema
            .get_or_try_init(|| {
                self.schema_parses.fetch_add(1, Ordering::Relaxed);
                let schema = parse_schema(context.property(&TABLE_SCHEMA).value())?;
                match &schema {
                    Some(s) => debug!("Cached table schema with {} fields", s.len()),
                    None => debug!("No table schema configured"),
                }
                Ok(schema)
            })
            .map(Option::as_ref)
    }

    /// Stream the payload through a write channel and return the submitted job
    async fn write(&self, config: &WriteChannelConfiguration, content: Bytes) -> Result<Job> {
        let mut channel = self.client.writer(config).await?;
        let written = channel.write(content).await?;
        debug!("Wrote {written} bytes to load channel for {}", config.table);
        channel.close().await
    }

    /// Wait for the job, bounded by the configured timeout
    async fn await_job(&self, job: &Job, timeout: Duration) -> Result<Job> {
        match tokio::time::timeout(timeout, self.client.wait_for(job)).await {
            Ok(result) => result,
            Err(_) => Err(Error::JobTimeout {
                job_id: job.id().to_string(),
                timeout_secs: timeout.as_secs(),
            }),
        }
    }

    fn route_failure(
        &self,
        session: &mut dyn ProcessSession,
        flow: FlowFile,
        stage: &str,
        err: &Error,
    ) -> LoadOutcome {
        error!("Failed to {stage} unit {}: {err}", flow.id);
        let flow = session.penalize(flow);
        session.transfer(flow, Relationship::Failure);
        LoadOutcome::Failure
    }

    fn report(
        &self,
        session: &mut dyn ProcessSession,
        mut flow: FlowFile,
        settings: &LoadSettings,
        job: &Job,
    ) -> LoadOutcome {
        let mut attributes = settings.attributes();

        // A unit may loop back here after an earlier failure
        for name in ERROR_ATTRS {
            flow.remove_attribute(name);
        }

        if let Some(job_error) = job.error() {
            warn!(
                "Load job {} into {} failed: {} ({})",
                job.id(),
                settings.table,
                job_error.message,
                job_error.reason
            );
            attributes.insert(JOB_ERROR_MSG_ATTR.to_string(), job_error.message.clone());
            attributes.insert(JOB_ERROR_REASON_ATTR.to_string(), job_error.reason.clone());
            if let Some(location) = &job_error.location {
                attributes.insert(JOB_ERROR_LOCATION_ATTR.to_string(), location.clone());
            }
            flow.put_all_attributes(attributes);

            let flow = session.penalize(flow);
            session.transfer(flow, Relationship::Failure);
            return LoadOutcome::Failure;
        }

        let stats = &job.statistics;
        for (name, value) in [
            (JOB_CREATE_TIME_ATTR, stats.creation_time),
            (JOB_START_TIME_ATTR, stats.start_time),
            (JOB_END_TIME_ATTR, stats.end_time),
        ] {
            if let Some(millis) = value {
                attributes.insert(name.to_string(), millis.to_string());
            }
        }
        if let Some(link) = &job.self_link {
            attributes.insert(JOB_LINK_ATTR.to_string(), link.clone());
        }
        flow.put_all_attributes(attributes);

        info!("Loaded unit {} into {} (job {})", flow.id, settings.table, job.id());
        session.transfer(flow, Relationship::Success);
        LoadOutcome::Success
    }
}

#[async_trait]
impl Processor for PutBigQueryBatch {
    fn properties(&self) -> &'static [PropertyDescriptor] {
        &PROPERTIES
    }

    async fn on_scheduled(&self, context: &ProcessContext) -> Result<()> {
        self.schema(context)?;
        ensure_valid(&self.validate(context))?;

        let dynamic = context.dynamic_properties(self.properties());
        if !dynamic.is_empty() {
            debug!("Carrying {} dynamic properties", dynamic.len());
        }
        info!("PutBigQueryBatch scheduled");
        Ok(())
    }

    async fn on_trigger(
        &self,
        context: &ProcessContext,
        session: &mut dyn ProcessSession,
    ) -> Result<LoadOutcome> {
        let Some(flow) = session.get() else {
            return Ok(LoadOutcome::Idle);
        };

        let schema = match self.schema(context) {
            Ok(schema) => schema.cloned(),
            Err(e) => {
                session.rollback(flow);
                return Err(e);
            }
        };

        let settings = match LoadSettings::resolve(context, &flow.attributes) {
            Ok(settings) => settings,
            Err(e) => return Ok(self.route_failure(session, flow, "resolve properties for", &e)),
        };

        let config = settings.channel_config(schema);
        let submitted = match self.write(&config, flow.content.clone()).await {
            Ok(job) => job,
            Err(e) => return Ok(self.route_failure(session, flow, "upload", &e)),
        };

        let job = match self.await_job(&submitted, settings.timeout).await {
            Ok(job) => job,
            Err(e) => return Ok(self.route_failure(session, flow, "await load job for", &e)),
        };

        Ok(self.report(session, flow, &settings, &job))
    }

    fn on_stopped(&mut self) {
        self.schema = OnceCell::new();
        debug!("Schema cache cleared");
    }
}
