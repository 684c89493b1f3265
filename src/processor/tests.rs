//! Tests for the batch load processor

use super::attributes::*;
use super::*;
use crate::error::Error;
use crate::schema::{Field, FieldMode, FieldType, TableSchema};
use crate::types::{Attributes, CreateDisposition, SourceFormat, WriteDisposition};
use crate::warehouse::{Job, WarehouseClient, WriteChannel, WriteChannelConfiguration};
use async_trait::async_trait;
use bytes::Bytes;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TWO_FIELDS: &str = r#"[{"name":"id","type":"INTEGER","mode":"REQUIRED"},{"name":"tags","type":"STRING","mode":"REPEATED"}]"#;

// ============================================================================
// Scripted warehouse
// ============================================================================

#[derive(Clone, Copy, PartialEq)]
enum Fail {
    Nothing,
    Open,
    Write,
    Close,
    Wait,
    Hang,
}

struct ScriptedClient {
    fail: Fail,
    finished: Job,
    writers: AtomicUsize,
    configs: Mutex<Vec<WriteChannelConfiguration>>,
    payloads: Arc<Mutex<Vec<Bytes>>>,
}

impl ScriptedClient {
    fn new(finished: Job) -> Self {
        Self {
            fail: Fail::Nothing,
            finished,
            writers: AtomicUsize::new(0),
            configs: Mutex::new(Vec::new()),
            payloads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn failing(mut self, fail: Fail) -> Self {
        self.fail = fail;
        self
    }

    fn writer_calls(&self) -> usize {
        self.writers.load(Ordering::SeqCst)
    }

    fn last_config(&self) -> WriteChannelConfiguration {
        self.configs.lock().unwrap().last().cloned().unwrap()
    }
}

struct ScriptedChannel {
    fail: Fail,
    payloads: Arc<Mutex<Vec<Bytes>>>,
}

#[async_trait]
impl WriteChannel for ScriptedChannel {
    async fn write(&mut self, data: Bytes) -> crate::Result<usize> {
        if self.fail == Fail::Write {
            return Err(Error::upload("connection reset"));
        }
        let len = data.len();
        self.payloads.lock().unwrap().push(data);
        Ok(len)
    }

    async fn close(self: Box<Self>) -> crate::Result<Job> {
        if self.fail == Fail::Close {
            return Err(Error::upload("finalize rejected"));
        }
        Ok(running_job())
    }
}

#[async_trait]
impl WarehouseClient for ScriptedClient {
    async fn writer(
        &self,
        config: &WriteChannelConfiguration,
    ) -> crate::Result<Box<dyn WriteChannel>> {
        self.writers.fetch_add(1, Ordering::SeqCst);
        self.configs.lock().unwrap().push(config.clone());
        if self.fail == Fail::Open {
            return Err(Error::http_status(403, "Access Denied"));
        }
        Ok(Box::new(ScriptedChannel {
            fail: self.fail,
            payloads: Arc::clone(&self.payloads),
        }))
    }

    async fn wait_for(&self, _job: &Job) -> crate::Result<Job> {
        match self.fail {
            Fail::Wait => Err(Error::Timeout { timeout_ms: 1000 }),
            Fail::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(self.finished.clone())
            }
            _ => Ok(self.finished.clone()),
        }
    }
}

fn running_job() -> Job {
    serde_json::from_value(json!({
        "jobReference": {"projectId": "acme", "jobId": "job_1"},
        "status": {"state": "RUNNING"}
    }))
    .unwrap()
}

fn successful_job() -> Job {
    serde_json::from_value(json!({
        "jobReference": {"projectId": "acme", "jobId": "job_1"},
        "selfLink": "https://job/1",
        "status": {"state": "DONE"},
        "statistics": {"creationTime": "90", "startTime": "100", "endTime": "200"}
    }))
    .unwrap()
}

fn failed_job() -> Job {
    serde_json::from_value(json!({
        "jobReference": {"projectId": "acme", "jobId": "job_1"},
        "selfLink": "https://job/1",
        "status": {
            "state": "DONE",
            "errorResult": {
                "reason": "invalid",
                "location": "gs://none/row/3",
                "message": "Provided Schema does not match Table"
            }
        },
        "statistics": {"creationTime": "90", "startTime": "100", "endTime": "200"}
    }))
    .unwrap()
}

fn context() -> ProcessContext {
    ProcessContext::new()
        .with_property("gcp.project.id", "acme")
        .with_property("bq.table.schema", TWO_FIELDS)
        .with_property("bq.load.write_disposition", "WRITE_APPEND")
}

fn unit_attrs(pairs: &[(&str, &str)]) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.insert("bq.dataset".to_string(), "raw".to_string());
    attrs.insert("bq.table.name".to_string(), "events".to_string());
    for (k, v) in pairs {
        attrs.insert((*k).to_string(), (*v).to_string());
    }
    attrs
}

fn session_with(payload: &'static [u8], attrs: Attributes) -> MemorySession {
    let mut session = MemorySession::new();
    session.enqueue(Bytes::from_static(payload), attrs);
    session
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_end_to_end_success() {
    let client = Arc::new(ScriptedClient::new(successful_job()));
    let processor = PutBigQueryBatch::new(client.clone());
    let ctx = context();
    processor.on_scheduled(&ctx).await.unwrap();

    let mut session = session_with(b"0123456789", unit_attrs(&[]));
    let outcome = processor.on_trigger(&ctx, &mut session).await.unwrap();

    assert_eq!(outcome, LoadOutcome::Success);
    assert!(session.failure().is_empty());
    let flow = session.success()[0];
    assert!(!flow.penalized);

    assert_eq!(flow.attribute(JOB_START_TIME_ATTR), Some("100"));
    assert_eq!(flow.attribute(JOB_END_TIME_ATTR), Some("200"));
    assert_eq!(flow.attribute(JOB_CREATE_TIME_ATTR), Some("90"));
    assert_eq!(flow.attribute(JOB_LINK_ATTR), Some("https://job/1"));
    for name in ERROR_ATTRS {
        assert_eq!(flow.attribute(name), None);
    }

    assert_eq!(flow.attribute(DATASET_ATTR), Some("raw"));
    assert_eq!(flow.attribute(TABLE_NAME_ATTR), Some("events"));
    assert_eq!(flow.attribute(TABLE_SCHEMA_ATTR), Some(TWO_FIELDS));
    assert_eq!(flow.attribute(SOURCE_TYPE_ATTR), Some("AVRO"));
    assert_eq!(flow.attribute(IGNORE_UNKNOWN_ATTR), Some("true"));
    assert_eq!(flow.attribute(CREATE_DISPOSITION_ATTR), Some("CREATE_IF_NEEDED"));
    assert_eq!(flow.attribute(WRITE_DISPOSITION_ATTR), Some("WRITE_APPEND"));
    assert_eq!(flow.attribute(MAX_BADRECORDS_ATTR), Some("0"));

    let config = client.last_config();
    assert_eq!(config.table.to_string(), "acme:raw.events");
    assert_eq!(config.format, SourceFormat::Avro);
    assert_eq!(config.create_disposition, CreateDisposition::CreateIfNeeded);
    assert_eq!(config.write_disposition, WriteDisposition::WriteAppend);
    assert_eq!(
        config.schema,
        Some(TableSchema::of(vec![
            Field::new("id", FieldType::Integer).with_mode(FieldMode::Required),
            Field::new("tags", FieldType::String).with_mode(FieldMode::Repeated),
        ]))
    );

    let payloads = client.payloads.lock().unwrap();
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].len(), 10);
}

#[tokio::test]
async fn test_job_error_routes_to_failure() {
    let client = Arc::new(ScriptedClient::new(failed_job()));
    let processor = PutBigQueryBatch::new(client);
    let ctx = context();
    processor.on_scheduled(&ctx).await.unwrap();

    let mut session = session_with(b"payload", unit_attrs(&[]));
    let outcome = processor.on_trigger(&ctx, &mut session).await.unwrap();

    assert_eq!(outcome, LoadOutcome::Failure);
    let flow = session.failure()[0];
    assert!(flow.penalized);
    assert_eq!(flow.content, Bytes::from_static(b"payload"));
    assert_eq!(
        flow.attribute(JOB_ERROR_MSG_ATTR),
        Some("Provided Schema does not match Table")
    );
    assert_eq!(flow.attribute(JOB_ERROR_REASON_ATTR), Some("invalid"));
    assert_eq!(flow.attribute(JOB_ERROR_LOCATION_ATTR), Some("gs://none/row/3"));
    assert_eq!(flow.attribute(JOB_START_TIME_ATTR), None);
    assert_eq!(flow.attribute(JOB_LINK_ATTR), None);
    assert_eq!(flow.attribute(DATASET_ATTR), Some("raw"));
}

#[tokio::test]
async fn test_stale_error_attributes_removed_on_success() {
    let processor = PutBigQueryBatch::new(Arc::new(ScriptedClient::new(successful_job())));
    let ctx = context();
    processor.on_scheduled(&ctx).await.unwrap();

    let mut session = session_with(
        b"retry",
        unit_attrs(&[
            (JOB_ERROR_MSG_ATTR, "old"),
            (JOB_ERROR_REASON_ATTR, "backendError"),
            (JOB_ERROR_LOCATION_ATTR, "somewhere"),
            ("keep.me", "yes"),
        ]),
    );
    processor.on_trigger(&ctx, &mut session).await.unwrap();

    let flow = session.success()[0];
    for name in ERROR_ATTRS {
        assert_eq!(flow.attribute(name), None, "{name} should be removed");
    }
    assert_eq!(flow.attribute("keep.me"), Some("yes"));
}

#[tokio::test]
async fn test_job_error_replaces_earlier_error_attributes() {
    let quota: Job = serde_json::from_value(json!({
        "jobReference": {"projectId": "acme", "jobId": "job_2"},
        "status": {
            "state": "DONE",
            "errorResult": {"reason": "quotaExceeded", "message": "Quota exceeded"}
        }
    }))
    .unwrap();
    let processor = PutBigQueryBatch::new(Arc::new(ScriptedClient::new(quota)));
    let ctx = context();
    processor.on_scheduled(&ctx).await.unwrap();

    let mut session = session_with(
        b"retry",
        unit_attrs(&[
            (JOB_ERROR_MSG_ATTR, "Provided Schema does not match Table"),
            (JOB_ERROR_REASON_ATTR, "invalid"),
            (JOB_ERROR_LOCATION_ATTR, "gs://none/row/3"),
        ]),
    );
    let outcome = processor.on_trigger(&ctx, &mut session).await.unwrap();

    assert_eq!(outcome, LoadOutcome::Failure);
    let flow = session.failure()[0];
    assert_eq!(flow.attribute(JOB_ERROR_MSG_ATTR), Some("Quota exceeded"));
    assert_eq!(flow.attribute(JOB_ERROR_REASON_ATTR), Some("quotaExceeded"));
    assert_eq!(flow.attribute(JOB_ERROR_LOCATION_ATTR), None);
}

#[tokio::test]
async fn test_empty_queue_is_idle() {
    let client = Arc::new(ScriptedClient::new(successful_job()));
    let processor = PutBigQueryBatch::new(client.clone());
    let ctx = context();
    processor.on_scheduled(&ctx).await.unwrap();

    let mut session = MemorySession::new();
    let outcome = processor.on_trigger(&ctx, &mut session).await.unwrap();

    assert_eq!(outcome, LoadOutcome::Idle);
    assert_eq!(client.writer_calls(), 0);
    assert!(session.transferred().is_empty());
}

#[tokio::test]
async fn test_channel_failures_route_to_failure() {
    for fail in [Fail::Open, Fail::Write, Fail::Close, Fail::Wait] {
        let processor =
            PutBigQueryBatch::new(Arc::new(ScriptedClient::new(successful_job()).failing(fail)));
        let ctx = context();
        processor.on_scheduled(&ctx).await.unwrap();

        let mut session = session_with(b"payload", unit_attrs(&[]));
        let outcome = processor.on_trigger(&ctx, &mut session).await.unwrap();

        assert_eq!(outcome, LoadOutcome::Failure);
        assert!(session.success().is_empty());
        let flow = session.failure()[0];
        assert!(flow.penalized);
        assert_eq!(flow.attribute(JOB_LINK_ATTR), None);
        assert_eq!(flow.attribute(JOB_ERROR_MSG_ATTR), None);
    }
}

#[tokio::test(start_paused = true)]
async fn test_hung_job_times_out() {
    let processor =
        PutBigQueryBatch::new(Arc::new(ScriptedClient::new(successful_job()).failing(Fail::Hang)));
    let ctx = context().with_property("bq.job.timeout", "5");
    processor.on_scheduled(&ctx).await.unwrap();

    let mut session = session_with(b"payload", unit_attrs(&[]));
    let outcome = processor.on_trigger(&ctx, &mut session).await.unwrap();

    assert_eq!(outcome, LoadOutcome::Failure);
    assert!(session.failure()[0].penalized);
}

#[tokio::test]
async fn test_missing_template_attribute_fails_unit() {
    let client = Arc::new(ScriptedClient::new(successful_job()));
    let processor = PutBigQueryBatch::new(client.clone());
    let ctx = context();
    processor.on_scheduled(&ctx).await.unwrap();

    // No bq.table.name attribute for the default template
    let mut attrs = Attributes::new();
    attrs.insert("bq.dataset".to_string(), "raw".to_string());
    let mut session = session_with(b"payload", attrs);

    let outcome = processor.on_trigger(&ctx, &mut session).await.unwrap();

    assert_eq!(outcome, LoadOutcome::Failure);
    assert_eq!(client.writer_calls(), 0);
}

#[tokio::test]
async fn test_templated_properties_resolve_per_unit() {
    let client = Arc::new(ScriptedClient::new(successful_job()));
    let processor = PutBigQueryBatch::new(client.clone());
    let ctx = context()
        .with_property("gcp.project.id", "{{ vars.project }}")
        .with_property("bq.table.name", "events_{{ day }}")
        .with_variables(json!({"project": "acme-prod"}));
    processor.on_scheduled(&ctx).await.unwrap();

    let mut session = session_with(b"x", unit_attrs(&[("day", "20240101")]));
    processor.on_trigger(&ctx, &mut session).await.unwrap();

    let config = client.last_config();
    assert_eq!(config.table.project, "acme-prod");
    assert_eq!(config.table.table, "events_20240101");
    assert_eq!(
        session.success()[0].attribute(TABLE_NAME_ATTR),
        Some("events_20240101")
    );
}

#[tokio::test]
async fn test_no_schema_configured_sends_none() {
    let client = Arc::new(ScriptedClient::new(successful_job()));
    let processor = PutBigQueryBatch::new(client.clone());
    let ctx = ProcessContext::new().with_property("gcp.project.id", "acme");
    processor.on_scheduled(&ctx).await.unwrap();

    let mut session = session_with(b"x", unit_attrs(&[]));
    processor.on_trigger(&ctx, &mut session).await.unwrap();

    assert_eq!(client.last_config().schema, None);
    assert_eq!(processor.cached_schema(), Some(None));
    assert_eq!(session.success()[0].attribute(TABLE_SCHEMA_ATTR), None);
}

// ============================================================================
// Scheduling and validation
// ============================================================================

#[tokio::test]
async fn test_bad_schema_fails_scheduling() {
    let processor = PutBigQueryBatch::new(Arc::new(ScriptedClient::new(successful_job())));
    let ctx = context().with_property(
        "bq.table.schema",
        r#"[{"name":"g","type":"GEOGRAPHY","mode":"NULLABLE"}]"#,
    );

    let err = processor.on_scheduled(&ctx).await.unwrap_err();
    assert!(matches!(err, Error::UnknownFieldType { .. }));
    assert_eq!(processor.cached_schema(), None);
}

#[tokio::test]
async fn test_unscheduled_empty_queue_is_idle_despite_bad_schema() {
    let client = Arc::new(ScriptedClient::new(successful_job()));
    let processor = PutBigQueryBatch::new(client.clone());
    let ctx = context().with_property("bq.table.schema", "not json");

    let mut session = MemorySession::new();
    let outcome = processor.on_trigger(&ctx, &mut session).await.unwrap();

    assert_eq!(outcome, LoadOutcome::Idle);
    assert_eq!(processor.schema_parses(), 0);
    assert_eq!(processor.cached_schema(), None);
}

#[tokio::test]
async fn test_unscheduled_bad_schema_keeps_unit_queued() {
    let client = Arc::new(ScriptedClient::new(successful_job()));
    let processor = PutBigQueryBatch::new(client.clone());
    let ctx = context().with_property("bq.table.schema", "not json");

    let mut session = session_with(b"payload", unit_attrs(&[]));
    assert!(processor.on_trigger(&ctx, &mut session).await.is_err());

    assert_eq!(session.pending(), 1);
    assert!(session.transferred().is_empty());
    assert_eq!(client.writer_calls(), 0);
}

#[tokio::test]
async fn test_invalid_properties_fail_scheduling() {
    let processor = PutBigQueryBatch::new(Arc::new(ScriptedClient::new(successful_job())));
    let ctx = context()
        .with_property("bq.load.type", "PARQUET")
        .with_property("bq.load.max_badrecords", "-1");

    let err = processor.on_scheduled(&ctx).await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("bq.load.type"));
    assert!(message.contains("bq.load.max_badrecords"));
}

#[test]
fn test_validation_rules() {
    let processor = PutBigQueryBatch::new(Arc::new(ScriptedClient::new(successful_job())));
    let ctx = ProcessContext::new()
        .with_property("bq.load.ignore_unknown", "yes")
        .with_property("bq.load.type", "{{ format }}")
        .with_property("bq.job.timeout", "0")
        .with_property("my.dynamic", "");

    let invalid: Vec<String> = processor
        .validate(&ctx)
        .into_iter()
        .filter(|r| !r.valid)
        .map(|r| r.subject)
        .collect();

    assert_eq!(
        invalid,
        vec![
            "gcp.project.id",
            "bq.load.type",
            "bq.load.ignore_unknown",
            "bq.job.timeout",
            "my.dynamic",
        ]
    );
}

#[test]
fn test_defaults_are_valid() {
    let processor = PutBigQueryBatch::new(Arc::new(ScriptedClient::new(successful_job())));
    let ctx = ProcessContext::new()
        .with_property("gcp.project.id", "acme")
        .with_property("custom.tag", "carried");

    assert!(processor.validate(&ctx).iter().all(|r| r.valid));
    assert_eq!(
        ctx.dynamic_properties(processor.properties())
            .into_iter()
            .collect::<Vec<_>>(),
        vec![("custom.tag", "carried")]
    );
}

#[test]
fn test_declared_surface() {
    let processor = PutBigQueryBatch::new(Arc::new(ScriptedClient::new(successful_job())));
    let names: Vec<&str> = processor.properties().iter().map(|p| p.name).collect();

    assert_eq!(names.len(), 10);
    assert!(names.contains(&"bq.load.max_badrecords"));
    assert_eq!(
        processor.relationships().to_vec(),
        vec![Relationship::Success, Relationship::Failure]
    );
    assert_eq!(WRITTEN_ATTRIBUTES.len(), 15);
}

#[tokio::test]
async fn test_on_stopped_clears_cache() {
    let mut processor = PutBigQueryBatch::new(Arc::new(ScriptedClient::new(successful_job())));
    processor.on_scheduled(&context()).await.unwrap();
    assert_eq!(processor.cached_schema().flatten().map(TableSchema::len), Some(2));

    processor.on_stopped();
    assert_eq!(processor.cached_schema(), None);

    // A new lifecycle picks up a changed schema
    let ctx = context().with_property(
        "bq.table.schema",
        r#"[{"name":"only","type":"BOOLEAN","mode":"NULLABLE"}]"#,
    );
    processor.on_scheduled(&ctx).await.unwrap();
    assert_eq!(processor.cached_schema().flatten().map(TableSchema::len), Some(1));
}

#[tokio::test]
async fn test_schema_is_cached_across_triggers() {
    let processor = PutBigQueryBatch::new(Arc::new(ScriptedClient::new(successful_job())));
    processor.on_scheduled(&context()).await.unwrap();

    // A later context change does not re-parse within the lifecycle
    let changed = context().with_property("bq.table.schema", "not json");
    let mut session = session_with(b"x", unit_attrs(&[]));
    let outcome = processor.on_trigger(&changed, &mut session).await.unwrap();

    assert_eq!(outcome, LoadOutcome::Success);
    assert_eq!(processor.cached_schema().flatten().map(TableSchema::len), Some(2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_triggers_share_one_schema() {
    const TASKS: usize = 8;

    let client = Arc::new(ScriptedClient::new(successful_job()));
    let processor = Arc::new(PutBigQueryBatch::new(client.clone()));
    let barrier = Arc::new(tokio::sync::Barrier::new(TASKS));

    let handles: Vec<_> = (0..TASKS)
        .map(|_| {
            let processor = Arc::clone(&processor);
            let barrier = Arc::clone(&barrier);
            let ctx = context();
            tokio::spawn(async move {
                let mut session = session_with(b"x", unit_attrs(&[]));
                barrier.wait().await;
                processor.on_trigger(&ctx, &mut session).await
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), LoadOutcome::Success);
    }

    assert_eq!(processor.schema_parses(), 1);
    let cached = processor.cached_schema().flatten().unwrap();
    assert_eq!(cached.len(), 2);

    let configs = client.configs.lock().unwrap();
    assert_eq!(configs.len(), TASKS);
    assert!(configs.iter().all(|c| c.schema.as_ref() == Some(cached)));
}
