//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::LoaderConfig;
use crate::error::{Error, Result};
use crate::processor::attributes::WRITTEN_ATTRIBUTES;
use crate::processor::{
    ensure_valid, LoadOutcome, MemorySession, Processor, PutBigQueryBatch, Relationship,
    PROPERTIES, TABLE_SCHEMA,
};
use crate::schema::{parse_schema, schema_from_str};
use crate::types::Attributes;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Attributes describing the payload file
const FILENAME_ATTR: &str = "filename";
const PATH_ATTR: &str = "path";
const FILE_SIZE_ATTR: &str = "file.size";

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Properties => self.properties(),
            Commands::Schema { schema, file } => self.schema(schema.as_deref(), file.as_deref()),
            Commands::Validate { config } => self.validate(config),
            Commands::Load {
                config,
                attributes,
                files,
            } => self.load(config, attributes, files).await,
        }
    }

    /// Describe the processor surface
    fn properties(&self) -> Result<()> {
        let relationships: Vec<Value> = Relationship::ALL
            .iter()
            .map(|r| json!({ "name": r.name(), "description": r.description() }))
            .collect();
        let attributes: Vec<Value> = WRITTEN_ATTRIBUTES
            .iter()
            .map(|(name, description)| json!({ "name": name, "description": description }))
            .collect();

        self.output_message(&json!({
            "type": "PROPERTIES",
            "properties": &PROPERTIES[..],
            "relationships": relationships,
            "writesAttributes": attributes,
        }));

        Ok(())
    }

    /// Translate a field list and print the result
    fn schema(&self, inline: Option<&str>, file: Option<&Path>) -> Result<()> {
        let text = match (inline, file) {
            (Some(text), _) => text.to_string(),
            (None, Some(path)) => read_file(path).and_then(|bytes| {
                String::from_utf8(bytes)
                    .map_err(|e| Error::schema(format!("{} is not UTF-8: {e}", path.display())))
            })?,
            (None, None) => {
                return Err(Error::config("Schema not specified (use --schema or --file)"))
            }
        };

        let schema = schema_from_str(&text)?;
        self.output_message(&json!({
            "type": "SCHEMA",
            "schema": schema.to_json(),
        }));

        Ok(())
    }

    /// Validate properties and the schema of a configuration
    fn validate(&self, config_path: &Path) -> Result<()> {
        let config = LoaderConfig::from_file(config_path)?;
        let context = config.process_context()?;

        let results = context.validate(&PROPERTIES);
        self.output_message(&json!({
            "type": "VALIDATION",
            "results": results,
        }));
        ensure_valid(&results)?;

        let schema = parse_schema(context.property(&TABLE_SCHEMA).value())?;
        self.output_message(&json!({
            "type": "LOG",
            "log": {
                "level": "INFO",
                "message": match schema {
                    Some(schema) => format!(
                        "Configuration is valid; table schema has {} fields",
                        schema.len()
                    ),
                    None => "Configuration is valid; schema left to the warehouse".to_string(),
                }
            }
        }));

        Ok(())
    }

    /// Queue each file as a unit and trigger until the queue drains
    async fn load(
        &self,
        config_path: &Path,
        attributes: &[(String, String)],
        files: &[PathBuf],
    ) -> Result<()> {
        let config = LoaderConfig::from_file(config_path)?;
        let context = config.process_context()?;
        let client = config.bigquery_client()?;
        debug!(endpoint = %config.endpoint, "Warehouse client ready");

        let mut processor = PutBigQueryBatch::new(Arc::new(client));
        processor.on_scheduled(&context).await?;

        let mut session = MemorySession::new();
        let mut sources = HashMap::new();
        for path in files {
            let content = read_file(path)?;
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default();

            let mut unit_attributes = Attributes::new();
            unit_attributes.insert(FILENAME_ATTR.to_string(), filename.clone());
            if let Some(parent) = path.parent() {
                unit_attributes.insert(PATH_ATTR.to_string(), parent.display().to_string());
            }
            unit_attributes.insert(FILE_SIZE_ATTR.to_string(), content.len().to_string());
            unit_attributes.extend(attributes.iter().cloned());

            let id = session.enqueue(content, unit_attributes);
            sources.insert(id, filename);
        }

        let started = Instant::now();
        let mut loaded = 0usize;
        let mut failed = 0usize;
        loop {
            match processor.on_trigger(&context, &mut session).await? {
                LoadOutcome::Idle => break,
                LoadOutcome::Success => loaded += 1,
                LoadOutcome::Failure => failed += 1,
            }
        }
        processor.on_stopped();

        for (relationship, unit) in session.transferred() {
            debug!(unit = unit.id, size = unit.size(), %relationship, "Unit routed");
            self.output_message(&json!({
                "relationship": relationship,
                "filename": sources.get(&unit.id),
                "penalized": unit.penalized,
                "attributes": &unit.attributes,
            }));
        }

        let elapsed = started.elapsed();
        info!(loaded, failed, elapsed_ms = (elapsed.as_millis() as u64), "Load finished");
        self.output_message(&json!({
            "type": "LOG",
            "log": {
                "level": if failed == 0 { "INFO" } else { "ERROR" },
                "message": format!(
                    "Loaded {loaded} of {} units in {:.2}s",
                    files.len(),
                    elapsed.as_secs_f64()
                )
            }
        }));

        if failed > 0 {
            return Err(Error::warehouse(format!(
                "{failed} of {} units routed to failure",
                files.len()
            )));
        }
        Ok(())
    }

    /// Output a message
    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        return Err(Error::FileNotFound {
            path: path.display().to_string(),
        });
    }
    Ok(fs::read(path)?)
}
