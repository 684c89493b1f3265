// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # bq-batch-load
//!
//! A host-driven processor that batch-loads flow units into BigQuery
//! tables through resumable load jobs.
//!
//! ## Features
//!
//! - **PutBigQueryBatch**: one unit per trigger, routed to success or failure
//! - **Per-unit templating**: dataset, table and project resolved from attributes
//! - **Schema translation**: JSON field lists into typed table schemas
//! - **Resumable uploads**: chunked at 256 KiB multiples, job polled to completion
//! - **Credentials**: bearer token, service account key, metadata server
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bq_batch_load::config::LoaderConfig;
//! use bq_batch_load::processor::{MemorySession, Processor, PutBigQueryBatch};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> bq_batch_load::Result<()> {
//!     let config = LoaderConfig::from_file("loader.yaml")?;
//!     let context = config.process_context()?;
//!     let processor = PutBigQueryBatch::new(Arc::new(config.bigquery_client()?));
//!     processor.on_scheduled(&context).await?;
//!
//!     let mut session = MemorySession::new();
//!     session.enqueue(std::fs::read("orders.avro")?, Default::default());
//!     processor.on_trigger(&context, &mut session).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    PutBigQueryBatch (processor)                 │
//! │  on_scheduled(ctx)   on_trigger(ctx, session)   on_stopped()    │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────┬───────────┬───────┴───────┬───────────┬─────────────┐
//! │ Context  │ Template  │    Schema     │ Warehouse │    Auth     │
//! ├──────────┼───────────┼───────────────┼───────────┼─────────────┤
//! │ Props    │ {{ attr }}│ Field list    │ Resumable │ Bearer      │
//! │ Validate │ {{ vars }}│ RECORD nest   │ upload    │ Service acct│
//! │ Defaults │           │ Type mapping  │ Job poll  │ Metadata    │
//! └──────────┴───────────┴───────────────┴─────┬─────┴─────────────┘
//!                                              │
//!                                     HTTP (retry, backoff)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(missing_docs)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Template interpolation
pub mod template;

/// Authentication implementations
pub mod auth;

/// HTTP client with retry and backoff
pub mod http;

/// Table schema translation
pub mod schema;

/// Warehouse client: resumable uploads and job polling
pub mod warehouse;

/// Processor lifecycle, session and the batch load processor
pub mod processor;

/// Driver configuration
pub mod config;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use processor::{Processor, PutBigQueryBatch};
pub use warehouse::{BigQueryClient, WarehouseClient};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
