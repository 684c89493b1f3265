//! Host-driven processors
//!
//! A processor is owned by a host runtime that configures it, schedules
//! it, and calls [`Processor::on_trigger`] repeatedly, each call handling at
//! most one unit from a [`ProcessSession`].
//!
//! ```text
//! on_scheduled(ctx)        validate, parse and cache the schema
//!   on_trigger(ctx, sess)  FETCH -> WRITE -> AWAIT_JOB -> REPORT
//!   on_trigger(ctx, sess)  ...
//! on_stopped()             drop the cache
//! ```

pub mod attributes;
mod context;
mod flowfile;
mod put_batch;
mod session;

pub use context::{
    ensure_valid, ProcessContext, PropertyDescriptor, PropertyValidator, PropertyValue,
    ValidationResult,
};
pub use flowfile::FlowFile;
pub use put_batch::{
    PutBigQueryBatch, CREATE_DISPOSITION, DATASET, IGNORE_UNKNOWN, JOB_TIMEOUT, MAX_BAD_RECORDS,
    PROJECT_ID, PROPERTIES, SOURCE_TYPE, TABLE_NAME, TABLE_SCHEMA, WRITE_DISPOSITION,
};
pub use session::{MemorySession, ProcessSession};

use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

// ============================================================================
// Routing
// ============================================================================

/// Where a processed unit goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Relationship {
    /// Loaded into the warehouse
    Success,
    /// Not loaded; the unit is penalized
    Failure,
}

impl Relationship {
    /// Both relationships
    pub const ALL: [Relationship; 2] = [Relationship::Success, Relationship::Failure];

    /// Relationship name
    pub fn name(self) -> &'static str {
        match self {
            Relationship::Success => "success",
            Relationship::Failure => "failure",
        }
    }

    /// What routing here means
    pub fn description(self) -> &'static str {
        match self {
            Relationship::Success => "Units are routed here after a successful load job",
            Relationship::Failure => {
                "Units are routed here when the upload or the load job fails"
            }
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of one trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No unit was queued
    Idle,
    /// The unit was routed to success
    Success,
    /// The unit was penalized and routed to failure
    Failure,
}

// ============================================================================
// Processor Trait
// ============================================================================

/// Lifecycle a host drives
#[async_trait]
pub trait Processor: Send + Sync {
    /// Declared properties
    fn properties(&self) -> &'static [PropertyDescriptor];

    /// Outgoing relationships
    fn relationships(&self) -> &'static [Relationship] {
        &Relationship::ALL
    }

    /// Check a configuration without running anything
    fn validate(&self, context: &ProcessContext) -> Vec<ValidationResult> {
        context.validate(self.properties())
    }

    /// Prepare to run with the given configuration
    async fn on_scheduled(&self, context: &ProcessContext) -> Result<()>;

    /// Process at most one unit from the session
    ///
    /// Per-unit failures are routed, not returned; `Err` means the
    /// processor itself is misconfigured.
    async fn on_trigger(
        &self,
        context: &ProcessContext,
        session: &mut dyn ProcessSession,
    ) -> Result<LoadOutcome>;

    /// Release scheduling-time state
    fn on_stopped(&mut self);
}

#[cfg(test)]
mod tests;
