//! Common types used throughout bq-batch-load
//!
//! This module contains the load-job enumerations shared by the processor,
//! the warehouse client and the CLI, plus small utility types.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Type Aliases
// ============================================================================

/// Flow unit attributes, ordered for stable output
pub type Attributes = BTreeMap<String, String>;

// ============================================================================
// Source Format
// ============================================================================

/// Format of the payload streamed into a load job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceFormat {
    /// Newline-delimited JSON records
    NewlineDelimitedJson,
    /// Avro container file
    #[default]
    Avro,
    /// Comma-separated values
    Csv,
}

impl SourceFormat {
    /// All accepted values, in property-listing order
    pub const ALLOWED: [&'static str; 3] = ["NEWLINE_DELIMITED_JSON", "AVRO", "CSV"];

    /// Wire name of this format
    pub fn as_str(self) -> &'static str {
        match self {
            SourceFormat::NewlineDelimitedJson => "NEWLINE_DELIMITED_JSON",
            SourceFormat::Avro => "AVRO",
            SourceFormat::Csv => "CSV",
        }
    }
}

impl FromStr for SourceFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "NEWLINE_DELIMITED_JSON" => Ok(SourceFormat::NewlineDelimitedJson),
            "AVRO" => Ok(SourceFormat::Avro),
            "CSV" => Ok(SourceFormat::Csv),
            other => Err(Error::invalid_value(
                "source format",
                format!("'{other}' is not one of {}", Self::ALLOWED.join(", ")),
            )),
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Create Disposition
// ============================================================================

/// Whether a load job may create the target table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreateDisposition {
    /// Create the table if it does not exist
    #[default]
    CreateIfNeeded,
    /// Fail if the table does not exist
    CreateNever,
}

impl CreateDisposition {
    /// All accepted values
    pub const ALLOWED: [&'static str; 2] = ["CREATE_IF_NEEDED", "CREATE_NEVER"];

    /// Wire name of this disposition
    pub fn as_str(self) -> &'static str {
        match self {
            CreateDisposition::CreateIfNeeded => "CREATE_IF_NEEDED",
            CreateDisposition::CreateNever => "CREATE_NEVER",
        }
    }
}

impl FromStr for CreateDisposition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "CREATE_IF_NEEDED" => Ok(CreateDisposition::CreateIfNeeded),
            "CREATE_NEVER" => Ok(CreateDisposition::CreateNever),
            other => Err(Error::invalid_value(
                "create disposition",
                format!("'{other}' is not one of {}", Self::ALLOWED.join(", ")),
            )),
        }
    }
}

impl fmt::Display for CreateDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Write Disposition
// ============================================================================

/// How a load job treats data already in the target table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriteDisposition {
    /// Only write if the table is empty
    #[default]
    WriteEmpty,
    /// Append to existing rows
    WriteAppend,
    /// Replace existing rows
    WriteTruncate,
}

impl WriteDisposition {
    /// All accepted values
    pub const ALLOWED: [&'static str; 3] = ["WRITE_EMPTY", "WRITE_APPEND", "WRITE_TRUNCATE"];

    /// Wire name of this disposition
    pub fn as_str(self) -> &'static str {
        match self {
            WriteDisposition::WriteEmpty => "WRITE_EMPTY",
            WriteDisposition::WriteAppend => "WRITE_APPEND",
            WriteDisposition::WriteTruncate => "WRITE_TRUNCATE",
        }
    }
}

impl FromStr for WriteDisposition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "WRITE_EMPTY" => Ok(WriteDisposition::WriteEmpty),
            "WRITE_APPEND" => Ok(WriteDisposition::WriteAppend),
            "WRITE_TRUNCATE" => Ok(WriteDisposition::WriteTruncate),
            other => Err(Error::invalid_value(
                "write disposition",
                format!("'{other}' is not one of {}", Self::ALLOWED.join(", ")),
            )),
        }
    }
}

impl fmt::Display for WriteDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Backoff Type
// ============================================================================

/// Type of backoff for transport retries and job polling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    #[default]
    Exponential,
}

// ============================================================================
// Utilities
// ============================================================================

/// Extension trait for Option<String> to handle empty strings
pub trait OptionStringExt {
    /// Returns None if the string is empty
    fn none_if_empty(self) -> Option<String>;
}

impl OptionStringExt for Option<String> {
    fn none_if_empty(self) -> Option<String> {
        self.filter(|s| !s.is_empty())
    }
}

impl OptionStringExt for String {
    fn none_if_empty(self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}
