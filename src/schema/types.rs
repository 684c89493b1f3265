//! Schema types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Warehouse column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    Boolean,
    String,
    Bytes,
    Integer,
    Float,
    Timestamp,
    Record,
}

impl FieldType {
    /// Map a descriptor type tag to a warehouse type.
    ///
    /// Tags are matched case-sensitively. `DATE`, `TIME` and `DATETIME`
    /// all collapse to `TIMESTAMP`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "BOOLEAN" => Some(FieldType::Boolean),
            "STRING" => Some(FieldType::String),
            "BYTES" => Some(FieldType::Bytes),
            "INTEGER" => Some(FieldType::Integer),
            "FLOAT" => Some(FieldType::Float),
            "TIMESTAMP" | "DATE" | "TIME" | "DATETIME" => Some(FieldType::Timestamp),
            "RECORD" => Some(FieldType::Record),
            _ => None,
        }
    }

    /// Wire name of this type
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Boolean => "BOOLEAN",
            FieldType::String => "STRING",
            FieldType::Bytes => "BYTES",
            FieldType::Integer => "INTEGER",
            FieldType::Float => "FLOAT",
            FieldType::Timestamp => "TIMESTAMP",
            FieldType::Record => "RECORD",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldMode {
    #[default]
    Nullable,
    Required,
    Repeated,
}

impl FieldMode {
    /// Parse a mode token (case-sensitive)
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "NULLABLE" => Some(FieldMode::Nullable),
            "REQUIRED" => Some(FieldMode::Required),
            "REPEATED" => Some(FieldMode::Repeated),
            _ => None,
        }
    }

    /// Wire name of this mode
    pub fn as_str(self) -> &'static str {
        match self {
            FieldMode::Nullable => "NULLABLE",
            FieldMode::Required => "REQUIRED",
            FieldMode::Repeated => "REPEATED",
        }
    }
}

impl fmt::Display for FieldMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single column of a table schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Column name
    pub name: String,

    /// Column type
    #[serde(rename = "type")]
    pub field_type: FieldType,

    /// Column mode
    pub mode: FieldMode,

    /// Sub-columns (RECORD only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<Field>>,
}

impl Field {
    /// Create a nullable scalar field
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            mode: FieldMode::Nullable,
            fields: None,
        }
    }

    /// Create a RECORD field with the given sub-fields
    pub fn record(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::Record,
            mode: FieldMode::Nullable,
            fields: Some(fields),
        }
    }

    /// Set the mode
    #[must_use]
    pub fn with_mode(mut self, mode: FieldMode) -> Self {
        self.mode = mode;
        self
    }

    /// Get a direct sub-field by name
    pub fn sub_field(&self, name: &str) -> Option<&Field> {
        self.fields.as_ref()?.iter().find(|f| f.name == name)
    }
}

/// Ordered list of top-level fields
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableSchema {
    /// Top-level fields
    pub fields: Vec<Field>,
}

impl TableSchema {
    /// Create a schema from fields
    pub fn of(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Number of top-level fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Get a top-level field by name
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Convert to the warehouse REST representation
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    /// Compact JSON string, used for the table-schema output attribute
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
