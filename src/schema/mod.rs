//! Schema translation module
//!
//! Converts the textual field-list description configured on the processor
//! into the warehouse's typed table schema.
//!
//! # Type mapping
//!
//! | Descriptor tag | Warehouse type |
//! |----------------|----------------|
//! | `BOOLEAN`      | `BOOLEAN`      |
//! | `STRING`       | `STRING`       |
//! | `BYTES`        | `BYTES`        |
//! | `INTEGER`      | `INTEGER`      |
//! | `FLOAT`        | `FLOAT`        |
//! | `TIMESTAMP`, `DATE`, `TIME`, `DATETIME` | `TIMESTAMP` |
//! | `RECORD`       | `RECORD` (sub-fields translated recursively) |
//!
//! Any other tag is an error.

mod translate;
mod types;

pub use translate::{parse_schema, schema_from_str, schema_from_value, translate_field};
pub use types::{Field, FieldMode, FieldType, TableSchema};
