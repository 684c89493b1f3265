//! Field-list description → warehouse schema
//!
//! Walks the untyped JSON description by hand rather than deriving
//! `Deserialize`, so every failure names the offending field by its dotted
//! path (`address.zip`).

use super::types::{Field, FieldMode, FieldType, TableSchema};
use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Translate an optional schema string.
///
/// `None` means no schema is configured and yields `Ok(None)`, which is not
/// the same thing as a schema with zero fields.
pub fn parse_schema(schema: Option<&str>) -> Result<Option<TableSchema>> {
    match schema {
        Some(text) => schema_from_str(text).map(Some),
        None => Ok(None),
    }
}

/// Translate a schema string in either `{"fields": [...]}` or bare `[...]` form
pub fn schema_from_str(text: &str) -> Result<TableSchema> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| Error::schema(format!("not valid JSON: {e}")))?;
    schema_from_value(&value)
}

/// Translate an already parsed schema description
pub fn schema_from_value(value: &Value) -> Result<TableSchema> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("fields") {
            Some(Value::Array(items)) => items,
            Some(_) => return Err(Error::schema("'fields' must be an array")),
            None => {
                return Err(Error::schema(
                    "expected an object with a 'fields' array or a bare array of fields",
                ))
            }
        },
        _ => {
            return Err(Error::schema(
                "expected an object with a 'fields' array or a bare array of fields",
            ))
        }
    };

    Ok(TableSchema::of(translate_fields(items, None)?))
}

/// Translate a list of field descriptors under an optional parent path
fn translate_fields(items: &[Value], parent: Option<&str>) -> Result<Vec<Field>> {
    let mut seen = HashSet::new();
    let mut fields = Vec::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        let field = translate_field(item, parent, index)?;
        // Column names are case-insensitive in the warehouse
        if !seen.insert(field.name.to_lowercase()) {
            return Err(Error::schema(format!(
                "duplicate field '{}'",
                join_path(parent, &field.name)
            )));
        }
        fields.push(field);
    }

    Ok(fields)
}

/// Translate one field descriptor
pub fn translate_field(item: &Value, parent: Option<&str>, index: usize) -> Result<Field> {
    let Value::Object(obj) = item else {
        return Err(Error::schema(format!(
            "field #{index}{} is not an object",
            parent.map(|p| format!(" of '{p}'")).unwrap_or_default()
        )));
    };

    let name = required_str(obj, "name", None, index)?;
    if name.is_empty() {
        return Err(Error::schema(format!("field #{index} has an empty name")));
    }
    let path = join_path(parent, name);

    let type_tag = required_str(obj, "type", Some(&path), index)?;
    let field_type = FieldType::from_tag(type_tag).ok_or_else(|| Error::UnknownFieldType {
        field: path.clone(),
        type_name: type_tag.to_string(),
    })?;

    let mode = match obj.get("mode") {
        Some(Value::String(tag)) => {
            FieldMode::from_tag(tag).ok_or_else(|| Error::InvalidFieldMode {
                field: path.clone(),
                mode: tag.clone(),
            })?
        }
        Some(other) => {
            return Err(Error::InvalidFieldMode {
                field: path,
                mode: other.to_string(),
            })
        }
        None => {
            return Err(Error::schema(format!(
                "field '{path}' is missing required 'mode'"
            )))
        }
    };

    let fields = match (field_type, obj.get("fields")) {
        (FieldType::Record, Some(Value::Array(items))) if !items.is_empty() => {
            Some(translate_fields(items, Some(&path))?)
        }
        (FieldType::Record, _) => {
            return Err(Error::schema(format!(
                "RECORD field '{path}' requires a non-empty 'fields' array"
            )))
        }
        (_, Some(_)) => {
            return Err(Error::schema(format!(
                "field '{path}' of type {field_type} cannot declare nested 'fields'"
            )))
        }
        (_, None) => None,
    };

    Ok(Field {
        name: name.to_string(),
        field_type,
        mode,
        fields,
    })
}

fn required_str<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    context: Option<&str>,
    index: usize,
) -> Result<&'a str> {
    match obj.get(key) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(Error::schema(format!(
            "'{key}' of {} must be a string",
            describe(context, index)
        ))),
        None => Err(Error::schema(format!(
            "{} is missing required '{key}'",
            describe(context, index)
        ))),
    }
}

fn describe(context: Option<&str>, index: usize) -> String {
    match context {
        Some(path) => format!("field '{path}'"),
        None => format!("field #{index}"),
    }
}

fn join_path(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(p) => format!("{p}.{name}"),
        None => name.to_string(),
    }
}
