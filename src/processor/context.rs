//! Property descriptors and the process context
//!
//! A [`PropertyDescriptor`] declares one configurable property. The
//! [`ProcessContext`] holds the configured values (declared and dynamic)
//! and resolves them, interpolating templated values against a unit's
//! attributes.

use crate::error::{Error, Result};
use crate::template::{check_syntax, has_templates, render, TemplateContext};
use crate::types::Attributes;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

// ============================================================================
// Descriptors
// ============================================================================

/// Value check applied by [`ProcessContext::validate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValidator {
    /// Any non-empty string
    NonEmpty,
    /// `true` or `false`
    Boolean,
    /// Integer `>= 0` that fits in 32 bits
    NonNegativeInteger,
    /// Integer `> 0`
    PositiveInteger,
}

impl PropertyValidator {
    fn check(self, value: &str) -> std::result::Result<(), String> {
        match self {
            PropertyValidator::NonEmpty => {
                if value.trim().is_empty() {
                    Err("must not be empty".to_string())
                } else {
                    Ok(())
                }
            }
            PropertyValidator::Boolean => parse_bool(value).map(|_| ()),
            PropertyValidator::NonNegativeInteger => value
                .parse::<u32>()
                .map(|_| ())
                .map_err(|_| format!("'{value}' is not a non-negative integer")),
            PropertyValidator::PositiveInteger => match value.parse::<u64>() {
                Ok(n) if n > 0 => Ok(()),
                _ => Err(format!("'{value}' is not a positive integer")),
            },
        }
    }
}

/// Declaration of one processor property
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyDescriptor {
    /// Property key
    pub name: &'static str,
    /// Label for listings
    pub display_name: &'static str,
    /// What the property controls
    pub description: &'static str,
    /// Whether a value (configured or default) must be present
    pub required: bool,
    /// Value used when none is configured
    pub default_value: Option<&'static str>,
    /// Closed set of accepted values; empty means any
    pub allowable_values: &'static [&'static str],
    /// Whether `{{ name }}` expressions are interpolated per unit
    pub supports_templates: bool,
    /// Value check
    pub validator: PropertyValidator,
}

// ============================================================================
// Validation
// ============================================================================

/// Outcome of validating one property
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    /// Property name
    pub subject: String,
    /// Whether the value is acceptable
    pub valid: bool,
    /// Why it is not
    pub explanation: Option<String>,
}

impl ValidationResult {
    /// A passing result
    pub fn valid(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            valid: true,
            explanation: None,
        }
    }

    /// A failing result
    pub fn invalid(subject: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            valid: false,
            explanation: Some(explanation.into()),
        }
    }
}

/// Collapse failing results into a single configuration error
pub fn ensure_valid(results: &[ValidationResult]) -> Result<()> {
    let problems: Vec<String> = results
        .iter()
        .filter(|r| !r.valid)
        .map(|r| {
            format!(
                "{}: {}",
                r.subject,
                r.explanation.as_deref().unwrap_or("invalid")
            )
        })
        .collect();

    if problems.is_empty() {
        Ok(())
    } else {
        Err(Error::config(problems.join("; ")))
    }
}

// ============================================================================
// Context
// ============================================================================

/// Configured property values plus host variables
#[derive(Debug, Clone, Default)]
pub struct ProcessContext {
    properties: BTreeMap<String, String>,
    variables: Value,
}

impl ProcessContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context from configured values
    pub fn from_properties<I, K, V>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            properties: properties
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            variables: Value::Null,
        }
    }

    /// Set a property value
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_property(name, value);
        self
    }

    /// Set a property value in place
    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(name.into(), value.into());
    }

    /// Set the variables templates can reference as `{{ vars.name }}`
    #[must_use]
    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = variables;
        self
    }

    /// All configured values
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Configured values whose names no descriptor declares
    pub fn dynamic_properties<'a>(
        &'a self,
        descriptors: &[PropertyDescriptor],
    ) -> BTreeMap<&'a str, &'a str> {
        self.properties
            .iter()
            .filter(|(name, _)| !descriptors.iter().any(|d| d.name == name.as_str()))
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect()
    }

    /// Resolve a declared property, falling back to its default
    pub fn property<'a>(&'a self, descriptor: &'a PropertyDescriptor) -> PropertyValue<'a> {
        let raw = self
            .properties
            .get(descriptor.name)
            .map(String::as_str)
            .or(descriptor.default_value);

        PropertyValue {
            descriptor,
            raw,
            variables: &self.variables,
        }
    }

    /// Check every declared property and every dynamic one
    pub fn validate(&self, descriptors: &[PropertyDescriptor]) -> Vec<ValidationResult> {
        let mut results: Vec<ValidationResult> = descriptors
            .iter()
            .map(|d| validate_property(d, self.property(d).value()))
            .collect();

        for (name, value) in self.dynamic_properties(descriptors) {
            results.push(match PropertyValidator::NonEmpty.check(value) {
                Ok(()) => ValidationResult::valid(name),
                Err(e) => ValidationResult::invalid(name, e),
            });
        }

        results
    }
}

fn validate_property(descriptor: &PropertyDescriptor, value: Option<&str>) -> ValidationResult {
    let name = descriptor.name;
    let Some(value) = value else {
        return if descriptor.required {
            ValidationResult::invalid(name, "is required")
        } else {
            ValidationResult::valid(name)
        };
    };

    if has_templates(value) || value.contains("{{") {
        if !descriptor.supports_templates {
            return ValidationResult::invalid(name, "does not support templated values");
        }
        return match check_syntax(value) {
            Ok(()) => ValidationResult::valid(name),
            Err(e) => ValidationResult::invalid(name, e.to_string()),
        };
    }

    if !descriptor.allowable_values.is_empty() && !descriptor.allowable_values.contains(&value) {
        return ValidationResult::invalid(
            name,
            format!(
                "'{value}' is not one of {}",
                descriptor.allowable_values.join(", ")
            ),
        );
    }

    match descriptor.validator.check(value) {
        Ok(()) => ValidationResult::valid(name),
        Err(e) => ValidationResult::invalid(name, e),
    }
}

// ============================================================================
// Values
// ============================================================================

/// A property's configured (or default) value
#[derive(Debug, Clone, Copy)]
pub struct PropertyValue<'a> {
    descriptor: &'a PropertyDescriptor,
    raw: Option<&'a str>,
    variables: &'a Value,
}

impl<'a> PropertyValue<'a> {
    /// Raw value, before interpolation
    pub fn value(&self) -> Option<&'a str> {
        self.raw
    }

    /// Whether a value is configured or defaulted
    pub fn is_set(&self) -> bool {
        self.raw.is_some()
    }

    /// Interpolate against a unit's attributes
    ///
    /// Properties that do not support templates are returned verbatim.
    pub fn evaluate(&self, attributes: Option<&Attributes>) -> Result<Option<String>> {
        let Some(raw) = self.raw else {
            return Ok(None);
        };
        if !self.descriptor.supports_templates {
            return Ok(Some(raw.to_string()));
        }

        let mut ctx = match attributes {
            Some(attrs) => TemplateContext::with_attributes(attrs),
            None => TemplateContext::new(),
        };
        ctx.set_vars(self.variables.clone());
        render(raw, &ctx).map(Some)
    }

    /// Interpolate and require a non-empty result
    pub fn evaluate_required(&self, attributes: Option<&Attributes>) -> Result<String> {
        match self.evaluate(attributes)? {
            Some(value) if !value.trim().is_empty() => Ok(value),
            Some(_) => Err(Error::invalid_value(
                self.descriptor.name,
                "evaluated to an empty value",
            )),
            None => Err(Error::missing_field(self.descriptor.name)),
        }
    }

    /// Parse the raw value with `FromStr`
    pub fn parse<T>(&self) -> Result<T>
    where
        T: FromStr<Err = Error>,
    {
        self.required_raw()?.parse()
    }

    /// Value as a boolean
    pub fn as_bool(&self) -> Result<bool> {
        parse_bool(self.required_raw()?)
            .map_err(|e| Error::invalid_value(self.descriptor.name, e))
    }

    /// Value as a 32-bit unsigned integer
    pub fn as_u32(&self) -> Result<u32> {
        let raw = self.required_raw()?;
        raw.parse().map_err(|_| {
            Error::invalid_value(
                self.descriptor.name,
                format!("'{raw}' is not a non-negative integer"),
            )
        })
    }

    /// Value as a 64-bit unsigned integer
    pub fn as_u64(&self) -> Result<u64> {
        let raw = self.required_raw()?;
        raw.parse().map_err(|_| {
            Error::invalid_value(
                self.descriptor.name,
                format!("'{raw}' is not a non-negative integer"),
            )
        })
    }

    fn required_raw(&self) -> Result<&'a str> {
        self.raw
            .ok_or_else(|| Error::missing_field(self.descriptor.name))
    }
}

fn parse_bool(value: &str) -> std::result::Result<bool, String> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(format!("'{other}' is not true or false")),
    }
}
