//! Template interpolation for processor properties
//!
//! Handles `{{ name }}` interpolation in property values. Names resolve
//! against the attributes of the flow unit being processed first (attribute
//! names may contain dots, e.g. `{{ bq.dataset }}`), then against nested
//! driver variables (`{{ vars.region }}` or just `{{ region }}`).

use crate::error::{Error, Result};
use crate::types::Attributes;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Regex for matching template variables: {{ variable.path }}
static TEMPLATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_\-]*(?:\.[a-zA-Z_][a-zA-Z0-9_\-]*)*)\s*\}\}")
        .expect("template regex is valid")
});

/// Context for template interpolation
#[derive(Debug, Clone, Default)]
pub struct TemplateContext<'a> {
    /// Attributes of the current flow unit
    pub attributes: Option<&'a Attributes>,
    /// Additional context variables
    pub vars: Value,
}

impl<'a> TemplateContext<'a> {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create context over a flow unit's attributes
    pub fn with_attributes(attributes: &'a Attributes) -> Self {
        Self {
            attributes: Some(attributes),
            vars: Value::Null,
        }
    }

    /// Set additional variables
    pub fn set_vars(&mut self, vars: Value) -> &mut Self {
        self.vars = vars;
        self
    }

    /// Get a value by name (attribute name or variable path)
    pub fn get(&self, path: &str) -> Option<String> {
        if let Some(value) = self.attributes.and_then(|attrs| attrs.get(path)) {
            return Some(value.clone());
        }

        let parts: Vec<&str> = path.split('.').collect();
        let parts = match parts.first() {
            Some(&"vars") => &parts[1..],
            _ => &parts[..],
        };
        get_nested_value(&self.vars, parts).map(value_to_string)
    }
}

/// Get a nested value from a JSON value by path
fn get_nested_value<'v>(value: &'v Value, path: &[&str]) -> Option<&'v Value> {
    if path.is_empty() {
        return None;
    }
    let mut current = value;
    for part in path {
        match current {
            Value::Object(map) => {
                current = map.get(*part)?;
            }
            _ => return None,
        }
    }
    Some(current)
}

/// Render a template string with the given context
pub fn render(template: &str, ctx: &TemplateContext<'_>) -> Result<String> {
    let mut result = template.to_string();
    let mut errors = Vec::new();

    for cap in TEMPLATE_REGEX.captures_iter(template) {
        let (Some(full_match), Some(var_path)) = (cap.get(0), cap.get(1)) else {
            continue;
        };

        match ctx.get(var_path.as_str()) {
            Some(replacement) => {
                result = result.replace(full_match.as_str(), &replacement);
            }
            None => {
                errors.push(var_path.as_str().to_string());
            }
        }
    }

    if errors.is_empty() {
        Ok(result)
    } else {
        Err(Error::undefined_var(errors.join(", ")))
    }
}

/// Check if a string contains template variables
pub fn has_templates(s: &str) -> bool {
    TEMPLATE_REGEX.is_match(s)
}

/// Reject unbalanced template markers that would otherwise pass through verbatim
pub fn check_syntax(template: &str) -> Result<()> {
    let stripped = TEMPLATE_REGEX.replace_all(template, "");
    if stripped.contains("{{") || stripped.contains("}}") {
        return Err(Error::template(format!(
            "malformed expression in '{template}'"
        )));
    }
    Ok(())
}

/// Convert a JSON value to a string for template substitution
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_dotted_attribute_name() {
        let attributes = attrs(&[("bq.dataset", "analytics")]);
        let ctx = TemplateContext::with_attributes(&attributes);

        assert_eq!(render("{{ bq.dataset }}", &ctx).unwrap(), "analytics");
    }

    #[test]
    fn test_multiple_substitutions() {
        let attributes = attrs(&[("source", "orders"), ("day", "20240101")]);
        let ctx = TemplateContext::with_attributes(&attributes);

        let result = render("{{ source }}_{{ day }}", &ctx).unwrap();
        assert_eq!(result, "orders_20240101");
    }

    #[test]
    fn test_attribute_shadows_vars() {
        let attributes = attrs(&[("region", "eu")]);
        let mut ctx = TemplateContext::with_attributes(&attributes);
        ctx.set_vars(json!({"region": "us"}));

        assert_eq!(render("{{ region }}", &ctx).unwrap(), "eu");
        assert_eq!(render("{{ vars.region }}", &ctx).unwrap(), "us");
    }

    #[test]
    fn test_nested_vars() {
        let mut ctx = TemplateContext::new();
        ctx.set_vars(json!({"gcp": {"project": "acme-prod"}, "limit": 5}));

        assert_eq!(render("{{ gcp.project }}", &ctx).unwrap(), "acme-prod");
        assert_eq!(render("n={{ vars.limit }}", &ctx).unwrap(), "n=5");
    }

    #[test]
    fn test_undefined_variable() {
        let ctx = TemplateContext::new();
        let result = render("{{ bq.table.name }}", &ctx);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("bq.table.name"));
    }

    #[test]
    fn test_no_templates() {
        let ctx = TemplateContext::new();
        let result = render("plain_table", &ctx).unwrap();
        assert_eq!(result, "plain_table");
    }

    #[test]
    fn test_has_templates() {
        assert!(has_templates("{{ bq.dataset }}"));
        assert!(has_templates("prefix_{{ day }}"));
        assert!(!has_templates("no templates here"));
        assert!(!has_templates("{ not a template }"));
    }

    #[test]
    fn test_check_syntax() {
        assert!(check_syntax("events_{{ day }}").is_ok());
        assert!(check_syntax("plain").is_ok());
        assert!(check_syntax("events_{{ day").is_err());
        assert!(check_syntax("{{ 9bad }}").is_err());
    }

    #[test]
    fn test_whitespace_in_template() {
        let attributes = attrs(&[("key", "value")]);
        let ctx = TemplateContext::with_attributes(&attributes);

        assert_eq!(render("{{key}}", &ctx).unwrap(), "value");
        assert_eq!(render("{{ key }}", &ctx).unwrap(), "value");
        assert_eq!(render("{{  key  }}", &ctx).unwrap(), "value");
    }
}
