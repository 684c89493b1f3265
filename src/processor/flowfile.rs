//! Flow units

use crate::types::Attributes;
use bytes::Bytes;

/// One unit of data moving through the host: a payload plus attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowFile {
    /// Host-assigned id
    pub id: u64,
    /// Payload
    pub content: Bytes,
    /// String attributes, ordered by name
    pub attributes: Attributes,
    /// Whether the host should delay retrying this unit
    pub penalized: bool,
}

impl FlowFile {
    /// Create a unit with no attributes
    pub fn new(id: u64, content: impl Into<Bytes>) -> Self {
        Self {
            id,
            content: content.into(),
            attributes: Attributes::new(),
            penalized: false,
        }
    }

    /// Replace the attribute map
    #[must_use]
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Payload size in bytes
    pub fn size(&self) -> usize {
        self.content.len()
    }

    /// Look up an attribute
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Set one attribute
    pub fn put_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Merge attributes, overwriting existing names
    pub fn put_all_attributes(&mut self, attributes: Attributes) {
        self.attributes.extend(attributes);
    }

    /// Remove an attribute, returning its old value
    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        self.attributes.remove(name)
    }
}
