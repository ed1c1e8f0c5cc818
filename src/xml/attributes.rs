use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use super::entities::{unescape, EntityError};

/// A single `name="value"` pair from a start tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name, including any namespace prefix
    pub name: String,
    /// Attribute value (raw or unescaped, depending on who produced it)
    pub value: String,
}

/// Ordered attribute list of one start tag.
///
/// Lookup is by name; document order is kept so elements can be written back
/// exactly as they were read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(Vec<Attribute>);

impl Attributes {
    /// Create an empty attribute list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an attribute without checking for duplicates
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push(Attribute {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Replace the value of `name`, or append it when absent
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        match self.0.iter_mut().find(|a| a.name == name) {
            Some(attr) => attr.value = value.into(),
            None => self.push(name, value),
        }
    }

    /// Look up an attribute value by name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Remove an attribute, returning its value
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.0.iter().position(|a| a.name == name)?;
        Some(self.0.remove(index).value)
    }

    /// Iterate in document order
    pub fn iter(&self) -> std::slice::Iter<'_, Attribute> {
        self.0.iter()
    }

    /// Number of attributes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the tag carried no attributes
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy of this list with every value passed through [`unescape`].
    pub(crate) fn unescaped(&self) -> Result<Attributes, EntityError> {
        let mut out = Vec::with_capacity(self.0.len());
        for attr in &self.0 {
            let value = match unescape(&attr.value)? {
                Cow::Borrowed(_) => attr.value.clone(),
                Cow::Owned(value) => value,
            };
            out.push(Attribute {
                name: attr.name.clone(),
                value,
            });
        }
        Ok(Attributes(out))
    }

    /// True when any value contains an entity or character reference
    pub(crate) fn has_references(&self) -> bool {
        self.0.iter().any(|a| a.value.contains('&'))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Attributes(
            iter.into_iter()
                .map(|(name, value)| Attribute {
                    name: name.into(),
                    value: value.into(),
                })
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = &'a Attribute;
    type IntoIter = std::slice::Iter<'a, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<Vec<Attribute>> for Attributes {
    fn from(attrs: Vec<Attribute>) -> Self {
        Attributes(attrs)
    }
}
