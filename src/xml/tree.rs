//! Small owned element trees
//!
//! Used for the parts of a document that are carried through without being
//! interpreted (instrument configuration, software lists, scan metadata) and
//! as the interchange shape between records and the orchestrator.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use super::attributes::Attributes;
use super::sax::{Handler, HandlerResult, Status};
use super::writer::XmlWriter;
use super::Position;

/// Child of an [`XmlElement`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum XmlNode {
    /// Nested element
    Element(XmlElement),
    /// Character data, trimmed and unescaped
    Text(String),
}

/// An element with its attributes and children.
///
/// Equality compares names, attributes and children; source positions are
/// ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct XmlElement {
    /// Element name
    pub name: String,
    /// Attributes in document order
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
    /// Child elements and text
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<XmlNode>,
    /// Offset of the start tag in the source document, if read from one
    #[serde(skip)]
    pub position: Option<Position>,
}

impl PartialEq for XmlElement {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.attributes == other.attributes && self.children == other.children
    }
}

impl XmlElement {
    /// Create an element with no attributes or children
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder-style attribute setter
    pub fn with_attribute(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes.set(name, value);
        self
    }

    /// Builder-style child appender
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// Builder-style text appender
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    /// Append a child element
    pub fn push(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    /// Look up an attribute value
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name)
    }

    /// Iterate over child elements, skipping text
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// Mutable iterator over child elements
    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|node| match node {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// First child element called `name`
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.name == name)
    }

    /// First child element called `name`, mutably
    pub fn child_mut(&mut self, name: &str) -> Option<&mut XmlElement> {
        self.elements_mut().find(|e| e.name == name)
    }

    /// All text directly inside this element, concatenated
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            if let XmlNode::Text(t) = node {
                out.push_str(t);
            }
        }
        out
    }

    /// Move the children out, leaving this element empty
    pub fn take_children(&mut self) -> Vec<XmlNode> {
        std::mem::take(&mut self.children)
    }

    /// Write this element and its subtree.
    pub fn write_to<W: Write>(&self, writer: &mut XmlWriter<W>) -> io::Result<()> {
        let attrs = self.attributes.iter().map(|a| (a.name.as_str(), a.value.as_str()));
        match self.children.as_slice() {
            [] => writer.empty_element(&self.name, attrs),
            [XmlNode::Text(text)] => writer.text_element(&self.name, attrs, text),
            children => {
                writer.start_element(&self.name, attrs)?;
                for child in children {
                    match child {
                        XmlNode::Element(e) => e.write_to(writer)?,
                        XmlNode::Text(t) => writer.characters(t)?,
                    }
                }
                writer.end_element()
            }
        }
    }
}

/// Handler that captures one element and everything below it.
///
/// Typically returned as a delegate from a parent's `start_element`, but it
/// can also be the root handler of a parse call.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    stack: Vec<XmlElement>,
    finished: Option<XmlElement>,
    skip_text_in: Option<&'static str>,
    skipping: usize,
}

impl TreeBuilder {
    /// Capture everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop character data inside any element called `name` (and below it).
    pub fn skip_text_in(mut self, name: &'static str) -> Self {
        self.skip_text_in = Some(name);
        self
    }

    /// The captured element, once its end tag has been seen
    pub fn into_element(self) -> Option<XmlElement> {
        self.finished
    }

    /// True once the captured element has closed
    pub fn is_finished(&self) -> bool {
        self.finished.is_some()
    }
}

impl Handler for TreeBuilder {
    fn start_element(&mut self, name: &str, attributes: &Attributes, position: Position) -> HandlerResult {
        if self.skip_text_in == Some(name) || self.skipping > 0 {
            self.skipping += 1;
        }
        let mut element = XmlElement::new(name);
        element.attributes = attributes.clone();
        element.position = Some(position);
        self.stack.push(element);
        Ok(Status::Continue)
    }

    fn end_element(&mut self, name: &str, _position: Position) -> HandlerResult {
        self.skipping = self.skipping.saturating_sub(1);
        let element = self
            .stack
            .pop()
            .ok_or_else(|| format!("end tag </{}> outside the captured element", name))?;
        match self.stack.last_mut() {
            Some(parent) => parent.push(element),
            None => self.finished = Some(element),
        }
        Ok(Status::Continue)
    }

    fn characters(&mut self, text: &str, _position: Position) -> HandlerResult {
        if let Some(current) = self.stack.last_mut() {
            current.children.push(XmlNode::Text(text.to_string()));
        }
        Ok(Status::Continue)
    }

    fn collect_characters(&self) -> bool {
        self.skipping == 0
    }
}
