//! Root element detection without a full parse

use std::io::BufRead;
use std::path::Path;

use super::attributes::Attributes;
use super::error::XmlError;
use super::sax::{Handler, HandlerResult, SaxReader, Status};
use super::Position;
use crate::input::open_input;

#[derive(Default)]
struct RootName {
    name: Option<String>,
}

impl Handler for RootName {
    fn start_element(&mut self, name: &str, _attributes: &Attributes, _position: Position) -> HandlerResult {
        self.name = Some(name.to_string());
        Ok(Status::Done)
    }

    fn collect_characters(&self) -> bool {
        false
    }

    fn auto_unescape_attributes(&self) -> bool {
        false
    }
}

/// Name of the first element in `xml`.
pub fn root_element_name(xml: &str) -> Result<String, XmlError> {
    root_element_name_from_reader(xml.as_bytes())
}

/// Name of the first element read from `reader`; stops at its start tag.
pub fn root_element_name_from_reader<R: BufRead>(reader: R) -> Result<String, XmlError> {
    let mut handler = RootName::default();
    SaxReader::new(reader).parse(&mut handler)?;
    handler.name.ok_or(XmlError::NoRootElement)
}

/// Name of the first element of the file at `path` (gzip input is accepted).
pub fn root_element_name_from_path(path: impl AsRef<Path>) -> Result<String, XmlError> {
    root_element_name_from_reader(open_input(path)?)
}
