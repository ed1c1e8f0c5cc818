//! Minimal streaming XML layer
//!
//! This module provides everything the mzML reader and writer need from XML,
//! without building whole-document trees:
//!
//! - [`entities`]: escaping, unescaping and `_xHHHH_` identifier escapes
//! - [`tokenizer`]: a forward-only tokenizer that tracks byte offsets
//! - [`sax`]: the event-driven parser with handler delegation
//! - [`root`]: root element detection
//! - [`writer`]: indented, byte-counting XML output
//! - [`tree`]: owned element trees for opaque metadata
//!
//! # Example
//!
//! ```
//! use mzcodec::xml::{parse, Attributes, Handler, HandlerResult, Position, Status};
//!
//! #[derive(Default)]
//! struct CountSpectra(usize);
//!
//! impl Handler for CountSpectra {
//!     fn start_element(&mut self, name: &str, _: &Attributes, _: Position) -> HandlerResult {
//!         if name == "spectrum" {
//!             self.0 += 1;
//!         }
//!         Ok(Status::Continue)
//!     }
//! }
//!
//! let xml = r#"<spectrumList><spectrum id="a"/><spectrum id="b"/></spectrumList>"#;
//! let mut counter = CountSpectra::default();
//! parse(xml.as_bytes(), &mut counter)?;
//! assert_eq!(counter.0, 2);
//! # Ok::<(), mzcodec::xml::XmlError>(())
//! ```

mod attributes;
pub mod entities;
mod error;
pub mod root;
pub mod sax;
pub mod tokenizer;
pub mod tree;
pub mod writer;


/// Byte offset into the source stream
pub type Position = u64;

pub use attributes::{Attribute, Attributes};
pub use entities::{decode_id, encode_id, escape, unescape, EntityError};
pub use error::{HandlerError, XmlError};
pub use root::{root_element_name, root_element_name_from_path, root_element_name_from_reader};
pub use sax::{parse, Completion, Handler, HandlerResult, SaxReader, Status, SubHandler};
pub use tokenizer::{Token, Tokenizer};
pub use tree::{TreeBuilder, XmlElement, XmlNode};
pub use writer::XmlWriter;
