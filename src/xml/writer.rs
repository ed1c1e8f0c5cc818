//! Indented XML emission with byte accounting
//!
//! [`XmlWriter`] escapes attribute values and character data on the way out
//! and keeps a running count of bytes written, which is what index offsets are
//! taken from.

use std::io::{self, Write};

use super::entities::{escape_attribute, escape_text};
use super::Position;

const INDENT: &[u8] = b"  ";

/// Empty attribute list for elements without attributes
pub const NO_ATTRIBUTES: [(&str, &str); 0] = [];

/// Byte-counting XML writer.
pub struct XmlWriter<W: Write> {
    inner: W,
    written: u64,
    open: Vec<String>,
    base_depth: usize,
    skip_next_indent: bool,
}

impl<W: Write> XmlWriter<W> {
    /// Write a document to `inner`, starting at offset 0
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            written: 0,
            open: Vec::new(),
            base_depth: 0,
            skip_next_indent: false,
        }
    }

    /// Write a fragment that will be spliced in at nesting level `depth`.
    ///
    /// The first line is not indented, so the fragment begins with its `<`.
    pub fn fragment(inner: W, depth: usize) -> Self {
        Self {
            base_depth: depth,
            skip_next_indent: true,
            ..Self::new(inner)
        }
    }

    /// Number of bytes written so far, i.e. the offset of the next byte
    pub fn position(&self) -> Position {
        self.written
    }

    /// Current nesting level
    pub fn depth(&self) -> usize {
        self.base_depth + self.open.len()
    }

    /// Get a reference to the underlying writer
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Unwrap the underlying writer
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Flush the underlying writer
    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    /// Write bytes verbatim
    pub fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    /// Write the indentation for the current depth
    pub fn write_indent(&mut self) -> io::Result<()> {
        if self.skip_next_indent {
            self.skip_next_indent = false;
            return Ok(());
        }
        for _ in 0..self.depth() {
            self.write_raw(INDENT)?;
        }
        Ok(())
    }

    /// Write the indentation of the next tag now and return the offset of
    /// its `<`. Must be followed by a tag-writing call.
    pub fn begin_line(&mut self) -> io::Result<Position> {
        self.write_indent()?;
        self.skip_next_indent = true;
        Ok(self.written)
    }

    /// `<?xml version="1.0" encoding="utf-8"?>`
    pub fn xml_declaration(&mut self) -> io::Result<()> {
        self.processing_instruction("xml", "version=\"1.0\" encoding=\"utf-8\"")
    }

    /// `<?target data?>` on its own line
    pub fn processing_instruction(&mut self, target: &str, data: &str) -> io::Result<()> {
        self.write_indent()?;
        self.write_raw(b"<?")?;
        self.write_raw(target.as_bytes())?;
        if !data.is_empty() {
            self.write_raw(b" ")?;
            self.write_raw(data.as_bytes())?;
        }
        self.write_raw(b"?>\n")
    }

    fn tag_open<'a, I>(&mut self, name: &str, attributes: I) -> io::Result<()>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.write_indent()?;
        self.write_raw(b"<")?;
        self.write_raw(name.as_bytes())?;
        for (key, value) in attributes {
            self.write_raw(b" ")?;
            self.write_raw(key.as_bytes())?;
            self.write_raw(b"=\"")?;
            self.write_raw(escape_attribute(value).as_bytes())?;
            self.write_raw(b"\"")?;
        }
        Ok(())
    }

    /// Open an element on its own line; children follow indented.
    pub fn start_element<'a, I>(&mut self, name: &str, attributes: I) -> io::Result<()>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.tag_open(name, attributes)?;
        self.write_raw(b">\n")?;
        self.open.push(name.to_string());
        Ok(())
    }

    /// `<name a="v"/>`
    pub fn empty_element<'a, I>(&mut self, name: &str, attributes: I) -> io::Result<()>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.tag_open(name, attributes)?;
        self.write_raw(b"/>\n")
    }

    /// `<name a="v">text</name>` on one line
    pub fn text_element<'a, I>(&mut self, name: &str, attributes: I, text: &str) -> io::Result<()>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.tag_open(name, attributes)?;
        self.write_raw(b">")?;
        self.write_raw(escape_text(text).as_bytes())?;
        self.write_raw(b"</")?;
        self.write_raw(name.as_bytes())?;
        self.write_raw(b">\n")
    }

    /// Character data on its own line
    pub fn characters(&mut self, text: &str) -> io::Result<()> {
        self.write_indent()?;
        self.write_raw(escape_text(text).as_bytes())?;
        self.write_raw(b"\n")
    }

    /// Close the innermost open element
    pub fn end_element(&mut self) -> io::Result<()> {
        let name = self
            .open
            .pop()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no open element to close"))?;
        self.write_indent()?;
        self.write_raw(b"</")?;
        self.write_raw(name.as_bytes())?;
        self.write_raw(b">\n")
    }

    /// Names of the elements still open, outermost first
    pub fn open_elements(&self) -> &[String] {
        &self.open
    }
}
