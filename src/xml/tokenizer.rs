//! Streaming XML tokenizer
//!
//! A forward-only cursor over any [`BufRead`]. The reader's internal buffer is
//! the only lookahead window, so memory use does not depend on document size.
//! Every token records the byte offset at which it began.

use std::io::{self, BufRead};

use memchr::memchr;

use super::attributes::{Attribute, Attributes};
use super::error::XmlError;
use super::Position;

/// One lexical unit of an XML document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `<name a="1">` or `<name/>`, with its attributes (values still escaped)
    StartTag {
        /// Element name
        name: String,
        /// Attributes in document order, raw values
        attributes: Attributes,
        /// True for `<name/>`
        self_closing: bool,
    },
    /// `</name>`
    EndTag {
        /// Element name
        name: String,
    },
    /// Character data between tags, untrimmed and still escaped
    Text(String),
    /// Contents of a `<![CDATA[...]]>` section
    CData(String),
    /// Contents of a `<!--...-->` comment
    Comment(String),
    /// Body of a `<!DOCTYPE ...>` declaration
    Doctype(String),
    /// `<?target data?>`
    ProcessingInstruction {
        /// PI target, e.g. `xml`
        target: String,
        /// Everything after the target, trimmed
        data: String,
    },
    /// End of input
    Eof,
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n')
}

fn is_name_byte(b: u8) -> bool {
    !is_whitespace(b) && !matches!(b, b'/' | b'>' | b'<' | b'=' | b'"' | b'\'' | b'?' | b'!')
}

/// Byte cursor with a running absolute offset.
pub(crate) struct ByteCursor<R> {
    inner: R,
    offset: Position,
}

impl<R: BufRead> ByteCursor<R> {
    pub(crate) fn new(inner: R, offset: Position) -> Self {
        Self { inner, offset }
    }

    pub(crate) fn offset(&self) -> Position {
        self.offset
    }

    pub(crate) fn into_inner(self) -> R {
        self.inner
    }

    fn advance(&mut self, n: usize) {
        self.inner.consume(n);
        self.offset += n as u64;
    }

    pub(crate) fn peek(&mut self) -> io::Result<Option<u8>> {
        Ok(self.inner.fill_buf()?.first().copied())
    }

    pub(crate) fn bump(&mut self) -> io::Result<Option<u8>> {
        let byte = self.peek()?;
        if byte.is_some() {
            self.advance(1);
        }
        Ok(byte)
    }

    /// Append bytes to `out` up to, not including, `delim`. Returns false if the
    /// input ended first.
    pub(crate) fn read_until_byte(&mut self, delim: u8, out: &mut Vec<u8>) -> io::Result<bool> {
        loop {
            let (found, used) = {
                let buf = self.inner.fill_buf()?;
                if buf.is_empty() {
                    return Ok(false);
                }
                match memchr(delim, buf) {
                    Some(i) => {
                        out.extend_from_slice(&buf[..i]);
                        (true, i)
                    }
                    None => {
                        out.extend_from_slice(buf);
                        (false, buf.len())
                    }
                }
            };
            self.advance(used);
            if found {
                return Ok(true);
            }
        }
    }

    /// Append bytes to `out` while `keep` holds.
    pub(crate) fn read_while(&mut self, keep: impl Fn(u8) -> bool, out: &mut Vec<u8>) -> io::Result<()> {
        loop {
            let (used, stop) = {
                let buf = self.inner.fill_buf()?;
                if buf.is_empty() {
                    return Ok(());
                }
                match buf.iter().position(|&b| !keep(b)) {
                    Some(i) => {
                        out.extend_from_slice(&buf[..i]);
                        (i, true)
                    }
                    None => {
                        out.extend_from_slice(buf);
                        (buf.len(), false)
                    }
                }
            };
            self.advance(used);
            if stop {
                return Ok(());
            }
        }
    }

    pub(crate) fn skip_whitespace(&mut self) -> io::Result<()> {
        loop {
            let (used, stop) = {
                let buf = self.inner.fill_buf()?;
                if buf.is_empty() {
                    return Ok(());
                }
                match buf.iter().position(|&b| !is_whitespace(b)) {
                    Some(i) => (i, true),
                    None => (buf.len(), false),
                }
            };
            self.advance(used);
            if stop {
                return Ok(());
            }
        }
    }

    /// Append bytes to `out` until `terminator` has been consumed; the
    /// terminator itself is not kept. Returns false if the input ended first.
    pub(crate) fn read_until_sequence(&mut self, terminator: &[u8], out: &mut Vec<u8>) -> io::Result<bool> {
        let (&last, head) = match terminator.split_last() {
            Some(split) => split,
            None => return Ok(true),
        };
        loop {
            if !self.read_until_byte(last, out)? {
                return Ok(false);
            }
            self.advance(1);
            if out.ends_with(head) {
                out.truncate(out.len() - head.len());
                return Ok(true);
            }
            out.push(last);
        }
    }
}

fn into_string(bytes: Vec<u8>, start: Position) -> Result<String, XmlError> {
    String::from_utf8(bytes).map_err(|e| {
        let offset = start + e.utf8_error().valid_up_to() as u64;
        XmlError::malformed(offset, "invalid UTF-8")
    })
}

/// Pull tokenizer over a buffered reader.
///
/// Tracks the names of open elements so that a closing tag which does not
/// match the innermost open element is reported instead of tolerated.
pub struct Tokenizer<R> {
    cursor: ByteCursor<R>,
    open: Vec<String>,
}

impl<R: BufRead> Tokenizer<R> {
    /// Tokenize from the start of `reader`
    pub fn new(reader: R) -> Self {
        Self::with_offset(reader, 0)
    }

    /// Tokenize `reader`, reporting positions relative to `offset`.
    ///
    /// Used after seeking into the middle of a file so that positions remain
    /// absolute file offsets.
    pub fn with_offset(reader: R, offset: Position) -> Self {
        Self {
            cursor: ByteCursor::new(reader, offset),
            open: Vec::new(),
        }
    }

    /// Offset of the next unread byte
    pub fn position(&self) -> Position {
        self.cursor.offset()
    }

    /// Names of the currently open elements, outermost first
    pub fn open_elements(&self) -> &[String] {
        &self.open
    }

    /// Forget all open elements
    pub fn reset_nesting(&mut self) {
        self.open.clear();
    }

    /// Give back the underlying reader, positioned at [`position`](Self::position)
    pub fn into_inner(self) -> R {
        self.cursor.into_inner()
    }

    /// Read the next token and the offset at which it starts.
    pub fn next_token(&mut self) -> Result<(Position, Token), XmlError> {
        let start = self.cursor.offset();
        let token = match self.cursor.peek()? {
            None => Token::Eof,
            Some(b'<') => {
                self.cursor.bump()?;
                self.markup(start)?
            }
            Some(_) => {
                let mut text = Vec::new();
                self.cursor.read_until_byte(b'<', &mut text)?;
                Token::Text(into_string(text, start)?)
            }
        };
        Ok((start, token))
    }

    fn markup(&mut self, start: Position) -> Result<Token, XmlError> {
        match self.cursor.peek()? {
            None => Err(XmlError::malformed(start, "unterminated tag")),
            Some(b'/') => {
                self.cursor.bump()?;
                self.end_tag(start)
            }
            Some(b'?') => {
                self.cursor.bump()?;
                self.processing_instruction(start)
            }
            Some(b'!') => {
                self.cursor.bump()?;
                self.declaration(start)
            }
            Some(_) => self.start_tag(start),
        }
    }

    fn read_name(&mut self) -> Result<String, XmlError> {
        let start = self.cursor.offset();
        let mut name = Vec::new();
        self.cursor.read_while(is_name_byte, &mut name)?;
        into_string(name, start)
    }

    fn start_tag(&mut self, start: Position) -> Result<Token, XmlError> {
        let name = self.read_name()?;
        if name.is_empty() {
            return Err(XmlError::malformed(start, "expected element name after '<'"));
        }

        let mut attributes = Vec::new();
        let self_closing = loop {
            self.cursor.skip_whitespace()?;
            match self.cursor.peek()? {
                None => {
                    return Err(XmlError::malformed(start, format!("unterminated tag <{}", name)));
                }
                Some(b'>') => {
                    self.cursor.bump()?;
                    break false;
                }
                Some(b'/') => {
                    self.cursor.bump()?;
                    if self.cursor.bump()? != Some(b'>') {
                        return Err(XmlError::malformed(
                            start,
                            format!("expected '>' after '/' in tag <{}", name),
                        ));
                    }
                    break true;
                }
                Some(b) if is_name_byte(b) => attributes.push(self.attribute(&name)?),
                Some(b) => {
                    return Err(XmlError::malformed(
                        self.cursor.offset(),
                        format!("unexpected character '{}' in tag <{}", b as char, name),
                    ));
                }
            }
        };

        if !self_closing {
            self.open.push(name.clone());
        }
        Ok(Token::StartTag {
            name,
            attributes: Attributes::from(attributes),
            self_closing,
        })
    }

    fn attribute(&mut self, element: &str) -> Result<Attribute, XmlError> {
        let start = self.cursor.offset();
        let name = self.read_name()?;

        self.cursor.skip_whitespace()?;
        if self.cursor.bump()? != Some(b'=') {
            return Err(XmlError::malformed(
                start,
                format!("attribute '{}' of <{}> has no value", name, element),
            ));
        }
        self.cursor.skip_whitespace()?;

        let quote = match self.cursor.bump()? {
            Some(q @ (b'"' | b'\'')) => q,
            None => return Err(XmlError::malformed(start, format!("unterminated tag <{}", element))),
            Some(_) => {
                return Err(XmlError::malformed(
                    start,
                    format!("value of attribute '{}' is not quoted", name),
                ));
            }
        };
        let value_start = self.cursor.offset();
        let mut value = Vec::new();
        if !self.cursor.read_until_byte(quote, &mut value)? {
            return Err(XmlError::malformed(
                start,
                format!("unterminated quote in attribute '{}' of <{}>", name, element),
            ));
        }
        self.cursor.bump()?;

        Ok(Attribute {
            name,
            value: into_string(value, value_start)?,
        })
    }

    fn end_tag(&mut self, start: Position) -> Result<Token, XmlError> {
        let name = self.read_name()?;
        self.cursor.skip_whitespace()?;
        if self.cursor.bump()? != Some(b'>') {
            return Err(XmlError::malformed(start, format!("unterminated end tag </{}", name)));
        }

        match self.open.pop() {
            Some(open) if open == name => Ok(Token::EndTag { name }),
            Some(open) => Err(XmlError::malformed(
                start,
                format!("illegal end tag </{}>, expected </{}>", name, open),
            )),
            None => Err(XmlError::malformed(
                start,
                format!("end tag </{}> without a matching start tag", name),
            )),
        }
    }

    fn processing_instruction(&mut self, start: Position) -> Result<Token, XmlError> {
        let target = self.read_name()?;
        if target.is_empty() {
            return Err(XmlError::malformed(start, "processing instruction without a target"));
        }
        let data_start = self.cursor.offset();
        let mut data = Vec::new();
        if !self.cursor.read_until_sequence(b"?>", &mut data)? {
            return Err(XmlError::malformed(start, "unterminated processing instruction"));
        }
        let data = into_string(data, data_start)?;
        Ok(Token::ProcessingInstruction {
            target,
            data: data.trim().to_string(),
        })
    }

    fn declaration(&mut self, start: Position) -> Result<Token, XmlError> {
        let body_start = self.cursor.offset();
        match self.cursor.peek()? {
            Some(b'-') => {
                self.cursor.bump()?;
                if self.cursor.bump()? != Some(b'-') {
                    return Err(XmlError::malformed(start, "malformed comment"));
                }
                let mut body = Vec::new();
                if !self.cursor.read_until_sequence(b"-->", &mut body)? {
                    return Err(XmlError::malformed(start, "unterminated comment"));
                }
                Ok(Token::Comment(into_string(body, body_start)?))
            }
            Some(b'[') => {
                for &expected in b"[CDATA[" {
                    if self.cursor.bump()? != Some(expected) {
                        return Err(XmlError::malformed(start, "malformed CDATA section"));
                    }
                }
                let mut body = Vec::new();
                if !self.cursor.read_until_sequence(b"]]>", &mut body)? {
                    return Err(XmlError::malformed(start, "unterminated CDATA section"));
                }
                Ok(Token::CData(into_string(body, body_start)?))
            }
            _ => {
                let mut keyword = Vec::new();
                self.cursor.read_while(|b| b.is_ascii_alphabetic(), &mut keyword)?;
                if keyword != b"DOCTYPE" {
                    return Err(XmlError::malformed(start, "unsupported markup declaration"));
                }
                self.doctype(start)
            }
        }
    }

    // The internal subset may contain '>' inside brackets or quotes.
    fn doctype(&mut self, start: Position) -> Result<Token, XmlError> {
        let body_start = self.cursor.offset();
        let mut body = Vec::new();
        let mut depth = 0usize;
        let mut quote: Option<u8> = None;
        loop {
            let b = match self.cursor.bump()? {
                Some(b) => b,
                None => return Err(XmlError::malformed(start, "unterminated DOCTYPE")),
            };
            match quote {
                Some(q) if b == q => quote = None,
                Some(_) => {}
                None => match b {
                    b'"' | b'\'' => quote = Some(b),
                    b'[' => depth += 1,
                    b']' => depth = depth.saturating_sub(1),
                    b'>' if depth == 0 => break,
                    _ => {}
                },
            }
            body.push(b);
        }
        let body = into_string(body, body_start)?;
        Ok(Token::Doctype(body.trim().to_string()))
    }
}
