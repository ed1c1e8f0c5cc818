//! Event-driven parsing with sub-tree delegation
//!
//! A [`Handler`] receives start tags, end tags, character data and processing
//! instructions one at a time. From `start_element` it may hand the rest of the
//! current element to another handler by returning [`Status::Delegate`]; the
//! delegate sees that same start tag first, every event inside the element, and
//! its end tag. Once the end tag has been dispatched the delegate is returned to
//! its parent through [`Handler::delegate_finished`], where the parent can
//! downcast it and take its results.
//!
//! One call to [`SaxReader::parse`] handles one top-level element. It returns
//! as soon as that element closes or any callback answers [`Status::Done`],
//! leaving the stream right after the token that ended it, so the next call
//! resumes with whatever follows.

use std::any::Any;
use std::fmt;
use std::io::BufRead;

use log::trace;

use super::attributes::Attributes;
use super::entities::unescape;
use super::error::{HandlerError, XmlError};
use super::tokenizer::{Token, Tokenizer};
use super::Position;

/// What the parser should do after a callback
pub enum Status {
    /// Keep dispatching to the current handler
    Continue,
    /// Dispatch the current element, starting with its start tag, to this handler
    Delegate(Box<dyn SubHandler>),
    /// Stop parsing now
    Done,
}

impl Status {
    /// Delegate the current element to `handler`
    pub fn delegate<H: Handler + 'static>(handler: H) -> Self {
        Status::Delegate(Box::new(handler))
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Continue => f.write_str("Continue"),
            Status::Delegate(_) => f.write_str("Delegate(..)"),
            Status::Done => f.write_str("Done"),
        }
    }
}

/// Result type returned by every handler callback
pub type HandlerResult = Result<Status, HandlerError>;

/// Receiver of parse events.
///
/// Every callback has a no-op default, so implementors only write the ones
/// they care about.
pub trait Handler {
    /// `<?target data?>`; `data` is trimmed.
    fn processing_instruction(&mut self, _target: &str, _data: &str, _position: Position) -> HandlerResult {
        Ok(Status::Continue)
    }

    /// Start tag. `position` is the offset of its `<`.
    fn start_element(&mut self, _name: &str, _attributes: &Attributes, _position: Position) -> HandlerResult {
        Ok(Status::Continue)
    }

    /// End tag, also sent right after the start tag of an empty element.
    fn end_element(&mut self, _name: &str, _position: Position) -> HandlerResult {
        Ok(Status::Continue)
    }

    /// Non-blank character data with surrounding whitespace removed.
    /// `position` is the offset of the first delivered byte.
    fn characters(&mut self, _text: &str, _position: Position) -> HandlerResult {
        Ok(Status::Continue)
    }

    /// A delegate created by this handler has seen its element's end tag.
    fn delegate_finished(&mut self, _name: &str, _delegate: Box<dyn Any>, _position: Position) -> HandlerResult {
        Ok(Status::Continue)
    }

    /// Whether [`characters`](Self::characters) should be called at all
    fn collect_characters(&self) -> bool {
        true
    }

    /// Whether attribute values are unescaped before delivery
    fn auto_unescape_attributes(&self) -> bool {
        true
    }

    /// Whether character data is unescaped before delivery
    fn auto_unescape_characters(&self) -> bool {
        true
    }
}

/// A handler that can be owned by the parser as a delegate.
///
/// Implemented for every `'static` [`Handler`].
pub trait SubHandler: Handler {
    /// View as a plain handler
    fn as_handler(&mut self) -> &mut dyn Handler;
    /// Convert into `Any` so the parent can downcast it
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Handler + 'static> SubHandler for T {
    fn as_handler(&mut self) -> &mut dyn Handler {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// How a [`SaxReader::parse`] call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// A callback returned [`Status::Done`]
    Done,
    /// The top-level element closed
    ElementClosed,
    /// The input ended before any element started
    EndOfInput,
}

struct Frame {
    handler: Box<dyn SubHandler>,
    name: String,
    depth: usize,
}

/// Routes events to the root handler or the innermost delegate.
struct Dispatcher<'h> {
    root: &'h mut dyn Handler,
    frames: Vec<Frame>,
    depth: usize,
}

fn wrap(position: Position) -> impl FnOnce(HandlerError) -> XmlError {
    move |source| XmlError::Handler { position, source }
}

fn no_delegate(status: Status, callback: &'static str, position: Position) -> Result<Status, XmlError> {
    match status {
        Status::Delegate(_) => Err(XmlError::IllegalDelegate { position, callback }),
        other => Ok(other),
    }
}

impl<'h> Dispatcher<'h> {
    fn new(root: &'h mut dyn Handler) -> Self {
        Self {
            root,
            frames: Vec::new(),
            depth: 0,
        }
    }

    fn active(&mut self) -> &mut dyn Handler {
        match self.frames.last_mut() {
            Some(frame) => frame.handler.as_handler(),
            None => &mut *self.root,
        }
    }

    fn start_element(&mut self, name: &str, raw: &Attributes, position: Position) -> Result<Status, XmlError> {
        self.depth += 1;
        let mut unescaped: Option<Attributes> = None;
        loop {
            let depth = self.depth;
            let handler = self.active();
            let attributes = if handler.auto_unescape_attributes() && raw.has_references() {
                if unescaped.is_none() {
                    let attrs = raw
                        .unescaped()
                        .map_err(|source| XmlError::Entity { position, source })?;
                    unescaped = Some(attrs);
                }
                unescaped.as_ref().unwrap_or(raw)
            } else {
                raw
            };

            match handler.start_element(name, attributes, position).map_err(wrap(position))? {
                Status::Delegate(child) => {
                    trace!("delegating <{}> at byte {}", name, position);
                    self.frames.push(Frame {
                        handler: child,
                        name: name.to_string(),
                        depth,
                    });
                }
                other => return Ok(other),
            }
        }
    }

    fn end_element(&mut self, name: &str, position: Position) -> Result<Status, XmlError> {
        let status = self.active().end_element(name, position).map_err(wrap(position))?;
        let mut status = no_delegate(status, "end_element", position)?;

        let closing = self.depth;
        self.depth -= 1;
        while self.frames.last().map_or(false, |f| f.depth == closing) {
            let frame = match self.frames.pop() {
                Some(frame) => frame,
                None => break,
            };
            if let Status::Done = status {
                break;
            }
            let parent = self.active();
            let finished = parent
                .delegate_finished(&frame.name, frame.handler.into_any(), position)
                .map_err(wrap(position))?;
            status = no_delegate(finished, "delegate_finished", position)?;
        }
        Ok(status)
    }

    fn characters(&mut self, raw: &str, position: Position, verbatim: bool) -> Result<Status, XmlError> {
        let handler = self.active();
        if !handler.collect_characters() {
            return Ok(Status::Continue);
        }

        let (text, position) = if verbatim {
            (raw, position)
        } else {
            let leading = raw.len() - raw.trim_start().len();
            (raw.trim(), position + leading as u64)
        };
        if text.is_empty() {
            return Ok(Status::Continue);
        }

        let status = if !verbatim && handler.auto_unescape_characters() {
            let text = unescape(text).map_err(|source| XmlError::Entity { position, source })?;
            handler.characters(&text, position)
        } else {
            handler.characters(text, position)
        };
        no_delegate(status.map_err(wrap(position))?, "characters", position)
    }

    fn processing_instruction(&mut self, target: &str, data: &str, position: Position) -> Result<Status, XmlError> {
        let status = self
            .active()
            .processing_instruction(target, data, position)
            .map_err(wrap(position))?;
        no_delegate(status, "processing_instruction", position)
    }
}

/// Resumable SAX parser over a buffered reader.
pub struct SaxReader<R> {
    tokenizer: Tokenizer<R>,
}

impl<R: BufRead> SaxReader<R> {
    /// Parse from the start of `reader`
    pub fn new(reader: R) -> Self {
        Self::with_offset(reader, 0)
    }

    /// Parse `reader`, reporting positions relative to `offset`
    pub fn with_offset(reader: R, offset: Position) -> Self {
        Self {
            tokenizer: Tokenizer::with_offset(reader, offset),
        }
    }

    /// Offset of the next unread byte
    pub fn position(&self) -> Position {
        self.tokenizer.position()
    }

    /// Give back the reader, positioned right after the last consumed token
    pub fn into_inner(self) -> R {
        self.tokenizer.into_inner()
    }

    /// Parse the next top-level element, dispatching its events to `handler`.
    ///
    /// Leading processing instructions, comments and whitespace are consumed
    /// along the way. Returns when the element closes, when a callback answers
    /// [`Status::Done`], or when the input is exhausted before any element.
    pub fn parse(&mut self, handler: &mut dyn Handler) -> Result<Completion, XmlError> {
        self.tokenizer.reset_nesting();
        let mut dispatcher = Dispatcher::new(handler);

        loop {
            let (position, token) = self.tokenizer.next_token()?;
            let mut closed_element = false;
            let status = match token {
                Token::StartTag {
                    name,
                    attributes,
                    self_closing,
                } => match dispatcher.start_element(&name, &attributes, position)? {
                    Status::Continue if self_closing => {
                        closed_element = true;
                        dispatcher.end_element(&name, position)?
                    }
                    other => other,
                },
                Token::EndTag { name } => {
                    closed_element = true;
                    dispatcher.end_element(&name, position)?
                }
                Token::Text(text) => dispatcher.characters(&text, position, false)?,
                Token::CData(text) => {
                    // content starts after "<![CDATA["
                    dispatcher.characters(&text, position + 9, true)?
                }
                Token::ProcessingInstruction { target, data } => {
                    dispatcher.processing_instruction(&target, &data, position)?
                }
                Token::Comment(_) | Token::Doctype(_) => Status::Continue,
                Token::Eof => {
                    if let Some(open) = self.tokenizer.open_elements().last() {
                        return Err(XmlError::malformed(
                            position,
                            format!("unexpected end of input inside <{}>", open),
                        ));
                    }
                    return Ok(Completion::EndOfInput);
                }
            };

            if let Status::Done = status {
                return Ok(Completion::Done);
            }
            if closed_element && dispatcher.depth == 0 {
                return Ok(Completion::ElementClosed);
            }
        }
    }
}

/// Parse one top-level element from `reader`.
pub fn parse<R: BufRead>(reader: R, handler: &mut dyn Handler) -> Result<Completion, XmlError> {
    SaxReader::new(reader).parse(handler)
}
