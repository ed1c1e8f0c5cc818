use super::entities::EntityError;
use super::Position;

/// Boxed error returned by [`Handler`](super::Handler) callbacks.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while tokenizing or parsing XML
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    /// Structural error in the document: mismatched or unterminated constructs
    #[error("malformed document at byte {position}: {detail}")]
    Malformed {
        /// Offset at which the offending construct starts
        position: Position,
        /// Description of the problem
        detail: String,
    },

    /// A character or entity reference could not be resolved
    #[error("bad entity reference at byte {position}: {source}")]
    Entity {
        /// Offset of the text or attribute containing the reference
        position: Position,
        /// Underlying entity error
        #[source]
        source: EntityError,
    },

    /// A handler callback failed
    #[error("handler error at byte {position}: {source}")]
    Handler {
        /// Offset of the event being handled
        position: Position,
        /// Error returned by the handler
        #[source]
        source: HandlerError,
    },

    /// A callback other than `start_element` asked to delegate
    #[error("handler requested delegation from {callback} at byte {position}")]
    IllegalDelegate {
        /// Offset of the event being handled
        position: Position,
        /// Callback that returned the delegate
        callback: &'static str,
    },

    /// The source ended before any start tag was found
    #[error("no root element found")]
    NoRootElement,

    /// I/O error from the underlying stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl XmlError {
    pub(crate) fn malformed(position: Position, detail: impl Into<String>) -> Self {
        XmlError::Malformed {
            position,
            detail: detail.into(),
        }
    }

    /// Byte offset associated with this error, when there is one.
    pub fn position(&self) -> Option<Position> {
        match self {
            XmlError::Malformed { position, .. }
            | XmlError::Entity { position, .. }
            | XmlError::Handler { position, .. }
            | XmlError::IllegalDelegate { position, .. } => Some(*position),
            XmlError::NoRootElement | XmlError::Io(_) => None,
        }
    }

    /// Whether this is a structural (tokenizer or nesting) error.
    pub fn is_malformed(&self) -> bool {
        matches!(self, XmlError::Malformed { .. })
    }
}
