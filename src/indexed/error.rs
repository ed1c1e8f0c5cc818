use crate::model::{RecordError, RecordKind};
use crate::xml::{Position, XmlError};

use super::SessionState;

/// Errors raised by the indexed writer and readers
#[derive(Debug, thiserror::Error)]
pub enum MzMLError {
    /// XML parsing failed
    #[error("XML error: {0}")]
    Xml(#[from] XmlError),

    /// I/O error on the underlying stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A single record could not be converted
    #[error("{kind} {ordinal} ({id}): {source}")]
    RecordFailure {
        /// Record list
        kind: RecordKind,
        /// Position of the record in its list
        ordinal: usize,
        /// Native id of the record
        id: String,
        /// What went wrong
        #[source]
        source: RecordError,
    },

    /// No compression in the fallback chain met an array's error tolerance
    #[error("{kind} {id}: no compression met the error tolerance: {source}")]
    EncodingViolation {
        /// Record list
        kind: RecordKind,
        /// Native id of the record
        id: String,
        /// The failing array and the tolerance detail
        #[source]
        source: RecordError,
    },

    /// The element found at an index offset is not the indexed record
    #[error("index entry {kind} {ordinal} (\"{expected}\") points at {found} (byte {offset})")]
    IndexMismatch {
        /// Record list
        kind: RecordKind,
        /// Position of the record in its list
        ordinal: usize,
        /// Id recorded in the index
        expected: String,
        /// Element name and id actually found
        found: String,
        /// Offset taken from the index
        offset: u64,
    },

    /// No record with this ordinal or id
    #[error("{kind} {key} not found")]
    RecordNotFound {
        /// Record list
        kind: RecordKind,
        /// Ordinal or id that was looked up
        key: String,
    },

    /// Operation not allowed in the session's current state
    #[error("cannot {operation} while {state}")]
    InvalidState {
        /// Current session state
        state: SessionState,
        /// What the caller attempted
        operation: &'static str,
    },

    /// The progress callback asked to stop
    #[error("cancelled after {written} {kind} records")]
    Cancelled {
        /// List being written when cancelled
        kind: RecordKind,
        /// Records written to that list so far
        written: usize,
    },

    /// The document bytes do not match the stored `<fileChecksum>`
    #[error("file checksum mismatch: stored {stored}, computed {computed}")]
    ChecksumMismatch {
        /// Digest written in the document
        stored: String,
        /// Digest of the bytes actually read
        computed: String,
    },

    /// The document does not have the shape of an mzML file
    #[error("invalid mzML structure at byte {position}: {detail}")]
    InvalidStructure {
        /// Offset of the offending element
        position: Position,
        /// Description of the problem
        detail: String,
    },
}

impl MzMLError {
    /// Wrap a per-record conversion failure, classifying encoding violations.
    pub(crate) fn from_record(kind: RecordKind, ordinal: usize, id: &str, source: RecordError) -> Self {
        if source.is_encoding_violation() {
            MzMLError::EncodingViolation {
                kind,
                id: id.to_string(),
                source,
            }
        } else {
            MzMLError::RecordFailure {
                kind,
                ordinal,
                id: id.to_string(),
                source,
            }
        }
    }

    pub(crate) fn structure(position: Position, detail: impl Into<String>) -> Self {
        MzMLError::InvalidStructure {
            position,
            detail: detail.into(),
        }
    }

    /// Whether a [`FailurePolicy::SkipAndContinue`](super::FailurePolicy)
    /// session may drop the record and go on.
    pub fn is_skippable(&self) -> bool {
        matches!(self, MzMLError::RecordFailure { .. })
    }
}
