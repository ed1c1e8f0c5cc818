//! Indexed mzML sessions
//!
//! Three entry points share one index representation:
//!
//! - [`IndexedMzMLWriter`] streams records into a new document and appends
//!   the byte-offset index (`<indexList>` + `<indexListOffset>`), closed by
//!   a SHA-1 `<fileChecksum>`.
//! - [`MzMLReader`] reads a document front to back, either collecting
//!   everything into an [`MzMLDocument`] or delivering [`DocumentEvent`]s.
//! - [`IndexedMzMLReader`] locates the trailing index of a seekable stream
//!   and fetches single records by ordinal or id.
//!
//! # Example
//!
//! ```
//! use std::io::Cursor;
//! use mzcodec::indexed::{IndexedMzMLReader, IndexedMzMLWriter, WriterConfig};
//! use mzcodec::model::{DocumentMetadata, Spectrum};
//!
//! let metadata = DocumentMetadata::new("run");
//! let mut writer = IndexedMzMLWriter::new(Vec::new(), &metadata, WriterConfig::default())?;
//! writer.begin_spectra(2)?;
//! writer.write_spectrum(&Spectrum::new("scan=1", vec![100.0], vec![5.0]))?;
//! writer.write_spectrum(&Spectrum::new("scan=2", vec![200.0], vec![7.0]))?;
//! writer.finish()?;
//!
//! let mut reader = IndexedMzMLReader::open(Cursor::new(writer.into_inner()))?;
//! let spectrum = reader.fetch_spectrum(1, true)?;
//! assert_eq!(spectrum.id, "scan=2");
//! # Ok::<(), mzcodec::indexed::MzMLError>(())
//! ```

mod checksum;
mod config;
mod error;
mod index;
mod random_access;
mod reader;
mod writer;

use std::fmt;

use serde::Serialize;

pub use config::{FailurePolicy, ReaderConfig, WriterConfig};
pub use error::MzMLError;
pub use index::{IndexEntry, IndexStatus, IndexTable};
pub use random_access::IndexedMzMLReader;
pub use reader::{DocumentEvent, MzMLDocument, MzMLReader};
pub use writer::{IndexedMzMLWriter, WriteSummary};

use crate::model::RecordKind;

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    /// A writer accepting records
    Writing,
    /// A reader walking the document front to back
    ReadingMetadata,
    /// A reader serving records through the index
    ReadingBinaryOnDemand,
    /// Finished, cancelled or failed; no further operations
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SessionState::Writing => "writing",
            SessionState::ReadingMetadata => "reading",
            SessionState::ReadingBinaryOnDemand => "serving indexed reads",
            SessionState::Closed => "closed",
        };
        f.write_str(text)
    }
}

/// A record dropped under [`FailurePolicy::SkipAndContinue`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRecord {
    /// Record list
    pub kind: RecordKind,
    /// Position of the record in its input sequence
    pub position: usize,
    /// Native id
    pub id: String,
    /// Rendered error
    pub reason: String,
}

/// Progress report passed to the writer's progress callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// List being written
    pub kind: RecordKind,
    /// Records written to that list so far
    pub current: usize,
    /// Count declared when the list was opened
    pub total: usize,
}
