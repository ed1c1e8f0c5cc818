//! # mzcodec - streaming indexed mzML
//!
//! `mzcodec` reads and writes mzML 1.1 documents, the XML exchange format for
//! mass spectrometry data, without ever holding a document tree in memory.
//!
//! ## Key Features
//!
//! - **Event-driven XML**: a small tokenizer and SAX parser that track byte
//!   offsets and let handlers delegate whole sub-trees to other handlers.
//!
//! - **Binary arrays**: Base64 arrays with zlib and MS-Numpress compression.
//!   Lossy Numpress output is checked against an error tolerance and replaced
//!   by a safer compression when it strays.
//!
//! - **Indexed output**: documents are wrapped in `<indexedmzML>` with a
//!   trailing offset index. Records can be rendered on a thread pool while the
//!   output keeps submission order.
//!
//! - **Random access**: the trailing index is located from the last few
//!   kilobytes of a file, after which any spectrum or chromatogram is one seek
//!   away. Unindexed or damaged files fall back to scanning.
//!
//! ## Quick Start
//!
//! ```
//! use std::io::Cursor;
//! use mzcodec::prelude::*;
//!
//! let mut writer = IndexedMzMLWriter::new(Vec::new(), &DocumentMetadata::new("run1"), WriterConfig::numpress())?;
//! writer.begin_spectra(2)?;
//! writer.write_spectrum(&Spectrum::new("scan=1", vec![100.0, 200.5], vec![10.0, 20.0]))?;
//! writer.write_spectrum(&Spectrum::new("scan=2", vec![150.25], vec![5.0]))?;
//! writer.finish()?;
//!
//! let mut reader = IndexedMzMLReader::open(Cursor::new(writer.into_inner()))?;
//! let spectrum = reader.fetch_spectrum_by_id("scan=2", true)?;
//! assert_eq!(spectrum.peak_count(), 1);
//! # Ok::<(), mzcodec::indexed::MzMLError>(())
//! ```
//!
//! ## Architecture
//!
//! - [`xml`]: entity codec, tokenizer, SAX parser, writer and element trees
//! - [`binary`]: precision, compression and Numpress codecs for arrays
//! - [`cv`]: controlled vocabulary parameters
//! - [`model`]: spectra, chromatograms and document metadata
//! - [`indexed`]: the writer, the sequential reader and the random access reader
//! - [`input`]: opening plain or gzipped files

#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

pub mod binary;
pub mod cv;
pub mod indexed;
pub mod input;
pub mod model;
pub mod xml;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::binary::{BinaryArraySpec, BinaryCodec, BinaryError, Compression, NumpressScheme, Precision};
    pub use crate::cv::{CvParam, UserParam, MS_CV_ACCESSIONS};
    pub use crate::indexed::{
        DocumentEvent, FailurePolicy, IndexStatus, IndexTable, IndexedMzMLReader, IndexedMzMLWriter, MzMLDocument,
        MzMLError, MzMLReader, Progress, ReaderConfig, SessionState, WriteSummary, WriterConfig,
    };
    pub use crate::input::open_input;
    pub use crate::model::{
        ArrayData, ArrayError, BinaryDataArray, BinaryReadMode, Chromatogram, DocumentMetadata, EncodingPolicy, Record,
        RecordKind, Spectrum,
    };
}
