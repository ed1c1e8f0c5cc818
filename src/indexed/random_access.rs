//! Random access through the trailing offset index

use std::any::Any;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::sync::Arc;

use log::{debug, warn};

use super::checksum::{digest_prefix, find_stored_checksum, StoredChecksum};
use super::config::ReaderConfig;
use super::error::MzMLError;
use super::index::{parse_index_list_offset, IndexEntry, IndexStatus, IndexTable};
use super::reader::{finished_tree, read_mode, record_capture, MzMLReader};
use super::SessionState;
use crate::model::{BinaryReadMode, Chromatogram, DocumentMetadata, Record, RecordKind, Spectrum};
use crate::xml::{Attributes, Handler, HandlerResult, Position, SaxReader, Status, XmlElement};

/// Reader that seeks straight to single records.
///
/// The index is located once when the reader is opened and shared between
/// readers created with [`share`](Self::share). When no usable index exists,
/// every fetch falls back to a forward scan of the document.
pub struct IndexedMzMLReader<R> {
    stream: R,
    index: Arc<IndexTable>,
    status: IndexStatus,
    checksum: Option<StoredChecksum>,
    config: ReaderConfig,
}

impl<R: Read + Seek> IndexedMzMLReader<R> {
    /// Open with the default configuration
    pub fn open(stream: R) -> Result<Self, MzMLError> {
        Self::open_with_config(stream, ReaderConfig::default())
    }

    /// Locate and read the trailing index.
    ///
    /// A missing or damaged index is not an error: the reader comes up with
    /// [`IndexStatus::Unavailable`] and scans on every fetch.
    pub fn open_with_config(mut stream: R, config: ReaderConfig) -> Result<Self, MzMLError> {
        let tail = read_tail(&mut stream, config.tail_window);
        let checksum = tail
            .as_ref()
            .ok()
            .and_then(|tail| find_stored_checksum(&tail.bytes, tail.start));
        let trailing = tail
            .map_err(|e| e.to_string())
            .and_then(|tail| read_trailing_index(&mut stream, &tail, &config));
        let (index, status) = match trailing {
            Ok(index) => {
                debug!(
                    "index lists {} spectra and {} chromatograms",
                    index.len(RecordKind::Spectrum),
                    index.len(RecordKind::Chromatogram)
                );
                (index, IndexStatus::Available)
            }
            Err(reason) => {
                warn!("Index unavailable, fetches will scan the document: {}", reason);
                (IndexTable::new(), IndexStatus::Unavailable(reason))
            }
        };
        Ok(Self {
            stream,
            index: Arc::new(index),
            status,
            checksum,
            config,
        })
    }

    /// Like [`open`](Self::open), but rebuild the index with one forward scan
    /// when the trailing one is unusable.
    pub fn open_with_scan(stream: R) -> Result<Self, MzMLError> {
        let mut reader = Self::open(stream)?;
        if !reader.status.is_usable() {
            reader.stream.seek(SeekFrom::Start(0))?;
            let input = BufReader::with_capacity(reader.config.buffer_size, &mut reader.stream);
            let index = IndexTable::scan(input)?;
            reader.index = Arc::new(index);
            reader.status = IndexStatus::Rebuilt;
        }
        Ok(reader)
    }

    /// Whether the index could be used
    pub fn index_status(&self) -> &IndexStatus {
        &self.status
    }

    /// The shared index table
    pub fn index(&self) -> &IndexTable {
        &self.index
    }

    /// Always [`SessionState::ReadingBinaryOnDemand`]
    pub fn state(&self) -> SessionState {
        SessionState::ReadingBinaryOnDemand
    }

    /// Number of records in one list, when known without scanning
    pub fn count(&self, kind: RecordKind) -> Option<usize> {
        self.status.is_usable().then(|| self.index.len(kind))
    }

    /// Another reader over `stream` sharing this reader's index
    pub fn share<S: Read + Seek>(&self, stream: S) -> IndexedMzMLReader<S> {
        IndexedMzMLReader {
            stream,
            index: Arc::clone(&self.index),
            status: self.status.clone(),
            checksum: self.checksum.clone(),
            config: self.config.clone(),
        }
    }

    /// SHA-1 found in the document's `<fileChecksum>`
    pub fn stored_checksum(&self) -> Option<&str> {
        self.checksum.as_ref().map(|c| c.digest.as_str())
    }

    /// Recompute the SHA-1 of the document and compare it with the stored
    /// `<fileChecksum>`. Returns `false` when the document carries none.
    pub fn verify_checksum(&mut self) -> Result<bool, MzMLError> {
        let Some(stored) = self.checksum.clone() else {
            return Ok(false);
        };
        self.stream.seek(SeekFrom::Start(0))?;
        let input = BufReader::with_capacity(self.config.buffer_size, &mut self.stream);
        let computed = digest_prefix(input, stored.covered)?;
        if computed != stored.digest {
            return Err(MzMLError::ChecksumMismatch {
                stored: stored.digest,
                computed,
            });
        }
        debug!("fileChecksum {} verified over {} bytes", computed, stored.covered);
        Ok(true)
    }

    /// Give back the stream
    pub fn into_inner(self) -> R {
        self.stream
    }

    /// Read the document header.
    pub fn metadata(&mut self) -> Result<DocumentMetadata, MzMLError> {
        self.stream.seek(SeekFrom::Start(0))?;
        let input = BufReader::with_capacity(self.config.buffer_size, &mut self.stream);
        MzMLReader::with_config(input, self.config.clone()).read_metadata()
    }

    /// Spectrum by ordinal; arrays are decoded only when `include_binary`.
    pub fn fetch_spectrum(&mut self, ordinal: usize, include_binary: bool) -> Result<Spectrum, MzMLError> {
        self.fetch(ordinal, include_binary)
    }

    /// Chromatogram by ordinal
    pub fn fetch_chromatogram(&mut self, ordinal: usize, include_binary: bool) -> Result<Chromatogram, MzMLError> {
        self.fetch(ordinal, include_binary)
    }

    /// Spectrum by native id
    pub fn fetch_spectrum_by_id(&mut self, id: &str, include_binary: bool) -> Result<Spectrum, MzMLError> {
        self.fetch_by_id(id, include_binary)
    }

    /// Chromatogram by native id
    pub fn fetch_chromatogram_by_id(&mut self, id: &str, include_binary: bool) -> Result<Chromatogram, MzMLError> {
        self.fetch_by_id(id, include_binary)
    }

    /// Record of type `T` by ordinal
    pub fn fetch<T: Record>(&mut self, ordinal: usize, include_binary: bool) -> Result<T, MzMLError> {
        if !self.status.is_usable() {
            return self.scanner()?.find_record(ordinal, include_binary);
        }
        let entry = self
            .index
            .get(T::KIND, ordinal)
            .cloned()
            .ok_or_else(|| MzMLError::RecordNotFound {
                kind: T::KIND,
                key: format!("#{}", ordinal),
            })?;
        self.read_entry(&entry, include_binary)
    }

    /// Record of type `T` by native id
    pub fn fetch_by_id<T: Record>(&mut self, id: &str, include_binary: bool) -> Result<T, MzMLError> {
        if !self.status.is_usable() {
            return self.scanner()?.find_record_by_id(id, include_binary);
        }
        let entry = self
            .index
            .find_id(T::KIND, id)
            .cloned()
            .ok_or_else(|| MzMLError::RecordNotFound {
                kind: T::KIND,
                key: format!("\"{}\"", id),
            })?;
        self.read_entry(&entry, include_binary)
    }

    /// Check the stored checksum (unless disabled in the config) and that
    /// every index entry points at the start tag of its record. Returns the
    /// number of entries checked.
    pub fn verify(&mut self) -> Result<usize, MzMLError> {
        if self.config.verify_checksum {
            self.verify_checksum()?;
        }
        let index = Arc::clone(&self.index);
        let mut checked = 0;
        for kind in [RecordKind::Spectrum, RecordKind::Chromatogram] {
            for entry in index.entries(kind) {
                let mut handler = FirstStartTag::default();
                let input = self.seek_to(entry.offset)?;
                // a start tag that does not parse is reported as a mismatch below
                let _ = SaxReader::with_offset(input, entry.offset).parse(&mut handler);
                if handler.found.as_ref() != Some(&(kind.element().to_string(), entry.id.clone())) {
                    return Err(mismatch(kind, entry, handler.describe()));
                }
                checked += 1;
            }
        }
        Ok(checked)
    }

    fn scanner(&mut self) -> Result<MzMLReader<BufReader<&mut R>>, MzMLError> {
        self.stream.seek(SeekFrom::Start(0))?;
        let input = BufReader::with_capacity(self.config.buffer_size, &mut self.stream);
        Ok(MzMLReader::with_config(input, self.config.clone()))
    }

    fn seek_to(&mut self, offset: u64) -> Result<BufReader<&mut R>, MzMLError> {
        self.stream.seek(SeekFrom::Start(offset))?;
        Ok(BufReader::with_capacity(self.config.buffer_size, &mut self.stream))
    }

    fn read_entry<T: Record>(&mut self, entry: &IndexEntry, include_binary: bool) -> Result<T, MzMLError> {
        let kind = T::KIND;
        let mode = read_mode(include_binary);
        let mut handler = FetchHandler {
            element: kind.element(),
            id: entry.id.clone(),
            mode,
            first_tag: FirstStartTag::default(),
            captured: None,
        };
        let input = self.seek_to(entry.offset)?;
        let completion = SaxReader::with_offset(input, entry.offset).parse(&mut handler);

        match (handler.captured, completion) {
            (Some(element), _) => {
                T::from_element(element, mode).map_err(|source| MzMLError::from_record(kind, entry.ordinal, &entry.id, source))
            }
            // the right record, but broken
            (None, Err(e)) if handler.first_tag.matches(kind.element(), &entry.id) => Err(e.into()),
            (None, _) => Err(mismatch(kind, entry, handler.first_tag.describe())),
        }
    }
}

fn mismatch(kind: RecordKind, entry: &IndexEntry, found: String) -> MzMLError {
    MzMLError::IndexMismatch {
        kind,
        ordinal: entry.ordinal,
        expected: entry.id.clone(),
        found,
        offset: entry.offset,
    }
}

/// The last bytes of a stream
struct Tail {
    bytes: Vec<u8>,
    /// Offset of `bytes[0]`
    start: u64,
    /// Length of the whole stream
    len: u64,
}

fn read_tail<R: Read + Seek>(stream: &mut R, window: usize) -> io::Result<Tail> {
    let len = stream.seek(SeekFrom::End(0))?;
    let window = (window as u64).min(len);
    let start = len - window;
    stream.seek(SeekFrom::Start(start))?;
    let mut bytes = vec![0u8; window as usize];
    stream.read_exact(&mut bytes)?;
    Ok(Tail { bytes, start, len })
}

fn read_trailing_index<R: Read + Seek>(stream: &mut R, tail: &Tail, config: &ReaderConfig) -> Result<IndexTable, String> {
    let len = tail.len;
    let offset = parse_index_list_offset(&tail.bytes)?;
    if offset >= len {
        return Err(format!(
            "indexListOffset {} is beyond the end of the file ({} bytes)",
            offset, len
        ));
    }

    stream.seek(SeekFrom::Start(offset)).map_err(|e| e.to_string())?;
    let input = BufReader::with_capacity(config.buffer_size, &mut *stream);
    let index = IndexTable::read_from(input, offset).map_err(|e| format!("unreadable <indexList>: {}", e))?;
    if let Some(max) = index.max_offset() {
        if max >= offset {
            return Err(format!("index entry offset {} lies past <indexList> at {}", max, offset));
        }
    }
    Ok(index)
}

/// Remembers the first start tag and stops.
#[derive(Default)]
struct FirstStartTag {
    found: Option<(String, String)>,
}

impl FirstStartTag {
    fn record(&mut self, name: &str, attributes: &Attributes) {
        if self.found.is_none() {
            let id = attributes.get("id").unwrap_or_default();
            self.found = Some((name.to_string(), id.to_string()));
        }
    }

    fn matches(&self, element: &str, id: &str) -> bool {
        matches!(&self.found, Some((n, i)) if n == element && i == id)
    }

    fn describe(&self) -> String {
        match &self.found {
            Some((name, id)) => format!("<{}> with id \"{}\"", name, id),
            None => "no start tag".to_string(),
        }
    }
}

impl Handler for FirstStartTag {
    fn start_element(&mut self, name: &str, attributes: &Attributes, _position: Position) -> HandlerResult {
        self.record(name, attributes);
        Ok(Status::Done)
    }

    fn collect_characters(&self) -> bool {
        false
    }
}

/// Captures the record at the current offset when it is the expected one.
struct FetchHandler {
    element: &'static str,
    id: String,
    mode: BinaryReadMode,
    first_tag: FirstStartTag,
    captured: Option<XmlElement>,
}

impl Handler for FetchHandler {
    fn start_element(&mut self, name: &str, attributes: &Attributes, _position: Position) -> HandlerResult {
        self.first_tag.record(name, attributes);
        if self.first_tag.matches(self.element, &self.id) {
            Ok(Status::delegate(record_capture(self.mode)))
        } else {
            Ok(Status::Done)
        }
    }

    fn delegate_finished(&mut self, _name: &str, delegate: Box<dyn Any>, _position: Position) -> HandlerResult {
        self.captured = Some(finished_tree(delegate)?);
        Ok(Status::Done)
    }

    fn collect_characters(&self) -> bool {
        false
    }
}
