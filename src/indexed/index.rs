//! Byte-offset index of the record lists

use std::any::Any;
use std::collections::HashMap;
use std::io::{self, BufRead, Write};

use log::debug;
use memchr::memmem;

use crate::model::RecordKind;
use crate::xml::{Attributes, Handler, HandlerResult, Position, SaxReader, Status, XmlError, XmlWriter};

/// Location of one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Native id (`idRef` in the index)
    pub id: String,
    /// Position in the record list, dense from 0
    pub ordinal: usize,
    /// Offset of the `<` of the record's start tag
    pub offset: u64,
    /// MALDI spot id, when present
    pub spot_id: Option<String>,
}

/// Whether the trailing index could be used
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexStatus {
    /// Read from `<indexList>`
    Available,
    /// Rebuilt by scanning the document
    Rebuilt,
    /// No usable index; fetches fall back to scanning
    Unavailable(String),
}

impl IndexStatus {
    /// True when offsets can be trusted for seeking
    pub fn is_usable(&self) -> bool {
        !matches!(self, IndexStatus::Unavailable(_))
    }
}

/// Offsets of every spectrum and chromatogram, with id lookup.
///
/// Built once per session and shared read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexTable {
    spectra: Vec<IndexEntry>,
    chromatograms: Vec<IndexEntry>,
    spectrum_ids: HashMap<String, usize>,
    chromatogram_ids: HashMap<String, usize>,
}

impl IndexTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry to `kind`'s list and return its ordinal.
    ///
    /// When an id repeats, id lookup keeps resolving to the first entry.
    pub fn push(&mut self, kind: RecordKind, id: impl Into<String>, spot_id: Option<String>, offset: u64) -> usize {
        let id = id.into();
        let (entries, ids) = self.parts_mut(kind);
        let ordinal = entries.len();
        ids.entry(id.clone()).or_insert(ordinal);
        entries.push(IndexEntry {
            id,
            ordinal,
            offset,
            spot_id,
        });
        ordinal
    }

    fn parts_mut(&mut self, kind: RecordKind) -> (&mut Vec<IndexEntry>, &mut HashMap<String, usize>) {
        match kind {
            RecordKind::Spectrum => (&mut self.spectra, &mut self.spectrum_ids),
            RecordKind::Chromatogram => (&mut self.chromatograms, &mut self.chromatogram_ids),
        }
    }

    /// Entries of one list in ordinal order
    pub fn entries(&self, kind: RecordKind) -> &[IndexEntry] {
        match kind {
            RecordKind::Spectrum => &self.spectra,
            RecordKind::Chromatogram => &self.chromatograms,
        }
    }

    /// Entry by ordinal
    pub fn get(&self, kind: RecordKind, ordinal: usize) -> Option<&IndexEntry> {
        self.entries(kind).get(ordinal)
    }

    /// Entry by native id
    pub fn find_id(&self, kind: RecordKind, id: &str) -> Option<&IndexEntry> {
        let ids = match kind {
            RecordKind::Spectrum => &self.spectrum_ids,
            RecordKind::Chromatogram => &self.chromatogram_ids,
        };
        ids.get(id).and_then(|&ordinal| self.get(kind, ordinal))
    }

    /// Spectra recorded with MALDI spot `spot_id`
    pub fn find_spot_id(&self, spot_id: &str) -> Vec<&IndexEntry> {
        self.spectra
            .iter()
            .filter(|e| e.spot_id.as_deref() == Some(spot_id))
            .collect()
    }

    /// Number of entries in one list
    pub fn len(&self, kind: RecordKind) -> usize {
        self.entries(kind).len()
    }

    /// True when neither list has entries
    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty() && self.chromatograms.is_empty()
    }

    /// Largest offset in either list
    pub fn max_offset(&self) -> Option<u64> {
        self.spectra.iter().chain(&self.chromatograms).map(|e| e.offset).max()
    }

    /// Write `<indexList>`, one `<index>` per non-empty list.
    pub fn write_to<W: Write>(&self, writer: &mut XmlWriter<W>) -> io::Result<()> {
        let lists: Vec<RecordKind> = [RecordKind::Spectrum, RecordKind::Chromatogram]
            .into_iter()
            .filter(|&kind| !self.entries(kind).is_empty())
            .collect();

        writer.start_element("indexList", [("count", lists.len().to_string().as_str())])?;
        for kind in lists {
            writer.start_element("index", [("name", kind.index_name())])?;
            for entry in self.entries(kind) {
                let mut attributes = vec![("idRef", entry.id.as_str())];
                if let Some(spot) = &entry.spot_id {
                    attributes.push(("spotID", spot.as_str()));
                }
                writer.text_element("offset", attributes, &entry.offset.to_string())?;
            }
            writer.end_element()?;
        }
        writer.end_element()
    }

    /// Parse an `<indexList>` element starting at `offset`.
    pub fn read_from<R: BufRead>(reader: R, offset: Position) -> Result<Self, XmlError> {
        let mut handler = IndexListHandler::default();
        SaxReader::with_offset(reader, offset).parse(&mut handler)?;
        if !handler.seen_list {
            return Err(XmlError::NoRootElement);
        }
        Ok(handler.table)
    }

    /// Build a table by scanning a document for record start tags.
    ///
    /// `reader` must be positioned at the start of the document.
    pub fn scan<R: BufRead>(reader: R) -> Result<Self, XmlError> {
        let mut handler = ScanHandler::default();
        SaxReader::new(reader).parse(&mut handler)?;
        debug!(
            "index scan found {} spectra and {} chromatograms",
            handler.table.spectra.len(),
            handler.table.chromatograms.len()
        );
        Ok(handler.table)
    }
}

/// Read the value of the last `<indexListOffset>` in the tail of a file.
pub(crate) fn parse_index_list_offset(tail: &[u8]) -> Result<u64, String> {
    let start = memmem::rfind(tail, b"<indexListOffset>").ok_or("<indexListOffset> not found")?;
    let mut handler = TextCapture::default();
    SaxReader::new(&tail[start..])
        .parse(&mut handler)
        .map_err(|e| format!("unreadable <indexListOffset>: {}", e))?;
    handler
        .text
        .trim()
        .parse()
        .map_err(|_| format!("invalid <indexListOffset> value \"{}\"", handler.text))
}

#[derive(Default)]
struct TextCapture {
    text: String,
}

impl Handler for TextCapture {
    fn characters(&mut self, text: &str, _position: Position) -> HandlerResult {
        self.text.push_str(text);
        Ok(Status::Continue)
    }

    fn auto_unescape_characters(&self) -> bool {
        false
    }
}

/// Receives one `<offset>` element.
struct OffsetHandler {
    id: String,
    spot_id: Option<String>,
    text: TextCapture,
}

impl Handler for OffsetHandler {
    fn characters(&mut self, text: &str, position: Position) -> HandlerResult {
        self.text.characters(text, position)
    }

    fn auto_unescape_characters(&self) -> bool {
        false
    }
}

#[derive(Default)]
struct IndexListHandler {
    table: IndexTable,
    current: Option<RecordKind>,
    seen_list: bool,
}

impl Handler for IndexListHandler {
    fn start_element(&mut self, name: &str, attributes: &Attributes, _position: Position) -> HandlerResult {
        match name {
            "indexList" => {
                self.seen_list = true;
                Ok(Status::Continue)
            }
            _ if !self.seen_list => Err(format!("expected <indexList> at the indexed offset, found <{}>", name).into()),
            "index" => {
                let list = attributes.get("name").unwrap_or_default();
                self.current = match list {
                    "spectrum" => Some(RecordKind::Spectrum),
                    "chromatogram" => Some(RecordKind::Chromatogram),
                    other => return Err(format!("unexpected index name \"{}\"", other).into()),
                };
                Ok(Status::Continue)
            }
            "offset" => {
                if self.current.is_none() {
                    return Err("<offset> outside <index>".into());
                }
                let id = attributes.get("idRef").ok_or("<offset> without idRef")?;
                Ok(Status::delegate(OffsetHandler {
                    id: id.to_string(),
                    spot_id: attributes.get("spotID").map(str::to_string),
                    text: TextCapture::default(),
                }))
            }
            other => Err(format!("unexpected element <{}> in index", other).into()),
        }
    }

    fn end_element(&mut self, name: &str, _position: Position) -> HandlerResult {
        if name == "index" {
            self.current = None;
        }
        Ok(Status::Continue)
    }

    fn delegate_finished(&mut self, _name: &str, delegate: Box<dyn Any>, _position: Position) -> HandlerResult {
        let offset = delegate
            .downcast::<OffsetHandler>()
            .map_err(|_| "unexpected delegate in index")?;
        let kind = self.current.ok_or("<offset> outside <index>")?;
        let value = offset
            .text
            .text
            .trim()
            .parse()
            .map_err(|_| format!("invalid offset \"{}\" for \"{}\"", offset.text.text, offset.id))?;
        self.table.push(kind, offset.id, offset.spot_id, value);
        Ok(Status::Continue)
    }

    fn auto_unescape_characters(&self) -> bool {
        false
    }
}

/// Records start tags of spectra and chromatograms; stops at `<indexList>`.
#[derive(Default)]
struct ScanHandler {
    table: IndexTable,
}

impl Handler for ScanHandler {
    fn start_element(&mut self, name: &str, attributes: &Attributes, position: Position) -> HandlerResult {
        if name == "indexList" {
            return Ok(Status::Done);
        }
        if let Some(kind) = RecordKind::from_element(name) {
            let id = attributes.get("id").unwrap_or_default();
            let spot_id = attributes.get("spotID").map(str::to_string);
            self.table.push(kind, id, spot_id, position);
        }
        Ok(Status::Continue)
    }

    fn collect_characters(&self) -> bool {
        false
    }
}
