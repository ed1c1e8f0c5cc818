//! Front-to-back reading of whole documents

use std::any::Any;
use std::io::BufRead;
use std::path::Path;

use log::{debug, warn};
use serde::Serialize;

use super::config::{FailurePolicy, ReaderConfig};
use super::error::MzMLError;
use super::index::IndexTable;
use super::{SessionState, SkippedRecord};
use crate::input::open_input_with_capacity;
use crate::model::{BinaryReadMode, Chromatogram, DocumentMetadata, Record, RecordKind, Spectrum};
use crate::xml::{Attributes, Completion, Handler, HandlerResult, Position, SaxReader, Status, TreeBuilder, XmlElement};

/// One step of a streamed document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DocumentEvent {
    /// Everything before the first record list; sent exactly once
    Metadata(DocumentMetadata),
    /// A record list opens
    ListStart {
        /// Which list
        kind: RecordKind,
        /// Declared `count`
        count: Option<usize>,
        /// `defaultDataProcessingRef` of the list
        default_data_processing_ref: Option<String>,
    },
    /// A converted spectrum
    Spectrum(Spectrum),
    /// A converted chromatogram
    Chromatogram(Chromatogram),
    /// A record left out under [`FailurePolicy::SkipAndContinue`]
    Skipped(SkippedRecord),
}

/// A fully read document
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MzMLDocument {
    /// Header and run metadata
    pub metadata: DocumentMetadata,
    /// Spectra in document order
    pub spectra: Vec<Spectrum>,
    /// Chromatograms in document order
    pub chromatograms: Vec<Chromatogram>,
    /// Offsets of every record start tag, skipped records included
    #[serde(skip)]
    pub index: IndexTable,
    /// Records that failed to convert
    pub skipped: Vec<SkippedRecord>,
}

/// Sequential reader over a buffered stream.
///
/// A reader makes exactly one pass; afterwards it is closed.
pub struct MzMLReader<R> {
    sax: SaxReader<R>,
    config: ReaderConfig,
    state: SessionState,
}

impl MzMLReader<Box<dyn BufRead + Send>> {
    /// Open a file, gunzipping it when needed
    pub fn from_path(path: impl AsRef<Path>, config: ReaderConfig) -> Result<Self, MzMLError> {
        let input = open_input_with_capacity(path, config.buffer_size)?;
        Ok(Self::with_config(input, config))
    }
}

impl<R: BufRead> MzMLReader<R> {
    /// Read from the start of `reader`
    pub fn new(reader: R) -> Self {
        Self::with_config(reader, ReaderConfig::default())
    }

    /// Read with an explicit configuration
    pub fn with_config(reader: R, config: ReaderConfig) -> Self {
        Self {
            sax: SaxReader::new(reader),
            config,
            state: SessionState::ReadingMetadata,
        }
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Read the whole document into memory.
    pub fn read_document(&mut self, mode: BinaryReadMode) -> Result<MzMLDocument, MzMLError> {
        let mut document = MzMLDocument::default();
        let index = self.stream_document(mode, |event| {
            match event {
                DocumentEvent::Metadata(metadata) => document.metadata = metadata,
                DocumentEvent::ListStart {
                    kind: RecordKind::Chromatogram,
                    default_data_processing_ref,
                    ..
                } => document.metadata.chromatogram_data_processing_ref = default_data_processing_ref,
                DocumentEvent::ListStart { .. } => {}
                DocumentEvent::Spectrum(spectrum) => document.spectra.push(spectrum),
                DocumentEvent::Chromatogram(chromatogram) => document.chromatograms.push(chromatogram),
                DocumentEvent::Skipped(skipped) => document.skipped.push(skipped),
            }
            Ok::<(), MzMLError>(())
        })?;
        document.index = index;
        Ok(document)
    }

    /// Walk the document, handing each event to `visitor` as soon as it is
    /// complete. Returns the index built from the record start tags.
    ///
    /// An error from `visitor` stops the pass and is returned unchanged.
    pub fn stream_document<F, E>(&mut self, mode: BinaryReadMode, mut visitor: F) -> Result<IndexTable, E>
    where
        F: FnMut(DocumentEvent) -> Result<(), E>,
        E: From<MzMLError>,
    {
        self.begin("read the document")?;
        let mut handler = DocumentHandler::new(mode, self.config.failure_policy, &mut visitor, false);
        let completion = self.sax.parse(&mut handler);
        self.state = SessionState::Closed;

        if let Some(failure) = handler.failure.take() {
            return Err(failure);
        }
        match completion.map_err(MzMLError::from)? {
            Completion::EndOfInput => Err(MzMLError::Xml(crate::xml::XmlError::NoRootElement).into()),
            _ => {
                debug!(
                    "read {} spectra and {} chromatograms",
                    handler.index.len(RecordKind::Spectrum),
                    handler.index.len(RecordKind::Chromatogram)
                );
                Ok(handler.index)
            }
        }
    }

    /// Read up to the first record list and return the metadata.
    pub fn read_metadata(&mut self) -> Result<DocumentMetadata, MzMLError> {
        self.begin("read metadata")?;
        let mut metadata = None;
        let mut visitor = |event: DocumentEvent| {
            if let DocumentEvent::Metadata(m) = event {
                metadata = Some(m);
            }
            Ok::<(), MzMLError>(())
        };
        let mut handler = DocumentHandler::new(BinaryReadMode::Skip, FailurePolicy::FailFast, &mut visitor, true);
        let completion = self.sax.parse(&mut handler);
        self.state = SessionState::Closed;
        if let Some(failure) = handler.failure.take() {
            return Err(failure);
        }
        completion?;
        drop(handler);
        metadata.ok_or_else(|| MzMLError::structure(self.sax.position(), "document has no <mzML> element"))
    }

    /// Scan forward to the `ordinal`-th record of type `T`.
    ///
    /// For streams that cannot seek; the reader is consumed up to the record.
    pub fn find_record<T: Record>(&mut self, ordinal: usize, include_binary: bool) -> Result<T, MzMLError> {
        self.find(RecordKey::Ordinal(ordinal), include_binary)
    }

    /// Scan forward to the first record of type `T` with native id `id`.
    pub fn find_record_by_id<T: Record>(&mut self, id: &str, include_binary: bool) -> Result<T, MzMLError> {
        self.find(RecordKey::Id(id.to_string()), include_binary)
    }

    fn find<T: Record>(&mut self, key: RecordKey, include_binary: bool) -> Result<T, MzMLError> {
        self.begin("scan for a record")?;
        let mut handler = FindHandler {
            element: T::KIND.element(),
            key,
            seen: 0,
            include_binary,
            found: None,
        };
        let completion = self.sax.parse(&mut handler);
        self.state = SessionState::Closed;
        completion?;

        let (ordinal, element) = handler.found.ok_or_else(|| MzMLError::RecordNotFound {
            kind: T::KIND,
            key: handler.key.to_string(),
        })?;
        let id = element.attribute("id").unwrap_or_default().to_string();
        T::from_element(element, read_mode(include_binary))
            .map_err(|source| MzMLError::from_record(T::KIND, ordinal, &id, source))
    }

    fn begin(&self, operation: &'static str) -> Result<(), MzMLError> {
        if self.state == SessionState::ReadingMetadata {
            Ok(())
        } else {
            Err(MzMLError::InvalidState {
                state: self.state,
                operation,
            })
        }
    }
}

pub(crate) fn read_mode(include_binary: bool) -> BinaryReadMode {
    if include_binary {
        BinaryReadMode::Eager
    } else {
        BinaryReadMode::Skip
    }
}

pub(crate) fn record_capture(mode: BinaryReadMode) -> TreeBuilder {
    match mode {
        BinaryReadMode::Skip => TreeBuilder::new().skip_text_in("binary"),
        BinaryReadMode::Eager | BinaryReadMode::Lazy => TreeBuilder::new(),
    }
}

pub(crate) fn finished_tree(delegate: Box<dyn Any>) -> Result<XmlElement, &'static str> {
    delegate
        .downcast::<TreeBuilder>()
        .ok()
        .and_then(|tree| tree.into_element())
        .ok_or("unexpected delegate")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Indexed,
    MzML,
    Run,
    List(RecordKind),
    /// Index trailer and anything else passed over
    Ignored,
}

struct DocumentHandler<'v, F, E> {
    mode: BinaryReadMode,
    policy: FailurePolicy,
    visitor: &'v mut F,
    stop_after_metadata: bool,
    scopes: Vec<Scope>,
    pending: Option<DocumentMetadata>,
    index: IndexTable,
    failure: Option<E>,
}

impl<'v, F, E> DocumentHandler<'v, F, E>
where
    F: FnMut(DocumentEvent) -> Result<(), E>,
    E: From<MzMLError>,
{
    fn new(mode: BinaryReadMode, policy: FailurePolicy, visitor: &'v mut F, stop_after_metadata: bool) -> Self {
        Self {
            mode,
            policy,
            visitor,
            stop_after_metadata,
            scopes: Vec::new(),
            pending: Some(DocumentMetadata::default()),
            index: IndexTable::new(),
            failure: None,
        }
    }

    fn fail(&mut self, error: MzMLError) -> HandlerResult {
        self.failure = Some(error.into());
        Ok(Status::Done)
    }

    fn emit(&mut self, event: DocumentEvent) -> HandlerResult {
        match (self.visitor)(event) {
            Ok(()) => Ok(Status::Continue),
            Err(e) => {
                self.failure = Some(e);
                Ok(Status::Done)
            }
        }
    }

    fn emit_metadata(&mut self) -> HandlerResult {
        match self.pending.take() {
            Some(metadata) => {
                let status = self.emit(DocumentEvent::Metadata(metadata))?;
                if self.stop_after_metadata {
                    Ok(Status::Done)
                } else {
                    Ok(status)
                }
            }
            None => Ok(Status::Continue),
        }
    }

    fn enter(&mut self, scope: Scope) -> HandlerResult {
        self.scopes.push(scope);
        Ok(Status::Continue)
    }

    fn start_list(&mut self, kind: RecordKind, attributes: &Attributes, position: Position) -> HandlerResult {
        let count = match attributes.get("count") {
            Some(text) => match text.trim().parse() {
                Ok(count) => Some(count),
                Err(_) => {
                    return self.fail(MzMLError::structure(
                        position,
                        format!("invalid count=\"{}\" on <{}>", text, kind.list_element()),
                    ))
                }
            },
            None => None,
        };
        let default_data_processing_ref = attributes.get("defaultDataProcessingRef").map(str::to_string);
        if kind == RecordKind::Spectrum {
            if let Some(metadata) = self.pending.as_mut() {
                metadata.spectrum_data_processing_ref = default_data_processing_ref.clone();
            }
        }
        if let Status::Done = self.emit_metadata()? {
            return Ok(Status::Done);
        }
        self.scopes.push(Scope::List(kind));
        self.emit(DocumentEvent::ListStart {
            kind,
            count,
            default_data_processing_ref,
        })
    }

    fn record_finished(&mut self, kind: RecordKind, element: XmlElement) -> HandlerResult {
        let position = self.index.len(kind).saturating_sub(1);
        let id = element.attribute("id").unwrap_or_default().to_string();
        let converted = match kind {
            RecordKind::Spectrum => Spectrum::from_element(element, self.mode).map(DocumentEvent::Spectrum),
            RecordKind::Chromatogram => {
                Chromatogram::from_element(element, self.mode).map(DocumentEvent::Chromatogram)
            }
        };
        match converted {
            Ok(event) => self.emit(event),
            Err(source) => {
                let error = MzMLError::from_record(kind, position, &id, source);
                if self.policy == FailurePolicy::SkipAndContinue && error.is_skippable() {
                    warn!("Skipping {} {} ({}): {}", kind, position, id, error);
                    self.emit(DocumentEvent::Skipped(SkippedRecord {
                        kind,
                        position,
                        id,
                        reason: error.to_string(),
                    }))
                } else {
                    self.fail(error)
                }
            }
        }
    }
}

impl<'v, F, E> Handler for DocumentHandler<'v, F, E>
where
    F: FnMut(DocumentEvent) -> Result<(), E>,
    E: From<MzMLError>,
{
    fn start_element(&mut self, name: &str, attributes: &Attributes, position: Position) -> HandlerResult {
        match self.scopes.last().copied() {
            None => match name {
                "indexedmzML" => self.enter(Scope::Indexed),
                "mzML" => {
                    if let Some(metadata) = self.pending.as_mut() {
                        metadata.mzml_attributes = attributes.clone();
                    }
                    self.enter(Scope::MzML)
                }
                other => self.fail(MzMLError::structure(
                    position,
                    format!("expected <mzML> or <indexedmzML>, found <{}>", other),
                )),
            },
            Some(Scope::Indexed) => match name {
                "mzML" => {
                    if let Some(metadata) = self.pending.as_mut() {
                        metadata.mzml_attributes = attributes.clone();
                    }
                    self.enter(Scope::MzML)
                }
                _ => self.enter(Scope::Ignored),
            },
            Some(Scope::MzML) => match name {
                "run" => {
                    if let Some(metadata) = self.pending.as_mut() {
                        metadata.run_attributes = attributes.clone();
                    }
                    self.enter(Scope::Run)
                }
                _ => Ok(Status::delegate(TreeBuilder::new())),
            },
            Some(Scope::Run) => match RecordKind::from_list_element(name) {
                Some(kind) => self.start_list(kind, attributes, position),
                None => Ok(Status::delegate(TreeBuilder::new())),
            },
            Some(Scope::List(kind)) => {
                if name == kind.element() {
                    let id = attributes.get("id").unwrap_or_default();
                    let spot_id = attributes.get("spotID").map(str::to_string);
                    self.index.push(kind, id, spot_id, position);
                    Ok(Status::delegate(record_capture(self.mode)))
                } else {
                    self.enter(Scope::Ignored)
                }
            }
            Some(Scope::Ignored) => self.enter(Scope::Ignored),
        }
    }

    fn end_element(&mut self, _name: &str, _position: Position) -> HandlerResult {
        match self.scopes.pop() {
            Some(Scope::Run) | Some(Scope::MzML) => self.emit_metadata(),
            _ => Ok(Status::Continue),
        }
    }

    fn delegate_finished(&mut self, name: &str, delegate: Box<dyn Any>, _position: Position) -> HandlerResult {
        let element = finished_tree(delegate)?;
        match self.scopes.last().copied() {
            Some(Scope::MzML) => {
                if let Some(metadata) = self.pending.as_mut() {
                    metadata.header.push(element);
                }
            }
            Some(Scope::Run) => {
                if let Some(metadata) = self.pending.as_mut() {
                    metadata.run_header.push(element);
                }
            }
            Some(Scope::List(kind)) if name == kind.element() => return self.record_finished(kind, element),
            _ => {}
        }
        Ok(Status::Continue)
    }

    fn collect_characters(&self) -> bool {
        false
    }
}

enum RecordKey {
    Ordinal(usize),
    Id(String),
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKey::Ordinal(n) => write!(f, "#{}", n),
            RecordKey::Id(id) => write!(f, "\"{}\"", id),
        }
    }
}

/// Counts record start tags until the wanted one, then captures it.
struct FindHandler {
    element: &'static str,
    key: RecordKey,
    seen: usize,
    include_binary: bool,
    found: Option<(usize, XmlElement)>,
}

impl Handler for FindHandler {
    fn start_element(&mut self, name: &str, attributes: &Attributes, _position: Position) -> HandlerResult {
        if name == "indexList" {
            return Ok(Status::Done);
        }
        if name != self.element {
            return Ok(Status::Continue);
        }
        let ordinal = self.seen;
        self.seen += 1;
        let wanted = match &self.key {
            RecordKey::Ordinal(n) => ordinal == *n,
            RecordKey::Id(id) => attributes.get("id") == Some(id.as_str()),
        };
        if wanted {
            Ok(Status::delegate(record_capture(read_mode(self.include_binary))))
        } else {
            Ok(Status::Continue)
        }
    }

    fn delegate_finished(&mut self, _name: &str, delegate: Box<dyn Any>, _position: Position) -> HandlerResult {
        let element = finished_tree(delegate)?;
        self.found = Some((self.seen - 1, element));
        Ok(Status::Done)
    }

    fn collect_characters(&self) -> bool {
        false
    }
}
