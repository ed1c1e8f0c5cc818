//! Indexed mzML output
//!
//! Records are rendered to element trees (optionally on a worker pool),
//! serialized into per-record buffers and appended in input order. The offset
//! of each record is the byte count of the output right before its `<`, so
//! the index never has to be recomputed from the finished file. Every byte
//! is also fed to a SHA-1 hasher for the closing `<fileChecksum>`.

use std::fmt;
use std::io::{self, Write};
use std::ops::ControlFlow;

use log::{debug, info, warn};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;

use super::checksum::{ChecksumWriter, CHECKSUM_OPEN};
use super::config::{FailurePolicy, WriterConfig};
use super::error::MzMLError;
use super::index::IndexTable;
use super::{Progress, SessionState, SkippedRecord};
use crate::model::{
    Chromatogram, DocumentMetadata, Record, RecordError, RecordKind, Spectrum, MZML_NAMESPACE, XSI_NAMESPACE,
};
use crate::xml::writer::NO_ATTRIBUTES;
use crate::xml::{Attributes, XmlElement, XmlWriter};

const INDEXED_SCHEMA_LOCATION: &str =
    "http://psi.hupo.org/ms/mzml http://psidev.info/files/ms/mzML/xsd/mzML1.1.2_idx.xsd";

type ProgressCallback = Box<dyn FnMut(&Progress) -> ControlFlow<()> + Send>;

/// Outcome of a finished write session
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WriteSummary {
    /// Spectra written
    pub spectra_written: usize,
    /// Chromatograms written
    pub chromatograms_written: usize,
    /// Records left out under [`FailurePolicy::SkipAndContinue`]
    pub skipped: Vec<SkippedRecord>,
    /// Total size of the document
    pub bytes_written: u64,
    /// Offset of `<indexList>`, when an index was written
    pub index_offset: Option<u64>,
    /// SHA-1 written to `<fileChecksum>`
    pub checksum: Option<String>,
}

impl fmt::Display for WriteSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} spectra, {} chromatograms, {} skipped, {} bytes",
            self.spectra_written,
            self.chromatograms_written,
            self.skipped.len(),
            self.bytes_written
        )
    }
}

struct OpenList {
    kind: RecordKind,
    declared: usize,
    /// Records handed in so far, including skipped ones
    seen: usize,
}

/// Streaming writer for (indexed) mzML.
///
/// Call order: [`new`](Self::new), optionally [`begin_spectra`](Self::begin_spectra)
/// and spectrum writes, optionally [`begin_chromatograms`](Self::begin_chromatograms)
/// and chromatogram writes, then [`finish`](Self::finish). Anything else is
/// rejected with [`MzMLError::InvalidState`]. Any other error closes the
/// session.
pub struct IndexedMzMLWriter<W: Write> {
    writer: XmlWriter<ChecksumWriter<W>>,
    config: WriterConfig,
    pool: Option<ThreadPool>,
    index: IndexTable,
    state: SessionState,
    list: Option<OpenList>,
    lists_begun: Vec<RecordKind>,
    spectrum_data_processing_ref: Option<String>,
    chromatogram_data_processing_ref: Option<String>,
    skipped: Vec<SkippedRecord>,
    progress: Option<ProgressCallback>,
}

fn pairs(attributes: &Attributes) -> impl Iterator<Item = (&str, &str)> {
    attributes.iter().map(|a| (a.name.as_str(), a.value.as_str()))
}

fn render_fragment(element: &XmlElement, depth: usize) -> io::Result<Vec<u8>> {
    let mut writer = XmlWriter::fragment(Vec::new(), depth);
    element.write_to(&mut writer)?;
    Ok(writer.into_inner())
}

impl<W: Write> IndexedMzMLWriter<W> {
    /// Start a document: declaration, root elements, metadata and `<run>`.
    pub fn new(inner: W, metadata: &DocumentMetadata, config: WriterConfig) -> Result<Self, MzMLError> {
        let pool = if config.threads > 1 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(config.threads)
                .thread_name(|i| format!("mzcodec-encode-{}", i))
                .build()
                .map_err(io::Error::other)?;
            debug!("rendering records on {} threads", config.threads);
            Some(pool)
        } else {
            None
        };

        let mut writer = XmlWriter::new(ChecksumWriter::new(inner));
        writer.xml_declaration()?;
        if config.write_index {
            writer.start_element(
                "indexedmzML",
                [
                    ("xmlns", MZML_NAMESPACE),
                    ("xmlns:xsi", XSI_NAMESPACE),
                    ("xsi:schemaLocation", INDEXED_SCHEMA_LOCATION),
                ],
            )?;
        }
        let mzml_attributes = metadata.mzml_attributes_for_output();
        writer.start_element("mzML", pairs(&mzml_attributes))?;
        for element in &metadata.header {
            element.write_to(&mut writer)?;
        }
        writer.start_element("run", pairs(&metadata.run_attributes))?;
        for element in &metadata.run_header {
            element.write_to(&mut writer)?;
        }

        Ok(Self {
            writer,
            config,
            pool,
            index: IndexTable::new(),
            state: SessionState::Writing,
            list: None,
            lists_begun: Vec::new(),
            spectrum_data_processing_ref: metadata.spectrum_data_processing_ref.clone(),
            chromatogram_data_processing_ref: metadata.chromatogram_data_processing_ref.clone(),
            skipped: Vec::new(),
            progress: None,
        })
    }

    /// Consult `callback` every `progress_interval` records; returning
    /// [`ControlFlow::Break`] cancels the session.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&Progress) -> ControlFlow<()> + Send + 'static,
    {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Index entries recorded so far
    pub fn index(&self) -> &IndexTable {
        &self.index
    }

    /// Bytes written so far
    pub fn position(&self) -> u64 {
        self.writer.position()
    }

    /// Override the `defaultDataProcessingRef` of a list that has not been
    /// opened yet.
    pub fn set_default_data_processing_ref(&mut self, kind: RecordKind, reference: impl Into<String>) {
        let slot = match kind {
            RecordKind::Spectrum => &mut self.spectrum_data_processing_ref,
            RecordKind::Chromatogram => &mut self.chromatogram_data_processing_ref,
        };
        *slot = Some(reference.into());
    }

    /// Open `<spectrumList>` declaring `count` records.
    pub fn begin_spectra(&mut self, count: usize) -> Result<(), MzMLError> {
        let result = self.begin_list(RecordKind::Spectrum, count);
        self.guard(result)
    }

    /// Close any spectrum list and open `<chromatogramList>`.
    pub fn begin_chromatograms(&mut self, count: usize) -> Result<(), MzMLError> {
        let result = self.begin_list(RecordKind::Chromatogram, count);
        self.guard(result)
    }

    /// Write one spectrum
    pub fn write_spectrum(&mut self, spectrum: &Spectrum) -> Result<(), MzMLError> {
        self.write_records(std::slice::from_ref(spectrum))
    }

    /// Write spectra in batches of `batch_size`
    pub fn write_spectra(&mut self, spectra: &[Spectrum]) -> Result<(), MzMLError> {
        self.write_records(spectra)
    }

    /// Write one chromatogram
    pub fn write_chromatogram(&mut self, chromatogram: &Chromatogram) -> Result<(), MzMLError> {
        self.write_records(std::slice::from_ref(chromatogram))
    }

    /// Write chromatograms in batches of `batch_size`
    pub fn write_chromatograms(&mut self, chromatograms: &[Chromatogram]) -> Result<(), MzMLError> {
        self.write_records(chromatograms)
    }

    /// Write records of any kind into the currently open list of that kind.
    pub fn write_records<T: Record>(&mut self, records: &[T]) -> Result<(), MzMLError> {
        let batch_size = self.config.batch_size.max(1);
        for batch in records.chunks(batch_size) {
            let result = self.write_batch(batch);
            self.guard(result)?;
        }
        Ok(())
    }

    /// Close the lists and the run, append the index and flush.
    pub fn finish(&mut self) -> Result<WriteSummary, MzMLError> {
        let result = self.finish_document();
        self.guard(result)
    }

    /// Unwrap the output stream
    pub fn into_inner(self) -> W {
        self.writer.into_inner().into_inner()
    }

    /// Every failure except a rejected call closes the session.
    fn guard<T>(&mut self, result: Result<T, MzMLError>) -> Result<T, MzMLError> {
        if let Err(e) = &result {
            if !matches!(e, MzMLError::InvalidState { .. }) {
                self.state = SessionState::Closed;
            }
        }
        result
    }

    fn check_writing(&self, operation: &'static str) -> Result<(), MzMLError> {
        if self.state == SessionState::Writing {
            Ok(())
        } else {
            Err(MzMLError::InvalidState {
                state: self.state,
                operation,
            })
        }
    }

    fn begin_list(&mut self, kind: RecordKind, count: usize) -> Result<(), MzMLError> {
        let operation = match kind {
            RecordKind::Spectrum => "begin spectra",
            RecordKind::Chromatogram => "begin chromatograms",
        };
        self.check_writing(operation)?;
        // spectra must come first, and each list only once
        let out_of_order = self.lists_begun.contains(&kind)
            || (kind == RecordKind::Spectrum && !self.lists_begun.is_empty());
        if out_of_order {
            return Err(MzMLError::InvalidState {
                state: self.state,
                operation,
            });
        }
        self.close_list()?;

        let count_text = count.to_string();
        let mut attributes = vec![("count", count_text.as_str())];
        let data_processing = match kind {
            RecordKind::Spectrum => self.spectrum_data_processing_ref.as_deref(),
            RecordKind::Chromatogram => self.chromatogram_data_processing_ref.as_deref(),
        };
        if let Some(r) = data_processing {
            attributes.push(("defaultDataProcessingRef", r));
        }
        self.writer.start_element(kind.list_element(), attributes)?;

        self.list = Some(OpenList {
            kind,
            declared: count,
            seen: 0,
        });
        self.lists_begun.push(kind);
        Ok(())
    }

    fn close_list(&mut self) -> Result<(), MzMLError> {
        if let Some(list) = self.list.take() {
            let written = self.index.len(list.kind);
            if written != list.declared {
                warn!(
                    "<{}> declared count=\"{}\" but {} records were written",
                    list.kind.list_element(),
                    list.declared,
                    written
                );
            }
            self.writer.end_element()?;
        }
        Ok(())
    }

    fn write_batch<T: Record>(&mut self, batch: &[T]) -> Result<(), MzMLError> {
        let kind = T::KIND;
        let operation = match kind {
            RecordKind::Spectrum => "write spectra",
            RecordKind::Chromatogram => "write chromatograms",
        };
        self.check_writing(operation)?;
        let first_seen = match &self.list {
            Some(list) if list.kind == kind => list.seen,
            _ => {
                return Err(MzMLError::InvalidState {
                    state: self.state,
                    operation,
                })
            }
        };

        let encoding = &self.config.encoding;
        let rendered: Vec<Result<XmlElement, RecordError>> = match &self.pool {
            Some(pool) => pool.install(|| batch.par_iter().map(|r| r.to_element(0, encoding)).collect()),
            None => batch.iter().map(|r| r.to_element(0, encoding)).collect(),
        };

        // Ordinals are assigned only now, so that skipped records leave no gap.
        let first_ordinal = self.index.len(kind);
        let mut kept: Vec<(&str, XmlElement)> = Vec::with_capacity(batch.len());
        for (offset, (record, result)) in batch.iter().zip(rendered).enumerate() {
            let position = first_seen + offset;
            match result {
                Ok(mut element) => {
                    element
                        .attributes
                        .set("index", (first_ordinal + kept.len()).to_string());
                    kept.push((record.id(), element));
                }
                Err(source) => {
                    let error = MzMLError::from_record(kind, position, record.id(), source);
                    self.skip_or_fail(kind, position, record.id(), error)?;
                }
            }
        }
        if let Some(list) = self.list.as_mut() {
            list.seen += batch.len();
        }

        let depth = self.writer.depth();
        let fragments: Vec<io::Result<Vec<u8>>> = match &self.pool {
            Some(pool) => pool.install(|| kept.par_iter().map(|(_, e)| render_fragment(e, depth)).collect()),
            None => kept.iter().map(|(_, e)| render_fragment(e, depth)).collect(),
        };

        for ((id, element), fragment) in kept.iter().zip(fragments) {
            let fragment = fragment?;
            self.writer.write_indent()?;
            let offset = self.writer.position();
            self.writer.write_raw(&fragment)?;
            let spot_id = element.attribute("spotID").map(str::to_string);
            let ordinal = self.index.push(kind, *id, spot_id, offset);
            self.report_progress(kind, ordinal + 1)?;
        }
        Ok(())
    }

    fn skip_or_fail(&mut self, kind: RecordKind, position: usize, id: &str, error: MzMLError) -> Result<(), MzMLError> {
        if self.config.failure_policy == FailurePolicy::SkipAndContinue && error.is_skippable() {
            warn!("Skipping {} {} ({}): {}", kind, position, id, error);
            self.skipped.push(SkippedRecord {
                kind,
                position,
                id: id.to_string(),
                reason: error.to_string(),
            });
            Ok(())
        } else {
            Err(error)
        }
    }

    fn report_progress(&mut self, kind: RecordKind, current: usize) -> Result<(), MzMLError> {
        let interval = self.config.progress_interval.max(1);
        if current % interval != 0 {
            return Ok(());
        }
        let total = self.list.as_ref().map_or(0, |l| l.declared);
        if total > 0 {
            let pct = (current as f64 / total as f64) * 100.0;
            info!("Progress: {}/{} {} records ({:.1}%)", current, total, kind, pct);
        } else {
            info!("Progress: {} {} records", current, kind);
        }

        if let Some(callback) = self.progress.as_mut() {
            let progress = Progress { kind, current, total };
            if callback(&progress).is_break() {
                warn!("Write cancelled after {} {} records", current, kind);
                return Err(MzMLError::Cancelled { kind, written: current });
            }
        }
        Ok(())
    }

    fn finish_document(&mut self) -> Result<WriteSummary, MzMLError> {
        self.check_writing("finish")?;
        self.close_list()?;
        self.writer.end_element()?; // run
        self.writer.end_element()?; // mzML

        let mut checksum = None;
        let index_offset = if self.config.write_index {
            let offset = self.writer.begin_line()?;
            self.index.write_to(&mut self.writer)?;
            self.writer
                .text_element("indexListOffset", NO_ATTRIBUTES, &offset.to_string())?;
            if self.config.write_checksum {
                checksum = Some(self.write_checksum()?);
            }
            self.writer.end_element()?; // indexedmzML
            Some(offset)
        } else {
            None
        };
        self.writer.flush()?;
        self.state = SessionState::Closed;

        let summary = WriteSummary {
            spectra_written: self.index.len(RecordKind::Spectrum),
            chromatograms_written: self.index.len(RecordKind::Chromatogram),
            skipped: std::mem::take(&mut self.skipped),
            bytes_written: self.writer.position(),
            index_offset,
            checksum,
        };
        info!("Document finalized: {}", summary);
        Ok(summary)
    }

    /// The digest includes the `<fileChecksum>` start tag itself.
    fn write_checksum(&mut self) -> Result<String, MzMLError> {
        self.writer.write_indent()?;
        self.writer.write_raw(CHECKSUM_OPEN)?;
        let digest = self.writer.get_ref().hex_digest();
        self.writer.write_raw(digest.as_bytes())?;
        self.writer.write_raw(b"</fileChecksum>\n")?;
        debug!("fileChecksum {}", digest);
        Ok(digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::{BinaryArraySpec, Compression, Precision};
    use crate::model::{ArrayData, EncodingPolicy};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn spectra(n: usize) -> Vec<Spectrum> {
        (0..n)
            .map(|i| {
                let mz = (0..8).map(|j| 100.0 + i as f64 + j as f64 * 0.25).collect();
                let intensity = (0..8).map(|j| (i * j) as f64).collect();
                Spectrum::new(format!("scan={}", i + 1), mz, intensity)
            })
            .collect()
    }

    fn write(spectra: &[Spectrum], config: WriterConfig) -> (Vec<u8>, WriteSummary) {
        let mut writer = IndexedMzMLWriter::new(Vec::new(), &DocumentMetadata::new("run"), config).unwrap();
        writer.begin_spectra(spectra.len()).unwrap();
        writer.write_spectra(spectra).unwrap();
        let summary = writer.finish().unwrap();
        (writer.into_inner(), summary)
    }

    fn broken(id: &str) -> Spectrum {
        let mut spectrum = Spectrum::new(id, vec![1.0], vec![2.0]);
        spectrum.arrays[0].data = ArrayData::Omitted { length: 1 };
        spectrum
    }

    #[test]
    fn test_offsets_point_at_start_tags() {
        let records = spectra(3);
        let mut writer = IndexedMzMLWriter::new(Vec::new(), &DocumentMetadata::new("run"), WriterConfig::default()).unwrap();
        writer.begin_spectra(3).unwrap();
        writer.write_spectra(&records).unwrap();
        writer.begin_chromatograms(1).unwrap();
        writer
            .write_chromatogram(&Chromatogram::tic(vec![0.0, 1.0], vec![5.0, 6.0]))
            .unwrap();
        let summary = writer.finish().unwrap();
        let index = writer.index().clone();
        let out = writer.into_inner();

        for entry in index.entries(RecordKind::Spectrum) {
            let expected = format!("<spectrum index=\"{}\" id=\"{}\"", entry.ordinal, entry.id);
            assert!(out[entry.offset as usize..].starts_with(expected.as_bytes()));
        }
        let tic = index.get(RecordKind::Chromatogram, 0).unwrap();
        assert!(out[tic.offset as usize..].starts_with(b"<chromatogram index=\"0\" id=\"TIC\""));

        let index_offset = summary.index_offset.unwrap() as usize;
        assert!(out[index_offset..].starts_with(b"<indexList count=\"2\">"));
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(&format!("<indexListOffset>{}</indexListOffset>", index_offset)));
        assert!(text.ends_with(&format!("<fileChecksum>{}</fileChecksum>\n</indexedmzML>\n", summary.checksum.as_ref().unwrap())));
        assert_eq!(summary.spectra_written, 3);
        assert_eq!(summary.bytes_written as usize, text.len());
    }

    #[test]
    fn test_plain_mzml_without_index() {
        let config = WriterConfig {
            write_index: false,
            ..WriterConfig::default()
        };
        let (out, summary) = write(&spectra(1), config);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<mzML "));
        assert!(!text.contains("indexList"));
        assert!(text.ends_with("</mzML>\n"));
        assert_eq!(summary.index_offset, None);
        assert_eq!(summary.checksum, None);
    }

    #[test]
    fn test_checksum_covers_document_through_open_tag() {
        use sha1::{Digest, Sha1};

        let (out, summary) = write(&spectra(3), WriterConfig::default());
        let digest = summary.checksum.unwrap();
        assert_eq!(digest.len(), 40);

        let covered = out.windows(CHECKSUM_OPEN.len()).rposition(|w| w == CHECKSUM_OPEN).unwrap() + CHECKSUM_OPEN.len();
        let expected: String = Sha1::digest(&out[..covered]).iter().map(|b| format!("{:02x}", b)).collect();
        assert_eq!(digest, expected);
        assert!(out[covered..].starts_with(digest.as_bytes()));

        let unchecked = WriterConfig {
            write_checksum: false,
            ..WriterConfig::default()
        };
        let (out, summary) = write(&spectra(3), unchecked);
        assert_eq!(summary.checksum, None);
        assert!(!String::from_utf8(out).unwrap().contains("fileChecksum"));
    }

    #[test]
    fn test_call_order_is_enforced() {
        let mut writer = IndexedMzMLWriter::new(Vec::new(), &DocumentMetadata::new("run"), WriterConfig::default()).unwrap();
        let spectrum = &spectra(1)[0];
        assert!(matches!(
            writer.write_spectrum(spectrum),
            Err(MzMLError::InvalidState { .. })
        ));
        writer.begin_chromatograms(0).unwrap();
        assert!(matches!(writer.begin_spectra(1), Err(MzMLError::InvalidState { .. })));
        assert!(matches!(
            writer.write_spectrum(spectrum),
            Err(MzMLError::InvalidState { .. })
        ));
        // rejected calls leave the session usable
        assert_eq!(writer.state(), SessionState::Writing);
        writer.finish().unwrap();
        assert_eq!(writer.state(), SessionState::Closed);
        assert!(matches!(
            writer.finish(),
            Err(MzMLError::InvalidState {
                state: SessionState::Closed,
                ..
            })
        ));
    }

    #[test]
    fn test_fail_fast_closes_session() {
        let mut writer = IndexedMzMLWriter::new(Vec::new(), &DocumentMetadata::new("run"), WriterConfig::default()).unwrap();
        writer.begin_spectra(2).unwrap();
        let err = writer.write_spectrum(&broken("bad")).unwrap_err();
        assert!(matches!(err, MzMLError::RecordFailure { ordinal: 0, .. }), "{}", err);
        assert_eq!(writer.state(), SessionState::Closed);
        assert!(writer.index().is_empty());
    }

    #[test]
    fn test_skip_keeps_ordinals_dense() {
        let mut records = spectra(4);
        records.insert(1, broken("bad"));
        let config = WriterConfig::default().with_failure_policy(FailurePolicy::SkipAndContinue);
        let mut writer = IndexedMzMLWriter::new(Vec::new(), &DocumentMetadata::new("run"), config).unwrap();
        writer.begin_spectra(records.len()).unwrap();
        writer.write_spectra(&records).unwrap();
        let summary = writer.finish().unwrap();

        assert_eq!(summary.spectra_written, 4);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].id, "bad");
        assert_eq!(summary.skipped[0].position, 1);

        let index = writer.index().clone();
        let ordinals: Vec<_> = index.entries(RecordKind::Spectrum).iter().map(|e| e.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2, 3]);
        let out = writer.into_inner();
        let second = index.get(RecordKind::Spectrum, 1).unwrap();
        assert_eq!(second.id, "scan=2");
        assert!(out[second.offset as usize..].starts_with(b"<spectrum index=\"1\" id=\"scan=2\""));
    }

    #[test]
    fn test_encoding_violation_is_never_skipped() {
        let mut config = WriterConfig::default().with_failure_policy(FailurePolicy::SkipAndContinue);
        config.encoding = EncodingPolicy {
            mz: BinaryArraySpec::new(Precision::Float64, Compression::NumpressPic)
                .with_tolerance(1e-12)
                .with_fallback(vec![]),
            ..EncodingPolicy::lossless()
        };
        let mut writer = IndexedMzMLWriter::new(Vec::new(), &DocumentMetadata::new("run"), config).unwrap();
        writer.begin_spectra(1).unwrap();
        let err = writer
            .write_spectrum(&Spectrum::new("frac", vec![100.25], vec![1.0]))
            .unwrap_err();
        assert!(matches!(err, MzMLError::EncodingViolation { .. }), "{}", err);
    }

    #[test]
    fn test_parallel_output_matches_sequential() {
        let records = spectra(50);
        let (sequential, _) = write(&records, WriterConfig::numpress());
        let parallel_config = WriterConfig {
            threads: 4,
            batch_size: 7,
            ..WriterConfig::numpress()
        };
        let (parallel, summary) = write(&records, parallel_config);
        assert_eq!(summary.spectra_written, 50);
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_progress_callback_cancels() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let config = WriterConfig {
            progress_interval: 2,
            ..WriterConfig::default()
        };
        let mut writer = IndexedMzMLWriter::new(Vec::new(), &DocumentMetadata::new("run"), config)
            .unwrap()
            .with_progress(move |progress| {
                seen.fetch_add(1, Ordering::SeqCst);
                assert_eq!(progress.total, 10);
                if progress.current >= 4 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            });
        writer.begin_spectra(10).unwrap();
        let err = writer.write_spectra(&spectra(10)).unwrap_err();
        assert!(matches!(err, MzMLError::Cancelled { written: 4, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(writer.state(), SessionState::Closed);
    }
}
