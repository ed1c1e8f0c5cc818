//! Integration tests for indexed mzML
//!
//! These tests write whole documents, read them back through the public API
//! and check the output with an independent XML parser.

use std::fs::File;
use std::io::Write;

use flate2::write::GzEncoder;
use mzcodec::binary::relative_error;
use mzcodec::cv::{CvParam, MS_CV_ACCESSIONS as CV};
use mzcodec::indexed::{
    FailurePolicy, IndexedMzMLWriter, MzMLError, MzMLReader, ReaderConfig, WriterConfig,
};
use mzcodec::model::{BinaryReadMode, Chromatogram, DocumentMetadata, RecordKind, Spectrum};
use mzcodec::xml::XmlElement;
use proptest::prelude::*;
use quick_xml::events::Event;
use tempfile::tempdir;

fn scan_list(retention_time: f64) -> XmlElement {
    XmlElement::new("scanList").with_attribute("count", "1").with_child(
        XmlElement::new("scan").with_child(
            CvParam::new("MS:1000016", "scan start time")
                .with_value(retention_time)
                .with_unit("UO:0000010", "second")
                .to_element(),
        ),
    )
}

fn spectra(count: usize) -> Vec<Spectrum> {
    (0..count)
        .map(|i| {
            let mz: Vec<f64> = (0..40).map(|j| 100.0 + j as f64 * 12.5 + i as f64 * 0.001).collect();
            let intensity: Vec<f64> = (0..40).map(|j| 1000.0 + ((i * 31 + j * 7) % 97) as f64 * 55.5).collect();
            let mut spectrum = Spectrum::new(format!("controllerType=0 controllerNumber=1 scan={}", i + 1), mz, intensity)
                .with_cv_param(CvParam::new(CV::MS_LEVEL, "ms level").with_value(if i % 5 == 0 { 1 } else { 2 }))
                .with_cv_param(CvParam::new(CV::CENTROID_SPECTRUM, "centroid spectrum"));
            spectrum.children.push(scan_list(i as f64 * 0.5));
            spectrum
        })
        .collect()
}

fn write_document(records: &[Spectrum], config: WriterConfig) -> Vec<u8> {
    let mut writer = IndexedMzMLWriter::new(Vec::new(), &DocumentMetadata::new("integration"), config).unwrap();
    writer.begin_spectra(records.len()).unwrap();
    writer.write_spectra(records).unwrap();
    writer.begin_chromatograms(1).unwrap();
    let times: Vec<f64> = (0..records.len()).map(|i| i as f64 * 0.5).collect();
    let tic: Vec<f64> = records
        .iter()
        .map(|s| s.intensity_array().unwrap().values().unwrap().iter().sum())
        .collect();
    writer.write_chromatogram(&Chromatogram::tic(times, tic)).unwrap();
    writer.finish().unwrap();
    writer.into_inner()
}

/// Parse with quick-xml and return the element names in document order.
fn well_formed_elements(document: &[u8]) -> Vec<String> {
    let mut reader = quick_xml::Reader::from_reader(document);
    let mut names = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                names.push(String::from_utf8(e.name().as_ref().to_vec()).unwrap());
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => panic!("not well formed at byte {}: {}", reader.buffer_position(), e),
        }
        buf.clear();
    }
    names
}

#[test]
fn test_lossless_roundtrip_is_exact() {
    let records = spectra(25);
    let document = write_document(&records, WriterConfig::lossless());

    let read = MzMLReader::new(document.as_slice())
        .read_document(BinaryReadMode::Eager)
        .unwrap();
    assert_eq!(read.metadata, DocumentMetadata::new("integration"));
    assert_eq!(read.spectra.len(), records.len());
    for (i, (read, original)) in read.spectra.iter().zip(&records).enumerate() {
        assert_eq!(read.index, i);
        let read = Spectrum {
            index: 0,
            ..read.clone()
        };
        assert_eq!(&read, original);
    }
    assert_eq!(read.chromatograms[0].id, "TIC");
    assert!(read.skipped.is_empty());
}

#[test]
fn test_numpress_roundtrip_within_tolerance() {
    let records = spectra(10);
    let config = WriterConfig::numpress();
    let document = write_document(&records, config.clone());

    let read = MzMLReader::new(document.as_slice())
        .read_document(BinaryReadMode::Eager)
        .unwrap();
    for (read, original) in read.spectra.iter().zip(&records) {
        let pairs = [
            (read.mz_array(), original.mz_array(), config.encoding.mz.error_tolerance),
            (
                read.intensity_array(),
                original.intensity_array(),
                config.encoding.intensity.error_tolerance,
            ),
        ];
        for (read, original, tolerance) in pairs {
            let tolerance = tolerance.unwrap();
            let read = read.unwrap().values().unwrap();
            let original = original.unwrap().values().unwrap();
            assert_eq!(read.len(), original.len());
            for (r, o) in read.iter().zip(&original) {
                assert!(relative_error(*o, *r) <= tolerance, "{} vs {}", r, o);
            }
        }
    }
}

#[test]
fn test_compact_stores_float32_intensities() {
    let records = spectra(3);
    let document = write_document(&records, WriterConfig::compact());
    let text = String::from_utf8(document.clone()).unwrap();
    assert!(text.contains(CV::FLOAT_32_BIT));

    let read = MzMLReader::new(document.as_slice())
        .read_document(BinaryReadMode::Eager)
        .unwrap();
    let intensities = read.spectra[1].intensity_array().unwrap().values().unwrap();
    let expected = records[1].intensity_array().unwrap().values().unwrap();
    for (r, e) in intensities.iter().zip(&expected) {
        assert_eq!(*r, *e as f32 as f64);
    }
    // m/z stays 64-bit and exact
    assert_eq!(read.spectra[1].mz_array(), records[1].mz_array());
}

#[test]
fn test_every_index_entry_points_at_its_record() {
    let records = spectra(12);
    let document = write_document(&records, WriterConfig::default());
    let read = MzMLReader::new(document.as_slice())
        .read_document(BinaryReadMode::Skip)
        .unwrap();

    for kind in [RecordKind::Spectrum, RecordKind::Chromatogram] {
        for entry in read.index.entries(kind) {
            let tail = &document[entry.offset as usize..];
            let head = format!("<{} index=\"{}\" id=\"", kind.element(), entry.ordinal);
            assert!(tail.starts_with(head.as_bytes()), "entry {:?}", entry);
        }
    }
}

#[test]
fn test_output_is_well_formed() {
    let records = spectra(6);
    for write_index in [true, false] {
        let config = WriterConfig {
            write_index,
            ..WriterConfig::numpress()
        };
        let names = well_formed_elements(&write_document(&records, config));
        assert_eq!(names[0], if write_index { "indexedmzML" } else { "mzML" });
        assert_eq!(names.iter().filter(|n| *n == "spectrum").count(), 6);
        assert_eq!(names.iter().any(|n| n == "indexListOffset"), write_index);
    }
}

#[test]
fn test_escaped_ids_survive() {
    let mut spectrum = Spectrum::new("sample <A> & \"B\"", vec![1.0], vec![2.0]);
    spectrum.data_processing_ref = Some("my processing".to_string());
    let document = write_document(std::slice::from_ref(&spectrum), WriterConfig::default());
    well_formed_elements(&document);

    let read = MzMLReader::new(document.as_slice())
        .read_document(BinaryReadMode::Eager)
        .unwrap();
    assert_eq!(read.spectra[0].id, spectrum.id);
    assert_eq!(read.spectra[0].data_processing_ref.as_deref(), Some("my processing"));
    assert!(read.index.find_id(RecordKind::Spectrum, "sample <A> & \"B\"").is_some());
}

#[test]
fn test_parallel_output_matches_sequential() {
    let records = spectra(57);
    let sequential = write_document(&records, WriterConfig::numpress());
    let parallel = write_document(
        &records,
        WriterConfig {
            batch_size: 8,
            ..WriterConfig::numpress().with_threads(4)
        },
    );
    assert_eq!(sequential, parallel);
}

fn corrupt_binary_of(document: &[u8], id: &str) -> Vec<u8> {
    let text = String::from_utf8(document.to_vec()).unwrap();
    let record = text.find(&format!("id=\"{}\"", id)).unwrap();
    let start = record + text[record..].find("<binary>").unwrap() + "<binary>".len();
    let end = start + text[start..].find("</binary>").unwrap();
    let mut corrupted = text[..start].to_string();
    corrupted.push_str("!!not base64!!");
    corrupted.push_str(&text[end..]);
    corrupted.into_bytes()
}

#[test]
fn test_read_failure_policies() {
    let records = spectra(4);
    let document = corrupt_binary_of(
        &write_document(&records, WriterConfig::default()),
        "controllerType=0 controllerNumber=1 scan=3",
    );

    let err = MzMLReader::new(document.as_slice())
        .read_document(BinaryReadMode::Eager)
        .unwrap_err();
    match err {
        MzMLError::RecordFailure { kind, ordinal, .. } => {
            assert_eq!(kind, RecordKind::Spectrum);
            assert_eq!(ordinal, 2);
        }
        other => panic!("unexpected error {}", other),
    }

    let config = ReaderConfig {
        failure_policy: FailurePolicy::SkipAndContinue,
        ..ReaderConfig::default()
    };
    let read = MzMLReader::with_config(document.as_slice(), config)
        .read_document(BinaryReadMode::Eager)
        .unwrap();
    assert_eq!(read.spectra.len(), 3);
    assert_eq!(read.skipped.len(), 1);
    assert_eq!(read.skipped[0].id, "controllerType=0 controllerNumber=1 scan=3");
    // the broken record keeps its place in the index
    assert_eq!(read.index.len(RecordKind::Spectrum), 4);

    // without decoding the damage goes unnoticed
    let skipped = MzMLReader::new(document.as_slice())
        .read_document(BinaryReadMode::Skip)
        .unwrap();
    assert_eq!(skipped.spectra.len(), 4);
}

#[test]
fn test_gzip_input() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("run.mzML.gz");
    let document = write_document(&spectra(5), WriterConfig::default());

    let mut encoder = GzEncoder::new(File::create(&path).unwrap(), flate2::Compression::default());
    encoder.write_all(&document).unwrap();
    encoder.finish().unwrap();

    let read = MzMLReader::from_path(&path, ReaderConfig::default())
        .unwrap()
        .read_document(BinaryReadMode::Eager)
        .unwrap();
    assert_eq!(read.spectra.len(), 5);
    assert_eq!(read.chromatograms.len(), 1);
}

#[test]
fn test_write_to_file_and_read_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("run.mzML");
    let records = spectra(8);

    let mut writer = IndexedMzMLWriter::new(
        std::io::BufWriter::new(File::create(&path).unwrap()),
        &DocumentMetadata::new("file"),
        WriterConfig::default(),
    )
    .unwrap();
    writer.begin_spectra(records.len()).unwrap();
    writer.write_spectra(&records).unwrap();
    let summary = writer.finish().unwrap();
    drop(writer);

    assert_eq!(summary.spectra_written, 8);
    assert_eq!(summary.bytes_written, std::fs::metadata(&path).unwrap().len());

    let read = MzMLReader::from_path(&path, ReaderConfig::default())
        .unwrap()
        .read_document(BinaryReadMode::Lazy)
        .unwrap();
    assert_eq!(read.spectra[7].mz_array().unwrap().values().unwrap(), records[7].mz_array().unwrap().values().unwrap());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_lossless_values_roundtrip(
        mz in prop::collection::vec(0.0f64..5000.0, 0..64),
        id in "[a-zA-Z0-9=_<>&\"']{1,24}",
    ) {
        let intensity: Vec<f64> = mz.iter().map(|v| v * 3.5).collect();
        let spectrum = Spectrum::new(id, mz, intensity);
        let document = write_document(std::slice::from_ref(&spectrum), WriterConfig::lossless());
        let read = MzMLReader::new(document.as_slice())
            .read_document(BinaryReadMode::Eager)
            .unwrap();
        prop_assert_eq!(&read.spectra[0], &spectrum);
    }
}
