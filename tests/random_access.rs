//! Random access through the trailing index on real files

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use std::thread;

use mzcodec::indexed::{IndexStatus, IndexedMzMLReader, IndexedMzMLWriter, MzMLError, WriterConfig};
use mzcodec::model::{Chromatogram, DocumentMetadata, RecordKind, Spectrum};
use tempfile::tempdir;

const SPECTRA: usize = 200;

fn write_file(path: &Path, config: WriterConfig) {
    let mut writer = IndexedMzMLWriter::new(
        BufWriter::new(File::create(path).unwrap()),
        &DocumentMetadata::new("random_access"),
        config,
    )
    .unwrap();
    let spectra: Vec<Spectrum> = (0..SPECTRA)
        .map(|i| {
            let peaks = 1 + i % 17;
            let mz = (0..peaks).map(|j| 150.0 + i as f64 + j as f64 * 0.25).collect();
            let intensity = (0..peaks).map(|j| (j * 100) as f64).collect();
            Spectrum::new(format!("scan={}", i + 1), mz, intensity)
        })
        .collect();
    writer.begin_spectra(SPECTRA).unwrap();
    writer.write_spectra(&spectra).unwrap();
    writer.begin_chromatograms(2).unwrap();
    writer
        .write_chromatogram(&Chromatogram::tic(vec![0.0, 1.0, 2.0], vec![5.0, 6.0, 7.0]))
        .unwrap();
    writer
        .write_chromatogram(&Chromatogram::new("SRM 500/300", vec![0.5], vec![42.0]))
        .unwrap();
    writer.finish().unwrap();
}

#[test]
fn test_fetch_any_record_from_a_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("indexed.mzML");
    write_file(&path, WriterConfig::default().with_threads(3));

    let mut reader = IndexedMzMLReader::open(File::open(&path).unwrap()).unwrap();
    assert_eq!(reader.index_status(), &IndexStatus::Available);
    assert_eq!(reader.count(RecordKind::Spectrum), Some(SPECTRA));
    assert_eq!(reader.count(RecordKind::Chromatogram), Some(2));
    assert_eq!(reader.verify().unwrap(), SPECTRA + 2);

    // out of order on purpose
    for ordinal in [199, 0, 57, 123, 1] {
        let spectrum = reader.fetch_spectrum(ordinal, true).unwrap();
        assert_eq!(spectrum.id, format!("scan={}", ordinal + 1));
        assert_eq!(spectrum.index, ordinal);
        assert_eq!(spectrum.peak_count(), 1 + ordinal % 17);
    }

    let srm = reader.fetch_chromatogram_by_id("SRM 500/300", true).unwrap();
    assert_eq!(srm.index, 1);
    assert_eq!(srm.intensity_array().unwrap().values().unwrap(), vec![42.0]);

    assert!(matches!(
        reader.fetch_chromatogram_by_id("BPC", true),
        Err(MzMLError::RecordNotFound { .. })
    ));
}

#[test]
fn test_shared_index_across_threads() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("shared.mzML");
    write_file(&path, WriterConfig::numpress());

    let reader = IndexedMzMLReader::open(File::open(&path).unwrap()).unwrap();
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let mut shared = reader.share(File::open(&path).unwrap());
            thread::spawn(move || {
                (0..SPECTRA)
                    .filter(|i| i % 8 == t)
                    .map(|i| shared.fetch_spectrum(i, true).map(|s| (i, s.id)))
                    .collect::<Result<Vec<_>, _>>()
            })
        })
        .collect();

    let mut seen = 0;
    for handle in handles {
        for (i, id) in handle.join().unwrap().unwrap() {
            assert_eq!(id, format!("scan={}", i + 1));
            seen += 1;
        }
    }
    assert_eq!(seen, SPECTRA);
}

#[test]
fn test_truncated_file_degrades_to_scanning() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("truncated.mzML");
    write_file(&path, WriterConfig::default());

    // cut the file inside <indexList>
    let bytes = fs::read(&path).unwrap();
    let text = String::from_utf8(bytes).unwrap();
    let cut = text.find("<indexList").unwrap() + 200;
    fs::write(&path, &text.as_bytes()[..cut]).unwrap();

    let mut reader = IndexedMzMLReader::open(File::open(&path).unwrap()).unwrap();
    assert!(matches!(reader.index_status(), IndexStatus::Unavailable(_)));
    assert_eq!(reader.fetch_spectrum(150, false).unwrap().id, "scan=151");
    assert_eq!(reader.fetch_spectrum_by_id("scan=3", true).unwrap().index, 2);

    let rebuilt = IndexedMzMLReader::open_with_scan(File::open(&path).unwrap()).unwrap();
    assert_eq!(rebuilt.index_status(), &IndexStatus::Rebuilt);
    assert_eq!(rebuilt.count(RecordKind::Spectrum), Some(SPECTRA));
}

#[test]
fn test_plain_mzml_has_no_index() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("plain.mzML");
    write_file(
        &path,
        WriterConfig {
            write_index: false,
            ..WriterConfig::default()
        },
    );

    let mut reader = IndexedMzMLReader::open_with_scan(File::open(&path).unwrap()).unwrap();
    assert_eq!(reader.index_status(), &IndexStatus::Rebuilt);
    assert_eq!(reader.verify().unwrap(), SPECTRA + 2);
    let tic = reader.fetch_chromatogram(0, true).unwrap();
    assert_eq!(tic.time_array().unwrap().values().unwrap(), vec![0.0, 1.0, 2.0]);
    assert_eq!(reader.metadata().unwrap().run_id(), Some("random_access"));
}
