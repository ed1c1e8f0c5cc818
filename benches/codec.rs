use std::io::Cursor;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use mzcodec::binary::{BinaryArraySpec, BinaryCodec, Compression, Precision};
use mzcodec::indexed::{IndexedMzMLReader, IndexedMzMLWriter, MzMLReader, WriterConfig};
use mzcodec::model::{BinaryReadMode, DocumentMetadata, Spectrum};

fn generate_spectra(num_spectra: usize, peaks_per_spectrum: usize) -> Vec<Spectrum> {
    (0..num_spectra)
        .map(|i| {
            let mz = (0..peaks_per_spectrum)
                .map(|j| 100.0 + (j as f64) * 10.0 + (i as f64) * 0.1)
                .collect();
            let intensity = (0..peaks_per_spectrum)
                .map(|j| 1000.0 + (j as f64) * 50.0)
                .collect();
            Spectrum::new(format!("scan={}", i + 1), mz, intensity)
        })
        .collect()
}

fn generate_document(spectra: &[Spectrum], config: WriterConfig) -> Vec<u8> {
    let mut writer = IndexedMzMLWriter::new(Vec::new(), &DocumentMetadata::new("bench_run"), config).unwrap();
    writer.begin_spectra(spectra.len()).unwrap();
    writer.write_spectra(spectra).unwrap();
    writer.finish().unwrap();
    writer.into_inner()
}

fn bench_array_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("binary_encode");
    let values: Vec<f64> = (0..10_000).map(|i| 100.0 + i as f64 * 0.013).collect();
    group.throughput(Throughput::Elements(values.len() as u64));

    for compression in [
        Compression::None,
        Compression::Zlib,
        Compression::NumpressLinear,
        Compression::NumpressLinearZlib,
    ] {
        let spec = BinaryArraySpec::new(Precision::Float64, compression);
        group.bench_with_input(BenchmarkId::from_parameter(format!("{:?}", compression)), &spec, |b, spec| {
            b.iter(|| black_box(BinaryCodec::encode(&values, spec).unwrap()));
        });
    }
    group.finish();
}

fn bench_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("indexed_write");
    let spectra = generate_spectra(500, 200);
    group.throughput(Throughput::Elements(spectra.len() as u64));

    for threads in [1, 4] {
        let config = WriterConfig::numpress().with_threads(threads);
        group.bench_with_input(BenchmarkId::new("numpress_threads", threads), &config, |b, config| {
            b.iter(|| black_box(generate_document(&spectra, config.clone()).len()));
        });
    }
    group.finish();
}

fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential_read");

    for num_spectra in [100, 1000] {
        let document = Arc::new(generate_document(&generate_spectra(num_spectra, 50), WriterConfig::default()));
        group.throughput(Throughput::Elements(num_spectra as u64));

        for mode in [BinaryReadMode::Eager, BinaryReadMode::Skip] {
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", mode), num_spectra),
                &document,
                |b, document| {
                    b.iter(|| {
                        let read = MzMLReader::new(document.as_slice()).read_document(mode).unwrap();
                        black_box(read.spectra.len())
                    });
                },
            );
        }
    }
    group.finish();
}

fn bench_random_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("random_access_fetch");
    let document = generate_document(&generate_spectra(2000, 50), WriterConfig::default());

    group.bench_function("open", |b| {
        b.iter_batched(
            || Cursor::new(document.clone()),
            |cursor| black_box(IndexedMzMLReader::open(cursor).unwrap().count(mzcodec::model::RecordKind::Spectrum)),
            BatchSize::LargeInput,
        );
    });

    let mut reader = IndexedMzMLReader::open(Cursor::new(document.clone())).unwrap();
    group.bench_function("fetch_spectrum", |b| {
        let mut ordinal = 0;
        b.iter(|| {
            ordinal = (ordinal + 997) % 2000;
            black_box(reader.fetch_spectrum(ordinal, true).unwrap())
        });
    });
    group.finish();
}

criterion_group!(benches, bench_array_codec, bench_write, bench_read, bench_random_access);
criterion_main!(benches);
