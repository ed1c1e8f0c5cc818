use anyhow::{Context, Result};
use log::{info, warn};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

use mzcodec::indexed::{
    DocumentEvent, FailurePolicy, IndexedMzMLWriter, MzMLReader, ReaderConfig, WriteSummary, WriterConfig,
};
use mzcodec::model::{BinaryReadMode, Chromatogram, RecordKind, Spectrum};

use super::config::{Config, RecodeConfig};
use super::{styled, Profile};

/// Flags given on the command line; `None` defers to the config file.
#[derive(Debug, Default)]
pub struct RecodeOptions {
    pub profile: Option<Profile>,
    pub config: Option<PathBuf>,
    pub threads: Option<usize>,
    pub batch_size: Option<usize>,
    pub skip_failures: bool,
    pub no_index: bool,
}

/// Re-encode an mzML file through the streaming reader and the indexed writer
pub fn run(input: PathBuf, output: PathBuf, options: RecodeOptions) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {}", input.display());
    }

    let file_config = match &options.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let config = resolve_config(&options, &file_config.recode)?;

    info!("mzcodec recode");
    info!("Input:  {}", input.display());
    info!("Output: {}", output.display());
    info!("Threads: {}, batch size: {}", config.threads, config.batch_size);

    let started = Instant::now();
    let summary = recode(&input, &output, config)?;
    let elapsed = started.elapsed();

    println!("{} {}", styled("Recoded", true), summary);
    if let Some(checksum) = &summary.checksum {
        println!("  fileChecksum: {}", checksum);
    }
    if !summary.skipped.is_empty() {
        println!("{} {} records", styled("Skipped", false), summary.skipped.len());
        for skipped in &summary.skipped {
            warn!("skipped {} \"{}\": {}", skipped.kind, skipped.id, skipped.reason);
        }
    }
    info!("Finished in {:.2}s", elapsed.as_secs_f64());
    Ok(())
}

/// Profile, then config file, then command line flags.
fn resolve_config(options: &RecodeOptions, file: &RecodeConfig) -> Result<WriterConfig> {
    let profile = match (options.profile, &file.profile) {
        (Some(profile), _) => profile,
        (None, Some(name)) => name.parse().map_err(anyhow::Error::msg)?,
        (None, None) => Profile::default(),
    };
    let mut config = profile.writer_config();

    if let Some(encoding) = &file.encoding {
        config.encoding = encoding.clone();
    }
    if let Some(interval) = file.progress_interval {
        config.progress_interval = interval;
    }
    config.threads = options.threads.or(file.threads).unwrap_or(config.threads);
    config.batch_size = options.batch_size.or(file.batch_size).unwrap_or(config.batch_size);
    if options.skip_failures || file.skip_failures == Some(true) {
        config.failure_policy = FailurePolicy::SkipAndContinue;
    }
    config.write_index = !options.no_index && file.write_index.unwrap_or(true);
    config.write_checksum = file.write_checksum.unwrap_or(config.write_checksum);
    Ok(config)
}

/// Records are buffered up to `batch_size` so the writer can render them in
/// parallel.
struct Pipeline {
    writer: Option<IndexedMzMLWriter<BufWriter<File>>>,
    output: Option<BufWriter<File>>,
    config: WriterConfig,
    spectra: Vec<Spectrum>,
    chromatograms: Vec<Chromatogram>,
}

impl Pipeline {
    fn writer(&mut self) -> Result<&mut IndexedMzMLWriter<BufWriter<File>>> {
        self.writer
            .as_mut()
            .context("document has record lists before its metadata")
    }

    fn flush(&mut self) -> Result<()> {
        let spectra = std::mem::take(&mut self.spectra);
        let chromatograms = std::mem::take(&mut self.chromatograms);
        let writer = self.writer()?;
        writer.write_spectra(&spectra)?;
        writer.write_chromatograms(&chromatograms)?;
        Ok(())
    }

    fn handle(&mut self, event: DocumentEvent) -> Result<()> {
        match event {
            DocumentEvent::Metadata(metadata) => {
                let output = self.output.take().context("document metadata seen twice")?;
                self.writer = Some(IndexedMzMLWriter::new(output, &metadata, self.config.clone())?);
            }
            DocumentEvent::ListStart {
                kind,
                count,
                default_data_processing_ref,
            } => {
                self.flush()?;
                let writer = self.writer()?;
                if let Some(reference) = default_data_processing_ref {
                    writer.set_default_data_processing_ref(kind, reference);
                }
                let count = count.unwrap_or_default();
                match kind {
                    RecordKind::Spectrum => writer.begin_spectra(count)?,
                    RecordKind::Chromatogram => writer.begin_chromatograms(count)?,
                }
            }
            DocumentEvent::Spectrum(spectrum) => {
                self.spectra.push(spectrum);
                if self.spectra.len() >= self.config.batch_size.max(1) {
                    self.flush()?;
                }
            }
            DocumentEvent::Chromatogram(chromatogram) => {
                self.chromatograms.push(chromatogram);
                if self.chromatograms.len() >= self.config.batch_size.max(1) {
                    self.flush()?;
                }
            }
            DocumentEvent::Skipped(skipped) => {
                warn!("input {} \"{}\" left out: {}", skipped.kind, skipped.id, skipped.reason);
            }
        }
        Ok(())
    }
}

fn recode(input: &Path, output: &Path, config: WriterConfig) -> Result<WriteSummary> {
    let reader_config = ReaderConfig {
        failure_policy: config.failure_policy,
        ..ReaderConfig::default()
    };
    let mut reader = MzMLReader::from_path(input, reader_config)
        .with_context(|| format!("Failed to open {}", input.display()))?;
    let file = File::create(output).with_context(|| format!("Failed to create {}", output.display()))?;

    let mut pipeline = Pipeline {
        writer: None,
        output: Some(BufWriter::new(file)),
        config,
        spectra: Vec::new(),
        chromatograms: Vec::new(),
    };
    // arrays are re-encoded, so they have to be decoded
    reader
        .stream_document(BinaryReadMode::Eager, |event| pipeline.handle(event))
        .with_context(|| format!("Failed to recode {}", input.display()))?;

    pipeline.flush()?;
    let summary = pipeline.writer()?.finish()?;
    Ok(summary)
}
