use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};

use mzcodec::cv::CvParam;
use mzcodec::indexed::{IndexedMzMLReader, MzMLReader, ReaderConfig};
use mzcodec::input::is_gzip;
use mzcodec::model::{BinaryDataArray, Chromatogram, Record, Spectrum};

const PREVIEW_VALUES: usize = 5;

/// Which record to show
pub enum RecordKey {
    /// Position in its list
    Ordinal(usize),
    /// Native id
    Id(String),
}

/// Print one spectrum or chromatogram
pub fn run(file: PathBuf, chromatogram: bool, key: RecordKey, binary: bool, json: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {}", file.display());
    }
    if chromatogram {
        show::<Chromatogram>(&file, &key, binary, json)
    } else {
        show::<Spectrum>(&file, &key, binary, json)
    }
}

fn show<T: Record + Serialize + RecordView>(file: &Path, key: &RecordKey, binary: bool, json: bool) -> Result<()> {
    let record: T = fetch(file, key, binary)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print_summary(&record);
    }
    Ok(())
}

fn fetch<T: Record>(file: &Path, key: &RecordKey, binary: bool) -> Result<T> {
    let record = if is_gzip(file)? {
        // no seeking in compressed input
        let mut reader = MzMLReader::from_path(file, ReaderConfig::default())?;
        match key {
            RecordKey::Ordinal(ordinal) => reader.find_record(*ordinal, binary),
            RecordKey::Id(id) => reader.find_record_by_id(id, binary),
        }
    } else {
        let mut reader = IndexedMzMLReader::open(File::open(file).context("Failed to open file")?)?;
        match key {
            RecordKey::Ordinal(ordinal) => reader.fetch(*ordinal, binary),
            RecordKey::Id(id) => reader.fetch_by_id(id, binary),
        }
    };
    record.with_context(|| format!("Failed to read {} from {}", T::KIND, file.display()))
}

/// The parts of a record the text summary prints
trait RecordView {
    fn ordinal(&self) -> usize;
    fn native_id(&self) -> &str;
    fn array_length(&self) -> usize;
    fn params(&self) -> &[CvParam];
    fn binary_arrays(&self) -> &[BinaryDataArray];
    /// Annotations worth a line of their own
    fn details(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}

impl RecordView for Spectrum {
    fn ordinal(&self) -> usize {
        self.index
    }
    fn native_id(&self) -> &str {
        &self.id
    }
    fn array_length(&self) -> usize {
        self.peak_count()
    }
    fn params(&self) -> &[CvParam] {
        &self.cv_params
    }
    fn binary_arrays(&self) -> &[BinaryDataArray] {
        &self.arrays
    }
    fn details(&self) -> Vec<(&'static str, String)> {
        let mut details = Vec::new();
        if let Some(scan) = self.scan_number() {
            details.push(("scan number", scan.to_string()));
        }
        if let Some(level) = self.ms_level() {
            details.push(("ms level", level.to_string()));
        }
        let representation = if self.is_centroided() { "centroid" } else { "profile or unannotated" };
        details.push(("representation", representation.to_string()));
        if let Some(tic) = self.total_ion_current() {
            details.push(("total ion current", tic.to_string()));
        }
        details
    }
}

impl RecordView for Chromatogram {
    fn ordinal(&self) -> usize {
        self.index
    }
    fn native_id(&self) -> &str {
        &self.id
    }
    fn array_length(&self) -> usize {
        self.default_array_length
    }
    fn params(&self) -> &[CvParam] {
        &self.cv_params
    }
    fn binary_arrays(&self) -> &[BinaryDataArray] {
        &self.arrays
    }
}

fn print_summary<T: Record + RecordView>(record: &T) {
    println!("{} #{} \"{}\"", T::KIND, record.ordinal(), record.native_id());
    for (label, value) in record.details() {
        println!("  {}: {}", label, value);
    }
    println!("  default array length: {}", record.array_length());
    for param in record.params() {
        match &param.value {
            Some(value) if !value.is_empty() => println!("  {} {} = {}", param.accession, param.name, value),
            _ => println!("  {} {}", param.accession, param.name),
        }
    }
    for array in record.binary_arrays() {
        let name = array.cv_params.first().map(|p| p.name.as_str()).unwrap_or("array");
        match array.values() {
            Ok(values) => {
                let preview: Vec<String> = values.iter().take(PREVIEW_VALUES).map(|v| v.to_string()).collect();
                let more = if values.len() > PREVIEW_VALUES { ", ..." } else { "" };
                println!("  {}: {} values [{}{}]", name, values.len(), preview.join(", "), more);
            }
            Err(_) => println!("  {}: {} values (not read)", name, array.len()),
        }
    }
}
