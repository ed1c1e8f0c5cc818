use anyhow::{Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};

use mzcodec::indexed::{IndexStatus, IndexTable, IndexedMzMLReader, MzMLReader, ReaderConfig};
use mzcodec::input::{is_gzip, open_input};
use mzcodec::model::RecordKind;
use mzcodec::xml::root_element_name_from_path;

use super::styled;

/// Display information about an mzML file
pub fn run(file: PathBuf) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {}", file.display());
    }

    let root = root_element_name_from_path(&file).context("Failed to find the root element")?;
    let metadata = MzMLReader::from_path(&file, ReaderConfig::default())
        .and_then(|mut reader| reader.read_metadata())
        .context("Failed to read document metadata")?;

    let (status, index, checksum) = if is_gzip(&file)? {
        let status = IndexStatus::Unavailable("gzip-compressed input cannot be seeked".to_string());
        (status, scan(&file)?, None)
    } else {
        let reader = IndexedMzMLReader::open(File::open(&file).context("Failed to open file")?)?;
        let status = reader.index_status().clone();
        let checksum = reader.stored_checksum().map(str::to_string);
        let index = if status.is_usable() {
            reader.index().clone()
        } else {
            scan(&file)?
        };
        (status, index, checksum)
    };

    println!("mzML File Information");
    println!("=====================");
    println!("File: {}", file.display());
    println!("Root element: {}", root);
    println!("mzML version: {}", metadata.version().unwrap_or("<unknown>"));
    println!("Run: {}", metadata.run_id().unwrap_or("<unnamed>"));
    let software = metadata.software_ids();
    if !software.is_empty() {
        println!("Software: {}", software.join(", "));
    }
    println!();

    match &status {
        IndexStatus::Available => println!("Index: {}", styled("available", true)),
        IndexStatus::Rebuilt => println!("Index: {}", styled("rebuilt", true)),
        IndexStatus::Unavailable(reason) => {
            println!("Index: {} ({})", styled("unavailable", false), reason);
            println!("  counts below come from a full scan");
        }
    }
    println!("  Spectra: {}", index.len(RecordKind::Spectrum));
    println!("  Chromatograms: {}", index.len(RecordKind::Chromatogram));
    if let Some(checksum) = checksum {
        println!("File checksum (SHA-1): {}", checksum);
    }

    Ok(())
}

fn scan(file: &Path) -> Result<IndexTable> {
    let input = open_input(file).context("Failed to open file")?;
    IndexTable::scan(input).context("Failed to scan the document")
}
