//! Opening documents from disk
//!
//! gzip-compressed files (`.mzML.gz`) are recognised by their magic bytes and
//! decompressed on the fly; everything else is read through a plain buffer.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;

/// Default buffer size for file input (64 KiB)
pub const DEFAULT_INPUT_BUFFER_SIZE: usize = 64 * 1024;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Check whether a file starts with the gzip magic bytes.
pub fn is_gzip(path: impl AsRef<Path>) -> io::Result<bool> {
    let mut magic = [0u8; 2];
    let mut file = File::open(path)?;
    let mut filled = 0;
    while filled < magic.len() {
        match file.read(&mut magic[filled..])? {
            0 => return Ok(false),
            n => filled += n,
        }
    }
    Ok(magic == GZIP_MAGIC)
}

/// Open a document for sequential reading, gunzipping when needed.
pub fn open_input(path: impl AsRef<Path>) -> io::Result<Box<dyn BufRead + Send>> {
    open_input_with_capacity(path, DEFAULT_INPUT_BUFFER_SIZE)
}

/// [`open_input`] with an explicit buffer size
pub fn open_input_with_capacity(path: impl AsRef<Path>, capacity: usize) -> io::Result<Box<dyn BufRead + Send>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    if is_gzip(path)? {
        Ok(Box::new(BufReader::with_capacity(capacity, MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::with_capacity(capacity, file)))
    }
}
