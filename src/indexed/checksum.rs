//! SHA-1 `<fileChecksum>` of indexed mzML
//!
//! The digest covers every byte of the document up to and including the
//! `<fileChecksum>` start tag, and is written as 40 lowercase hex digits.

use std::io::{self, Read, Write};

use memchr::memmem;
use sha1::{Digest, Sha1};

pub(crate) const CHECKSUM_OPEN: &[u8] = b"<fileChecksum>";
const CHECKSUM_CLOSE: &[u8] = b"</fileChecksum>";

/// Writer that hashes everything passing through it.
pub(crate) struct ChecksumWriter<W> {
    inner: W,
    hasher: Sha1,
}

impl<W: Write> ChecksumWriter<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha1::new(),
        }
    }

    /// Digest of the bytes written so far; writing may continue.
    pub(crate) fn hex_digest(&self) -> String {
        to_hex(&self.hasher.clone().finalize())
    }

    pub(crate) fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for ChecksumWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// A checksum found in the tail of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StoredChecksum {
    /// Number of leading bytes the digest covers
    pub covered: u64,
    /// Digest as written, lowercased
    pub digest: String,
}

/// Find the last `<fileChecksum>` in `tail`, which starts at absolute offset
/// `tail_start`.
pub(crate) fn find_stored_checksum(tail: &[u8], tail_start: u64) -> Option<StoredChecksum> {
    let open = memmem::rfind(tail, CHECKSUM_OPEN)?;
    let value_start = open + CHECKSUM_OPEN.len();
    let value_len = memmem::find(&tail[value_start..], CHECKSUM_CLOSE)?;
    let digest = std::str::from_utf8(&tail[value_start..value_start + value_len])
        .ok()?
        .trim()
        .to_ascii_lowercase();
    Some(StoredChecksum {
        covered: tail_start + value_start as u64,
        digest,
    })
}

/// SHA-1 of the first `len` bytes of `reader`.
pub(crate) fn digest_prefix<R: Read>(reader: R, len: u64) -> io::Result<String> {
    let mut hasher = Sha1::new();
    let mut limited = reader.take(len);
    let mut buffer = vec![0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let n = limited.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
        total += n as u64;
    }
    if total != len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("checksum covers {} bytes but only {} could be read", len, total),
        ));
    }
    Ok(to_hex(&hasher.finalize()))
}
