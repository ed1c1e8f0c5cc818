//! Binary data array encoding for mzML
//!
//! mzML stores numerical arrays (m/z, intensity, time) as Base64-encoded
//! binary data, optionally compressed. Encoding runs this pipeline:
//!
//! 1. Narrow to 32-bit when requested
//! 2. Compress (none, zlib, MS-Numpress, or MS-Numpress followed by zlib)
//! 3. For lossy compression with an error tolerance, decode the result again
//!    and fall back to a safer compression when any value strays too far
//! 4. Base64 encode
//!
//! Decoding reverses it. Values are always exchanged as `f64`.

pub mod numpress;

#[cfg(test)]
mod tests;

use std::fmt;
use std::io::{Read, Write};

use base64::prelude::*;
use byteorder::{ByteOrder, LittleEndian};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use log::debug;
use serde::{Deserialize, Serialize};

pub use numpress::NumpressError;

use crate::cv::MS_CV_ACCESSIONS as CV;

/// Binary encoding precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// 32-bit floating point (CV: MS:1000521)
    Float32,
    /// 64-bit floating point (CV: MS:1000523)
    #[default]
    Float64,
}

impl Precision {
    /// Determine precision from CV accession
    pub fn from_cv_accession(accession: &str) -> Option<Self> {
        match accession {
            CV::FLOAT_32_BIT => Some(Precision::Float32),
            CV::FLOAT_64_BIT => Some(Precision::Float64),
            _ => None,
        }
    }

    /// CV accession announcing this precision
    pub fn cv_accession(&self) -> &'static str {
        match self {
            Precision::Float32 => CV::FLOAT_32_BIT,
            Precision::Float64 => CV::FLOAT_64_BIT,
        }
    }

    /// CV term name announcing this precision
    pub fn cv_name(&self) -> &'static str {
        match self {
            Precision::Float32 => "32-bit float",
            Precision::Float64 => "64-bit float",
        }
    }

    /// Get the byte size per value
    pub fn byte_size(&self) -> usize {
        match self {
            Precision::Float32 => 4,
            Precision::Float64 => 8,
        }
    }
}

/// Compression types used in mzML binary data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Compression {
    /// No compression (raw binary)
    None,
    /// zlib compression (most common)
    #[default]
    Zlib,
    /// MS-Numpress linear prediction
    NumpressLinear,
    /// MS-Numpress positive integer compression
    NumpressPic,
    /// MS-Numpress short logged float compression
    NumpressSlof,
    /// MS-Numpress linear prediction followed by zlib
    NumpressLinearZlib,
    /// MS-Numpress positive integer compression followed by zlib
    NumpressPicZlib,
    /// MS-Numpress short logged float compression followed by zlib
    NumpressSlofZlib,
}

/// The three MS-Numpress schemes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumpressScheme {
    /// Linear prediction
    Linear,
    /// Positive integers
    Pic,
    /// Short logged floats
    Slof,
}

impl Compression {
    /// Every compression, in declaration order
    pub const ALL: [Compression; 8] = [
        Compression::None,
        Compression::Zlib,
        Compression::NumpressLinear,
        Compression::NumpressPic,
        Compression::NumpressSlof,
        Compression::NumpressLinearZlib,
        Compression::NumpressPicZlib,
        Compression::NumpressSlofZlib,
    ];

    /// Determine compression type from CV accession
    pub fn from_cv_accession(accession: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.cv_accession() == accession)
    }

    /// CV accession announcing this compression
    pub fn cv_accession(&self) -> &'static str {
        match self {
            Compression::None => CV::NO_COMPRESSION,
            Compression::Zlib => CV::ZLIB_COMPRESSION,
            Compression::NumpressLinear => CV::NUMPRESS_LINEAR,
            Compression::NumpressPic => CV::NUMPRESS_PIC,
            Compression::NumpressSlof => CV::NUMPRESS_SLOF,
            Compression::NumpressLinearZlib => CV::NUMPRESS_LINEAR_ZLIB,
            Compression::NumpressPicZlib => CV::NUMPRESS_PIC_ZLIB,
            Compression::NumpressSlofZlib => CV::NUMPRESS_SLOF_ZLIB,
        }
    }

    /// CV term name announcing this compression
    pub fn cv_name(&self) -> &'static str {
        match self {
            Compression::None => "no compression",
            Compression::Zlib => "zlib compression",
            Compression::NumpressLinear => "MS-Numpress linear prediction compression",
            Compression::NumpressPic => "MS-Numpress positive integer compression",
            Compression::NumpressSlof => "MS-Numpress short logged float compression",
            Compression::NumpressLinearZlib => {
                "MS-Numpress linear prediction compression followed by zlib compression"
            }
            Compression::NumpressPicZlib => {
                "MS-Numpress positive integer compression followed by zlib compression"
            }
            Compression::NumpressSlofZlib => {
                "MS-Numpress short logged float compression followed by zlib compression"
            }
        }
    }

    /// The Numpress scheme applied before any zlib stage
    pub fn numpress(&self) -> Option<NumpressScheme> {
        match self {
            Compression::NumpressLinear | Compression::NumpressLinearZlib => Some(NumpressScheme::Linear),
            Compression::NumpressPic | Compression::NumpressPicZlib => Some(NumpressScheme::Pic),
            Compression::NumpressSlof | Compression::NumpressSlofZlib => Some(NumpressScheme::Slof),
            Compression::None | Compression::Zlib => None,
        }
    }

    /// Whether a zlib stage is applied
    pub fn uses_zlib(&self) -> bool {
        matches!(
            self,
            Compression::Zlib
                | Compression::NumpressLinearZlib
                | Compression::NumpressPicZlib
                | Compression::NumpressSlofZlib
        )
    }

    /// Whether decoded values may differ from the input
    pub fn is_lossy(&self) -> bool {
        self.numpress().is_some()
    }

    /// Fallback ordering: lossy compressions first, then zlib, then none.
    fn safety_rank(&self) -> u8 {
        match self {
            Compression::None => 2,
            Compression::Zlib => 1,
            _ => 0,
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cv_name())
    }
}

fn default_fallback() -> Vec<Compression> {
    vec![Compression::Zlib, Compression::None]
}

/// How one kind of array should be encoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinaryArraySpec {
    /// Numeric precision of the stored values
    pub precision: Precision,
    /// Requested compression
    pub compression: Compression,
    /// Largest acceptable relative error for lossy compression.
    /// `None` accepts whatever the compression produces.
    pub error_tolerance: Option<f64>,
    /// Compressions to try, in order, when the requested one exceeds the
    /// tolerance. Only entries strictly safer than the one that failed are used.
    pub fallback: Vec<Compression>,
}

impl Default for BinaryArraySpec {
    fn default() -> Self {
        Self {
            precision: Precision::Float64,
            compression: Compression::Zlib,
            error_tolerance: None,
            fallback: default_fallback(),
        }
    }
}

impl BinaryArraySpec {
    /// Spec with the default fallback chain and no tolerance
    pub fn new(precision: Precision, compression: Compression) -> Self {
        Self {
            precision,
            compression,
            ..Default::default()
        }
    }

    /// Builder-style tolerance setter
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.error_tolerance = Some(tolerance);
        self
    }

    /// Builder-style fallback chain setter
    pub fn with_fallback(mut self, fallback: Vec<Compression>) -> Self {
        self.fallback = fallback;
        self
    }

    /// The compressions `encode` will try, in order
    pub fn candidates(&self) -> Vec<Compression> {
        let mut candidates = vec![self.compression];
        for &next in &self.fallback {
            let floor = candidates.last().map_or(0, |c: &Compression| c.safety_rank());
            if next.safety_rank() > floor {
                candidates.push(next);
            }
        }
        candidates
    }
}

/// A Base64 array ready for a `<binary>` element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedArray {
    /// Base64 text
    pub text: String,
    /// Precision of the stored values
    pub precision: Precision,
    /// Compression actually applied
    pub compression: Compression,
    /// Number of values
    pub length: usize,
}

impl EncodedArray {
    /// Value of the `encodedLength` attribute
    pub fn encoded_length(&self) -> usize {
        self.text.len()
    }

    /// Decode back to values.
    pub fn decode(&self) -> Result<Vec<f64>, BinaryError> {
        BinaryCodec::decode(&self.text, self.precision, self.compression, Some(self.length))
    }
}

/// Errors that can occur during binary encoding or decoding
#[derive(Debug, thiserror::Error)]
pub enum BinaryError {
    /// Text is not valid Base64
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// zlib stream could not be inflated
    #[error("Decompression error: {0}")]
    Decompression(#[source] std::io::Error),

    /// zlib stream could not be written
    #[error("Compression error: {0}")]
    Compression(#[source] std::io::Error),

    /// Value count differs from the declared array length
    #[error("Invalid data length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Declared number of values
        expected: usize,
        /// Decoded number of values
        actual: usize,
    },

    /// Byte count is not a multiple of the value width
    #[error("{bytes} bytes is not a whole number of {width}-byte values")]
    Misaligned {
        /// Decompressed byte count
        bytes: usize,
        /// Width of one value
        width: usize,
    },

    /// Malformed Numpress payload
    #[error("Numpress error: {0}")]
    Numpress(#[from] NumpressError),

    /// No candidate compression met the error tolerance
    #[error("no compression satisfies the error tolerance: {detail}")]
    EncodingViolation {
        /// Which candidates were tried and how far off they were
        detail: String,
    },
}

/// Relative error between an input value and its round-tripped counterpart.
///
/// Absolute when either side is zero; infinite when either is not finite and
/// the two differ.
pub fn relative_error(original: f64, decoded: f64) -> f64 {
    if original == decoded {
        return 0.0;
    }
    if !original.is_finite() || !decoded.is_finite() {
        return f64::INFINITY;
    }
    if original == 0.0 || decoded == 0.0 {
        return (original - decoded).abs();
    }
    (original - decoded).abs() / original.abs().max(decoded.abs())
}

/// Stateless encoder and decoder for mzML binary arrays
pub struct BinaryCodec;

impl BinaryCodec {
    /// Encode `values` following `spec`.
    ///
    /// Returns the compression actually used, which differs from the
    /// requested one when a fallback was needed.
    pub fn encode(values: &[f64], spec: &BinaryArraySpec) -> Result<EncodedArray, BinaryError> {
        let narrowed: Vec<f64>;
        let values = match spec.precision {
            Precision::Float32 => {
                narrowed = values.iter().map(|&v| v as f32 as f64).collect();
                &narrowed[..]
            }
            Precision::Float64 => values,
        };

        let mut rejected = Vec::new();
        for compression in spec.candidates() {
            let bytes = Self::compress(values, spec.precision, compression)?;

            if let (true, Some(tolerance)) = (compression.is_lossy(), spec.error_tolerance) {
                let decoded = Self::decompress(&bytes, spec.precision, compression)?;
                if let Some(worst) = Self::tolerance_violation(values, &decoded, tolerance) {
                    debug!(
                        "{} exceeds tolerance {} (worst relative error {:e}), trying next compression",
                        compression, tolerance, worst
                    );
                    rejected.push(format!("{}: {:e}", compression, worst));
                    continue;
                }
            }

            return Ok(EncodedArray {
                text: BASE64_STANDARD.encode(&bytes),
                precision: spec.precision,
                compression,
                length: values.len(),
            });
        }

        Err(BinaryError::EncodingViolation {
            detail: format!(
                "tolerance {:?} exceeded by {}",
                spec.error_tolerance,
                rejected.join(", ")
            ),
        })
    }

    /// Decode a Base64-encoded binary array from mzML
    ///
    /// # Arguments
    /// * `text` - The Base64-encoded string from the `<binary>` element
    /// * `precision` - The numerical precision (32 or 64 bit)
    /// * `compression` - The compression applied
    /// * `expected_length` - Expected number of values (from defaultArrayLength)
    pub fn decode(
        text: &str,
        precision: Precision,
        compression: Compression,
        expected_length: Option<usize>,
    ) -> Result<Vec<f64>, BinaryError> {
        let trimmed = text.trim();
        let decoded_bytes = if trimmed.bytes().any(|b| b.is_ascii_whitespace()) {
            let compact: Vec<u8> = trimmed.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
            BASE64_STANDARD.decode(compact)?
        } else {
            BASE64_STANDARD.decode(trimmed)?
        };

        let values = if decoded_bytes.is_empty() {
            Vec::new()
        } else {
            Self::decompress(&decoded_bytes, precision, compression)?
        };

        if let Some(expected) = expected_length {
            if values.len() != expected {
                return Err(BinaryError::InvalidLength {
                    expected,
                    actual: values.len(),
                });
            }
        }

        Ok(values)
    }

    fn compress(values: &[f64], precision: Precision, compression: Compression) -> Result<Vec<u8>, BinaryError> {
        let raw = match compression.numpress() {
            Some(NumpressScheme::Linear) => numpress::encode_linear(values, None),
            Some(NumpressScheme::Pic) => numpress::encode_pic(values),
            Some(NumpressScheme::Slof) => numpress::encode_slof(values, None),
            None => Self::floats_to_bytes(values, precision),
        };

        if !compression.uses_zlib() {
            return Ok(raw);
        }
        let mut encoder = ZlibEncoder::new(Vec::with_capacity(raw.len() / 2), flate2::Compression::default());
        encoder.write_all(&raw).map_err(BinaryError::Compression)?;
        encoder.finish().map_err(BinaryError::Compression)
    }

    fn decompress(bytes: &[u8], precision: Precision, compression: Compression) -> Result<Vec<f64>, BinaryError> {
        let inflated;
        let bytes = if compression.uses_zlib() {
            let mut decoder = ZlibDecoder::new(bytes);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out).map_err(BinaryError::Decompression)?;
            inflated = out;
            &inflated[..]
        } else {
            bytes
        };

        match compression.numpress() {
            Some(NumpressScheme::Linear) => Ok(numpress::decode_linear(bytes)?),
            Some(NumpressScheme::Pic) => Ok(numpress::decode_pic(bytes)?),
            Some(NumpressScheme::Slof) => Ok(numpress::decode_slof(bytes)?),
            None => Self::bytes_to_floats(bytes, precision),
        }
    }

    fn floats_to_bytes(values: &[f64], precision: Precision) -> Vec<u8> {
        let mut bytes = vec![0u8; values.len() * precision.byte_size()];
        match precision {
            Precision::Float32 => {
                for (chunk, &v) in bytes.chunks_exact_mut(4).zip(values) {
                    LittleEndian::write_f32(chunk, v as f32);
                }
            }
            Precision::Float64 => LittleEndian::write_f64_into(values, &mut bytes),
        }
        bytes
    }

    /// Convert raw bytes to f64 values based on precision
    fn bytes_to_floats(bytes: &[u8], precision: Precision) -> Result<Vec<f64>, BinaryError> {
        let width = precision.byte_size();
        if bytes.len() % width != 0 {
            return Err(BinaryError::Misaligned {
                bytes: bytes.len(),
                width,
            });
        }

        Ok(match precision {
            Precision::Float32 => bytes
                .chunks_exact(4)
                .map(|chunk| LittleEndian::read_f32(chunk) as f64)
                .collect(),
            Precision::Float64 => {
                let mut values = vec![0.0; bytes.len() / 8];
                LittleEndian::read_f64_into(bytes, &mut values);
                values
            }
        })
    }

    /// Worst relative error when it exceeds `tolerance`, or when the lengths differ.
    fn tolerance_violation(original: &[f64], decoded: &[f64], tolerance: f64) -> Option<f64> {
        if original.len() != decoded.len() {
            return Some(f64::INFINITY);
        }
        let worst = original
            .iter()
            .zip(decoded)
            .map(|(&a, &b)| relative_error(a, b))
            .fold(0.0f64, |acc, e| if e.is_nan() || e > acc { e } else { acc });
        (worst.is_nan() || worst > tolerance).then_some(worst)
    }
}
