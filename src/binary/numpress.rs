//! MS-Numpress lossy array compression
//!
//! Three schemes are supported, all byte-compatible with the reference
//! implementation used throughout the mzML ecosystem:
//!
//! - **linear**: fixed-point integers, second-order linear prediction, residuals
//!   packed as variable-length half-byte integers. Suited to m/z and time arrays.
//! - **pic**: values rounded to the nearest non-negative integer and packed as
//!   half-byte integers. Suited to ion counts.
//! - **slof**: `ln(x + 1)` stored as 16-bit fixed point. Suited to intensities.
//!
//! Linear and slof payloads begin with their fixed-point scaling factor as an
//! 8-byte big-endian IEEE double.
//!
//! Decoding never panics on malformed input; truncated or inconsistent payloads
//! are reported as [`NumpressError`].

/// Errors raised while decoding a Numpress payload
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NumpressError {
    /// Payload is shorter than its mandatory header
    #[error("payload of {actual} bytes is shorter than the {required} byte header")]
    TooShort {
        /// Bytes required
        required: usize,
        /// Bytes present
        actual: usize,
    },

    /// Payload ended in the middle of a value
    #[error("payload truncated inside a value at byte {offset}")]
    Truncated {
        /// Byte offset where more data was expected
        offset: usize,
    },

    /// Slof payloads hold whole 16-bit values
    #[error("slof payload has an odd number of value bytes ({0})")]
    OddLength(usize),
}

const FIXED_POINT_LEN: usize = 8;
const NIBBLE_MASK: i32 = 0xf000_0000_u32 as i32;

fn encode_fixed_point(fixed_point: f64, out: &mut Vec<u8>) {
    out.extend_from_slice(&fixed_point.to_be_bytes());
}

fn decode_fixed_point(data: &[u8]) -> Result<f64, NumpressError> {
    let bytes: [u8; FIXED_POINT_LEN] = data
        .get(..FIXED_POINT_LEN)
        .and_then(|b| b.try_into().ok())
        .ok_or(NumpressError::TooShort {
            required: FIXED_POINT_LEN,
            actual: data.len(),
        })?;
    Ok(f64::from_be_bytes(bytes))
}

/// Accumulates half-bytes, high nibble first.
#[derive(Default)]
struct HalfByteWriter {
    out: Vec<u8>,
    pending: Option<u8>,
}

impl HalfByteWriter {
    fn with_bytes(out: Vec<u8>) -> Self {
        Self { out, pending: None }
    }

    fn push(&mut self, nibble: u8) {
        let nibble = nibble & 0xf;
        match self.pending.take() {
            Some(high) => self.out.push((high << 4) | nibble),
            None => self.pending = Some(nibble),
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if let Some(high) = self.pending.take() {
            self.out.push(high << 4);
        }
        self.out
    }
}

struct HalfByteReader<'a> {
    data: &'a [u8],
    index: usize,
    low: bool,
}

impl<'a> HalfByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            index: 0,
            low: false,
        }
    }

    fn has_more(&self) -> bool {
        self.index < self.data.len()
    }

    /// True when only the low nibble of the final byte is left and it is padding.
    fn at_padding(&self) -> bool {
        self.low && self.index + 1 == self.data.len() && self.data[self.index] & 0xf != 0x8
    }

    fn next(&mut self) -> Result<u8, NumpressError> {
        let byte = *self
            .data
            .get(self.index)
            .ok_or(NumpressError::Truncated { offset: self.index })?;
        let nibble = if self.low {
            self.index += 1;
            byte & 0xf
        } else {
            byte >> 4
        };
        self.low = !self.low;
        Ok(nibble)
    }
}

/// Write `x` as a head nibble followed by its significant nibbles, lowest first.
///
/// Heads 0..=8 count leading zero nibbles, heads 9..=15 count leading `0xf`
/// nibbles plus eight.
fn encode_int(x: i32, out: &mut HalfByteWriter) {
    let init = x & NIBBLE_MASK;
    let (head, skipped) = if init == 0 {
        let l = (0..8).find(|&i| x & (NIBBLE_MASK >> (4 * i)) != 0).unwrap_or(8);
        (l, l)
    } else if init == NIBBLE_MASK {
        let l = (0..8)
            .find(|&i| {
                let m = NIBBLE_MASK >> (4 * i);
                x & m != m
            })
            .unwrap_or(7);
        (l + 8, l)
    } else {
        (0, 0)
    };

    out.push(head as u8);
    for i in 0..(8 - skipped) {
        out.push((x >> (4 * i)) as u8);
    }
}

fn decode_int(reader: &mut HalfByteReader<'_>) -> Result<i32, NumpressError> {
    let head = reader.next()? as u32;
    let mut value: i32 = 0;
    let n = if head <= 8 {
        head
    } else {
        let n = head - 8;
        for i in 0..n {
            value |= NIBBLE_MASK >> (4 * i);
        }
        n
    };
    for i in n..8 {
        let nibble = reader.next()? as i32;
        value |= nibble << ((i - n) * 4);
    }
    Ok(value)
}

/// Largest fixed point that keeps every linear-prediction residual in 31 bits.
pub fn optimal_linear_fixed_point(data: &[f64]) -> f64 {
    match data {
        [] => 0.0,
        [only] => {
            let denominator = if *only > 0.0 { *only } else { 1.0 };
            (0x7FFF_FFFF as f64 / denominator).floor()
        }
        [first, second, rest @ ..] => {
            let mut max_double = first.max(*second);
            let mut previous = [*first, *second];
            for &x in rest {
                let extrapolated = previous[1] + (previous[1] - previous[0]);
                let diff = x - extrapolated;
                max_double = max_double.max((diff.abs() + 1.0).ceil());
                previous = [previous[1], x];
            }
            (0x7FFF_FFFF as f64 / max_double).floor()
        }
    }
}

fn to_fixed(value: f64, fixed_point: f64) -> i64 {
    (value * fixed_point + 0.5) as i64
}

/// Encode with linear prediction. A `fixed_point` of `None` picks
/// [`optimal_linear_fixed_point`].
pub fn encode_linear(data: &[f64], fixed_point: Option<f64>) -> Vec<u8> {
    let fixed_point = fixed_point.unwrap_or_else(|| optimal_linear_fixed_point(data));
    let mut out = Vec::with_capacity(FIXED_POINT_LEN + 8 + data.len() * 2);
    encode_fixed_point(fixed_point, &mut out);

    let mut ints = [0i64; 3];
    for (slot, value) in data.iter().take(2).enumerate() {
        ints[slot + 1] = to_fixed(*value, fixed_point);
        out.extend_from_slice(&(ints[slot + 1] as u32).to_le_bytes());
    }
    if data.len() <= 2 {
        return out;
    }

    let mut writer = HalfByteWriter::with_bytes(out);
    for &value in &data[2..] {
        ints = [ints[1], ints[2], to_fixed(value, fixed_point)];
        let extrapolated = ints[1].wrapping_add(ints[1].wrapping_sub(ints[0]));
        encode_int(ints[2].wrapping_sub(extrapolated) as i32, &mut writer);
    }
    writer.finish()
}

fn read_u32_le(data: &[u8], at: usize) -> Result<i64, NumpressError> {
    let bytes: [u8; 4] = data
        .get(at..at + 4)
        .and_then(|b| b.try_into().ok())
        .ok_or(NumpressError::Truncated { offset: at })?;
    Ok(u32::from_le_bytes(bytes) as i64)
}

/// Decode a linear payload.
pub fn decode_linear(data: &[u8]) -> Result<Vec<f64>, NumpressError> {
    let fixed_point = decode_fixed_point(data)?;
    if data.len() == FIXED_POINT_LEN {
        return Ok(Vec::new());
    }
    if data.len() < 12 {
        return Err(NumpressError::TooShort {
            required: 12,
            actual: data.len(),
        });
    }

    let mut ints = [0i64; 3];
    ints[1] = read_u32_le(data, 8)?;
    let mut result = vec![ints[1] as f64 / fixed_point];
    if data.len() == 12 {
        return Ok(result);
    }
    if data.len() < 16 {
        return Err(NumpressError::TooShort {
            required: 16,
            actual: data.len(),
        });
    }
    ints[2] = read_u32_le(data, 12)?;
    result.push(ints[2] as f64 / fixed_point);

    let mut reader = HalfByteReader::new(&data[16..]);
    while reader.has_more() {
        if reader.at_padding() {
            break;
        }
        let diff = decode_int(&mut reader).map_err(|e| shift_offset(e, 16))?;
        ints = [ints[1], ints[2], 0];
        let extrapolated = ints[1].wrapping_add(ints[1].wrapping_sub(ints[0]));
        ints[2] = extrapolated.wrapping_add(diff as i64);
        result.push(ints[2] as f64 / fixed_point);
    }
    Ok(result)
}

fn shift_offset(error: NumpressError, base: usize) -> NumpressError {
    match error {
        NumpressError::Truncated { offset } => NumpressError::Truncated { offset: offset + base },
        other => other,
    }
}

/// Encode as rounded positive integers.
pub fn encode_pic(data: &[f64]) -> Vec<u8> {
    let mut writer = HalfByteWriter::with_bytes(Vec::with_capacity(data.len() * 2));
    for &value in data {
        let count = (value + 0.5) as i64;
        encode_int(count as i32, &mut writer);
    }
    writer.finish()
}

/// Decode a pic payload.
pub fn decode_pic(data: &[u8]) -> Result<Vec<f64>, NumpressError> {
    let mut reader = HalfByteReader::new(data);
    let mut result = Vec::with_capacity(data.len());
    while reader.has_more() {
        if reader.at_padding() {
            break;
        }
        result.push(decode_int(&mut reader)? as f64);
    }
    Ok(result)
}

/// Fixed point spreading `ln(x + 1)` over the 16-bit range.
pub fn optimal_slof_fixed_point(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let max_double = data.iter().fold(1.0f64, |acc, &x| acc.max((x + 1.0).ln()));
    (0xFFFF as f64 / max_double).floor()
}

/// Encode as short logged floats. A `fixed_point` of `None` picks
/// [`optimal_slof_fixed_point`].
pub fn encode_slof(data: &[f64], fixed_point: Option<f64>) -> Vec<u8> {
    let fixed_point = fixed_point.unwrap_or_else(|| optimal_slof_fixed_point(data));
    let mut out = Vec::with_capacity(FIXED_POINT_LEN + data.len() * 2);
    encode_fixed_point(fixed_point, &mut out);
    for &value in data {
        let x = ((value + 1.0).ln() * fixed_point + 0.5) as u16;
        out.extend_from_slice(&x.to_le_bytes());
    }
    out
}

/// Decode a slof payload.
pub fn decode_slof(data: &[u8]) -> Result<Vec<f64>, NumpressError> {
    let fixed_point = decode_fixed_point(data)?;
    let values = &data[FIXED_POINT_LEN..];
    if values.len() % 2 != 0 {
        return Err(NumpressError::OddLength(values.len()));
    }
    Ok(values
        .chunks_exact(2)
        .map(|pair| (f64::from(u16::from_le_bytes([pair[0], pair[1]])) / fixed_point).exp() - 1.0)
        .collect())
}
