// Row encoding shared by the batch codec and the persistent backend.

mod batch;

pub use batch::{Batch, BatchBuilder, BatchRows};

/// Longest tag the row encoding can carry.
pub const MAX_TAG_LEN: usize = u16::MAX as usize;

/// Encoding error with a descriptive message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingError {
    pub message: String,
}

impl EncodingError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::error::Error for EncodingError {}

impl std::fmt::Display for EncodingError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Encode a UTF-8 string
///
/// Format: `len: u16` (little-endian) + `len` bytes of UTF-8
pub fn encode_utf8(s: &str, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
    let bytes = s.as_bytes();
    if bytes.len() > MAX_TAG_LEN {
        return Err(EncodingError::new(format!(
            "String too long for UTF-8 encoding: {} bytes",
            bytes.len()
        )));
    }
    buf.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

/// Decode a UTF-8 string
///
/// Format: `len: u16` (little-endian) + `len` bytes of UTF-8
pub fn decode_utf8(buf: &mut &[u8]) -> Result<String, EncodingError> {
    let len = decode_u16(buf, "UTF-8 length")? as usize;
    if buf.len() < len {
        return Err(EncodingError::new(format!(
            "Buffer too short for UTF-8 payload: need {} bytes, have {}",
            len,
            buf.len()
        )));
    }
    let bytes = &buf[..len];
    *buf = &buf[len..];

    String::from_utf8(bytes.to_vec())
        .map_err(|e| EncodingError::new(format!("Invalid UTF-8: {}", e)))
}

/// Encode a value vector
///
/// Format: `count: u32` (little-endian) + `count` little-endian f64s
pub fn encode_values(values: &[f64], buf: &mut Vec<u8>) -> Result<(), EncodingError> {
    let count = u32::try_from(values.len())
        .map_err(|_| EncodingError::new(format!("Too many values: {}", values.len())))?;
    buf.extend_from_slice(&count.to_le_bytes());
    for value in values {
        buf.extend_from_slice(&value.to_le_bytes());
    }
    Ok(())
}

/// Decode a value vector
///
/// Format: `count: u32` (little-endian) + `count` little-endian f64s
pub fn decode_values(buf: &mut &[u8]) -> Result<Vec<f64>, EncodingError> {
    let count = decode_u32(buf, "value count")? as usize;
    let needed = count
        .checked_mul(8)
        .ok_or_else(|| EncodingError::new(format!("Value count overflow: {}", count)))?;
    if buf.len() < needed {
        return Err(EncodingError::new(format!(
            "Buffer too short for values: need {} bytes, have {}",
            needed,
            buf.len()
        )));
    }
    let values = buf[..needed]
        .chunks_exact(8)
        .map(|chunk| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            f64::from_le_bytes(raw)
        })
        .collect();
    *buf = &buf[needed..];
    Ok(values)
}

pub(crate) fn decode_i64(buf: &mut &[u8], what: &str) -> Result<i64, EncodingError> {
    let raw = take::<8>(buf, what)?;
    Ok(i64::from_le_bytes(raw))
}

fn decode_u16(buf: &mut &[u8], what: &str) -> Result<u16, EncodingError> {
    let raw = take::<2>(buf, what)?;
    Ok(u16::from_le_bytes(raw))
}

fn decode_u32(buf: &mut &[u8], what: &str) -> Result<u32, EncodingError> {
    let raw = take::<4>(buf, what)?;
    Ok(u32::from_le_bytes(raw))
}

fn take<const N: usize>(buf: &mut &[u8], what: &str) -> Result<[u8; N], EncodingError> {
    if buf.len() < N {
        return Err(EncodingError::new(format!(
            "Buffer too short for {}: need {} bytes, have {}",
            what,
            N,
            buf.len()
        )));
    }
    let mut raw = [0u8; N];
    raw.copy_from_slice(&buf[..N]);
    *buf = &buf[N..];
    Ok(raw)
}
