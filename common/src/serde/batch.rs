//! Batch row codec.
//!
//! A batch is a contiguous buffer of rows, one per [`Measurement`], in the
//! order they were appended. Each row is laid out as:
//!
//! ```text
//! ┌──────────┬──────────┬──────────────┬─────────────┬──────────────────────┐
//! │ tag_len  │ tag      │ timestamp    │ value_count │ values               │
//! │ u16 LE   │ utf-8    │ i64 LE       │ u32 LE      │ value_count × f64 LE │
//! └──────────┴──────────┴──────────────┴─────────────┴──────────────────────┘
//! ```
//!
//! The builder is owned by the accumulator; freezing it produces an immutable
//! [`Batch`] whose ownership moves to the dispatcher. Cloning a batch only
//! bumps a reference count, which keeps retries cheap.

use bytes::Bytes;

use super::{EncodingError, decode_i64, decode_utf8, decode_values, encode_utf8, encode_values};
use crate::model::Measurement;

/// Append-only builder for a [`Batch`].
#[derive(Debug, Default)]
pub struct BatchBuilder {
    buf: Vec<u8>,
    rows: usize,
}

impl BatchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one row. On error the builder is left unchanged.
    pub fn push(&mut self, measurement: &Measurement) -> Result<(), EncodingError> {
        let mark = self.buf.len();
        let encoded = encode_utf8(&measurement.tag, &mut self.buf).and_then(|_| {
            self.buf
                .extend_from_slice(&measurement.timestamp.to_le_bytes());
            encode_values(&measurement.values, &mut self.buf)
        });
        if encoded.is_err() {
            self.buf.truncate(mark);
        } else {
            self.rows += 1;
        }
        encoded
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Encoded size in bytes.
    pub fn size(&self) -> usize {
        self.buf.len()
    }

    /// Freezes the accumulated rows, leaving this builder empty.
    pub fn take(&mut self) -> Batch {
        let buf = std::mem::take(&mut self.buf);
        let rows = std::mem::take(&mut self.rows);
        Batch {
            data: Bytes::from(buf),
            rows,
        }
    }
}

/// An immutable, ordered group of encoded rows delivered in one backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    data: Bytes,
    rows: usize,
}

impl Batch {
    /// Encodes the given measurements into a batch, preserving order.
    pub fn from_measurements<'a>(
        measurements: impl IntoIterator<Item = &'a Measurement>,
    ) -> Result<Batch, EncodingError> {
        let mut builder = BatchBuilder::new();
        for measurement in measurements {
            builder.push(measurement)?;
        }
        Ok(builder.take())
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Encoded size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.data
    }

    /// Iterates over the decoded rows in append order.
    pub fn rows(&self) -> BatchRows<'_> {
        BatchRows {
            buf: &self.data,
            failed: false,
        }
    }

    /// Decodes every row, failing on the first malformed one.
    pub fn decode(&self) -> Result<Vec<Measurement>, EncodingError> {
        self.rows().collect()
    }
}

/// Iterator over the rows of a [`Batch`].
///
/// Stops after yielding the first decoding error.
pub struct BatchRows<'a> {
    buf: &'a [u8],
    failed: bool,
}

impl Iterator for BatchRows<'_> {
    type Item = Result<Measurement, EncodingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.buf.is_empty() {
            return None;
        }
        let row = decode_row(&mut self.buf);
        if row.is_err() {
            self.failed = true;
        }
        Some(row)
    }
}

fn decode_row(buf: &mut &[u8]) -> Result<Measurement, EncodingError> {
    let tag = decode_utf8(buf)?;
    let timestamp = decode_i64(buf, "timestamp")?;
    let values = decode_values(buf)?;
    Ok(Measurement {
        timestamp,
        tag,
        values,
    })
}
