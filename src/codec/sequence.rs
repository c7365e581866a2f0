//! Self-contained encodings of strictly ascending integer sequences.
//!
//! Both codecs store the value count first, then the gaps between successive
//! values (the first gap is `first + 1` so every gap is positive). Each blob
//! can be decoded without any surrounding context.

use crate::codec::bits::{BitReader, BitWriter};
use crate::error::{LoupeError, Result};
use crate::util::varint;

/// A decodable sequence of ascending positions.
pub trait CodedSequence {
    /// Raw encoded representation.
    fn bytes(&self) -> &[u8];

    /// Iterate the decoded values in ascending order.
    fn iter(&self) -> Box<dyn Iterator<Item = i32> + '_>;

    /// Number of values in the sequence.
    fn value_count(&self) -> usize;

    /// Iterate the values shifted by a constant offset.
    ///
    /// Phrase matching aligns the positions of the `i`-th phrase term by
    /// viewing them at offset `-i`.
    fn offset_iter(&self, offset: i32) -> Box<dyn Iterator<Item = i32> + '_> {
        Box::new(self.iter().map(move |v| v + offset))
    }

    fn values(&self) -> Vec<i32> {
        self.iter().collect()
    }

    /// True if `position` is one of the values.
    fn contains_position(&self, position: i32) -> bool {
        for v in self.iter() {
            if v == position {
                return true;
            }
            if v > position {
                break;
            }
        }
        false
    }

    fn is_empty(&self) -> bool {
        self.value_count() == 0
    }
}

fn validate(values: &[i32]) -> Result<()> {
    let mut prev: i64 = -1;
    for &v in values {
        if (v as i64) <= prev {
            return Err(LoupeError::invalid_argument(format!(
                "sequence values must be non-negative and strictly ascending, got {v} after {prev}"
            )));
        }
        prev = v as i64;
    }
    Ok(())
}

fn gaps(values: &[i32]) -> impl Iterator<Item = u64> + '_ {
    let mut prev: i64 = -1;
    values.iter().map(move |&v| {
        let gap = (v as i64 - prev) as u64;
        prev = v as i64;
        gap
    })
}

/// Elias-gamma coded sequence.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GammaCodedSequence {
    bytes: Vec<u8>,
}

impl GammaCodedSequence {
    /// Encode a strictly ascending list of non-negative values.
    pub fn generate(values: &[i32]) -> Result<Self> {
        validate(values)?;

        let mut writer = BitWriter::with_capacity(values.len() + 1);
        writer.put_gamma(values.len() as u64 + 1);
        for gap in gaps(values) {
            writer.put_gamma(gap);
        }

        Ok(GammaCodedSequence {
            bytes: writer.finish(),
        })
    }

    /// Wrap an already encoded blob.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        GammaCodedSequence { bytes }
    }

    /// An empty sequence: a blob encoding zero values.
    pub fn empty() -> Self {
        let mut writer = BitWriter::new();
        writer.put_gamma(1);
        GammaCodedSequence {
            bytes: writer.finish(),
        }
    }

    /// Decode every value, failing on a malformed blob.
    pub fn try_values(&self) -> Result<Vec<i32>> {
        let mut reader = BitReader::new(&self.bytes);
        let count = reader.get_gamma()? - 1;
        // Every value takes at least one bit.
        let mut values = Vec::with_capacity(count.min(self.bytes.len() as u64 * 8) as usize);
        let mut prev: i64 = -1;
        for _ in 0..count {
            prev += reader.get_gamma()? as i64;
            values.push(prev as i32);
        }
        Ok(values)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl CodedSequence for GammaCodedSequence {
    fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn iter(&self) -> Box<dyn Iterator<Item = i32> + '_> {
        Box::new(GammaIter::new(&self.bytes))
    }

    fn value_count(&self) -> usize {
        let mut reader = BitReader::new(&self.bytes);
        reader.get_gamma().map(|c| c as usize - 1).unwrap_or(0)
    }
}

/// Decoding iterator over a gamma blob. A malformed blob ends iteration early.
struct GammaIter<'a> {
    reader: BitReader<'a>,
    remaining: u64,
    prev: i64,
}

impl<'a> GammaIter<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        let mut reader = BitReader::new(bytes);
        let remaining = reader.get_gamma().map(|c| c - 1).unwrap_or(0);
        GammaIter {
            reader,
            remaining,
            prev: -1,
        }
    }
}

impl Iterator for GammaIter<'_> {
    type Item = i32;

    fn next(&mut self) -> Option<i32> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        match self.reader.get_gamma() {
            Ok(gap) => {
                self.prev += gap as i64;
                Some(self.prev as i32)
            }
            Err(_) => {
                self.remaining = 0;
                None
            }
        }
    }
}

/// Varint coded sequence, used where gaps are large (span boundaries).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VarintCodedSequence {
    bytes: Vec<u8>,
}

impl VarintCodedSequence {
    pub fn generate(values: &[i32]) -> Result<Self> {
        validate(values)?;

        let mut bytes = Vec::with_capacity(values.len() + 1);
        varint::write_u64(&mut bytes, values.len() as u64 + 1);
        for gap in gaps(values) {
            varint::write_u64(&mut bytes, gap);
        }
        Ok(VarintCodedSequence { bytes })
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        VarintCodedSequence { bytes }
    }

    pub fn try_values(&self) -> Result<Vec<i32>> {
        let (count, mut pos) = varint::decode_u64(&self.bytes)?;
        let count = count
            .checked_sub(1)
            .ok_or_else(|| LoupeError::corruption("varint sequence missing count"))?;
        // Every value takes at least one byte.
        let mut values = Vec::with_capacity(count.min(self.bytes.len() as u64) as usize);
        let mut prev: i64 = -1;
        for _ in 0..count {
            let (gap, read) = varint::decode_u64(&self.bytes[pos..])?;
            pos += read;
            prev += gap as i64;
            values.push(prev as i32);
        }
        Ok(values)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl CodedSequence for VarintCodedSequence {
    fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn iter(&self) -> Box<dyn Iterator<Item = i32> + '_> {
        Box::new(VarintIter::new(&self.bytes))
    }

    fn value_count(&self) -> usize {
        varint::decode_u64(&self.bytes)
            .map(|(c, _)| c.saturating_sub(1) as usize)
            .unwrap_or(0)
    }
}

struct VarintIter<'a> {
    bytes: &'a [u8],
    pos: usize,
    remaining: u64,
    prev: i64,
}

impl<'a> VarintIter<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        let (remaining, pos) = varint::decode_u64(bytes)
            .map(|(c, read)| (c.saturating_sub(1), read))
            .unwrap_or((0, 0));
        VarintIter {
            bytes,
            pos,
            remaining,
            prev: -1,
        }
    }
}

impl Iterator for VarintIter<'_> {
    type Item = i32;

    fn next(&mut self) -> Option<i32> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        match varint::decode_u64(&self.bytes[self.pos..]) {
            Ok((gap, read)) => {
                self.pos += read;
                self.prev += gap as i64;
                Some(self.prev as i32)
            }
            Err(_) => {
                self.remaining = 0;
                None
            }
        }
    }
}
