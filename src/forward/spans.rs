//! Per-document span records for the forward index.
//!
//! Each document's spans are appended to the spans file as
//! `[count u8]` followed by `count` x `[code u8][len varint][bytes]`; the data
//! file stores `start << 24 | len` to locate the record.

use std::fs::File;
use std::io::{BufWriter, Cursor};
use std::path::Path;

use crate::codec::span::DocumentSpans;
use crate::error::{LoupeError, Result};
use crate::journal::JournalSpan;
use crate::storage::batch::{BatchRead, PositionalReader};
use crate::storage::structured::{StructReader, StructWriter};

const LEN_BITS: u32 = 24;
const MAX_RECORD_LEN: u64 = (1 << LEN_BITS) - 1;

pub fn encode_offset(start: u64, len: u64) -> u64 {
    (start << LEN_BITS) | len
}

pub fn decode_offset(encoded: u64) -> (u64, u64) {
    (encoded >> LEN_BITS, encoded & MAX_RECORD_LEN)
}

/// Appends span records.
pub struct SpansWriter {
    writer: StructWriter<BufWriter<File>>,
}

impl SpansWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(SpansWriter {
            writer: StructWriter::new(BufWriter::new(File::create(path)?)),
        })
    }

    /// Write one document's spans and return the encoded offset of the record.
    pub fn write_record(&mut self, spans: &[JournalSpan]) -> Result<u64> {
        if spans.len() > u8::MAX as usize {
            return Err(LoupeError::invalid_argument("too many span lists"));
        }

        let start = self.writer.position();
        self.writer.write_u8(spans.len() as u8)?;
        for span in spans {
            self.writer.write_u8(span.code)?;
            self.writer.write_bytes(&span.data)?;
        }

        let len = self.writer.position() - start;
        if len > MAX_RECORD_LEN {
            return Err(LoupeError::invalid_argument(format!(
                "span record of {len} bytes is too large"
            )));
        }
        Ok(encode_offset(start, len))
    }

    pub fn finish(self) -> Result<()> {
        let file = self
            .writer
            .into_inner()?
            .into_inner()
            .map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(())
    }
}

/// Reads span records in batches.
pub struct SpansReader {
    source: Box<dyn BatchRead>,
}

impl SpansReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(SpansReader {
            source: Box::new(PositionalReader::open(path)?),
        })
    }

    pub fn from_source(source: Box<dyn BatchRead>) -> Self {
        SpansReader { source }
    }

    /// Decode the records at each encoded offset. A zero offset is an empty record.
    pub fn read_spans(&self, encoded_offsets: &[u64]) -> Result<Vec<DocumentSpans>> {
        let mut destinations = Vec::with_capacity(encoded_offsets.len());
        let mut offsets = Vec::with_capacity(encoded_offsets.len());
        for &encoded in encoded_offsets {
            let (start, len) = decode_offset(encoded);
            destinations.push(vec![0u8; len as usize]);
            offsets.push(start);
        }

        let read = self.source.read_batch(&mut destinations, &offsets)?;
        if read != destinations.len() {
            return Err(LoupeError::corruption(format!(
                "read {read} of {} span records",
                destinations.len()
            )));
        }

        destinations.iter().map(|bytes| parse_record(bytes)).collect()
    }
}

fn parse_record(bytes: &[u8]) -> Result<DocumentSpans> {
    if bytes.is_empty() {
        return Ok(DocumentSpans::new());
    }

    let mut reader = StructReader::new(Cursor::new(bytes));
    let count = reader.read_u8()?;
    let mut raw = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let code = reader.read_u8()?;
        raw.push((code, reader.read_bytes()?));
    }
    DocumentSpans::decode(&raw)
}
