//! Journal record types and their byte encoding.

use std::io::Read;

use crate::codec::sequence::{CodedSequence, GammaCodedSequence};
use crate::codec::span::{DocumentSpan, DocumentSpans, SpanCode};
use crate::error::{LoupeError, Result};
use crate::storage::structured::{StructReader, StructWriter};
use crate::util::hash::TermHasher;

/// Fixed-size part of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalEntryHeader {
    /// Number of postings in the record.
    pub entry_size: u32,
    /// Document feature bitmask.
    pub document_features: u32,
    /// Clean document id.
    pub combined_id: u64,
    /// Encoded [`DocumentMetadata`](crate::codec::DocumentMetadata) word.
    pub document_meta: u64,
    /// Document length in tokens.
    pub document_size: u32,
}

impl JournalEntryHeader {
    /// Header for a document; `entry_size` is filled in when the record is written.
    pub fn new(combined_id: u64, document_features: u32, document_size: u32, document_meta: u64) -> Self {
        JournalEntryHeader {
            entry_size: 0,
            document_features,
            combined_id,
            document_meta,
            document_size,
        }
    }
}

/// One posting as stored in the journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalTerm {
    pub term_id: u64,
    /// [`WordFlags`](crate::codec::WordFlags) byte.
    pub meta: u8,
    pub positions: GammaCodedSequence,
}

/// One structural span list as stored in the journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalSpan {
    pub code: u8,
    /// Varint-coded interlaced boundaries.
    pub data: Vec<u8>,
}

/// Variable-size part of a record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JournalEntryData {
    pub terms: Vec<JournalTerm>,
    pub spans: Vec<JournalSpan>,
}

impl JournalEntryData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_term(&mut self, term_id: u64, meta: u8, positions: GammaCodedSequence) -> &mut Self {
        self.terms.push(JournalTerm {
            term_id,
            meta,
            positions,
        });
        self
    }

    /// Hash `keyword` and add it with the given positions.
    pub fn add_keyword(
        &mut self,
        hasher: &TermHasher,
        keyword: &str,
        meta: u8,
        positions: &[i32],
    ) -> Result<&mut Self> {
        let positions = GammaCodedSequence::generate(positions)?;
        Ok(self.add_term(hasher.hash_term(keyword), meta, positions))
    }

    pub fn add_span(&mut self, code: SpanCode, span: &DocumentSpan) -> Result<&mut Self> {
        let data = span.encode()?.into_bytes();
        self.spans.push(JournalSpan {
            code: code.code(),
            data,
        });
        Ok(self)
    }

    pub fn size(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Decode the span payload.
    pub fn document_spans(&self) -> Result<DocumentSpans> {
        let raw: Vec<(u8, Vec<u8>)> = self
            .spans
            .iter()
            .map(|s| (s.code, s.data.clone()))
            .collect();
        DocumentSpans::decode(&raw)
    }
}

/// A complete journal record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub header: JournalEntryHeader,
    pub data: JournalEntryData,
}

impl JournalEntry {
    pub fn doc_id(&self) -> u64 {
        self.header.combined_id
    }
}

fn blob_len(len: usize, what: &str) -> Result<u16> {
    u16::try_from(len).map_err(|_| {
        LoupeError::invalid_argument(format!("{what} blob of {len} bytes exceeds 65535"))
    })
}

/// Serialize one record.
pub(crate) fn encode_record(
    header: &JournalEntryHeader,
    data: &JournalEntryData,
    out: &mut Vec<u8>,
) -> Result<()> {
    if data.spans.len() > u8::MAX as usize {
        return Err(LoupeError::invalid_argument(format!(
            "{} span lists exceed the per-record limit",
            data.spans.len()
        )));
    }

    let mut writer = StructWriter::new(out);
    writer.write_u32(data.terms.len() as u32)?;
    writer.write_u32(header.document_features)?;
    writer.write_u64(header.combined_id)?;
    writer.write_u64(header.document_meta)?;
    writer.write_u32(header.document_size)?;

    for term in &data.terms {
        let bytes = term.positions.bytes();
        writer.write_u64(term.term_id)?;
        writer.write_u8(term.meta)?;
        writer.write_u16(blob_len(bytes.len(), "positions")?)?;
        writer.write_raw(bytes)?;
    }

    writer.write_u8(data.spans.len() as u8)?;
    for span in &data.spans {
        writer.write_u8(span.code)?;
        writer.write_u16(blob_len(span.data.len(), "span")?)?;
        writer.write_raw(&span.data)?;
    }

    Ok(())
}

/// Deserialize one record, keeping only postings accepted by `keep`.
pub(crate) fn decode_record<R, F>(reader: &mut StructReader<R>, keep: F) -> Result<JournalEntry>
where
    R: Read,
    F: Fn(u64, u8) -> bool,
{
    let entry_size = reader.read_u32()?;
    let document_features = reader.read_u32()?;
    let combined_id = reader.read_u64()?;
    let document_meta = reader.read_u64()?;
    let document_size = reader.read_u32()?;

    let mut data = JournalEntryData::new();
    for _ in 0..entry_size {
        let term_id = reader.read_u64()?;
        let meta = reader.read_u8()?;
        let len = reader.read_u16()? as usize;
        let bytes = reader.read_raw(len)?;
        if keep(term_id, meta) {
            data.add_term(term_id, meta, GammaCodedSequence::from_bytes(bytes));
        }
    }

    let span_count = reader.read_u8()?;
    for _ in 0..span_count {
        let code = reader.read_u8()?;
        let len = reader.read_u16()? as usize;
        let data_bytes = reader.read_raw(len)?;
        data.spans.push(JournalSpan {
            code,
            data: data_bytes,
        });
    }

    Ok(JournalEntry {
        header: JournalEntryHeader {
            entry_size,
            document_features,
            combined_id,
            document_meta,
            document_size,
        },
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> (JournalEntryHeader, JournalEntryData) {
        let hasher = TermHasher::new();
        let mut data = JournalEntryData::new();
        data.add_keyword(&hasher, "hello", 1, &[0, 4]).unwrap();
        data.add_keyword(&hasher, "world", 0, &[1]).unwrap();
        data.add_span(SpanCode::Title, &DocumentSpan::new(vec![0, 2]))
            .unwrap();
        (JournalEntryHeader::new(77, 0b101, 120, 0xABCD), data)
    }

    #[test]
    fn test_record_roundtrip() {
        let (header, data) = sample();
        let mut buf = Vec::new();
        encode_record(&header, &data, &mut buf).unwrap();

        let mut reader = StructReader::new(Cursor::new(buf));
        let entry = decode_record(&mut reader, |_, _| true).unwrap();

        assert_eq!(entry.header.entry_size, 2);
        assert_eq!(entry.header.combined_id, 77);
        assert_eq!(entry.header.document_features, 0b101);
        assert_eq!(entry.header.document_size, 120);
        assert_eq!(entry.header.document_meta, 0xABCD);
        assert_eq!(entry.data, data);
        assert_eq!(
            entry.data.document_spans().unwrap().get(SpanCode::Title),
            DocumentSpan::new(vec![0, 2])
        );
    }

    #[test]
    fn test_record_filter_keeps_payload_aligned() {
        let (header, data) = sample();
        let mut buf = Vec::new();
        encode_record(&header, &data, &mut buf).unwrap();
        encode_record(&header, &data, &mut buf).unwrap();

        let mut reader = StructReader::new(Cursor::new(buf));
        let first = decode_record(&mut reader, |_, meta| meta & 1 != 0).unwrap();
        let second = decode_record(&mut reader, |_, _| true).unwrap();

        assert_eq!(first.data.size(), 1);
        assert_eq!(first.header.entry_size, 2);
        assert_eq!(first.data.spans.len(), 1);
        assert_eq!(second.data.size(), 2);
    }

    #[test]
    fn test_truncated_record() {
        let (header, data) = sample();
        let mut buf = Vec::new();
        encode_record(&header, &data, &mut buf).unwrap();
        buf.truncate(buf.len() - 3);

        let mut reader = StructReader::new(Cursor::new(buf));
        assert!(decode_record(&mut reader, |_, _| true).is_err());
    }
}
