//! Read side of the forward index.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use ahash::AHashMap;
use log::{debug, info, warn};

use crate::codec::span::DocumentSpans;
use crate::error::{LoupeError, Result};
use crate::forward::spans::SpansReader;
use crate::forward::{
    DOC_DATA_FILE, DOC_IDS_FILE, DOMAIN_OFFSET, DOMAIN_RANKS_FILE, ENTRY_SIZE, FEATURES_OFFSET,
    METADATA_OFFSET, SPANS_FILE, SPANS_OFFSET,
};
use crate::storage::mmap::{AccessPattern, MappedFile};
use crate::util::id;

/// Forward index lookups by clean document id.
///
/// A reader whose files are missing is *not loaded*: every lookup returns a
/// zero value.
pub struct ForwardIndexReader {
    ids_to_ordinals: AHashMap<u64, usize>,
    data: Option<Arc<MappedFile>>,
    spans: Option<SpansReader>,
    domain_ranks: AHashMap<u32, u32>,
}

impl ForwardIndexReader {
    /// Open the forward index stored in `dir`.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let ids_path = dir.join(DOC_IDS_FILE);
        let data_path = dir.join(DOC_DATA_FILE);

        if !ids_path.exists() || !data_path.exists() {
            warn!(
                "forward index files missing in {}, running without forward index",
                dir.display()
            );
            return Ok(Self::not_loaded());
        }

        let ids = MappedFile::open(&ids_path)?;
        ids.advise(AccessPattern::Sequential);
        let ids_to_ordinals: AHashMap<u64, usize> = (0..ids.word_count())
            .filter_map(|ordinal| ids.u64_at(ordinal * 8).map(|doc_id| (doc_id, ordinal)))
            .collect();

        let data = MappedFile::open(&data_path)?;
        let expected = ids.word_count() * ENTRY_SIZE * 8;
        if data.len() != expected {
            return Err(LoupeError::corruption(format!(
                "forward data file is {} bytes, expected {expected} for {} documents",
                data.len(),
                ids.word_count()
            )));
        }
        data.advise(AccessPattern::WillNeed);

        let spans_path = dir.join(SPANS_FILE);
        let spans = if spans_path.exists() {
            Some(SpansReader::open(&spans_path)?)
        } else {
            warn!("forward spans file missing in {}", dir.display());
            None
        };

        let ranks_path = dir.join(DOMAIN_RANKS_FILE);
        let domain_ranks = if ranks_path.exists() {
            let ranks: BTreeMap<u32, u32> = serde_json::from_slice(&fs::read(&ranks_path)?)?;
            ranks.into_iter().collect()
        } else {
            AHashMap::new()
        };

        info!(
            "loaded forward index from {} with {} documents",
            dir.display(),
            ids_to_ordinals.len()
        );

        Ok(ForwardIndexReader {
            ids_to_ordinals,
            data: Some(Arc::new(data)),
            spans,
            domain_ranks,
        })
    }

    /// A reader with no backing files.
    pub fn not_loaded() -> Self {
        ForwardIndexReader {
            ids_to_ordinals: AHashMap::new(),
            data: None,
            spans: None,
            domain_ranks: AHashMap::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.data.is_some()
    }

    pub fn doc_count(&self) -> usize {
        self.ids_to_ordinals.len()
    }

    fn ordinal(&self, doc_id: u64) -> Option<usize> {
        assert!(
            id::is_clean(doc_id),
            "forward index lookup with ranked id {doc_id:#x}"
        );

        let ordinal = self.ids_to_ordinals.get(&doc_id).copied();
        if ordinal.is_none() && self.is_loaded() {
            debug!("document {doc_id} not in forward index");
        }
        ordinal
    }

    fn word(&self, doc_id: u64, offset: usize) -> u64 {
        match (self.ordinal(doc_id), &self.data) {
            (Some(ordinal), Some(data)) => data
                .u64_at((ordinal * ENTRY_SIZE + offset) * 8)
                .unwrap_or(0),
            _ => 0,
        }
    }

    pub fn contains(&self, doc_id: u64) -> bool {
        self.ordinal(doc_id).is_some()
    }

    /// Encoded metadata word, rank included.
    pub fn get_doc_meta(&self, doc_id: u64) -> u64 {
        self.word(doc_id, METADATA_OFFSET)
    }

    /// Document feature bitmask.
    pub fn get_html_features(&self, doc_id: u64) -> u32 {
        self.word(doc_id, FEATURES_OFFSET) as u32
    }

    /// Document length in tokens.
    pub fn get_document_size(&self, doc_id: u64) -> u32 {
        (self.word(doc_id, FEATURES_OFFSET) >> 32) as u32
    }

    pub fn get_domain_id(&self, doc_id: u64) -> u32 {
        self.word(doc_id, DOMAIN_OFFSET) as u32
    }

    /// Structural spans of one document.
    pub fn get_document_spans(&self, doc_id: u64) -> Result<DocumentSpans> {
        let mut spans = self.get_document_spans_batch(&[doc_id])?;
        Ok(spans.pop().unwrap_or_default())
    }

    /// Structural spans of several documents, read as one batch.
    pub fn get_document_spans_batch(&self, doc_ids: &[u64]) -> Result<Vec<DocumentSpans>> {
        let Some(spans) = &self.spans else {
            return Ok(vec![DocumentSpans::new(); doc_ids.len()]);
        };

        let offsets: Vec<u64> = doc_ids
            .iter()
            .map(|&doc_id| self.word(doc_id, SPANS_OFFSET))
            .collect();
        spans.read_spans(&offsets)
    }

    /// Ranking recorded for a domain at construction time.
    pub fn domain_rank(&self, domain_id: u32) -> Option<u32> {
        self.domain_ranks.get(&domain_id).copied()
    }

    /// Inclusive range of rank-encoded ids covering every document of a domain.
    pub fn rank_encoded_domain_range(&self, domain_id: u32) -> (u64, u64) {
        let rank = self.domain_rank(domain_id).unwrap_or(0);
        id::domain_range(domain_id, rank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::metadata::DocumentMetadata;
    use crate::codec::sequence::GammaCodedSequence;
    use crate::codec::span::{DocumentSpan, SpanCode};
    use crate::config::JournalConfig;
    use crate::forward::construction::ForwardIndexConverter;
    use crate::journal::{JournalEntryData, JournalEntryHeader, JournalReader, JournalWriter};
    use crate::progress::NoProgress;
    use crate::progress::testing::RecordingProgress;
    use crate::ranking::StaticRankings;
    use tempfile::TempDir;

    fn meta(i: u32) -> DocumentMetadata {
        DocumentMetadata {
            quality: i % 16,
            year: 2000 + (i % 20) as i32,
            size: i % 200,
            ..Default::default()
        }
    }

    fn write_journal(dir: &Path, ids: &[u64]) -> JournalReader {
        let path = dir.join("journal.dat");
        let mut writer = JournalWriter::create(&path, &JournalConfig::default()).unwrap();
        for &doc_id in ids {
            let ordinal = id::get_ordinal(doc_id);
            let mut data = JournalEntryData::new();
            data.add_term(1, 0, GammaCodedSequence::generate(&[0]).unwrap());
            data.add_span(SpanCode::Title, &DocumentSpan::new(vec![0, ordinal as i32 + 1]))
                .unwrap();
            writer
                .put(
                    &JournalEntryHeader::new(doc_id, ordinal * 3, ordinal + 100, meta(ordinal).encode()),
                    &data,
                )
                .unwrap();
        }
        writer.close().unwrap();
        JournalReader::open_file(path)
    }

    #[test]
    fn test_forward_roundtrip() {
        let dir = TempDir::new().unwrap();
        let ids: Vec<u64> = (0..100u32).rev().map(|i| id::encode_id(i % 3, i)).collect();
        let journal = write_journal(dir.path(), &ids);

        let rankings: StaticRankings = [(0, 5), (1, 9)].into_iter().collect();
        let progress = RecordingProgress::default();
        let out = dir.path().join("index");
        assert!(ForwardIndexConverter::new(&journal, &out, &rankings, &progress).convert().unwrap());

        assert_eq!(
            progress.steps_for("forwardIndexConverter"),
            vec![
                "GET_DOC_IDS",
                "GATHER_OFFSETS",
                "SUPPLEMENTAL_INDEXES",
                "FORCE",
                "DOMAIN_METADATA",
                "FINISHED"
            ]
        );

        let reader = ForwardIndexReader::open(&out).unwrap();
        assert!(reader.is_loaded());
        assert_eq!(reader.doc_count(), 100);

        for i in 0..100u32 {
            let doc_id = id::encode_id(i % 3, i);
            let expected_rank = match i % 3 {
                0 => 5,
                1 => 9,
                _ => 255,
            };
            let word = reader.get_doc_meta(doc_id);
            assert_eq!(DocumentMetadata::decode(word), meta(i).with_rank(expected_rank));
            assert_eq!(reader.get_html_features(doc_id), i * 3);
            assert_eq!(reader.get_document_size(doc_id), i + 100);
            assert_eq!(reader.get_domain_id(doc_id), i % 3);
            assert_eq!(
                reader.get_document_spans(doc_id).unwrap().get(SpanCode::Title),
                DocumentSpan::new(vec![0, i as i32 + 1])
            );
        }

        assert_eq!(reader.domain_rank(1), Some(9));
        let (lo, hi) = reader.rank_encoded_domain_range(1);
        assert!(lo <= id::with_rank(id::encode_id(1, 4), 9));
        assert!(hi >= id::with_rank(id::encode_id(1, 4), 9));
    }

    #[test]
    fn test_unknown_id_returns_zero() {
        let dir = TempDir::new().unwrap();
        let journal = write_journal(dir.path(), &[id::encode_id(1, 1)]);
        let out = dir.path().join("index");
        ForwardIndexConverter::new(&journal, &out, &crate::ranking::NoRankings, &NoProgress)
            .convert()
            .unwrap();

        let reader = ForwardIndexReader::open(&out).unwrap();
        let unknown = id::encode_id(2, 2);
        assert!(!reader.contains(unknown));
        assert_eq!(reader.get_doc_meta(unknown), 0);
        assert_eq!(reader.get_document_size(unknown), 0);
        assert!(reader.get_document_spans(unknown).unwrap().is_empty());
    }

    #[test]
    fn test_batch_spans_preserve_order() {
        let dir = TempDir::new().unwrap();
        let ids: Vec<u64> = (1..=5).map(|i| id::encode_id(0, i)).collect();
        let journal = write_journal(dir.path(), &ids);
        let out = dir.path().join("index");
        ForwardIndexConverter::new(&journal, &out, &crate::ranking::NoRankings, &NoProgress)
            .convert()
            .unwrap();

        let reader = ForwardIndexReader::open(&out).unwrap();
        let batch = reader
            .get_document_spans_batch(&[ids[4], ids[0], ids[2]])
            .unwrap();
        let ends: Vec<usize> = batch
            .iter()
            .map(|s| s.get(SpanCode::Title).length() as usize)
            .collect();
        assert_eq!(ends, vec![6, 2, 4]);
    }

    #[test]
    fn test_missing_files_degrade() {
        let dir = TempDir::new().unwrap();
        let reader = ForwardIndexReader::open(dir.path()).unwrap();
        assert!(!reader.is_loaded());
        assert_eq!(reader.get_doc_meta(id::encode_id(1, 1)), 0);
        assert_eq!(reader.get_domain_id(id::encode_id(1, 1)), 0);
    }

    #[test]
    fn test_empty_journal_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("journal.dat");
        JournalWriter::create(&path, &JournalConfig::default())
            .unwrap()
            .close()
            .unwrap();
        let journal = JournalReader::open_file(&path);
        let out = dir.path().join("index");

        let written = ForwardIndexConverter::new(&journal, &out, &crate::ranking::NoRankings, &NoProgress)
            .convert()
            .unwrap();
        assert!(!written);
        assert!(!out.join(DOC_IDS_FILE).exists());
    }

    #[test]
    #[should_panic(expected = "ranked id")]
    fn test_dirty_id_panics() {
        let reader = ForwardIndexReader::not_loaded();
        reader.get_doc_meta(id::with_rank(id::encode_id(1, 1), 3));
    }
}
