use loupe::codec::{CodedSequence, DocumentMetadata, GammaCodedSequence, WordFlags};
use loupe::config::JournalConfig;
use loupe::forward::{ForwardIndexConverter, ForwardIndexReader};
use loupe::journal::{JournalEntryData, JournalEntryHeader, JournalReader, PagingJournalWriter};
use loupe::progress::NoProgress;
use loupe::query::{DocIdBuffer, EntrySource};
use loupe::ranking::{NoRankings, StaticRankings};
use loupe::reverse::skiplist::{PostingList, PostingRecord, SkipListCursor, SkipStats, write_posting_list};
use loupe::reverse::{DocIdRewriter, IndexTier, ReverseIndexConstructor, ReverseIndexReader};
use loupe::storage::{MappedFile, StructWriter};
use loupe::util::id;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

/// Document `i` holds term `t` for every `t` in `2..=i` dividing `i`.
fn write_divisor_journal(dir: &Path, max_doc: u32, per_page: u64) -> JournalReader {
    let config = JournalConfig {
        records_per_page: per_page,
        ..Default::default()
    };
    let mut writer = PagingJournalWriter::create(dir, &config).unwrap();

    for i in 1..=max_doc {
        let mut data = JournalEntryData::new();
        for t in (2..=i).filter(|t| i % t == 0) {
            let flags = if t % 2 == 0 { WordFlags::Title.as_bit() } else { 0 };
            data.add_term(t as u64, flags, GammaCodedSequence::generate(&[t as i32]).unwrap());
        }
        let meta = DocumentMetadata {
            quality: i % 16,
            ..Default::default()
        };
        writer
            .put(&JournalEntryHeader::new(id::encode_id(i % 5, i), 0, i, meta.encode()), &data)
            .unwrap();
    }
    writer.close().unwrap();
    JournalReader::open_dir(dir).unwrap()
}

fn drain(mut source: Box<dyn EntrySource>) -> Vec<u64> {
    let mut buffer = DocIdBuffer::new(64);
    let mut out = Vec::new();
    while source.has_more() {
        buffer.reset();
        source.read(&mut buffer);
        out.extend_from_slice(buffer.data());
    }
    out
}

#[test]
fn test_journal_to_forward_and_reverse() {
    let dir = tempdir().unwrap();
    let journal = write_divisor_journal(&dir.path().join("journal"), 300, 64);
    assert_eq!(journal.pages().len(), 5);
    assert_eq!(journal.record_count().unwrap(), 300);

    let out = dir.path().join("index");
    let rankings: StaticRankings = (0..5).map(|d| (d, d * 10)).collect();
    assert!(ForwardIndexConverter::new(&journal, &out, &rankings, &NoProgress).convert().unwrap());
    for tier in IndexTier::ALL {
        assert!(
            ReverseIndexConstructor::new(&journal, tier, &out, DocIdRewriter::Ranked(&rankings), &NoProgress)
                .with_block_size(16)
                .construct()
                .unwrap()
        );
    }

    let forward = ForwardIndexReader::open(&out).unwrap();
    assert_eq!(forward.doc_count(), 300);
    let doc = id::encode_id(7 % 5, 7);
    assert_eq!(forward.get_document_size(doc), 7);
    assert_eq!(DocumentMetadata::decode(forward.get_doc_meta(doc)).quality, 7);
    assert_eq!(DocumentMetadata::decode(forward.get_doc_meta(doc)).rank, 20);

    let full = ReverseIndexReader::open(&out, IndexTier::Full).unwrap();
    for t in [2u32, 3, 11, 150] {
        let mut found: Vec<u64> = drain(full.documents(t as u64))
            .into_iter()
            .map(id::remove_rank)
            .collect();
        found.sort_unstable();

        let mut expected: Vec<u64> = (1..=300u32)
            .filter(|i| i % t == 0)
            .map(|i| id::encode_id(i % 5, i))
            .collect();
        expected.sort_unstable();
        assert_eq!(found, expected, "term {t}");
    }

    // Rank-encoded ids list the best-ranked domain first.
    let ranked = drain(full.documents(3));
    assert!(ranked.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(id::get_domain_id(ranked[0]), 0);

    let prio = ReverseIndexReader::open(&out, IndexTier::Priority).unwrap();
    assert_eq!(prio.num_documents(4), full.num_documents(4));
    assert_eq!(prio.num_documents(3), 0);
}

#[test]
fn test_multiples_with_identity_ids() {
    let dir = tempdir().unwrap();
    let journal = write_divisor_journal(&dir.path().join("journal"), 256, 1000);
    let out = dir.path().join("index");
    ReverseIndexConstructor::new(&journal, IndexTier::Full, &out, DocIdRewriter::Identity, &NoProgress)
        .construct()
        .unwrap();

    let full = ReverseIndexReader::open(&out, IndexTier::Full).unwrap();
    let found: Vec<u32> = drain(full.documents(16)).into_iter().map(id::get_ordinal).collect();
    let mut sorted = found.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, (1..=256).filter(|i| i % 16 == 0).collect::<Vec<u32>>());

    let doc = id::encode_id(48 % 5, 48);
    let data = full.get_term_data(16, &[doc]);
    assert_eq!(data[0].as_ref().unwrap().positions.values(), vec![16]);
}

#[test]
fn test_retain_idempotent_across_tiers() {
    let dir = tempdir().unwrap();
    let journal = write_divisor_journal(&dir.path().join("journal"), 200, 1000);
    let out = dir.path().join("index");
    ReverseIndexConstructor::new(&journal, IndexTier::Full, &out, DocIdRewriter::Ranked(&NoRankings), &NoProgress)
        .construct()
        .unwrap();
    let full = ReverseIndexReader::open(&out, IndexTier::Full).unwrap();

    let mut all: Vec<u64> = (1..=200u32).map(|i| id::encode_id(i % 5, i)).collect();
    all.sort_unstable();

    let mut buffer = DocIdBuffer::from_values(&all);
    full.also(6).apply(&mut buffer);
    let once = buffer.copy_data();
    assert_eq!(once.len(), 33);

    full.also(6).apply(&mut buffer);
    assert_eq!(buffer.data(), once.as_slice());
}

#[test]
fn test_randomized_skip_list_retain() {
    let dir = tempdir().unwrap();
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for round in 0..20 {
        let list_ids: BTreeSet<u64> = (0..rng.random_range(1..2000))
            .map(|_| rng.random_range(0..10_000))
            .collect();
        let probe_ids: BTreeSet<u64> = (0..rng.random_range(1..500))
            .map(|_| rng.random_range(0..10_000))
            .collect();
        let block_size = rng.random_range(2..100);

        let postings: Vec<PostingRecord> = list_ids
            .iter()
            .map(|&doc_id| PostingRecord {
                doc_id,
                meta: 0,
                positions: Vec::new(),
            })
            .collect();
        let mut writer = StructWriter::new(Vec::new());
        write_posting_list(&mut writer, &postings, block_size).unwrap();

        let path = dir.path().join(format!("list-{round}.dat"));
        std::fs::write(&path, writer.into_inner().unwrap()).unwrap();
        let file = Arc::new(MappedFile::open(&path).unwrap());
        let list = PostingList::parse(file.as_slice(), 0).unwrap();

        let probes: Vec<u64> = probe_ids.iter().copied().collect();
        let mut retained = DocIdBuffer::from_values(&probes);
        SkipListCursor::new(file.clone(), list, Arc::new(SkipStats::default())).retain(&mut retained);
        let expected: Vec<u64> = probe_ids.intersection(&list_ids).copied().collect();
        assert_eq!(retained.data(), expected.as_slice(), "round {round}");

        let mut rejected = DocIdBuffer::from_values(&probes);
        SkipListCursor::new(file.clone(), list, Arc::new(SkipStats::default())).reject(&mut rejected);
        let expected: Vec<u64> = probe_ids.difference(&list_ids).copied().collect();
        assert_eq!(rejected.data(), expected.as_slice(), "round {round}");
    }
}
