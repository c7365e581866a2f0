use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use std::path::Path;
use std::time::Duration;

use loupe::codec::{DocumentMetadata, DocumentSpan, SpanCode, WordFlags};
use loupe::query::{IndexQueryExecution, QueryParams, QueryStrategy, SearchSubquery, SpecificationLimit};
use loupe::util::id;
use loupe::{IndexConfig, JournalEntryData, JournalEntryHeader, NoProgress, PagingJournalWriter, SearchIndex, StaticRankings, TermHasher};
use tempfile::TempDir;

fn domain_of(i: u32) -> u32 {
    i % 3 + 1
}

fn doc(i: u32) -> u64 {
    id::encode_id(domain_of(i), i)
}

fn rankings() -> StaticRankings {
    [(1, 0), (2, 5), (3, 10)].into_iter().collect()
}

/// Document `i` holds the term `"t"` at position `t` for every divisor `t`
/// of `i`. Positions below 8 form the title.
fn write_corpus(config: &IndexConfig, docs: RangeInclusive<u32>) {
    let hasher = TermHasher::new();
    let mut writer = PagingJournalWriter::create(&config.journal_dir, &config.journal).unwrap();

    for i in docs {
        let mut data = JournalEntryData::new();
        for t in (1..=i).filter(|t| i % t == 0) {
            let flags = if t < 8 { WordFlags::Title.as_bit() } else { 0 };
            data.add_keyword(&hasher, &t.to_string(), flags, &[t as i32])
                .unwrap();
        }
        data.add_span(SpanCode::Title, &DocumentSpan::new(vec![0, 8]))
            .unwrap();

        let meta = DocumentMetadata {
            year: 2000 + (i % 7) as i32,
            quality: i % 16,
            ..Default::default()
        };
        writer
            .put(&JournalEntryHeader::new(doc(i), 0, i, meta.encode()), &data)
            .unwrap();
    }
    writer.close().unwrap();
}

fn build_index(dir: &Path, docs: RangeInclusive<u32>) -> SearchIndex {
    let config = IndexConfig::builder(dir.join("journal"), dir.join("index"))
        .records_per_page(128)
        .block_size(8)
        .build()
        .unwrap();
    write_corpus(&config, docs);

    let index = SearchIndex::open(config).unwrap();
    assert!(index.construct(&rankings(), &NoProgress).unwrap());
    assert!(index.switch_index().unwrap());
    index
}

fn params() -> QueryParams {
    QueryParams {
        timeout: Some(Duration::from_secs(10)),
        fetch_size: Some(1000),
        ..Default::default()
    }
}

fn expected(filter: impl Fn(u32) -> bool) -> BTreeSet<u64> {
    (1..=511).filter(|&i| filter(i)).map(doc).collect()
}

fn found(index: &SearchIndex, subquery: SearchSubquery, params: QueryParams) -> BTreeSet<u64> {
    let result = index.search(&[subquery], params).unwrap();
    assert!(!result.timed_out);
    let ids: BTreeSet<u64> = result.doc_ids().into_iter().collect();
    assert_eq!(ids.len(), result.len(), "duplicate results");
    ids
}

#[test]
fn test_intersection_with_advice() {
    let dir = TempDir::new().unwrap();
    let index = build_index(dir.path(), 1..=511);

    let subquery = SearchSubquery::new(["3", "5", "2"]).with_advice(["4"]);
    let result = index.search(&[subquery], params()).unwrap();

    let ids: BTreeSet<u64> = result.doc_ids().into_iter().collect();
    assert_eq!(ids, expected(|i| i % 30 == 0));
    assert_eq!(result.len(), 17);

    // Documents matching the advice term sort ahead of the rest.
    let weights: Vec<usize> = result.items.iter().map(|item| item.weight).collect();
    assert_eq!(weights.iter().filter(|&&w| w == 1).count(), 8);
    assert!(weights.windows(2).all(|w| w[0] >= w[1]));
    for item in result.items.iter().filter(|item| item.weight == 1) {
        assert_eq!(id::get_ordinal(item.clean_id()) % 60, 0);
    }
}

#[test]
fn test_missing_term_finds_nothing() {
    let dir = TempDir::new().unwrap();
    let index = build_index(dir.path(), 1..=511);

    assert!(found(&index, SearchSubquery::new(["2", "no-such-term"]), params()).is_empty());
    assert!(found(&index, SearchSubquery::new(["1024"]), params()).is_empty());
}

#[test]
fn test_exclude_and_include_any() {
    let dir = TempDir::new().unwrap();
    let index = build_index(dir.path(), 1..=511);

    let ids = found(&index, SearchSubquery::new(["2"]).with_exclude(["3"]), params());
    assert_eq!(ids, expected(|i| i % 2 == 0 && i % 3 != 0));
    assert_eq!(ids.len(), 170);

    let ids = found(
        &index,
        SearchSubquery::new(["7"]).with_include_any(["5", "11"]),
        params(),
    );
    assert_eq!(ids, expected(|i| i % 7 == 0 && (i % 5 == 0 || i % 11 == 0)));
}

#[test]
fn test_phrase_and_coherence() {
    let dir = TempDir::new().unwrap();
    let index = build_index(dir.path(), 1..=511);

    let ids = found(&index, SearchSubquery::new(["2", "3"]).with_phrase(["2", "3"]), params());
    assert_eq!(ids, expected(|i| i % 6 == 0));

    // "4" sits at position 4 and "3" at 3, so the reversed order never occurs.
    let ids = found(&index, SearchSubquery::new(["4", "3"]).with_phrase(["4", "3"]), params());
    assert!(ids.is_empty());

    // Positions 2 and 5 fall in different windows of width 4.
    let ids = found(&index, SearchSubquery::new(["2", "5"]).with_coherence(["2", "5"]), params());
    assert!(ids.is_empty());

    let ids = found(&index, SearchSubquery::new(["2", "3"]).with_coherence(["2", "3"]), params());
    assert_eq!(ids, expected(|i| i % 6 == 0));
}

#[test]
fn test_require_title_strategy() {
    let dir = TempDir::new().unwrap();
    let index = build_index(dir.path(), 1..=511);

    let title = QueryParams {
        strategy: QueryStrategy::RequireFieldTitle,
        ..params()
    };

    let ids = found(&index, SearchSubquery::new(["6", "7"]), title.clone());
    assert_eq!(ids, expected(|i| i % 42 == 0));

    // "7 8" would end at position 9, past the end of the title.
    assert!(found(&index, SearchSubquery::new(["7", "8"]), title).is_empty());
    assert_eq!(
        found(&index, SearchSubquery::new(["7", "8"]), params()),
        expected(|i| i % 56 == 0)
    );
}

#[test]
fn test_domain_and_year_constraints() {
    let dir = TempDir::new().unwrap();
    let index = build_index(dir.path(), 1..=511);

    let in_domain = QueryParams {
        domains: vec![2],
        ..params()
    };
    let ids = found(&index, SearchSubquery::new(["5"]), in_domain);
    assert_eq!(ids, expected(|i| i % 5 == 0 && domain_of(i) == 2));

    let in_year = QueryParams {
        year: SpecificationLimit::Equals(2003),
        ..params()
    };
    let ids = found(&index, SearchSubquery::new(["5"]), in_year);
    assert_eq!(ids, expected(|i| i % 5 == 0 && i % 7 == 3));

    let before = QueryParams {
        year: SpecificationLimit::LessThan(2001),
        ..params()
    };
    let ids = found(&index, SearchSubquery::new(["5"]), before);
    assert_eq!(ids, expected(|i| i % 5 == 0 && i % 7 <= 1));
}

#[test]
fn test_results_by_domain_and_ranking() {
    let dir = TempDir::new().unwrap();
    let index = build_index(dir.path(), 1..=511);

    let capped = QueryParams {
        results_by_domain: Some(5),
        ..params()
    };
    let result = index.search(&[SearchSubquery::new(["2"])], capped).unwrap();
    assert_eq!(result.len(), 15);
    for domain in 1..=3 {
        assert_eq!(result.items.iter().filter(|i| i.domain_id() == domain).count(), 5);
    }

    // The best ranked domain fills a small result set on its own.
    let small = QueryParams {
        fetch_size: Some(10),
        ..params()
    };
    let result = index.search(&[SearchSubquery::new(["2"])], small).unwrap();
    assert_eq!(result.len(), 10);
    assert!(result.items.iter().all(|i| i.domain_id() == 1));
}

#[test]
fn test_multiple_subqueries() {
    let dir = TempDir::new().unwrap();
    let index = build_index(dir.path(), 1..=511);

    let subqueries = [
        SearchSubquery::new(["11", "13"]),
        SearchSubquery::new(["17"]),
    ];
    let result = index.search(&subqueries, params()).unwrap();
    let ids: BTreeSet<u64> = result.doc_ids().into_iter().collect();
    assert_eq!(ids, expected(|i| i % 143 == 0 || i % 17 == 0));
    assert_eq!(ids.len(), result.len());
}

#[test]
fn test_zero_budget_times_out() {
    let dir = TempDir::new().unwrap();
    let index = build_index(dir.path(), 1..=511);

    let expired = QueryParams {
        timeout: Some(Duration::ZERO),
        ..params()
    };
    let result = index.search(&[SearchSubquery::new(["2"])], expired).unwrap();
    assert!(result.timed_out);
    assert!(result.is_empty());
    assert_eq!(index.stats().searches(), 1);
    assert_eq!(index.stats().timeouts(), 1);
}

#[test]
fn test_generation_switch_keeps_running_searches() {
    let dir = TempDir::new().unwrap();
    let index = build_index(dir.path(), 1..=50);
    let old = index.current().unwrap();

    std::fs::remove_dir_all(&index.config().journal_dir).unwrap();
    write_corpus(index.config(), 51..=100);
    assert!(index.construct(&rankings(), &NoProgress).unwrap());
    assert!(index.switch_index().unwrap());

    let subquery = [SearchSubquery::new(["2"])];
    let result = IndexQueryExecution::new(old.clone(), &index.config().query, old.resolve(&subquery), params())
        .run()
        .unwrap();
    let old_ids: BTreeSet<u64> = result.doc_ids().into_iter().collect();
    assert_eq!(old_ids, (1..=50).filter(|i| i % 2 == 0).map(doc).collect::<BTreeSet<u64>>());

    let new_ids: BTreeSet<u64> = index.search(&subquery, params()).unwrap().doc_ids().into_iter().collect();
    assert_eq!(new_ids, (51..=100).filter(|i| i % 2 == 0).map(doc).collect::<BTreeSet<u64>>());
    assert!(!new_ids.contains(&doc(2)));
}

fn with_fetch_size(fetch_size: usize) -> QueryParams {
    QueryParams {
        fetch_size: Some(fetch_size),
        ..params()
    }
}

#[test]
fn test_small_fetch_size_runs_good_query() {
    let dir = TempDir::new().unwrap();
    let index = build_index(dir.path(), 1..=511);

    // "11" has no priority-tier postings, so only the Good query exists.
    let result = index
        .search(&[SearchSubquery::new(["11"])], with_fetch_size(3))
        .unwrap();
    assert_eq!(result.len(), 3);
    assert_eq!(result.queries_run, 1);
    assert_eq!(result.queries_skipped, 0);
}

#[test]
fn test_fallback_runs_when_nothing_found() {
    let dir = TempDir::new().unwrap();
    let index = build_index(dir.path(), 1..=511);

    let subqueries = [SearchSubquery::new(["no-such-term"]), SearchSubquery::new(["11"])];
    let result = index.search(&subqueries, with_fetch_size(7)).unwrap();
    assert_eq!(result.len(), 7);
    assert_eq!(result.queries_run, 1);
    assert_eq!(result.queries_skipped, 0);
    assert!(result.items.iter().all(|item| item.subquery == 1));
}

#[test]
fn test_good_query_skipped_past_quarter_fetch() {
    let dir = TempDir::new().unwrap();
    let index = build_index(dir.path(), 1..=511);

    // The Best query driven by the title term "7" finds only document 448.
    let subquery = || [SearchSubquery::new(["7", "64"])];

    let at_threshold = index.search(&subquery(), with_fetch_size(4)).unwrap();
    assert_eq!(at_threshold.doc_ids(), vec![doc(448)]);
    assert_eq!(at_threshold.queries_run, 2);
    assert_eq!(at_threshold.queries_skipped, 0);

    let past_threshold = index.search(&subquery(), with_fetch_size(3)).unwrap();
    assert_eq!(past_threshold.doc_ids(), vec![doc(448)]);
    assert_eq!(past_threshold.queries_run, 1);
    assert_eq!(past_threshold.queries_skipped, 1);
}
