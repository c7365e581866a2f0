//! Runs the queries of one search against a captured index generation.

use std::cmp::Reverse;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::{AHashMap, AHashSet};
use log::debug;

use crate::codec::sequence::CodedSequence;
use crate::codec::span::DocumentSpans;
use crate::coherence::{CoherenceMatcher, TermPositions};
use crate::config::QueryConfig;
use crate::error::Result;
use crate::index::CombinedIndexReader;
use crate::query::budget::SearchBudget;
use crate::query::buffer::DocIdBuffer;
use crate::query::index_query::QueryPriority;
use crate::query::params::QueryParams;
use crate::query::terms::SearchTerms;
use crate::reverse::IndexTier;
use crate::util::id;

/// One matching document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResultItem {
    /// Id as stored in the reverse index, rank included.
    pub doc_id: u64,
    pub priority: QueryPriority,
    /// Index of the subquery that found the document.
    pub subquery: usize,
    /// Size of the best matching optional term group.
    pub weight: usize,
}

impl SearchResultItem {
    pub fn clean_id(&self) -> u64 {
        id::remove_rank(self.doc_id)
    }

    pub fn domain_id(&self) -> u32 {
        id::get_domain_id(self.doc_id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchResultSet {
    pub items: Vec<SearchResultItem>,
    /// The budget ran out; `items` holds what was found until then.
    pub timed_out: bool,
    pub queries_run: usize,
    pub queries_skipped: usize,
}

impl SearchResultSet {
    /// Clean ids in result order.
    pub fn doc_ids(&self) -> Vec<u64> {
        self.items.iter().map(|i| i.clean_id()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Counters shared by every search against an index.
#[derive(Debug, Default)]
pub struct ExecutionStats {
    searches: AtomicU64,
    timeouts: AtomicU64,
}

impl ExecutionStats {
    pub fn searches(&self) -> u64 {
        self.searches.load(Ordering::Relaxed)
    }

    pub fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::Relaxed)
    }
}

/// One search: builds the queries, drains them by priority and applies the
/// coherence stage to what they found.
pub struct IndexQueryExecution<'a> {
    index: Arc<CombinedIndexReader>,
    config: &'a QueryConfig,
    terms: Vec<SearchTerms>,
    params: QueryParams,
    stats: Option<&'a ExecutionStats>,
}

impl<'a> IndexQueryExecution<'a> {
    pub fn new(
        index: Arc<CombinedIndexReader>,
        config: &'a QueryConfig,
        terms: Vec<SearchTerms>,
        params: QueryParams,
    ) -> Self {
        IndexQueryExecution {
            index,
            config,
            terms,
            params,
            stats: None,
        }
    }

    pub fn with_stats(mut self, stats: &'a ExecutionStats) -> Self {
        self.stats = Some(stats);
        self
    }

    fn skip_threshold(&self, priority: QueryPriority, fetch_size: usize) -> Option<usize> {
        match priority {
            QueryPriority::Best => None,
            QueryPriority::Good => fetch_size.checked_div(self.config.good_divisor),
            QueryPriority::Fallback => fetch_size.checked_div(self.config.fallback_divisor),
        }
    }

    pub fn run(self) -> Result<SearchResultSet> {
        let fetch_size = self
            .params
            .fetch_size
            .unwrap_or(self.config.default_fetch_size)
            .max(1);
        let budget = SearchBudget::new(
            self.params
                .timeout
                .unwrap_or_else(|| self.config.default_timeout()),
        );

        let mut queries = self
            .index
            .create_queries(&self.terms, &self.params, self.config);
        queries.sort_by_key(|q| q.priority());

        let mut result = SearchResultSet::default();
        let mut buffer = DocIdBuffer::new(self.config.buffer_size.max(1));
        let mut seen = AHashSet::new();
        let mut per_domain: AHashMap<u32, usize> = AHashMap::new();

        for query in queries.iter_mut() {
            let found = result.items.len();
            let enough = self
                .skip_threshold(query.priority(), fetch_size)
                .is_some_and(|threshold| found > threshold);

            if enough || found >= fetch_size || !budget.has_time_left() {
                debug!("skipping query {}", query.describe());
                result.queries_skipped += 1;
                continue;
            }
            result.queries_run += 1;

            while query.has_more() && result.items.len() < fetch_size && budget.has_time_left() {
                buffer.reset();
                query.get_more_results(&mut buffer, &budget);

                for &doc_id in buffer.data() {
                    if result.items.len() >= fetch_size {
                        break;
                    }
                    if !seen.insert(id::remove_rank(doc_id)) {
                        continue;
                    }
                    if let Some(limit) = self.params.results_by_domain {
                        let count = per_domain.entry(id::get_domain_id(doc_id)).or_default();
                        if *count >= limit {
                            continue;
                        }
                        *count += 1;
                    }
                    result.items.push(SearchResultItem {
                        doc_id,
                        priority: query.priority(),
                        subquery: query.subquery(),
                        weight: 0,
                    });
                }
            }
        }

        result.items = self.apply_coherence(std::mem::take(&mut result.items))?;
        result
            .items
            .sort_by_key(|item| (item.priority, Reverse(item.weight)));

        result.timed_out = budget.is_expired();
        if let Some(stats) = self.stats {
            stats.searches.fetch_add(1, Ordering::Relaxed);
            if result.timed_out {
                stats.timeouts.fetch_add(1, Ordering::Relaxed);
            }
        }
        if result.timed_out {
            debug!(
                "search timed out after {:?} with {} results",
                budget.elapsed(),
                result.items.len()
            );
        }
        Ok(result)
    }

    /// Drop candidates failing their subquery's positional checks and weigh the rest.
    fn apply_coherence(&self, items: Vec<SearchResultItem>) -> Result<Vec<SearchResultItem>> {
        let mut by_subquery: AHashMap<usize, Vec<SearchResultItem>> = AHashMap::new();
        for item in items {
            by_subquery.entry(item.subquery).or_default().push(item);
        }

        let full = self.index.reverse(IndexTier::Full);
        let mut kept = Vec::new();

        for (subquery, mut group) in by_subquery {
            let Some(terms) = self.terms.get(subquery) else {
                kept.extend(group);
                continue;
            };
            let matcher =
                CoherenceMatcher::new(terms, self.params.strategy, self.config.coherence_window);
            if matcher.is_trivial() {
                kept.extend(group);
                continue;
            }

            group.sort_by_key(|item| item.doc_id);
            let ids: Vec<u64> = group.iter().map(|item| item.doc_id).collect();

            let mut positions: Vec<TermPositions> = vec![TermPositions::default(); ids.len()];
            for term in terms.positional_terms() {
                for (doc, data) in full.get_term_data(term, &ids).into_iter().enumerate() {
                    if let Some(data) = data {
                        positions[doc].insert(term, data.positions.values());
                    }
                }
            }

            let spans = if matcher.needs_spans() {
                let clean: Vec<u64> = ids.iter().map(|&d| id::remove_rank(d)).collect();
                self.index.forward().get_document_spans_batch(&clean)?
            } else {
                vec![DocumentSpans::new(); ids.len()]
            };

            for ((mut item, doc_positions), doc_spans) in group.into_iter().zip(positions).zip(spans) {
                if matcher.test(&doc_positions, &doc_spans) {
                    item.weight = matcher.weight(&doc_positions);
                    kept.push(item);
                }
            }
        }

        kept.sort_by_key(|item| item.doc_id);
        Ok(kept)
    }
}
