//! A runnable query: sources drained in order, narrowed by filter steps.

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::index::CombinedIndexReader;
use crate::query::budget::SearchBudget;
use crate::query::buffer::DocIdBuffer;
use crate::query::filter::{QueryFilterAnyOf, QueryFilterStep};
use crate::query::source::EntrySource;
use crate::reverse::IndexTier;

/// Order in which queries run; later priorities may be skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QueryPriority {
    Best,
    Good,
    Fallback,
}

pub struct IndexQuery {
    sources: Vec<Box<dyn EntrySource>>,
    filters: Vec<Box<dyn QueryFilterStep>>,
    priority: QueryPriority,
    /// Index of the subquery this query was generated from.
    subquery: usize,
    current: usize,
}

impl IndexQuery {
    pub fn new(sources: Vec<Box<dyn EntrySource>>, priority: QueryPriority) -> Self {
        IndexQuery {
            sources,
            filters: Vec::new(),
            priority,
            subquery: 0,
            current: 0,
        }
    }

    pub fn with_subquery(mut self, subquery: usize) -> Self {
        self.subquery = subquery;
        self
    }

    pub fn add_filter(&mut self, filter: Box<dyn QueryFilterStep>) {
        self.filters.push(filter);
    }

    pub fn priority(&self) -> QueryPriority {
        self.priority
    }

    pub fn subquery(&self) -> usize {
        self.subquery
    }

    pub fn has_more(&self) -> bool {
        self.sources[self.current.min(self.sources.len())..]
            .iter()
            .any(|s| s.has_more())
    }

    /// Fill `buffer` from the current source and apply every filter.
    ///
    /// If the budget runs out part way through the filters, the batch is
    /// dropped rather than returned half-filtered.
    pub fn get_more_results(&mut self, buffer: &mut DocIdBuffer, budget: &SearchBudget) {
        while self.current < self.sources.len() && !self.sources[self.current].has_more() {
            self.current += 1;
        }
        let Some(source) = self.sources.get_mut(self.current) else {
            return;
        };

        source.read(buffer);

        for filter in self.filters.iter_mut() {
            if buffer.is_empty() {
                return;
            }
            if !budget.has_time_left() {
                buffer.reset();
                return;
            }
            filter.apply(buffer);
        }
    }

    pub fn describe(&self) -> String {
        let sources: Vec<String> = self.sources.iter().map(|s| s.index_name()).collect();
        let filters: Vec<String> = self.filters.iter().map(|f| f.describe()).collect();
        format!(
            "{:?} [{}] {}",
            self.priority,
            sources.join(", "),
            filters.join(" ")
        )
    }
}

/// Composes an [`IndexQuery`] from term constraints.
///
/// Term filters are ordered cheapest first; inclusion filters run after
/// them in the order they were added.
pub struct IndexQueryBuilder<'a> {
    index: &'a CombinedIndexReader,
    query: IndexQuery,
    term_filters: Vec<Box<dyn QueryFilterStep>>,
    inclusion_filters: Vec<Box<dyn QueryFilterStep>>,
    included: AHashSet<(IndexTier, u64)>,
    excluded: AHashSet<u64>,
}

impl<'a> IndexQueryBuilder<'a> {
    /// Start a query over the documents of `term` in `tier`.
    pub fn new(
        index: &'a CombinedIndexReader,
        tier: IndexTier,
        term_id: u64,
        priority: QueryPriority,
    ) -> Self {
        let source = index.reverse(tier).documents(term_id);
        let mut included = AHashSet::new();
        included.insert((tier, term_id));
        IndexQueryBuilder {
            index,
            query: IndexQuery::new(vec![source], priority),
            term_filters: Vec::new(),
            inclusion_filters: Vec::new(),
            included,
            excluded: AHashSet::new(),
        }
    }

    pub fn subquery(mut self, subquery: usize) -> Self {
        self.query.subquery = subquery;
        self
    }

    /// Require `term` in the full tier.
    pub fn also(&mut self, term_id: u64) -> &mut Self {
        self.also_in(IndexTier::Full, term_id)
    }

    /// Require `term` in the given tier.
    pub fn also_in(&mut self, tier: IndexTier, term_id: u64) -> &mut Self {
        if self.included.insert((tier, term_id)) {
            self.term_filters.push(self.index.reverse(tier).also(term_id));
        }
        self
    }

    /// Require at least one of `terms` in the full tier.
    pub fn also_any(&mut self, term_ids: &[u64]) -> &mut Self {
        let mut unique: Vec<u64> = term_ids.to_vec();
        unique.sort_unstable();
        unique.dedup();

        match unique.as_slice() {
            [] => {}
            [single] => {
                self.also(*single);
            }
            many => {
                let full = self.index.reverse(IndexTier::Full);
                let steps = many.iter().map(|&t| full.also(t)).collect();
                self.term_filters.push(Box::new(QueryFilterAnyOf::new(steps)));
            }
        }
        self
    }

    /// Reject documents containing `term`.
    pub fn not(&mut self, term_id: u64) -> &mut Self {
        if self.excluded.insert(term_id) {
            self.term_filters
                .push(self.index.reverse(IndexTier::Full).not(term_id));
        }
        self
    }

    pub fn add_inclusion_filter(&mut self, filter: Box<dyn QueryFilterStep>) -> &mut Self {
        self.inclusion_filters.push(filter);
        self
    }

    pub fn build(self) -> IndexQuery {
        let mut query = self.query;
        let mut term_filters = self.term_filters;
        term_filters.sort_by(|a, b| a.cost().total_cmp(&b.cost()));
        query.filters.extend(term_filters);
        query.filters.extend(self.inclusion_filters);
        query
    }
}
