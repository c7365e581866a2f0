//! Per-search parameters and the filter that enforces them.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::metadata::DocumentMetadata;
use crate::forward::ForwardIndexReader;
use crate::query::buffer::DocIdBuffer;
use crate::query::filter::QueryFilterStep;
use crate::util::id;

/// Inclusive scalar predicate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpecificationLimit {
    #[default]
    None,
    Equals(i32),
    LessThan(i32),
    GreaterThan(i32),
}

impl SpecificationLimit {
    pub fn test(&self, value: i32) -> bool {
        match *self {
            SpecificationLimit::None => true,
            SpecificationLimit::Equals(v) => value == v,
            SpecificationLimit::LessThan(v) => value <= v,
            SpecificationLimit::GreaterThan(v) => value >= v,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, SpecificationLimit::None)
    }
}

/// Domains a search may return results from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchSet {
    #[default]
    Any,
    Domains(BTreeSet<u32>),
}

impl SearchSet {
    pub fn contains(&self, domain_id: u32) -> bool {
        match self {
            SearchSet::Any => true,
            SearchSet::Domains(domains) => domains.contains(&domain_id),
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, SearchSet::Any)
    }
}

/// How the coherence stage interprets a subquery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryStrategy {
    /// Coherence and phrase groups as given.
    #[default]
    Auto,
    /// The include terms must also co-occur within one coherence window.
    Sentence,
    /// Coherence groups only weigh results; phrase groups still filter.
    Topic,
    /// The include terms must form a phrase inside a title span.
    RequireFieldTitle,
    /// The include terms must form a phrase inside a heading span.
    RequireFieldHeading,
    /// The include terms must form a phrase inside an anchor span.
    RequireFieldAnchor,
}

/// Search-wide restrictions and limits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryParams {
    pub quality: SpecificationLimit,
    pub year: SpecificationLimit,
    pub size: SpecificationLimit,
    pub rank: SpecificationLimit,
    pub search_set: SearchSet,
    /// Restrict results to these domains, via rank-encoded id ranges.
    pub domains: Vec<u32>,
    pub strategy: QueryStrategy,
    /// Results to collect; the configured default when `None`.
    ///
    /// Counted as candidates are drained, before the positional checks
    /// drop any of them, so a search with phrase or coherence groups can
    /// return fewer.
    pub fetch_size: Option<usize>,
    /// Cap on results per domain; unlimited when `None`.
    ///
    /// Like `fetch_size`, applied to candidates before the positional
    /// checks, so a domain can end up under its cap.
    pub results_by_domain: Option<usize>,
    /// Search budget; the configured default when `None`.
    pub timeout: Option<Duration>,
}

impl QueryParams {
    /// True if no per-document predicate needs the forward index.
    pub fn is_unrestricted(&self) -> bool {
        self.quality.is_none()
            && self.year.is_none()
            && self.size.is_none()
            && self.rank.is_none()
            && self.search_set.is_any()
    }
}

/// Checks candidates against [`QueryParams`] through the forward index.
pub struct ParamMatchingQueryFilter {
    forward: Arc<ForwardIndexReader>,
    params: QueryParams,
}

impl ParamMatchingQueryFilter {
    pub fn new(forward: Arc<ForwardIndexReader>, params: QueryParams) -> Self {
        ParamMatchingQueryFilter { forward, params }
    }

    pub fn test(&self, doc_id: u64) -> bool {
        let doc_id = id::remove_rank(doc_id);

        if !self.params.search_set.contains(id::get_domain_id(doc_id)) {
            return false;
        }

        let meta = self.forward.get_doc_meta(doc_id);
        self.params.quality.test(DocumentMetadata::decode_quality(meta) as i32)
            && self.params.year.test(DocumentMetadata::decode_year(meta))
            && self.params.size.test(DocumentMetadata::decode_size(meta) as i32)
            && self.params.rank.test(DocumentMetadata::decode_rank(meta) as i32)
    }
}

impl QueryFilterStep for ParamMatchingQueryFilter {
    fn apply(&mut self, buffer: &mut DocIdBuffer) {
        while buffer.has_more() {
            if self.test(buffer.current_value()) {
                buffer.retain_and_advance();
            } else {
                buffer.reject_and_advance();
            }
        }
        buffer.finalize_filtering();
    }

    fn cost(&self) -> f64 {
        32.0
    }

    fn describe(&self) -> String {
        "[ParamMatch]".to_string()
    }
}
