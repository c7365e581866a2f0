//! Filter steps backed by a term's posting list.

use crate::query::buffer::DocIdBuffer;
use crate::query::filter::QueryFilterStep;
use crate::reverse::IndexTier;
use crate::reverse::skiplist::SkipListCursor;

/// Keeps documents that contain the term.
pub struct ReverseIndexRetainFilter {
    cursor: SkipListCursor,
    tier: IndexTier,
    term_id: u64,
}

impl ReverseIndexRetainFilter {
    pub fn new(cursor: SkipListCursor, tier: IndexTier, term_id: u64) -> Self {
        ReverseIndexRetainFilter {
            cursor,
            tier,
            term_id,
        }
    }
}

impl QueryFilterStep for ReverseIndexRetainFilter {
    fn apply(&mut self, buffer: &mut DocIdBuffer) {
        self.cursor.retain(buffer);
    }

    fn cost(&self) -> f64 {
        self.cursor.doc_count() as f64
    }

    fn describe(&self) -> String {
        format!("[Retain {}:{:#x}]", self.tier.name(), self.term_id)
    }
}

/// Drops documents that contain the term.
pub struct ReverseIndexRejectFilter {
    cursor: SkipListCursor,
    tier: IndexTier,
    term_id: u64,
}

impl ReverseIndexRejectFilter {
    pub fn new(cursor: SkipListCursor, tier: IndexTier, term_id: u64) -> Self {
        ReverseIndexRejectFilter {
            cursor,
            tier,
            term_id,
        }
    }
}

impl QueryFilterStep for ReverseIndexRejectFilter {
    fn apply(&mut self, buffer: &mut DocIdBuffer) {
        self.cursor.reject(buffer);
    }

    fn cost(&self) -> f64 {
        self.cursor.doc_count() as f64
    }

    fn describe(&self) -> String {
        format!("[Reject {}:{:#x}]", self.tier.name(), self.term_id)
    }
}
