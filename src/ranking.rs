//! Domain rankings supplied by the external ranking computation.
//!
//! Lower values rank better. The forward index stores the ranking in the
//! metadata rank field (8 bits) and the reverse index folds it into the rank
//! bits of document ids (7 bits) so posting lists sort best domains first;
//! both saturate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Ranking assigned to domains that do not appear in a ranking table.
pub const UNRANKED: u32 = 255;

/// Lookup of a domain's ranking.
pub trait DomainRankings: Send + Sync {
    fn ranking(&self, domain_id: u32) -> u32;
}

/// Every domain ranks equally; ids are left clean.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRankings;

impl DomainRankings for NoRankings {
    fn ranking(&self, _domain_id: u32) -> u32 {
        0
    }
}

/// A ranking table; unknown domains get [`UNRANKED`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticRankings {
    ranks: BTreeMap<u32, u32>,
}

impl StaticRankings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, domain_id: u32, ranking: u32) {
        self.ranks.insert(domain_id, ranking);
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}

impl FromIterator<(u32, u32)> for StaticRankings {
    fn from_iter<T: IntoIterator<Item = (u32, u32)>>(iter: T) -> Self {
        StaticRankings {
            ranks: iter.into_iter().collect(),
        }
    }
}

impl DomainRankings for StaticRankings {
    fn ranking(&self, domain_id: u32) -> u32 {
        self.ranks.get(&domain_id).copied().unwrap_or(UNRANKED)
    }
}

impl<F> DomainRankings for F
where
    F: Fn(u32) -> u32 + Send + Sync,
{
    fn ranking(&self, domain_id: u32) -> u32 {
        self(domain_id)
    }
}
