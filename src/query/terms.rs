//! Subquery term lists and their resolution to term ids.

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::util::hash::TermInterner;

/// One variant of a search, as term strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSubquery {
    /// Every term must be present.
    pub include: Vec<String>,
    /// From each group at least one term must be present.
    pub include_any: Vec<Vec<String>>,
    /// Terms that favor a result without being required.
    pub advice: Vec<String>,
    /// No term may be present.
    pub exclude: Vec<String>,
    /// Terms whose priority-tier presence favors a result.
    pub priority: Vec<String>,
    /// Each group must appear contiguously and in order.
    pub phrase_groups: Vec<Vec<String>>,
    /// Each group must co-occur within one coherence window.
    pub coherence_groups: Vec<Vec<String>>,
}

impl SearchSubquery {
    pub fn new<S: Into<String>>(include: impl IntoIterator<Item = S>) -> Self {
        SearchSubquery {
            include: include.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_advice<S: Into<String>>(mut self, terms: impl IntoIterator<Item = S>) -> Self {
        self.advice.extend(terms.into_iter().map(Into::into));
        self
    }

    pub fn with_exclude<S: Into<String>>(mut self, terms: impl IntoIterator<Item = S>) -> Self {
        self.exclude.extend(terms.into_iter().map(Into::into));
        self
    }

    pub fn with_priority<S: Into<String>>(mut self, terms: impl IntoIterator<Item = S>) -> Self {
        self.priority.extend(terms.into_iter().map(Into::into));
        self
    }

    pub fn with_include_any<S: Into<String>>(mut self, group: impl IntoIterator<Item = S>) -> Self {
        self.include_any.push(group.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_phrase<S: Into<String>>(mut self, group: impl IntoIterator<Item = S>) -> Self {
        self.phrase_groups.push(group.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_coherence<S: Into<String>>(mut self, group: impl IntoIterator<Item = S>) -> Self {
        self.coherence_groups.push(group.into_iter().map(Into::into).collect());
        self
    }
}

/// A subquery resolved to term ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchTerms {
    pub include: Vec<u64>,
    pub include_any: Vec<Vec<u64>>,
    pub advice: Vec<u64>,
    pub exclude: Vec<u64>,
    pub priority: Vec<u64>,
    pub phrase_groups: Vec<Vec<u64>>,
    pub coherence_groups: Vec<Vec<u64>>,
}

fn resolve_groups(groups: &[Vec<String>], interner: &TermInterner) -> Vec<Vec<u64>> {
    groups
        .iter()
        .filter(|g| !g.is_empty())
        .map(|g| interner.intern_all(g))
        .collect()
}

impl SearchTerms {
    /// Resolve term strings. Blank terms are dropped.
    pub fn resolve(subquery: &SearchSubquery, interner: &TermInterner) -> Self {
        let resolve = |terms: &[String]| -> Vec<u64> {
            let mut seen = AHashSet::new();
            terms
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .map(|t| interner.intern(t))
                .filter(|id| seen.insert(*id))
                .collect()
        };

        SearchTerms {
            include: resolve(&subquery.include),
            include_any: resolve_groups(&subquery.include_any, interner),
            advice: resolve(&subquery.advice),
            exclude: resolve(&subquery.exclude),
            priority: resolve(&subquery.priority),
            phrase_groups: resolve_groups(&subquery.phrase_groups, interner),
            coherence_groups: resolve_groups(&subquery.coherence_groups, interner),
        }
    }

    /// A subquery with no include terms cannot drive a query.
    pub fn is_empty(&self) -> bool {
        self.include.is_empty()
    }

    /// Every term whose positions the coherence stage may need, deduplicated.
    pub fn positional_terms(&self) -> Vec<u64> {
        let mut seen = AHashSet::new();
        self.include
            .iter()
            .chain(self.advice.iter())
            .chain(self.priority.iter())
            .chain(self.phrase_groups.iter().flatten())
            .chain(self.coherence_groups.iter().flatten())
            .copied()
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_matches_interner() {
        let interner = TermInterner::new();
        let subquery = SearchSubquery::new(["cat", "hat", "cat", " "])
            .with_advice(["mat"])
            .with_phrase(["cat", "hat"])
            .with_coherence(Vec::<String>::new());

        let terms = SearchTerms::resolve(&subquery, &interner);
        assert_eq!(terms.include, vec![interner.intern("cat"), interner.intern("hat")]);
        assert_eq!(terms.advice, vec![interner.intern("mat")]);
        assert_eq!(terms.phrase_groups.len(), 1);
        assert!(terms.coherence_groups.is_empty());
        assert_eq!(terms.positional_terms().len(), 3);
    }

    #[test]
    fn test_empty_include() {
        let interner = TermInterner::new();
        let terms = SearchTerms::resolve(&SearchSubquery::new(["", "  "]), &interner);
        assert!(terms.is_empty());
    }
}
