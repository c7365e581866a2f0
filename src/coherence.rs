//! Positional checks run on candidate documents after retrieval.
//!
//! A *coherence* group passes when all its terms occur within a common
//! window of `window` positions (bucketed as `position / window`). A
//! *phrase* group passes when its terms occur contiguously and in order.

use ahash::AHashMap;
use bit_vec::BitVec;

use crate::codec::sequence_ops::find_intersections;
use crate::codec::span::{DocumentSpan, DocumentSpans, SpanCode};
use crate::query::params::QueryStrategy;
use crate::query::terms::SearchTerms;

/// Positions of each query term within one document.
pub type TermPositions = AHashMap<u64, Vec<i32>>;

fn bucket_mask(positions: &[i32], window: usize, len: usize) -> BitVec {
    let mut mask = BitVec::from_elem(len, false);
    for &p in positions {
        if p >= 0 {
            mask.set(p as usize / window, true);
        }
    }
    mask
}

/// True if every term of `group` falls in one shared window bucket.
pub fn test_coherence(group: &[u64], positions: &TermPositions, window: usize) -> bool {
    if group.len() <= 1 {
        return group.iter().all(|t| positions.get(t).is_some_and(|p| !p.is_empty()));
    }

    let mut lists = Vec::with_capacity(group.len());
    for term in group {
        match positions.get(term) {
            Some(p) if !p.is_empty() => lists.push(p.as_slice()),
            _ => return false,
        }
    }

    let window = window.max(1);
    let max = lists
        .iter()
        .filter_map(|l| l.last())
        .copied()
        .max()
        .unwrap_or(0)
        .max(0) as usize;
    let len = max / window + 1;

    let mut combined = bucket_mask(lists[0], window, len);
    for list in &lists[1..] {
        combined.and(&bucket_mask(list, window, len));
    }
    combined.any()
}

/// Start positions where `group` occurs as a contiguous phrase.
pub fn phrase_starts(group: &[u64], positions: &TermPositions, limit: usize) -> Vec<i32> {
    let mut lists = Vec::with_capacity(group.len());
    for term in group {
        match positions.get(term) {
            Some(p) => lists.push(p.as_slice()),
            None => return Vec::new(),
        }
    }
    let offsets: Vec<i32> = (0..group.len()).map(|i| -(i as i32)).collect();
    find_intersections(&lists, &offsets, limit)
}

pub fn test_phrase(group: &[u64], positions: &TermPositions) -> bool {
    group.is_empty() || !phrase_starts(group, positions, 1).is_empty()
}

/// True if `group` occurs as a phrase entirely inside one range of `span`.
pub fn test_phrase_in_span(group: &[u64], positions: &TermPositions, span: &DocumentSpan) -> bool {
    if group.is_empty() {
        return true;
    }
    let starts = phrase_starts(group, positions, usize::MAX);
    span.contains_range(&starts, group.len() as i32)
}

/// Size of the largest optional group whose terms are all present and coherent.
pub fn best_optional_weight(groups: &[Vec<u64>], positions: &TermPositions, window: usize) -> usize {
    groups
        .iter()
        .filter(|g| !g.is_empty() && test_coherence(g, positions, window))
        .map(|g| g.len())
        .max()
        .unwrap_or(0)
}

/// Positional requirements of one subquery.
#[derive(Debug, Clone)]
pub struct CoherenceMatcher {
    mandatory: Vec<Vec<u64>>,
    phrases: Vec<Vec<u64>>,
    optional: Vec<Vec<u64>>,
    required_span: Option<(SpanCode, Vec<u64>)>,
    window: usize,
}

impl CoherenceMatcher {
    pub fn new(terms: &SearchTerms, strategy: QueryStrategy, window: usize) -> Self {
        let mut mandatory = Vec::new();
        let mut optional: Vec<Vec<u64>> = Vec::new();

        match strategy {
            QueryStrategy::Topic => optional.extend(terms.coherence_groups.iter().cloned()),
            _ => mandatory.extend(terms.coherence_groups.iter().cloned()),
        }
        if strategy == QueryStrategy::Sentence && terms.include.len() > 1 {
            mandatory.push(terms.include.clone());
        }

        for group in [&terms.advice, &terms.priority] {
            if !group.is_empty() {
                optional.push(group.clone());
            }
        }

        let required_span = match strategy {
            QueryStrategy::RequireFieldTitle => Some(SpanCode::Title),
            QueryStrategy::RequireFieldHeading => Some(SpanCode::Heading),
            QueryStrategy::RequireFieldAnchor => Some(SpanCode::Anchor),
            _ => None,
        }
        .map(|code| (code, terms.include.clone()));

        CoherenceMatcher {
            mandatory,
            phrases: terms.phrase_groups.clone(),
            optional,
            required_span,
            window: window.max(1),
        }
    }

    /// True if no check or weight depends on positions.
    pub fn is_trivial(&self) -> bool {
        self.mandatory.is_empty()
            && self.phrases.is_empty()
            && self.optional.is_empty()
            && self.required_span.is_none()
    }

    /// Whether the matcher needs the document's spans.
    pub fn needs_spans(&self) -> bool {
        self.required_span.is_some()
    }

    /// Whether the document satisfies every mandatory group.
    pub fn test(&self, positions: &TermPositions, spans: &DocumentSpans) -> bool {
        if !self
            .mandatory
            .iter()
            .all(|g| test_coherence(g, positions, self.window))
        {
            return false;
        }
        if !self.phrases.iter().all(|g| test_phrase(g, positions)) {
            return false;
        }
        match &self.required_span {
            Some((code, group)) => test_phrase_in_span(group, positions, &spans.get(*code)),
            None => true,
        }
    }

    pub fn weight(&self, positions: &TermPositions) -> usize {
        best_optional_weight(&self.optional, positions, self.window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(entries: &[(u64, &[i32])]) -> TermPositions {
        entries.iter().map(|(t, p)| (*t, p.to_vec())).collect()
    }

    #[test]
    fn test_coherence_window() {
        let doc = positions(&[(1, &[0, 40]), (2, &[42]), (3, &[100])]);
        assert!(test_coherence(&[1, 2], &doc, 4));
        assert!(!test_coherence(&[1, 3], &doc, 4));
        assert!(test_coherence(&[1, 3], &doc, 128));
        assert!(!test_coherence(&[1, 9], &doc, 4));
        assert!(test_coherence(&[], &doc, 4));
    }

    #[test]
    fn test_phrase_groups() {
        let doc = positions(&[(1, &[3, 10]), (2, &[4, 20]), (3, &[5])]);
        assert!(test_phrase(&[1, 2, 3], &doc));
        assert!(test_phrase(&[2, 3], &doc));
        assert!(!test_phrase(&[2, 1], &doc));
        assert!(!test_phrase(&[1, 3], &doc));
        assert_eq!(phrase_starts(&[1, 2], &doc, 10), vec![3]);
    }

    #[test]
    fn test_phrase_in_span_check() {
        let doc = positions(&[(1, &[3, 10]), (2, &[4, 11])]);
        assert!(test_phrase_in_span(&[1, 2], &doc, &DocumentSpan::new(vec![9, 12])));
        assert!(!test_phrase_in_span(&[1, 2], &doc, &DocumentSpan::new(vec![4, 9])));
        assert!(!test_phrase_in_span(&[1, 2], &doc, &DocumentSpan::new(vec![10, 11])));
    }

    #[test]
    fn test_optional_weight() {
        let doc = positions(&[(1, &[0]), (2, &[1]), (3, &[2])]);
        let groups = vec![vec![1], vec![2, 3], vec![1, 4]];
        assert_eq!(best_optional_weight(&groups, &doc, 4), 2);
        assert_eq!(best_optional_weight(&[], &doc, 4), 0);
    }

    #[test]
    fn test_matcher_strategies() {
        let terms = SearchTerms {
            include: vec![1, 2],
            coherence_groups: vec![vec![1, 2]],
            advice: vec![3],
            ..Default::default()
        };
        let far = positions(&[(1, &[0]), (2, &[50]), (3, &[1])]);
        let spans = DocumentSpans::new();

        let auto = CoherenceMatcher::new(&terms, QueryStrategy::Auto, 4);
        assert!(!auto.test(&far, &spans));

        let topic = CoherenceMatcher::new(&terms, QueryStrategy::Topic, 4);
        assert!(topic.test(&far, &spans));
        assert_eq!(topic.weight(&far), 1);

        let mut title = DocumentSpans::new();
        title.insert(SpanCode::Title, DocumentSpan::new(vec![0, 2]));
        let near = positions(&[(1, &[0]), (2, &[1])]);
        let in_title = CoherenceMatcher::new(&terms, QueryStrategy::RequireFieldTitle, 4);
        assert!(in_title.needs_spans());
        assert!(in_title.test(&near, &title));
        assert!(!in_title.test(&near, &spans));
    }
}
