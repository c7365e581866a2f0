//! Term hashing and interning.
//!
//! Term ids are 64-bit hashes computed with fixed seeds, so the same term
//! string maps to the same id in the journal writer and in the query path.

use std::hash::{BuildHasher, Hasher};

use ahash::{AHashMap, RandomState};
use parking_lot::RwLock;

const SEEDS: [u64; 4] = [
    0x243F_6A88_85A3_08D3,
    0x1319_8A2E_0370_7344,
    0xA409_3822_299F_31D0,
    0x082E_FA98_EC4E_6C89,
];

/// Deterministic term string to term id hasher.
#[derive(Clone)]
pub struct TermHasher {
    state: RandomState,
}

impl TermHasher {
    pub fn new() -> Self {
        TermHasher {
            state: RandomState::with_seeds(SEEDS[0], SEEDS[1], SEEDS[2], SEEDS[3]),
        }
    }

    pub fn hash_term(&self, term: &str) -> u64 {
        let mut hasher = self.state.build_hasher();
        hasher.write(term.as_bytes());
        hasher.finish()
    }
}

impl Default for TermHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TermHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TermHasher").finish()
    }
}

/// Memoizing term resolver scoped to one index generation.
///
/// Query parsing resolves the same handful of terms repeatedly; the interner
/// caches the hash and remembers the spelling for diagnostics.
#[derive(Debug, Default)]
pub struct TermInterner {
    hasher: TermHasher,
    ids: RwLock<AHashMap<String, u64>>,
}

impl TermInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a term to its id, caching the result.
    pub fn intern(&self, term: &str) -> u64 {
        if let Some(&id) = self.ids.read().get(term) {
            return id;
        }

        let id = self.hasher.hash_term(term);
        self.ids.write().insert(term.to_string(), id);
        id
    }

    pub fn intern_all<S: AsRef<str>>(&self, terms: &[S]) -> Vec<u64> {
        terms.iter().map(|t| self.intern(t.as_ref())).collect()
    }

    /// Look up the spelling of a previously interned id.
    pub fn term_for(&self, id: u64) -> Option<String> {
        self.ids
            .read()
            .iter()
            .find(|(_, v)| **v == id)
            .map(|(k, _)| k.clone())
    }

    pub fn len(&self) -> usize {
        self.ids.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable_across_instances() {
        let a = TermHasher::new();
        let b = TermHasher::new();
        assert_eq!(a.hash_term("marginal"), b.hash_term("marginal"));
        assert_ne!(a.hash_term("marginal"), a.hash_term("marginalia"));
    }

    #[test]
    fn test_interner_matches_hasher() {
        let interner = TermInterner::new();
        let hasher = TermHasher::new();

        let id = interner.intern("search");
        assert_eq!(id, hasher.hash_term("search"));
        assert_eq!(interner.intern("search"), id);
        assert_eq!(interner.len(), 1);
        assert_eq!(interner.term_for(id).as_deref(), Some("search"));
    }

    #[test]
    fn test_intern_all() {
        let interner = TermInterner::new();
        let ids = interner.intern_all(&["a", "b", "a"]);
        assert_eq!(ids[0], ids[2]);
        assert_ne!(ids[0], ids[1]);
        assert_eq!(interner.len(), 2);
    }
}
