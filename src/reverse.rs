//! The reverse index: term id to the documents containing it.
//!
//! Each tier is two files. The *docs* file holds one skip-listed posting list
//! per term; the *words* file maps term ids to list offsets. The full tier
//! holds every posting, the priority tier only postings whose flags mark
//! them as high-signal (title, heading, subject, domain, site terms).

pub mod construction;
pub mod filter;
pub mod reader;
pub mod skiplist;
pub mod words;

use serde::{Deserialize, Serialize};

use crate::codec::metadata::WordFlags;

pub use construction::{DocIdRewriter, ReverseIndexConstructor, ReverseIndexStep};
pub use filter::{ReverseIndexRejectFilter, ReverseIndexRetainFilter};
pub use reader::{ReverseIndexReader, TermData};

/// Which reverse index a term lookup targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexTier {
    Full,
    Priority,
}

impl IndexTier {
    pub const ALL: [IndexTier; 2] = [IndexTier::Full, IndexTier::Priority];

    pub fn name(&self) -> &'static str {
        match self {
            IndexTier::Full => "full",
            IndexTier::Priority => "prio",
        }
    }

    pub fn docs_file(&self) -> String {
        format!("rev-{}-docs.dat", self.name())
    }

    pub fn words_file(&self) -> String {
        format!("rev-{}-words.dat", self.name())
    }

    /// Whether a posting with this metadata byte belongs in the tier.
    pub fn accepts(&self, meta: u8) -> bool {
        match self {
            IndexTier::Full => true,
            IndexTier::Priority => WordFlags::is_priority(meta),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_files() {
        assert_eq!(IndexTier::Full.docs_file(), "rev-full-docs.dat");
        assert_eq!(IndexTier::Priority.words_file(), "rev-prio-words.dat");
    }

    #[test]
    fn test_tier_predicate() {
        let title = WordFlags::Title.as_bit();
        let path = WordFlags::UrlPath.as_bit();
        assert!(IndexTier::Full.accepts(0));
        assert!(IndexTier::Full.accepts(path));
        assert!(IndexTier::Priority.accepts(title));
        assert!(!IndexTier::Priority.accepts(path));
        assert!(!IndexTier::Priority.accepts(0));
    }
}
