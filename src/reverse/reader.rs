//! Read side of one reverse index tier.

use std::path::Path;
use std::sync::Arc;

use log::{error, info, warn};

use crate::codec::sequence::GammaCodedSequence;
use crate::error::Result;
use crate::query::buffer::DocIdBuffer;
use crate::query::filter::{QueryFilterLetThrough, QueryFilterNoPass, QueryFilterStep};
use crate::query::source::{EmptyEntrySource, EntrySource};
use crate::reverse::IndexTier;
use crate::reverse::filter::{ReverseIndexRejectFilter, ReverseIndexRetainFilter};
use crate::reverse::skiplist::{PostingList, SkipListCursor, SkipStats};
use crate::reverse::words::WordsTable;
use crate::storage::mmap::{AccessPattern, MappedFile};

/// Metadata byte and positions of one term in one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermData {
    pub meta: u8,
    pub positions: GammaCodedSequence,
}

/// Term lookups against one tier.
///
/// A reader whose files are missing is *not loaded*: every term is absent.
#[derive(Debug)]
pub struct ReverseIndexReader {
    tier: IndexTier,
    words: Option<WordsTable>,
    docs: Option<Arc<MappedFile>>,
    stats: Arc<SkipStats>,
}

impl ReverseIndexReader {
    /// Open the `tier` files stored in `dir`.
    pub fn open<P: AsRef<Path>>(dir: P, tier: IndexTier) -> Result<Self> {
        let dir = dir.as_ref();
        let words_path = dir.join(tier.words_file());
        let docs_path = dir.join(tier.docs_file());

        if !words_path.exists() || !docs_path.exists() {
            warn!(
                "{} reverse index files missing in {}, running without it",
                tier.name(),
                dir.display()
            );
            return Ok(Self::not_loaded(tier));
        }

        let words_file = MappedFile::open(&words_path)?;
        words_file.advise(AccessPattern::WillNeed);
        let words = WordsTable::open(Arc::new(words_file))?;

        let docs = MappedFile::open(&docs_path)?;
        docs.advise(AccessPattern::Random);

        info!(
            "loaded {} reverse index from {} with {} terms",
            tier.name(),
            dir.display(),
            words.len()
        );

        Ok(ReverseIndexReader {
            tier,
            words: Some(words),
            docs: Some(Arc::new(docs)),
            stats: Arc::new(SkipStats::default()),
        })
    }

    pub fn not_loaded(tier: IndexTier) -> Self {
        ReverseIndexReader {
            tier,
            words: None,
            docs: None,
            stats: Arc::new(SkipStats::default()),
        }
    }

    pub fn tier(&self) -> IndexTier {
        self.tier
    }

    pub fn is_loaded(&self) -> bool {
        self.words.is_some()
    }

    pub fn term_count(&self) -> usize {
        self.words.as_ref().map_or(0, |w| w.len())
    }

    fn cursor(&self, term_id: u64) -> Option<SkipListCursor> {
        let (words, docs) = (self.words.as_ref()?, self.docs.as_ref()?);
        let offset = words.lookup(term_id)?;
        match PostingList::parse(docs.as_slice(), offset as usize) {
            Ok(list) => Some(SkipListCursor::new(docs.clone(), list, self.stats.clone())),
            Err(e) => {
                error!("{} reverse index, term {term_id:#x}: {e}", self.tier.name());
                None
            }
        }
    }

    /// Number of documents containing the term.
    pub fn num_documents(&self, term_id: u64) -> usize {
        self.cursor(term_id).map_or(0, |c| c.doc_count())
    }

    /// All documents containing the term, in ascending order.
    pub fn documents(&self, term_id: u64) -> Box<dyn EntrySource> {
        match self.cursor(term_id) {
            Some(cursor) => Box::new(SkipListSource {
                cursor,
                name: format!("{}:{term_id:#x}", self.tier.name()),
            }),
            None => Box::new(EmptyEntrySource),
        }
    }

    /// Filter keeping documents that contain the term.
    pub fn also(&self, term_id: u64) -> Box<dyn QueryFilterStep> {
        match self.cursor(term_id) {
            Some(cursor) => Box::new(ReverseIndexRetainFilter::new(cursor, self.tier, term_id)),
            None => Box::new(QueryFilterNoPass),
        }
    }

    /// Filter dropping documents that contain the term.
    pub fn not(&self, term_id: u64) -> Box<dyn QueryFilterStep> {
        match self.cursor(term_id) {
            Some(cursor) => Box::new(ReverseIndexRejectFilter::new(cursor, self.tier, term_id)),
            None => Box::new(QueryFilterLetThrough),
        }
    }

    /// Term data for each of `sorted_ids`, `None` where the term is absent.
    pub fn get_term_data(&self, term_id: u64, sorted_ids: &[u64]) -> Vec<Option<TermData>> {
        let Some(mut cursor) = self.cursor(term_id) else {
            return vec![None; sorted_ids.len()];
        };
        cursor
            .term_data(sorted_ids)
            .into_iter()
            .map(|found| {
                found.map(|(meta, bytes)| TermData {
                    meta,
                    positions: GammaCodedSequence::from_bytes(bytes),
                })
            })
            .collect()
    }

    /// Log2 histogram of checkpoint skip distances seen by this reader's filters.
    pub fn skip_histogram(&self) -> [u64; 32] {
        self.stats.snapshot()
    }
}

struct SkipListSource {
    cursor: SkipListCursor,
    name: String,
}

impl EntrySource for SkipListSource {
    fn read(&mut self, buffer: &mut DocIdBuffer) {
        self.cursor.read(buffer);
    }

    fn has_more(&self) -> bool {
        !self.cursor.is_exhausted()
    }

    fn index_name(&self) -> String {
        self.name.clone()
    }
}
