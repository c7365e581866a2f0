//! # Loupe
//!
//! The core of a web search index: a document journal feeding a forward
//! index and two tiers of reverse index, with budgeted query execution on
//! top.
//!
//! ## Features
//!
//! - Compressed, paged document journal
//! - Memory-mapped forward index of per-document metadata and spans
//! - Skip-listed reverse index with a priority tier for high-signal terms
//! - Prioritized query execution under a wall-clock budget
//! - Phrase and proximity checks over term positions
//! - Atomic switching between index generations

pub mod codec;
pub mod coherence;
pub mod config;
pub mod error;
pub mod forward;
pub mod index;
pub mod journal;
pub mod progress;
pub mod query;
pub mod ranking;
pub mod reverse;
pub mod storage;
pub mod util;

// Re-exports for the public API
pub use codec::{DocumentMetadata, DocumentSpan, DocumentSpans, SpanCode, WordFlags};
pub use config::{IndexConfig, JournalConfig, QueryConfig, ReverseIndexConfig};
pub use error::{LoupeError, Result};
pub use forward::{ForwardIndexConverter, ForwardIndexReader};
pub use index::{CombinedIndexReader, SearchIndex, construct_index};
pub use journal::{JournalEntryData, JournalEntryHeader, JournalReader, JournalWriter, PagingJournalWriter};
pub use progress::{LogProgress, NoProgress, ProgressSink};
pub use query::{QueryParams, QueryStrategy, SearchResultSet, SearchSubquery, SpecificationLimit};
pub use ranking::{DomainRankings, NoRankings, StaticRankings};
pub use reverse::{IndexTier, ReverseIndexConstructor, ReverseIndexReader};
pub use util::hash::{TermHasher, TermInterner};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
