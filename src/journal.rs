//! The index journal: an append-only log of per-document records.
//!
//! Each construction run writes one journal (possibly split into pages);
//! the forward and reverse indices are derived from it by replaying it.
//!
//! Page layout:
//!
//! ```text
//! [record_count u64][posting_count u64]      fixed header, patched on close
//! zstd stream of records:
//!   [entry_size u32][features u32][combined_id u64][meta u64][size u32]
//!   entry_size x [term_id u64][meta u8][len u16][gamma positions]
//!   [span_count u8] span_count x [code u8][len u16][varint boundaries]
//! ```

pub mod entry;
pub mod reader;
pub mod writer;

pub use entry::{JournalEntry, JournalEntryData, JournalEntryHeader, JournalSpan, JournalTerm};
pub use reader::{JournalEntries, JournalFileHeader, JournalReader};
pub use writer::{JournalSummary, JournalWriter, PagingJournalWriter, page_path};

/// Size in bytes of the fixed page header.
pub const JOURNAL_HEADER_SIZE: u64 = 16;
