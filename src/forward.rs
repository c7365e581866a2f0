//! The forward index: document id to per-document scalar metadata.
//!
//! Documents are stored densely by ordinal, the position of their id in the
//! sorted ids file. Each ordinal owns a fixed stride of four `u64` words in
//! the data file:
//!
//! | word | content                                  |
//! |------|------------------------------------------|
//! | 0    | metadata word, rank patched in           |
//! | 1    | feature bitmask, document size `<< 32`   |
//! | 2    | domain id                                |
//! | 3    | encoded offset into the spans file       |

pub mod construction;
pub mod reader;
pub mod spans;

pub use construction::{ForwardIndexConverter, ForwardIndexStep};
pub use reader::ForwardIndexReader;

pub const DOC_IDS_FILE: &str = "fwd-doc-id.dat";
pub const DOC_DATA_FILE: &str = "fwd-doc-data.dat";
pub const SPANS_FILE: &str = "fwd-spans.dat";
pub const DOMAIN_RANKS_FILE: &str = "fwd-domain-ranks.json";

/// Words per document in the data file.
pub const ENTRY_SIZE: usize = 4;
pub const METADATA_OFFSET: usize = 0;
pub const FEATURES_OFFSET: usize = 1;
pub const DOMAIN_OFFSET: usize = 2;
pub const SPANS_OFFSET: usize = 3;

/// Every file a forward index generation consists of.
pub const FILES: [&str; 4] = [DOC_IDS_FILE, DOC_DATA_FILE, SPANS_FILE, DOMAIN_RANKS_FILE];
