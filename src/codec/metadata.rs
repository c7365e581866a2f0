//! Packed per-document and per-posting metadata.
//!
//! A document's scalar attributes are packed into a single `u64`:
//!
//! | field        | bits | shift |
//! |--------------|------|-------|
//! | flags        | 8    | 0     |
//! | sets         | 4    | 8     |
//! | quality      | 4    | 12    |
//! | year         | 8    | 16    |
//! | size         | 8    | 24    |
//! | topology     | 8    | 32    |
//! | rank         | 8    | 40    |
//! | avg sentence | 2    | 48    |
//!
//! Encoding saturates out-of-range values to the field bounds instead of
//! masking them, so a value that does not fit reads back as the field maximum.

use serde::{Deserialize, Serialize};

const FLAGS_SHIFT: u32 = 0;
const FLAGS_MASK: u64 = 0xFF;

const SETS_SHIFT: u32 = 8;
const SETS_MASK: u64 = 0x0F;

const QUALITY_SHIFT: u32 = 12;
const QUALITY_MASK: u64 = 0x0F;

const YEAR_SHIFT: u32 = 16;
const YEAR_MASK: u64 = 0xFF;

const SIZE_SHIFT: u32 = 24;
const SIZE_MASK: u64 = 0xFF;

const TOPOLOGY_SHIFT: u32 = 32;
const TOPOLOGY_MASK: u64 = 0xFF;

const RANK_SHIFT: u32 = 40;
const RANK_MASK: u64 = 0xFF;

const AVG_SENTENCE_SHIFT: u32 = 48;
const AVG_SENTENCE_MASK: u64 = 0x03;

/// Earliest representable publication year; stored years are offsets from it.
pub const BASE_YEAR: i32 = 1996;
/// Latest representable publication year.
pub const MAX_YEAR: i32 = BASE_YEAR + YEAR_MASK as i32;

/// Decoded document metadata.
///
/// `year` is a calendar year. Every other field is a small unsigned quantity
/// whose range is given by its bit width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub avg_sentence_length: u32,
    pub rank: u32,
    pub size: u32,
    pub topology: u32,
    pub year: i32,
    pub sets: u32,
    pub quality: u32,
    pub flags: u8,
}

impl Default for DocumentMetadata {
    fn default() -> Self {
        DocumentMetadata {
            avg_sentence_length: 0,
            rank: 0,
            size: 0,
            topology: 0,
            year: BASE_YEAR,
            sets: 0,
            quality: 0,
            flags: 0,
        }
    }
}

fn clamp_field(value: u32, mask: u64) -> u64 {
    (value as u64).min(mask)
}

impl DocumentMetadata {
    /// Pack into the 64-bit representation, saturating each field.
    pub fn encode(&self) -> u64 {
        let year_offset = (self.year.clamp(BASE_YEAR, MAX_YEAR) - BASE_YEAR) as u64;

        ((self.flags as u64 & FLAGS_MASK) << FLAGS_SHIFT)
            | (clamp_field(self.sets, SETS_MASK) << SETS_SHIFT)
            | (clamp_field(self.quality, QUALITY_MASK) << QUALITY_SHIFT)
            | (year_offset << YEAR_SHIFT)
            | (clamp_field(self.size, SIZE_MASK) << SIZE_SHIFT)
            | (clamp_field(self.topology, TOPOLOGY_MASK) << TOPOLOGY_SHIFT)
            | (clamp_field(self.rank, RANK_MASK) << RANK_SHIFT)
            | (clamp_field(self.avg_sentence_length, AVG_SENTENCE_MASK) << AVG_SENTENCE_SHIFT)
    }

    /// Unpack every field. An all-zero word yields [`DocumentMetadata::default`].
    pub fn decode(word: u64) -> Self {
        DocumentMetadata {
            avg_sentence_length: Self::decode_avg_sentence_length(word),
            rank: Self::decode_rank(word),
            size: Self::decode_size(word),
            topology: Self::decode_topology(word),
            year: Self::decode_year(word),
            sets: Self::decode_sets(word),
            quality: Self::decode_quality(word),
            flags: Self::decode_flags(word),
        }
    }

    pub fn decode_flags(word: u64) -> u8 {
        ((word >> FLAGS_SHIFT) & FLAGS_MASK) as u8
    }

    pub fn decode_sets(word: u64) -> u32 {
        ((word >> SETS_SHIFT) & SETS_MASK) as u32
    }

    pub fn decode_quality(word: u64) -> u32 {
        ((word >> QUALITY_SHIFT) & QUALITY_MASK) as u32
    }

    pub fn decode_year(word: u64) -> i32 {
        BASE_YEAR + ((word >> YEAR_SHIFT) & YEAR_MASK) as i32
    }

    pub fn decode_size(word: u64) -> u32 {
        ((word >> SIZE_SHIFT) & SIZE_MASK) as u32
    }

    pub fn decode_topology(word: u64) -> u32 {
        ((word >> TOPOLOGY_SHIFT) & TOPOLOGY_MASK) as u32
    }

    pub fn decode_rank(word: u64) -> u32 {
        ((word >> RANK_SHIFT) & RANK_MASK) as u32
    }

    pub fn decode_avg_sentence_length(word: u64) -> u32 {
        ((word >> AVG_SENTENCE_SHIFT) & AVG_SENTENCE_MASK) as u32
    }

    /// Overwrite only the rank bits of an encoded word.
    pub fn encode_rank(word: u64, rank: u32) -> u64 {
        (word & !(RANK_MASK << RANK_SHIFT)) | (clamp_field(rank, RANK_MASK) << RANK_SHIFT)
    }

    pub fn with_rank(mut self, rank: u32) -> Self {
        self.rank = rank;
        self
    }
}

/// Check that every bit of `mask` is set in a document feature bitmask.
pub fn has_flags(features: u32, mask: u32) -> bool {
    features & mask == mask
}

/// Per-posting flags stored in the posting metadata byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WordFlags {
    /// Term appears in the document title.
    Title,
    /// Term appears in a heading.
    Heading,
    /// Term is one of the document's detected subjects.
    Subjects,
    /// Term is part of a proper name.
    NamesWords,
    /// Term is strongly associated with the site.
    Site,
    /// Term is weakly associated with the site.
    SiteAdjacent,
    /// Term appears in the domain name.
    UrlDomain,
    /// Term appears in the URL path.
    UrlPath,
}

impl WordFlags {
    pub const ALL: [WordFlags; 8] = [
        WordFlags::Title,
        WordFlags::Heading,
        WordFlags::Subjects,
        WordFlags::NamesWords,
        WordFlags::Site,
        WordFlags::SiteAdjacent,
        WordFlags::UrlDomain,
        WordFlags::UrlPath,
    ];

    pub fn as_bit(self) -> u8 {
        1 << (self as u8)
    }

    pub fn is_present(self, meta: u8) -> bool {
        meta & self.as_bit() != 0
    }

    /// Combine several flags into one metadata byte.
    pub fn encode(flags: &[WordFlags]) -> u8 {
        flags.iter().fold(0, |acc, f| acc | f.as_bit())
    }

    pub fn decode(meta: u8) -> Vec<WordFlags> {
        Self::ALL.into_iter().filter(|f| f.is_present(meta)).collect()
    }

    /// Mask of the flags that admit a posting into the priority tier.
    pub fn priority_mask() -> u8 {
        Self::encode(&[
            WordFlags::Title,
            WordFlags::Heading,
            WordFlags::Subjects,
            WordFlags::UrlDomain,
            WordFlags::Site,
        ])
    }

    /// True if the posting metadata byte qualifies for the priority tier.
    pub fn is_priority(meta: u8) -> bool {
        meta & Self::priority_mask() != 0
    }
}
