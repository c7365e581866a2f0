//! Composite 64-bit document ids.
//!
//! Bits 57-63: Rank (7 bits)
//! Bits 26-56: Domain ID (31 bits)
//! Bits 0-25:  Document ordinal within the domain (26 bits)
//!
//! An id whose rank bits are zero is *clean*. Ids stored in the reverse index
//! and returned mid-query may carry a rank (*dirty*) so that lists sort by
//! domain rank first; the forward index only accepts clean ids.

pub const ORDINAL_BITS: u32 = 26;
pub const DOMAIN_BITS: u32 = 31;
pub const RANK_BITS: u32 = 7;

pub const ORDINAL_MASK: u64 = (1 << ORDINAL_BITS) - 1;
pub const DOMAIN_MASK: u64 = (1 << DOMAIN_BITS) - 1;
pub const RANK_SHIFT: u32 = ORDINAL_BITS + DOMAIN_BITS;
pub const RANK_MASK: u64 = ((1 << RANK_BITS) - 1) << RANK_SHIFT;

pub const MAX_ORDINAL: u32 = ORDINAL_MASK as u32;
pub const MAX_DOMAIN_ID: u32 = DOMAIN_MASK as u32;
pub const MAX_RANK: u32 = (1 << RANK_BITS) - 1;

/// Create a clean document id from a domain id and a document ordinal.
pub fn encode_id(domain_id: u32, ordinal: u32) -> u64 {
    (((domain_id as u64) & DOMAIN_MASK) << ORDINAL_BITS) | ((ordinal as u64) & ORDINAL_MASK)
}

/// Return `doc_id` with its rank bits replaced; ranks above [`MAX_RANK`] saturate.
pub fn with_rank(doc_id: u64, rank: u32) -> u64 {
    let rank = rank.min(MAX_RANK) as u64;
    remove_rank(doc_id) | (rank << RANK_SHIFT)
}

/// Strip the rank bits, yielding the clean id.
pub fn remove_rank(doc_id: u64) -> u64 {
    doc_id & !RANK_MASK
}

pub fn get_rank(doc_id: u64) -> u32 {
    (doc_id >> RANK_SHIFT) as u32
}

pub fn get_domain_id(doc_id: u64) -> u32 {
    ((doc_id >> ORDINAL_BITS) & DOMAIN_MASK) as u32
}

pub fn get_ordinal(doc_id: u64) -> u32 {
    (doc_id & ORDINAL_MASK) as u32
}

/// Check whether the id carries no rank.
pub fn is_clean(doc_id: u64) -> bool {
    doc_id & RANK_MASK == 0
}

/// Inclusive range of ids covering every document of `domain_id` at `rank`.
pub fn domain_range(domain_id: u32, rank: u32) -> (u64, u64) {
    (
        with_rank(encode_id(domain_id, 0), rank),
        with_rank(encode_id(domain_id, MAX_ORDINAL), rank),
    )
}
