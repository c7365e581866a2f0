//! Shared utility modules used across the index components.

pub mod hash;
pub mod id;
pub mod varint;
