//! File-level building blocks: structured binary streams, memory-mapped
//! files and batched positional reads.

pub mod batch;
pub mod mmap;
pub mod structured;

pub use batch::{BatchRead, PositionalReader};
pub use mmap::{AccessPattern, MappedFile, MappedFileMut};
pub use structured::{StructReader, StructWriter};
