//! Term id to posting-list offset table.
//!
//! ```text
//! count x [term_id u64][offset u64]     ascending by term_id
//! [count u64][crc32 u32][version u32][magic 8 bytes]
//! ```

use std::io::Write;
use std::sync::Arc;

use crc32fast::Hasher;

use crate::error::{LoupeError, Result};
use crate::storage::mmap::MappedFile;
use crate::storage::structured::StructWriter;

pub const WORDS_MAGIC: &[u8; 8] = b"LOUPEREV";
pub const WORDS_VERSION: u32 = 1;
pub const WORDS_ENTRY_SIZE: usize = 16;
pub const WORDS_FOOTER_SIZE: usize = 24;

/// Streams entries in ascending term order and appends the footer.
pub struct WordsWriter<W: Write> {
    out: StructWriter<W>,
    hasher: Hasher,
    count: u64,
    last_term: Option<u64>,
}

impl<W: Write> WordsWriter<W> {
    pub fn new(inner: W) -> Self {
        WordsWriter {
            out: StructWriter::new(inner),
            hasher: Hasher::new(),
            count: 0,
            last_term: None,
        }
    }

    pub fn add(&mut self, term_id: u64, offset: u64) -> Result<()> {
        if self.last_term.is_some_and(|last| last >= term_id) {
            return Err(LoupeError::index(format!(
                "words table entries out of order at term {term_id:#x}"
            )));
        }
        self.hasher.update(&term_id.to_le_bytes());
        self.hasher.update(&offset.to_le_bytes());
        self.out.write_u64(term_id)?;
        self.out.write_u64(offset)?;
        self.last_term = Some(term_id);
        self.count += 1;
        Ok(())
    }

    pub fn len(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn finish(mut self) -> Result<W> {
        self.out.write_u64(self.count)?;
        self.out.write_u32(self.hasher.finalize())?;
        self.out.write_u32(WORDS_VERSION)?;
        self.out.write_raw(WORDS_MAGIC)?;
        self.out.into_inner()
    }
}

/// Validated, memory-mapped words table.
#[derive(Debug, Clone)]
pub struct WordsTable {
    file: Arc<MappedFile>,
    count: usize,
}

impl WordsTable {
    /// Check the footer, size and checksum.
    pub fn open(file: Arc<MappedFile>) -> Result<Self> {
        let data = file.as_slice();
        let name = file.path().display();
        if data.len() < WORDS_FOOTER_SIZE {
            return Err(LoupeError::corruption(format!(
                "{name}: {} bytes is too short for a words table",
                data.len()
            )));
        }

        let footer = data.len() - WORDS_FOOTER_SIZE;
        if &data[footer + 16..] != WORDS_MAGIC {
            return Err(LoupeError::corruption(format!("{name}: bad magic")));
        }
        let version = file.u32_at(footer + 12).unwrap_or_default();
        if version != WORDS_VERSION {
            return Err(LoupeError::corruption(format!(
                "{name}: unsupported version {version}"
            )));
        }

        let count = file.u64_at(footer).unwrap_or_default() as usize;
        if count.checked_mul(WORDS_ENTRY_SIZE) != Some(footer) {
            return Err(LoupeError::corruption(format!(
                "{name}: footer claims {count} entries in {footer} bytes"
            )));
        }

        let expected = file.u32_at(footer + 8).unwrap_or_default();
        if crc32fast::hash(&data[..footer]) != expected {
            return Err(LoupeError::corruption(format!("{name}: checksum mismatch")));
        }

        Ok(WordsTable { file, count })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn term_at(&self, index: usize) -> u64 {
        self.file.u64_at(index * WORDS_ENTRY_SIZE).unwrap_or_default()
    }

    /// Offset of the term's posting list in the docs file.
    pub fn lookup(&self, term_id: u64) -> Option<u64> {
        let (mut lo, mut hi) = (0, self.count);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.term_at(mid).cmp(&term_id) {
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
                std::cmp::Ordering::Equal => {
                    return self.file.u64_at(mid * WORDS_ENTRY_SIZE + 8);
                }
            }
        }
        None
    }

    /// All `(term_id, offset)` pairs in term order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        (0..self.count).map(move |i| {
            (
                self.term_at(i),
                self.file.u64_at(i * WORDS_ENTRY_SIZE + 8).unwrap_or_default(),
            )
        })
    }
}
