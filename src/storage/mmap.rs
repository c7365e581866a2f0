//! Memory-mapped files.
//!
//! A [`MappedFile`] owns its mapping; the region is unmapped when the last
//! owner drops it. Readers share mappings through `Arc<MappedFile>`.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use log::debug;
use memmap2::{Mmap, MmapMut, MmapOptions};

use crate::error::{LoupeError, Result};

/// Expected access pattern, forwarded to the kernel where supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPattern {
    /// Data will be touched soon; prefetch it.
    WillNeed,
    /// Lookups jump around; disable readahead.
    Random,
    /// Data is scanned front to back.
    Sequential,
}

/// A read-only mapping of an entire file.
#[derive(Debug)]
pub struct MappedFile {
    path: PathBuf,
    mmap: Option<Mmap>,
}

impl MappedFile {
    /// Map `path` read-only. Empty files map to an empty slice.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let len = file.metadata()?.len();

        let mmap = if len == 0 {
            None
        } else {
            // The index files are immutable once published and are only
            // replaced by rename, so the mapped inode never changes under us.
            Some(unsafe { MmapOptions::new().map(&file)? })
        };

        Ok(MappedFile { path, mmap })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn as_slice(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Little-endian `u64` at a byte offset, if in bounds.
    pub fn u64_at(&self, offset: usize) -> Option<u64> {
        let bytes = self.as_slice().get(offset..offset + 8)?;
        let mut word = [0u8; 8];
        word.copy_from_slice(bytes);
        Some(u64::from_le_bytes(word))
    }

    pub fn u32_at(&self, offset: usize) -> Option<u32> {
        let bytes = self.as_slice().get(offset..offset + 4)?;
        let mut word = [0u8; 4];
        word.copy_from_slice(bytes);
        Some(u32::from_le_bytes(word))
    }

    /// Number of whole `u64` words in the file.
    pub fn word_count(&self) -> usize {
        self.len() / 8
    }

    /// Hint the kernel about the access pattern. Failures are logged and ignored.
    pub fn advise(&self, pattern: AccessPattern) {
        #[cfg(unix)]
        if let Some(mmap) = &self.mmap {
            let advice = match pattern {
                AccessPattern::WillNeed => memmap2::Advice::WillNeed,
                AccessPattern::Random => memmap2::Advice::Random,
                AccessPattern::Sequential => memmap2::Advice::Sequential,
            };
            if let Err(e) = mmap.advise(advice) {
                debug!("madvise {:?} failed for {}: {e}", pattern, self.path.display());
            }
        }

        #[cfg(not(unix))]
        debug!("ignoring {:?} advice for {}", pattern, self.path.display());
    }
}

/// A writable, fixed-size mapping used to fill a file at random offsets.
pub struct MappedFileMut {
    path: PathBuf,
    _file: File,
    mmap: MmapMut,
}

impl MappedFileMut {
    /// Create (or truncate) `path` with `len` zeroed bytes and map it.
    pub fn create<P: AsRef<Path>>(path: P, len: u64) -> Result<Self> {
        if len == 0 {
            return Err(LoupeError::invalid_argument("cannot map an empty file for writing"));
        }

        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        file.set_len(len)?;

        // The file was just created by this process and is not shared.
        let mmap = unsafe { MmapOptions::new().map_mut(&file)? };

        Ok(MappedFileMut {
            path,
            _file: file,
            mmap,
        })
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Store a little-endian `u64` at word index `index`.
    pub fn put_u64(&mut self, index: usize, value: u64) {
        let offset = index * 8;
        self.mmap[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
    }

    pub fn get_u64(&self, index: usize) -> u64 {
        let offset = index * 8;
        let mut word = [0u8; 8];
        word.copy_from_slice(&self.mmap[offset..offset + 8]);
        u64::from_le_bytes(word)
    }

    /// Flush to disk and release the pages from the page cache.
    pub fn finish(self) -> Result<()> {
        self.mmap.flush()?;

        #[cfg(unix)]
        {
            // The mapping is dropped immediately after, so discarding the
            // clean pages cannot be observed through it.
            if let Err(e) = unsafe { self.mmap.unchecked_advise(memmap2::UncheckedAdvice::DontNeed) } {
                debug!("madvise DontNeed failed for {}: {e}", self.path.display());
            }
        }

        debug!("finished writing {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_map() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("words.dat");

        let mut out = MappedFileMut::create(&path, 24).unwrap();
        out.put_u64(0, 1);
        out.put_u64(2, u64::MAX);
        assert_eq!(out.get_u64(2), u64::MAX);
        out.finish().unwrap();

        let mapped = MappedFile::open(&path).unwrap();
        mapped.advise(AccessPattern::WillNeed);
        assert_eq!(mapped.word_count(), 3);
        assert_eq!(mapped.u64_at(0), Some(1));
        assert_eq!(mapped.u64_at(8), Some(0));
        assert_eq!(mapped.u64_at(16), Some(u64::MAX));
        assert_eq!(mapped.u64_at(17), None);
        assert_eq!(mapped.u32_at(0), Some(1));
    }

    #[test]
    fn test_empty_file_maps_to_empty_slice() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.dat");
        std::fs::write(&path, b"").unwrap();

        let mapped = MappedFile::open(&path).unwrap();
        assert!(mapped.is_empty());
        assert_eq!(mapped.u64_at(0), None);
        mapped.advise(AccessPattern::Random);
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(MappedFile::open(dir.path().join("nope")).is_err());
        assert!(MappedFileMut::create(dir.path().join("zero"), 0).is_err());
    }
}
