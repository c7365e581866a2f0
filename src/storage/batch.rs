//! Batched positional reads.
//!
//! Callers hand over a set of destination buffers (pre-sized to the number
//! of bytes wanted) and one file offset per buffer; implementations fill as
//! many as they can and report how many were completed.

use std::fs::File;
use std::path::Path;

use log::warn;
use rayon::prelude::*;

use crate::error::{LoupeError, Result};
use crate::storage::mmap::MappedFile;

/// Fill several buffers from several offsets of one file.
pub trait BatchRead: Send + Sync {
    /// Read `destinations[i].len()` bytes at `offsets[i]` into each destination.
    ///
    /// Returns the number of destinations filled completely. A destination that
    /// would extend past the end of the data is left untouched and not counted.
    fn read_batch(&self, destinations: &mut [Vec<u8>], offsets: &[u64]) -> Result<usize>;
}

/// Positional (`pread`) reader over an open file, reading in parallel.
#[derive(Debug)]
pub struct PositionalReader {
    file: File,
    len: u64,
}

impl PositionalReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(PositionalReader { file, len })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            self.file.read_exact_at(buf, offset)
        }

        #[cfg(windows)]
        {
            use std::os::windows::fs::FileExt;
            let mut done = 0;
            while done < buf.len() {
                let n = self.file.seek_read(&mut buf[done..], offset + done as u64)?;
                if n == 0 {
                    return Err(std::io::ErrorKind::UnexpectedEof.into());
                }
                done += n;
            }
            Ok(())
        }
    }
}

fn check_lengths(destinations: &[Vec<u8>], offsets: &[u64]) -> Result<()> {
    if destinations.len() != offsets.len() {
        return Err(LoupeError::invalid_argument(format!(
            "batch read with {} destinations but {} offsets",
            destinations.len(),
            offsets.len()
        )));
    }
    Ok(())
}

impl BatchRead for PositionalReader {
    fn read_batch(&self, destinations: &mut [Vec<u8>], offsets: &[u64]) -> Result<usize> {
        check_lengths(destinations, offsets)?;

        let completed: usize = destinations
            .par_iter_mut()
            .zip(offsets.par_iter())
            .filter(|(dst, offset)| **offset + dst.len() as u64 <= self.len)
            .map(|(dst, &offset)| match self.read_at(dst, offset) {
                Ok(()) => 1,
                Err(e) => {
                    warn!("batch read at offset {offset} failed: {e}");
                    0
                }
            })
            .sum();

        Ok(completed)
    }
}

impl BatchRead for MappedFile {
    fn read_batch(&self, destinations: &mut [Vec<u8>], offsets: &[u64]) -> Result<usize> {
        check_lengths(destinations, offsets)?;

        let data = self.as_slice();
        let mut completed = 0;
        for (dst, &offset) in destinations.iter_mut().zip(offsets) {
            let start = offset as usize;
            if let Some(src) = data.get(start..start + dst.len()) {
                dst.copy_from_slice(src);
                completed += 1;
            }
        }
        Ok(completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("batch.dat");
        let data: Vec<u8> = (0..=255u8).collect();
        std::fs::write(&path, data).unwrap();
        (dir, path)
    }

    #[test]
    fn test_positional_batch() {
        let (_dir, path) = fixture();
        let reader = PositionalReader::open(&path).unwrap();

        let mut dests = vec![vec![0u8; 4], vec![0u8; 2], vec![0u8; 8]];
        let count = reader.read_batch(&mut dests, &[10, 254, 252]).unwrap();

        assert_eq!(count, 2);
        assert_eq!(dests[0], vec![10, 11, 12, 13]);
        assert_eq!(dests[1], vec![254, 255]);
        assert_eq!(dests[2], vec![0u8; 8]);
    }

    #[test]
    fn test_mapped_batch_matches_positional() {
        let (_dir, path) = fixture();
        let mapped = MappedFile::open(&path).unwrap();

        let mut dests = vec![vec![0u8; 3], vec![0u8; 1]];
        let count = mapped.read_batch(&mut dests, &[100, 0]).unwrap();
        assert_eq!(count, 2);
        assert_eq!(dests[0], vec![100, 101, 102]);
        assert_eq!(dests[1], vec![0]);
    }

    #[test]
    fn test_mismatched_lengths() {
        let (_dir, path) = fixture();
        let reader = PositionalReader::open(&path).unwrap();
        let mut dests = vec![vec![0u8; 1]];
        assert!(reader.read_batch(&mut dests, &[]).is_err());
    }
}
