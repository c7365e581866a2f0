//! Journal writers.

use std::fs::{self, File};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use zstd::stream::write::Encoder;

use crate::config::JournalConfig;
use crate::error::{LoupeError, Result};
use crate::journal::JOURNAL_HEADER_SIZE;
use crate::journal::entry::{JournalEntryData, JournalEntryHeader, encode_record};
use crate::storage::structured::StructWriter;

/// Counts reported when a journal is closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JournalSummary {
    pub records: u64,
    pub postings: u64,
    pub pages: u32,
}

/// Path of page `page` in a journal directory.
pub fn page_path(dir: &Path, page: u32) -> PathBuf {
    dir.join(format!("index-journal.{page:04}.dat"))
}

/// Single-file journal writer.
///
/// Records are staged in an in-memory buffer and handed to the compressor a
/// whole buffer at a time; a record is never split across two flushes.
pub struct JournalWriter {
    path: PathBuf,
    encoder: Option<Encoder<'static, BufWriter<File>>>,
    buffer: Vec<u8>,
    buffer_size: usize,
    scratch: Vec<u8>,
    records: u64,
    postings: u64,
}

impl JournalWriter {
    /// Create the file and reserve its header.
    pub fn create<P: AsRef<Path>>(path: P, config: &JournalConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = BufWriter::new(File::create(&path)?);
        file.write_all(&[0u8; JOURNAL_HEADER_SIZE as usize])?;

        let encoder = Encoder::new(file, config.compression_level)?;
        debug!("opened journal {}", path.display());

        Ok(JournalWriter {
            path,
            encoder: Some(encoder),
            buffer: Vec::with_capacity(config.buffer_size),
            buffer_size: config.buffer_size,
            scratch: Vec::new(),
            records: 0,
            postings: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    /// Append one record.
    pub fn put(&mut self, header: &JournalEntryHeader, data: &JournalEntryData) -> Result<()> {
        self.scratch.clear();
        encode_record(header, data, &mut self.scratch)?;

        if self.buffer.len() + self.scratch.len() > self.buffer_size {
            self.flush_buffer()?;
        }

        if self.scratch.len() > self.buffer_size {
            let encoder = self
                .encoder
                .as_mut()
                .ok_or_else(|| LoupeError::invalid_operation("journal writer is closed"))?;
            encoder.write_all(&self.scratch)?;
        } else {
            self.buffer.extend_from_slice(&self.scratch);
        }

        self.records += 1;
        self.postings += data.terms.len() as u64;
        Ok(())
    }

    fn flush_buffer(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| LoupeError::invalid_operation("journal writer is closed"))?;
        encoder.write_all(&self.buffer)?;
        self.buffer.clear();
        Ok(())
    }

    /// Finish the compressed stream, write the real header and sync.
    pub fn close(mut self) -> Result<JournalSummary> {
        self.finish()
    }

    fn finish(&mut self) -> Result<JournalSummary> {
        self.flush_buffer()?;

        let encoder = self
            .encoder
            .take()
            .ok_or_else(|| LoupeError::invalid_operation("journal writer is closed"))?;
        let writer = encoder.finish()?;
        let mut file = writer.into_inner().map_err(|e| e.into_error())?;

        file.seek(SeekFrom::Start(0))?;
        let mut header = StructWriter::new(&mut file);
        header.write_u64(self.records)?;
        header.write_u64(self.postings)?;
        file.sync_all()?;

        debug!(
            "closed journal {} with {} records, {} postings",
            self.path.display(),
            self.records,
            self.postings
        );

        Ok(JournalSummary {
            records: self.records,
            postings: self.postings,
            pages: 1,
        })
    }
}

impl Drop for JournalWriter {
    fn drop(&mut self) {
        if self.encoder.is_some()
            && let Err(e) = self.finish()
        {
            warn!("failed to finalize journal {}: {e}", self.path.display());
        }
    }
}

/// Journal writer that rolls to a new page every `records_per_page` records.
pub struct PagingJournalWriter {
    dir: PathBuf,
    config: JournalConfig,
    page: u32,
    current: Option<JournalWriter>,
    summary: JournalSummary,
}

impl PagingJournalWriter {
    /// Open page 0 in `dir`, creating the directory if needed.
    pub fn create<P: AsRef<Path>>(dir: P, config: &JournalConfig) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let current = JournalWriter::create(page_path(&dir, 0), config)?;
        Ok(PagingJournalWriter {
            dir,
            config: config.clone(),
            page: 0,
            current: Some(current),
            summary: JournalSummary::default(),
        })
    }

    pub fn put(&mut self, header: &JournalEntryHeader, data: &JournalEntryData) -> Result<()> {
        let needs_roll = match &self.current {
            Some(writer) => writer.records() >= self.config.records_per_page,
            None => return Err(LoupeError::invalid_operation("journal writer is closed")),
        };

        if needs_roll {
            self.roll()?;
        }

        match self.current.as_mut() {
            Some(writer) => writer.put(header, data),
            None => Err(LoupeError::invalid_operation("journal writer is closed")),
        }
    }

    fn roll(&mut self) -> Result<()> {
        if let Some(writer) = self.current.take() {
            self.accumulate(writer.close()?);
        }
        self.page += 1;
        debug!("rolling journal to page {}", self.page);
        self.current = Some(JournalWriter::create(
            page_path(&self.dir, self.page),
            &self.config,
        )?);
        Ok(())
    }

    fn accumulate(&mut self, page: JournalSummary) {
        self.summary.records += page.records;
        self.summary.postings += page.postings;
        self.summary.pages += page.pages;
    }

    pub fn close(mut self) -> Result<JournalSummary> {
        if let Some(writer) = self.current.take() {
            let page = writer.close()?;
            self.accumulate(page);
        }
        info!(
            "journal {} written: {} records in {} pages",
            self.dir.display(),
            self.summary.records,
            self.summary.pages
        );
        Ok(self.summary)
    }
}
