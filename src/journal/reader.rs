//! Journal readers.

use std::fs::{self, File};
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};
use zstd::stream::read::Decoder;

use crate::error::{LoupeError, Result};
use crate::journal::JOURNAL_HEADER_SIZE;
use crate::journal::entry::{JournalEntry, decode_record};
use crate::storage::structured::StructReader;

/// Predicate over `(term_id, posting meta byte)`.
pub type PostingFilter = Arc<dyn Fn(u64, u8) -> bool + Send + Sync>;

/// Fixed header at the start of every page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JournalFileHeader {
    pub record_count: u64,
    pub posting_count: u64,
}

/// Read a page header. Pages shorter than the header are empty: `None`.
pub fn read_header(path: &Path) -> Result<Option<JournalFileHeader>> {
    let len = fs::metadata(path)?.len();
    if len < JOURNAL_HEADER_SIZE {
        warn!("journal page {} is empty ({len} bytes)", path.display());
        return Ok(None);
    }

    let mut reader = StructReader::new(File::open(path)?);
    Ok(Some(JournalFileHeader {
        record_count: reader.read_u64()?,
        posting_count: reader.read_u64()?,
    }))
}

/// Replays one or more journal pages in order.
#[derive(Clone)]
pub struct JournalReader {
    pages: Vec<PathBuf>,
    filter: Option<PostingFilter>,
}

impl std::fmt::Debug for JournalReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalReader")
            .field("pages", &self.pages)
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

impl JournalReader {
    /// Reader over a single journal file.
    pub fn open_file<P: AsRef<Path>>(path: P) -> Self {
        JournalReader {
            pages: vec![path.as_ref().to_path_buf()],
            filter: None,
        }
    }

    /// Reader over every `index-journal.NNNN.dat` page in `dir`, in page order.
    ///
    /// A missing directory yields an empty reader.
    pub fn open_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.exists() {
            warn!("journal directory {} does not exist", dir.display());
            return Ok(JournalReader {
                pages: Vec::new(),
                filter: None,
            });
        }

        let mut pages: Vec<(u32, PathBuf)> = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let page = name
                .strip_prefix("index-journal.")
                .and_then(|rest| rest.strip_suffix(".dat"))
                .and_then(|n| n.parse::<u32>().ok());
            if let Some(page) = page {
                pages.push((page, path));
            }
        }
        pages.sort_by_key(|(page, _)| *page);

        debug!("found {} journal pages in {}", pages.len(), dir.display());
        Ok(JournalReader {
            pages: pages.into_iter().map(|(_, p)| p).collect(),
            filter: None,
        })
    }

    /// Restrict postings to those accepted by `filter`.
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(u64, u8) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Restrict postings by their metadata byte only.
    pub fn with_meta_filter<F>(self, filter: F) -> Self
    where
        F: Fn(u8) -> bool + Send + Sync + 'static,
    {
        self.with_filter(move |_, meta| filter(meta))
    }

    pub fn pages(&self) -> &[PathBuf] {
        &self.pages
    }

    /// A reader over page `index` only, keeping the filter.
    pub fn page(&self, index: usize) -> Option<JournalReader> {
        self.pages.get(index).map(|p| JournalReader {
            pages: vec![p.clone()],
            filter: self.filter.clone(),
        })
    }

    /// Total records across all pages.
    pub fn record_count(&self) -> Result<u64> {
        let mut total = 0;
        for page in &self.pages {
            if let Some(header) = read_header(page)? {
                total += header.record_count;
            }
        }
        Ok(total)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.record_count()? == 0)
    }

    /// Iterate every record of every page.
    pub fn entries(&self) -> JournalEntries {
        JournalEntries {
            pages: self.pages.clone(),
            next_page: 0,
            cursor: None,
            filter: self.filter.clone(),
            failed: false,
        }
    }

    /// Visit every record, stopping at the first error.
    pub fn for_each_entry<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(JournalEntry) -> Result<()>,
    {
        for entry in self.entries() {
            f(entry?)?;
        }
        Ok(())
    }
}

struct PageCursor {
    path: PathBuf,
    reader: StructReader<Decoder<'static, BufReader<File>>>,
    remaining: u64,
    total: u64,
}

/// Iterator over journal records. Yields an error once and then stops.
pub struct JournalEntries {
    pages: Vec<PathBuf>,
    next_page: usize,
    cursor: Option<PageCursor>,
    filter: Option<PostingFilter>,
    failed: bool,
}

impl JournalEntries {
    fn open_next_page(&mut self) -> Result<bool> {
        while self.next_page < self.pages.len() {
            let path = self.pages[self.next_page].clone();
            self.next_page += 1;

            let Some(header) = read_header(&path)? else {
                continue;
            };
            if header.record_count == 0 {
                continue;
            }

            let mut file = File::open(&path)?;
            let mut skip = [0u8; JOURNAL_HEADER_SIZE as usize];
            file.read_exact(&mut skip)?;

            self.cursor = Some(PageCursor {
                path,
                reader: StructReader::new(Decoder::new(file)?),
                remaining: header.record_count,
                total: header.record_count,
            });
            return Ok(true);
        }
        Ok(false)
    }

    fn next_entry(&mut self) -> Result<Option<JournalEntry>> {
        loop {
            if let Some(cursor) = self.cursor.as_mut() {
                if cursor.remaining > 0 {
                    let entry = match &self.filter {
                        Some(filter) => decode_record(&mut cursor.reader, |t, m| filter(t, m)),
                        None => decode_record(&mut cursor.reader, |_, _| true),
                    };
                    let entry = entry.map_err(|e| match e {
                        LoupeError::Io(io) if io.kind() == ErrorKind::UnexpectedEof => {
                            LoupeError::corruption(format!(
                                "journal {} ended after {} of {} records",
                                cursor.path.display(),
                                cursor.total - cursor.remaining,
                                cursor.total
                            ))
                        }
                        LoupeError::Io(io) => LoupeError::corruption(format!(
                            "journal {} is unreadable: {io}",
                            cursor.path.display()
                        )),
                        other => other,
                    })?;
                    cursor.remaining -= 1;
                    return Ok(Some(entry));
                }
                self.cursor = None;
            }

            if !self.open_next_page()? {
                return Ok(None);
            }
        }
    }
}

impl Iterator for JournalEntries {
    type Item = Result<JournalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_entry() {
            Ok(entry) => entry.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
