//! Reverse index construction.
//!
//! Each journal page is turned into a sorted *preindex* segment in a scratch
//! directory; the segments are then k-way merged into the final docs and
//! words files of the tier.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::error::Result;
use crate::journal::JournalReader;
use crate::progress::ProgressSink;
use crate::ranking::DomainRankings;
use crate::reverse::IndexTier;
use crate::reverse::skiplist::{PostingRecord, write_posting_list};
use crate::reverse::words::WordsWriter;
use crate::storage::structured::{StructReader, StructWriter};
use crate::util::id;

const TASK_NAME: &str = "reverseIndexConstructor";

/// Phases reported while a reverse index tier is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReverseIndexStep {
    ConstructPreindex,
    MergePreindex,
    WriteWords,
    Force,
    Finished,
}

impl ReverseIndexStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReverseIndexStep::ConstructPreindex => "CONSTRUCT_PREINDEX",
            ReverseIndexStep::MergePreindex => "MERGE_PREINDEX",
            ReverseIndexStep::WriteWords => "WRITE_WORDS",
            ReverseIndexStep::Force => "FORCE",
            ReverseIndexStep::Finished => "FINISHED",
        }
    }
}

/// Maps journal document ids to the ids stored in posting lists.
#[derive(Clone, Copy)]
pub enum DocIdRewriter<'a> {
    Identity,
    /// Encode the domain's ranking into the id so lists sort best-first.
    Ranked(&'a dyn DomainRankings),
}

impl DocIdRewriter<'_> {
    pub fn rewrite(&self, doc_id: u64) -> u64 {
        match self {
            DocIdRewriter::Identity => doc_id,
            DocIdRewriter::Ranked(rankings) => {
                id::with_rank(doc_id, rankings.ranking(id::get_domain_id(doc_id)))
            }
        }
    }
}

/// A posting tagged with its term, as held in a preindex segment.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SegmentRecord {
    term_id: u64,
    posting: PostingRecord,
}

/// Sequential reader over one spilled preindex segment.
struct SegmentReader {
    reader: StructReader<BufReader<File>>,
    remaining: u64,
}

impl SegmentReader {
    fn open(path: &Path) -> Result<Self> {
        let mut reader = StructReader::new(BufReader::new(File::open(path)?));
        let remaining = reader.read_u64()?;
        Ok(SegmentReader { reader, remaining })
    }

    fn next_record(&mut self) -> Result<Option<SegmentRecord>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        let term_id = self.reader.read_u64()?;
        let doc_id = self.reader.read_u64()?;
        let meta = self.reader.read_u8()?;
        let positions = self.reader.read_bytes()?;
        Ok(Some(SegmentRecord {
            term_id,
            posting: PostingRecord {
                doc_id,
                meta,
                positions,
            },
        }))
    }
}

/// Builds one tier of the reverse index from the journal.
pub struct ReverseIndexConstructor<'a> {
    journal: JournalReader,
    tier: IndexTier,
    output_dir: PathBuf,
    rewriter: DocIdRewriter<'a>,
    block_size: usize,
    progress: &'a dyn ProgressSink,
}

fn tmp_name(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.tmp"))
}

impl<'a> ReverseIndexConstructor<'a> {
    pub fn new<P: Into<PathBuf>>(
        journal: &JournalReader,
        tier: IndexTier,
        output_dir: P,
        rewriter: DocIdRewriter<'a>,
        progress: &'a dyn ProgressSink,
    ) -> Self {
        let journal = journal
            .clone()
            .with_meta_filter(move |meta| tier.accepts(meta));
        ReverseIndexConstructor {
            journal,
            tier,
            output_dir: output_dir.into(),
            rewriter,
            block_size: crate::config::ReverseIndexConfig::default().block_size,
            progress,
        }
    }

    /// Postings per skip-list block.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(2);
        self
    }

    fn step(&self, step: ReverseIndexStep) {
        self.progress
            .progress(&format!("{TASK_NAME}[{}]", self.tier.name()), step.as_str());
    }

    /// Build the tier. Returns `false` without writing anything if the journal is empty.
    pub fn construct(&self) -> Result<bool> {
        if self.journal.is_empty()? {
            warn!(
                "Bailing: journal is empty, no {} reverse index written",
                self.tier.name()
            );
            return Ok(false);
        }

        fs::create_dir_all(&self.output_dir)?;
        let dir = self.output_dir.as_path();
        let scratch = tempfile::Builder::new()
            .prefix("preindex-")
            .tempdir_in(dir)?;

        self.step(ReverseIndexStep::ConstructPreindex);
        let mut segments = Vec::with_capacity(self.journal.pages().len());
        for (page_no, page) in (0..self.journal.pages().len())
            .filter_map(|i| self.journal.page(i))
            .enumerate()
        {
            let path = scratch.path().join(format!("segment-{page_no:04}.dat"));
            let postings = self.write_segment(&page, &path)?;
            debug!("preindex segment {page_no}: {postings} postings");
            segments.push(path);
        }

        self.step(ReverseIndexStep::MergePreindex);
        let docs_tmp = tmp_name(dir, &self.tier.docs_file());
        let words_tmp = tmp_name(dir, &self.tier.words_file());
        let mut docs = StructWriter::new(BufWriter::new(File::create(&docs_tmp)?));
        let mut words = WordsWriter::new(BufWriter::new(File::create(&words_tmp)?));
        let postings = self.merge_segments(&segments, &mut docs, &mut words)?;

        self.step(ReverseIndexStep::WriteWords);
        let terms = words.len();
        let words_file = words.finish()?.into_inner().map_err(|e| e.into_error())?;

        self.step(ReverseIndexStep::Force);
        let docs_file = docs.into_inner()?.into_inner().map_err(|e| e.into_error())?;
        docs_file.sync_all()?;
        words_file.sync_all()?;
        drop(scratch);

        fs::rename(&docs_tmp, dir.join(self.tier.docs_file()))?;
        fs::rename(&words_tmp, dir.join(self.tier.words_file()))?;

        self.step(ReverseIndexStep::Finished);
        info!(
            "{} reverse index written to {}: {terms} terms, {postings} postings",
            self.tier.name(),
            dir.display()
        );
        Ok(true)
    }

    /// Sort one page's postings by `(term, doc)` and spill them.
    fn write_segment(&self, page: &JournalReader, path: &Path) -> Result<u64> {
        let mut records = Vec::new();
        page.for_each_entry(|entry| {
            let doc_id = self.rewriter.rewrite(entry.header.combined_id);
            for term in entry.data.terms {
                records.push(SegmentRecord {
                    term_id: term.term_id,
                    posting: PostingRecord {
                        doc_id,
                        meta: term.meta,
                        positions: term.positions.into_bytes(),
                    },
                });
            }
            Ok(())
        })?;

        // Stable, so repeated records of one document keep journal order.
        records.sort_by_key(|r| (r.term_id, r.posting.doc_id));

        let mut out = StructWriter::new(BufWriter::new(File::create(path)?));
        out.write_u64(records.len() as u64)?;
        for record in &records {
            out.write_u64(record.term_id)?;
            out.write_u64(record.posting.doc_id)?;
            out.write_u8(record.posting.meta)?;
            out.write_bytes(&record.posting.positions)?;
        }
        out.flush()?;
        Ok(records.len() as u64)
    }

    /// Merge all segments into posting lists; returns the number of postings written.
    fn merge_segments(
        &self,
        segments: &[PathBuf],
        docs: &mut StructWriter<BufWriter<File>>,
        words: &mut WordsWriter<BufWriter<File>>,
    ) -> Result<u64> {
        let mut readers = segments
            .iter()
            .map(|p| SegmentReader::open(p))
            .collect::<Result<Vec<_>>>()?;

        let mut heads: Vec<Option<SegmentRecord>> = Vec::with_capacity(readers.len());
        let mut heap = BinaryHeap::new();
        for (index, reader) in readers.iter_mut().enumerate() {
            let head = reader.next_record()?;
            if let Some(record) = &head {
                heap.push(Reverse((record.term_id, record.posting.doc_id, index)));
            }
            heads.push(head);
        }

        let mut written = 0u64;
        let mut current_term = None;
        let mut group: Vec<PostingRecord> = Vec::new();

        while let Some(Reverse((term_id, _, index))) = heap.pop() {
            let Some(record) = heads[index].take() else {
                continue;
            };
            if let Some(next) = readers[index].next_record()? {
                heap.push(Reverse((next.term_id, next.posting.doc_id, index)));
                heads[index] = Some(next);
            }

            if current_term != Some(term_id) {
                if let Some(term) = current_term {
                    written += self.flush_group(term, &mut group, docs, words)?;
                }
                current_term = Some(term_id);
            }

            match group.last_mut() {
                Some(last) if last.doc_id == record.posting.doc_id => *last = record.posting,
                _ => group.push(record.posting),
            }
        }

        if let Some(term) = current_term {
            written += self.flush_group(term, &mut group, docs, words)?;
        }
        Ok(written)
    }

    fn flush_group(
        &self,
        term_id: u64,
        group: &mut Vec<PostingRecord>,
        docs: &mut StructWriter<BufWriter<File>>,
        words: &mut WordsWriter<BufWriter<File>>,
    ) -> Result<u64> {
        let offset = docs.position();
        write_posting_list(docs, group, self.block_size)?;
        words.add(term_id, offset)?;
        let count = group.len() as u64;
        group.clear();
        Ok(count)
    }
}
