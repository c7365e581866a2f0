//! Forward index construction from the journal.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use ahash::AHashMap;
use log::{info, warn};

use crate::codec::metadata::DocumentMetadata;
use crate::error::{LoupeError, Result};
use crate::forward::spans::SpansWriter;
use crate::forward::{
    DOC_DATA_FILE, DOC_IDS_FILE, DOMAIN_OFFSET, DOMAIN_RANKS_FILE, ENTRY_SIZE, FEATURES_OFFSET,
    METADATA_OFFSET, SPANS_FILE, SPANS_OFFSET,
};
use crate::journal::JournalReader;
use crate::progress::ProgressSink;
use crate::ranking::DomainRankings;
use crate::storage::mmap::MappedFileMut;
use crate::storage::structured::StructWriter;
use crate::util::id;

const TASK_NAME: &str = "forwardIndexConverter";

/// Phases reported while the forward index is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardIndexStep {
    GetDocIds,
    GatherOffsets,
    SupplementalIndexes,
    Force,
    DomainMetadata,
    Finished,
}

impl ForwardIndexStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForwardIndexStep::GetDocIds => "GET_DOC_IDS",
            ForwardIndexStep::GatherOffsets => "GATHER_OFFSETS",
            ForwardIndexStep::SupplementalIndexes => "SUPPLEMENTAL_INDEXES",
            ForwardIndexStep::Force => "FORCE",
            ForwardIndexStep::DomainMetadata => "DOMAIN_METADATA",
            ForwardIndexStep::Finished => "FINISHED",
        }
    }
}

/// Builds the forward index files of one generation.
pub struct ForwardIndexConverter<'a> {
    journal: &'a JournalReader,
    output_dir: PathBuf,
    rankings: &'a dyn DomainRankings,
    progress: &'a dyn ProgressSink,
}

fn tmp_name(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.tmp"))
}

impl<'a> ForwardIndexConverter<'a> {
    pub fn new<P: Into<PathBuf>>(
        journal: &'a JournalReader,
        output_dir: P,
        rankings: &'a dyn DomainRankings,
        progress: &'a dyn ProgressSink,
    ) -> Self {
        ForwardIndexConverter {
            journal,
            output_dir: output_dir.into(),
            rankings,
            progress,
        }
    }

    fn step(&self, step: ForwardIndexStep) {
        self.progress.progress(TASK_NAME, step.as_str());
    }

    /// Build the index. Returns `false` without writing anything if the journal is empty.
    pub fn convert(&self) -> Result<bool> {
        if self.journal.is_empty()? {
            warn!("Bailing: journal is empty, no forward index written");
            return Ok(false);
        }

        fs::create_dir_all(&self.output_dir)?;
        let dir = self.output_dir.as_path();

        self.step(ForwardIndexStep::GetDocIds);
        let doc_ids = self.collect_doc_ids()?;
        self.write_doc_ids(&tmp_name(dir, DOC_IDS_FILE), &doc_ids)?;

        let ordinals: AHashMap<u64, usize> = doc_ids
            .iter()
            .enumerate()
            .map(|(ordinal, &doc_id)| (doc_id, ordinal))
            .collect();

        self.step(ForwardIndexStep::GatherOffsets);
        let mut data = MappedFileMut::create(
            tmp_name(dir, DOC_DATA_FILE),
            (doc_ids.len() * ENTRY_SIZE * 8) as u64,
        )?;
        let mut spans = SpansWriter::create(tmp_name(dir, SPANS_FILE))?;
        let mut domain_ranks: BTreeMap<u32, u32> = BTreeMap::new();

        self.journal.for_each_entry(|entry| {
            let doc_id = entry.header.combined_id;
            let ordinal = *ordinals
                .get(&doc_id)
                .ok_or_else(|| LoupeError::index(format!("document {doc_id} vanished between passes")))?;

            let domain_id = id::get_domain_id(doc_id);
            let rank = *domain_ranks
                .entry(domain_id)
                .or_insert_with(|| self.rankings.ranking(domain_id));

            let base = ordinal * ENTRY_SIZE;
            let features = entry.header.document_features as u64
                | ((entry.header.document_size as u64) << 32);

            data.put_u64(
                base + METADATA_OFFSET,
                DocumentMetadata::encode_rank(entry.header.document_meta, rank),
            );
            data.put_u64(base + FEATURES_OFFSET, features);
            data.put_u64(base + DOMAIN_OFFSET, domain_id as u64);
            data.put_u64(base + SPANS_OFFSET, spans.write_record(&entry.data.spans)?);
            Ok(())
        })?;

        self.step(ForwardIndexStep::SupplementalIndexes);
        spans.finish()?;

        self.step(ForwardIndexStep::Force);
        data.finish()?;

        self.step(ForwardIndexStep::DomainMetadata);
        let ranks_json = serde_json::to_vec(&domain_ranks)?;
        fs::write(tmp_name(dir, DOMAIN_RANKS_FILE), ranks_json)?;

        for name in [DOC_IDS_FILE, DOC_DATA_FILE, SPANS_FILE, DOMAIN_RANKS_FILE] {
            fs::rename(tmp_name(dir, name), dir.join(name))?;
        }

        self.step(ForwardIndexStep::Finished);
        info!(
            "forward index written to {}: {} documents, {} domains",
            dir.display(),
            doc_ids.len(),
            domain_ranks.len()
        );
        Ok(true)
    }

    fn collect_doc_ids(&self) -> Result<Vec<u64>> {
        let mut doc_ids = Vec::new();
        self.journal.for_each_entry(|entry| {
            let doc_id = entry.header.combined_id;
            assert!(
                id::is_clean(doc_id),
                "journal record carries ranked document id {doc_id:#x}"
            );
            doc_ids.push(doc_id);
            Ok(())
        })?;

        doc_ids.sort_unstable();
        let before = doc_ids.len();
        doc_ids.dedup();
        if doc_ids.len() != before {
            warn!(
                "journal holds {} duplicate document records; the last one wins",
                before - doc_ids.len()
            );
        }
        Ok(doc_ids)
    }

    fn write_doc_ids(&self, path: &Path, doc_ids: &[u64]) -> Result<()> {
        let mut writer = StructWriter::new(BufWriter::new(File::create(path)?));
        for &doc_id in doc_ids {
            writer.write_u64(doc_id)?;
        }
        let file = writer.into_inner()?.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(())
    }
}
