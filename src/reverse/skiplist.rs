//! Checkpointed posting lists.
//!
//! ```text
//! [doc_count u32][block_count u32]
//! block_count x [last_doc_id u64][data_offset u32][first_index u32]
//! blocks, each:
//!   ids:      n x varint delta (first delta is from the previous block's last id)
//!   payloads: n x [meta u8][len varint][gamma-coded positions]
//! ```
//!
//! Every block holds up to `block_size` postings; its checkpoint records the
//! largest id in the block, so a lookup can skip whole blocks without
//! decoding them.

use std::io::Write;
use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::error;

use crate::error::{LoupeError, Result};
use crate::query::buffer::DocIdBuffer;
use crate::storage::mmap::MappedFile;
use crate::storage::structured::StructWriter;
use crate::util::varint;

pub const LIST_HEADER_SIZE: usize = 8;
pub const CHECKPOINT_SIZE: usize = 16;

/// One posting handed to the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingRecord {
    pub doc_id: u64,
    pub meta: u8,
    pub positions: Vec<u8>,
}

/// Serialize one posting list. Postings must be strictly ascending by id.
pub fn write_posting_list<W: Write>(
    out: &mut StructWriter<W>,
    postings: &[PostingRecord],
    block_size: usize,
) -> Result<()> {
    if postings.windows(2).any(|w| w[0].doc_id >= w[1].doc_id) {
        return Err(LoupeError::index("posting list is not strictly ascending"));
    }

    let mut data = Vec::new();
    let mut checkpoints = Vec::with_capacity(postings.len().div_ceil(block_size));
    let mut prev_last = 0u64;

    for (b, block) in postings.chunks(block_size).enumerate() {
        let offset = u32::try_from(data.len())
            .map_err(|_| LoupeError::index("posting list exceeds 4 GiB"))?;

        let mut prev = prev_last;
        for posting in block {
            varint::write_u64(&mut data, posting.doc_id - prev);
            prev = posting.doc_id;
        }
        for posting in block {
            data.push(posting.meta);
            varint::write_u64(&mut data, posting.positions.len() as u64);
            data.extend_from_slice(&posting.positions);
        }

        prev_last = prev;
        checkpoints.push((prev_last, offset, (b * block_size) as u32));
    }

    out.write_u32(postings.len() as u32)?;
    out.write_u32(checkpoints.len() as u32)?;
    for (last, offset, first_index) in checkpoints {
        out.write_u64(last)?;
        out.write_u32(offset)?;
        out.write_u32(first_index)?;
    }
    out.write_raw(&data)
}

fn u32_at(data: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(word)
}

fn u64_at(data: &[u8], offset: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(word)
}

/// Location and shape of one posting list inside a docs file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostingList {
    start: usize,
    doc_count: u32,
    block_count: u32,
}

#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    last_id: u64,
    offset: usize,
    first_index: u32,
}

impl PostingList {
    /// Validate the list header at `start`.
    pub fn parse(data: &[u8], start: usize) -> Result<Self> {
        if start + LIST_HEADER_SIZE > data.len() {
            return Err(LoupeError::corruption(format!(
                "posting list header at {start} is past the end of the docs file"
            )));
        }
        let doc_count = u32_at(data, start);
        let block_count = u32_at(data, start + 4);
        let list = PostingList {
            start,
            doc_count,
            block_count,
        };
        if list.data_start() > data.len() {
            return Err(LoupeError::corruption(format!(
                "posting list at {start} claims {block_count} checkpoints past the end of file"
            )));
        }
        Ok(list)
    }

    pub fn doc_count(&self) -> usize {
        self.doc_count as usize
    }

    pub fn block_count(&self) -> usize {
        self.block_count as usize
    }

    fn data_start(&self) -> usize {
        self.start + LIST_HEADER_SIZE + self.block_count as usize * CHECKPOINT_SIZE
    }

    fn checkpoint(&self, data: &[u8], block: usize) -> Checkpoint {
        let at = self.start + LIST_HEADER_SIZE + block * CHECKPOINT_SIZE;
        Checkpoint {
            last_id: u64_at(data, at),
            offset: self.data_start() + u32_at(data, at + 8) as usize,
            first_index: u32_at(data, at + 12),
        }
    }

    fn last_id(&self, data: &[u8], block: usize) -> u64 {
        self.checkpoint(data, block).last_id
    }

    fn block_len(&self, data: &[u8], block: usize) -> usize {
        let first = self.checkpoint(data, block).first_index;
        let next = if block + 1 < self.block_count() {
            self.checkpoint(data, block + 1).first_index
        } else {
            self.doc_count
        };
        next.saturating_sub(first) as usize
    }

    /// Decode the ids of `block` into `ids`; returns where the payloads begin.
    fn decode_ids(&self, data: &[u8], block: usize, ids: &mut Vec<u64>) -> Result<usize> {
        ids.clear();
        let checkpoint = self.checkpoint(data, block);
        let mut prev = if block == 0 {
            0
        } else {
            self.last_id(data, block - 1)
        };

        let mut pos = checkpoint.offset;
        for _ in 0..self.block_len(data, block) {
            let bytes = data
                .get(pos..)
                .ok_or_else(|| LoupeError::corruption("posting block past end of file"))?;
            let (delta, read) = varint::decode_u64(bytes)?;
            pos += read;
            prev += delta;
            ids.push(prev);
        }

        if ids.last().copied() != Some(checkpoint.last_id) {
            return Err(LoupeError::corruption(format!(
                "posting block {block} does not end at its checkpoint id"
            )));
        }
        Ok(pos)
    }

    /// Decode `(meta, byte range of positions)` for `count` postings starting at `pos`.
    fn decode_payloads(
        data: &[u8],
        mut pos: usize,
        count: usize,
        payloads: &mut Vec<(u8, Range<usize>)>,
    ) -> Result<()> {
        payloads.clear();
        for _ in 0..count {
            let meta = *data
                .get(pos)
                .ok_or_else(|| LoupeError::corruption("posting payload past end of file"))?;
            let (len, read) = varint::decode_u64(&data[pos + 1..])?;
            let start = pos + 1 + read;
            let end = start + len as usize;
            if end > data.len() {
                return Err(LoupeError::corruption("posting positions past end of file"));
            }
            payloads.push((meta, start..end));
            pos = end;
        }
        Ok(())
    }

    /// Decode every posting. Intended for diagnostics and tests.
    pub fn decode_all(&self, data: &[u8]) -> Result<Vec<PostingRecord>> {
        let mut out = Vec::with_capacity(self.doc_count());
        let mut ids = Vec::new();
        let mut payloads = Vec::new();
        for block in 0..self.block_count() {
            let payload_start = self.decode_ids(data, block, &mut ids)?;
            Self::decode_payloads(data, payload_start, ids.len(), &mut payloads)?;
            for (doc_id, (meta, range)) in ids.iter().zip(payloads.iter()) {
                out.push(PostingRecord {
                    doc_id: *doc_id,
                    meta: *meta,
                    positions: data[range.clone()].to_vec(),
                });
            }
        }
        Ok(out)
    }
}

/// Log2 histogram of how many blocks each checkpoint seek skipped.
#[derive(Debug, Default)]
pub struct SkipStats {
    buckets: [AtomicU64; 32],
}

impl SkipStats {
    pub fn record(&self, distance: usize) {
        if distance == 0 {
            return;
        }
        let bucket = (usize::BITS - distance.leading_zeros()) as usize - 1;
        self.buckets[bucket.min(31)].fetch_add(1, Ordering::Relaxed);
    }

    /// Counts per bucket; bucket `i` covers distances `2^i ..= 2^(i+1) - 1`.
    pub fn snapshot(&self) -> [u64; 32] {
        std::array::from_fn(|i| self.buckets[i].load(Ordering::Relaxed))
    }

    pub fn total(&self) -> u64 {
        self.snapshot().iter().sum()
    }
}

/// Stateful forward-only cursor over one posting list.
pub struct SkipListCursor {
    file: Arc<MappedFile>,
    list: PostingList,
    stats: Arc<SkipStats>,
    block: usize,
    loaded: Option<usize>,
    ids: Vec<u64>,
    payload_start: usize,
    payloads_loaded: Option<usize>,
    payloads: Vec<(u8, Range<usize>)>,
    pos: usize,
    last_target: Option<u64>,
}

impl SkipListCursor {
    pub fn new(file: Arc<MappedFile>, list: PostingList, stats: Arc<SkipStats>) -> Self {
        SkipListCursor {
            file,
            list,
            stats,
            block: 0,
            loaded: None,
            ids: Vec::new(),
            payload_start: 0,
            payloads_loaded: None,
            payloads: Vec::new(),
            pos: 0,
            last_target: None,
        }
    }

    pub fn doc_count(&self) -> usize {
        self.list.doc_count()
    }

    pub fn is_exhausted(&self) -> bool {
        self.block >= self.list.block_count()
    }

    /// Make sure the current block's ids are decoded.
    fn load(&mut self) -> bool {
        if self.is_exhausted() {
            return false;
        }
        if self.loaded == Some(self.block) {
            return true;
        }

        let data = self.file.as_slice();
        match self.list.decode_ids(data, self.block, &mut self.ids) {
            Ok(payload_start) => {
                self.payload_start = payload_start;
                self.loaded = Some(self.block);
                self.pos = 0;
                true
            }
            Err(e) => {
                error!("{} block {}: {e}", self.file.path().display(), self.block);
                self.block = self.list.block_count();
                false
            }
        }
    }

    fn load_payloads(&mut self) -> bool {
        if self.payloads_loaded == Some(self.block) {
            return true;
        }
        let data = self.file.as_slice();
        match PostingList::decode_payloads(data, self.payload_start, self.ids.len(), &mut self.payloads) {
            Ok(()) => {
                self.payloads_loaded = Some(self.block);
                true
            }
            Err(e) => {
                error!("{} block {}: {e}", self.file.path().display(), self.block);
                false
            }
        }
    }

    fn next_block(&mut self) {
        self.block += 1;
        self.pos = 0;
    }

    /// Position on the first id `>= target`. Returns `false` if none is left.
    fn seek(&mut self, target: u64) -> bool {
        // A query with several sources restarts from low ids.
        if self.last_target.is_some_and(|last| target < last) {
            self.block = 0;
            self.pos = 0;
        }
        self.last_target = Some(target);

        let block_count = self.list.block_count();
        if self.block >= block_count {
            return false;
        }

        let data = self.file.as_slice();
        if self.list.last_id(data, self.block) < target {
            // Gallop over checkpoints, then bisect the bracket.
            let mut lo = self.block;
            let mut step = 1;
            let hi = loop {
                let probe = self.block + step;
                if probe >= block_count || self.list.last_id(data, probe) >= target {
                    break probe.min(block_count);
                }
                lo = probe;
                step *= 2;
            };

            let (mut l, mut h) = (lo + 1, hi);
            while l < h {
                let mid = (l + h) / 2;
                if self.list.last_id(data, mid) >= target {
                    h = mid;
                } else {
                    l = mid + 1;
                }
            }

            self.stats.record(l - self.block);
            self.block = l;
            self.pos = 0;
            if self.block >= block_count {
                return false;
            }
        }

        if !self.load() {
            return false;
        }
        self.pos += self.ids[self.pos..].partition_point(|&v| v < target);
        self.pos < self.ids.len()
    }

    /// Append the next ids to `buffer`.
    pub fn read(&mut self, buffer: &mut DocIdBuffer) {
        while !buffer.is_full() && self.load() {
            self.pos += buffer.extend_from_slice(&self.ids[self.pos..]);
            if self.pos >= self.ids.len() {
                self.next_block();
            }
        }
    }

    /// Keep only the buffered ids present in this list.
    pub fn retain(&mut self, buffer: &mut DocIdBuffer) {
        while buffer.has_more() {
            let value = buffer.current_value();
            if !self.seek(value) {
                buffer.reject_all();
                break;
            }
            if self.ids[self.pos] == value {
                buffer.retain_and_advance();
            } else {
                buffer.reject_and_advance();
            }
        }
        buffer.finalize_filtering();
    }

    /// Drop the buffered ids present in this list.
    pub fn reject(&mut self, buffer: &mut DocIdBuffer) {
        while buffer.has_more() {
            let value = buffer.current_value();
            if !self.seek(value) {
                buffer.retain_all();
                break;
            }
            if self.ids[self.pos] == value {
                buffer.reject_and_advance();
            } else {
                buffer.retain_and_advance();
            }
        }
        buffer.finalize_filtering();
    }

    /// Metadata and raw positions for each of `sorted_ids` present in the list.
    pub fn term_data(&mut self, sorted_ids: &[u64]) -> Vec<Option<(u8, Vec<u8>)>> {
        let mut out = Vec::with_capacity(sorted_ids.len());
        for &doc_id in sorted_ids {
            if !self.seek(doc_id) || self.ids[self.pos] != doc_id || !self.load_payloads() {
                out.push(None);
                continue;
            }
            let (meta, range) = &self.payloads[self.pos];
            out.push(Some((*meta, self.file.as_slice()[range.clone()].to_vec())));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::sequence::{CodedSequence, GammaCodedSequence};
    use tempfile::TempDir;

    fn postings(ids: &[u64]) -> Vec<PostingRecord> {
        ids.iter()
            .map(|&doc_id| PostingRecord {
                doc_id,
                meta: (doc_id % 256) as u8,
                positions: GammaCodedSequence::generate(&[(doc_id % 100) as i32])
                    .unwrap()
                    .into_bytes(),
            })
            .collect()
    }

    fn write_file(dir: &TempDir, lists: &[Vec<u64>], block_size: usize) -> (Arc<MappedFile>, Vec<PostingList>) {
        let path = dir.path().join("docs.dat");
        let mut writer = StructWriter::new(Vec::new());
        let mut offsets = Vec::new();
        for ids in lists {
            offsets.push(writer.position() as usize);
            write_posting_list(&mut writer, &postings(ids), block_size).unwrap();
        }
        std::fs::write(&path, writer.into_inner().unwrap()).unwrap();

        let file = Arc::new(MappedFile::open(&path).unwrap());
        let parsed = offsets
            .iter()
            .map(|&o| PostingList::parse(file.as_slice(), o).unwrap())
            .collect();
        (file, parsed)
    }

    fn cursor(file: &Arc<MappedFile>, list: PostingList) -> SkipListCursor {
        SkipListCursor::new(file.clone(), list, Arc::new(SkipStats::default()))
    }

    #[test]
    fn test_decode_all_roundtrip() {
        let dir = TempDir::new().unwrap();
        let ids: Vec<u64> = (0..100).map(|i| i * 7 + 3).collect();
        let (file, lists) = write_file(&dir, &[ids.clone(), vec![42]], 8);

        assert_eq!(lists[0].doc_count(), 100);
        assert_eq!(lists[0].block_count(), 13);
        assert_eq!(lists[0].decode_all(file.as_slice()).unwrap(), postings(&ids));
        assert_eq!(lists[1].decode_all(file.as_slice()).unwrap(), postings(&[42]));
    }

    #[test]
    fn test_unsorted_list_rejected() {
        let mut writer = StructWriter::new(Vec::new());
        assert!(write_posting_list(&mut writer, &postings(&[3, 2]), 4).is_err());
        assert!(write_posting_list(&mut writer, &postings(&[3, 3]), 4).is_err());
    }

    #[test]
    fn test_read_through_small_buffer() {
        let dir = TempDir::new().unwrap();
        let ids: Vec<u64> = (1..=50).collect();
        let (file, lists) = write_file(&dir, &[ids.clone()], 4);

        let mut cursor = cursor(&file, lists[0]);
        let mut buffer = DocIdBuffer::new(7);
        let mut seen = Vec::new();
        while !cursor.is_exhausted() {
            buffer.reset();
            cursor.read(&mut buffer);
            seen.extend_from_slice(buffer.data());
        }
        assert_eq!(seen, ids);
    }

    #[test]
    fn test_retain_and_reject() {
        let dir = TempDir::new().unwrap();
        let multiples_of_3: Vec<u64> = (1..=300).filter(|i| i % 3 == 0).collect();
        let (file, lists) = write_file(&dir, &[multiples_of_3], 4);

        let values: Vec<u64> = (1..=300).filter(|i| i % 5 == 0).collect();

        let mut buffer = DocIdBuffer::from_values(&values);
        cursor(&file, lists[0]).retain(&mut buffer);
        let expected: Vec<u64> = (1..=300).filter(|i| i % 15 == 0).collect();
        assert_eq!(buffer.data(), expected.as_slice());

        let mut buffer = DocIdBuffer::from_values(&values);
        cursor(&file, lists[0]).reject(&mut buffer);
        let expected: Vec<u64> = values.iter().copied().filter(|i| i % 3 != 0).collect();
        assert_eq!(buffer.data(), expected.as_slice());
    }

    #[test]
    fn test_retain_past_end() {
        let dir = TempDir::new().unwrap();
        let (file, lists) = write_file(&dir, &[vec![1, 2, 3]], 2);

        let mut buffer = DocIdBuffer::from_values(&[2, 10, 20]);
        cursor(&file, lists[0]).retain(&mut buffer);
        assert_eq!(buffer.data(), &[2]);

        let mut buffer = DocIdBuffer::from_values(&[2, 10, 20]);
        cursor(&file, lists[0]).reject(&mut buffer);
        assert_eq!(buffer.data(), &[10, 20]);
    }

    #[test]
    fn test_seek_records_skips() {
        let dir = TempDir::new().unwrap();
        let ids: Vec<u64> = (0..1000).collect();
        let (file, lists) = write_file(&dir, &[ids], 4);

        let stats = Arc::new(SkipStats::default());
        let mut cursor = SkipListCursor::new(file.clone(), lists[0], stats.clone());
        let mut buffer = DocIdBuffer::from_values(&[0, 999]);
        cursor.retain(&mut buffer);

        assert_eq!(buffer.data(), &[0, 999]);
        assert_eq!(stats.total(), 1);
        // 249 blocks skipped lands in bucket 7 (128..=255).
        assert_eq!(stats.snapshot()[7], 1);
    }

    #[test]
    fn test_retain_rewinds_for_new_source() {
        let dir = TempDir::new().unwrap();
        let (file, lists) = write_file(&dir, &[(1..=40).collect()], 4);

        let mut cursor = cursor(&file, lists[0]);
        let mut buffer = DocIdBuffer::from_values(&[30, 35, 50]);
        cursor.retain(&mut buffer);
        assert_eq!(buffer.data(), &[30, 35]);

        let mut buffer = DocIdBuffer::from_values(&[2, 3]);
        cursor.retain(&mut buffer);
        assert_eq!(buffer.data(), &[2, 3]);
    }

    #[test]
    fn test_term_data() {
        let dir = TempDir::new().unwrap();
        let (file, lists) = write_file(&dir, &[vec![5, 10, 15, 20, 25]], 2);

        let data = cursor(&file, lists[0]).term_data(&[5, 11, 20, 30]);
        assert_eq!(data.len(), 4);
        let (meta, positions) = data[0].clone().unwrap();
        assert_eq!(meta, 5);
        assert_eq!(GammaCodedSequence::from_bytes(positions).values(), vec![5]);
        assert!(data[1].is_none());
        assert_eq!(data[2].as_ref().unwrap().0, 20);
        assert!(data[3].is_none());
    }

    #[test]
    fn test_parse_rejects_out_of_bounds() {
        let data = [0u8; 4];
        assert!(PostingList::parse(&data, 0).unwrap_err().is_corruption());

        let mut header = Vec::new();
        header.extend_from_slice(&1u32.to_le_bytes());
        header.extend_from_slice(&100u32.to_le_bytes());
        assert!(PostingList::parse(&header, 0).is_err());
    }
}
