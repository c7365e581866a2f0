//! Posting sources: producers of ascending document ids.

use crate::query::buffer::DocIdBuffer;

/// Produces document ids in ascending order, a buffer at a time.
pub trait EntrySource: Send {
    /// Append the next ids to `buffer`, up to its remaining capacity.
    fn read(&mut self, buffer: &mut DocIdBuffer);

    fn has_more(&self) -> bool;

    /// Human-readable name for diagnostics.
    fn index_name(&self) -> String;
}

/// A source with nothing to produce.
#[derive(Debug, Default)]
pub struct EmptyEntrySource;

impl EntrySource for EmptyEntrySource {
    fn read(&mut self, _buffer: &mut DocIdBuffer) {}

    fn has_more(&self) -> bool {
        false
    }

    fn index_name(&self) -> String {
        "empty".to_string()
    }
}

/// A source over an in-memory sorted id list.
#[derive(Debug)]
pub struct VecEntrySource {
    ids: Vec<u64>,
    pos: usize,
    name: String,
}

impl VecEntrySource {
    pub fn new(name: impl Into<String>, mut ids: Vec<u64>) -> Self {
        ids.sort_unstable();
        ids.dedup();
        VecEntrySource {
            ids,
            pos: 0,
            name: name.into(),
        }
    }
}

impl EntrySource for VecEntrySource {
    fn read(&mut self, buffer: &mut DocIdBuffer) {
        self.pos += buffer.extend_from_slice(&self.ids[self.pos..]);
    }

    fn has_more(&self) -> bool {
        self.pos < self.ids.len()
    }

    fn index_name(&self) -> String {
        self.name.clone()
    }
}
