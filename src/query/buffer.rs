//! Reusable buffer of document ids filled by sources and narrowed by filters.
//!
//! Filters walk the buffer with a read cursor and compact kept values
//! towards the front with a write cursor; [`DocIdBuffer::finalize_filtering`]
//! truncates to the kept values.

/// Fixed-capacity buffer of ascending document ids.
#[derive(Debug, Clone)]
pub struct DocIdBuffer {
    data: Vec<u64>,
    capacity: usize,
    read: usize,
    write: usize,
}

impl DocIdBuffer {
    pub fn new(capacity: usize) -> Self {
        DocIdBuffer {
            data: Vec::with_capacity(capacity),
            capacity,
            read: 0,
            write: 0,
        }
    }

    /// Buffer holding exactly `values`.
    pub fn from_values(values: &[u64]) -> Self {
        let mut buffer = DocIdBuffer::new(values.len().max(1));
        buffer.data.extend_from_slice(values);
        buffer
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.data.len() >= self.capacity
    }

    /// Free slots left for a source to fill.
    pub fn remaining_capacity(&self) -> usize {
        self.capacity.saturating_sub(self.data.len())
    }

    /// Append a value; returns `false` when the buffer is full.
    pub fn push(&mut self, value: u64) -> bool {
        if self.is_full() {
            return false;
        }
        self.data.push(value);
        true
    }

    pub fn extend_from_slice(&mut self, values: &[u64]) -> usize {
        let n = values.len().min(self.remaining_capacity());
        self.data.extend_from_slice(&values[..n]);
        n
    }

    /// Replace the contents, ignoring capacity.
    pub fn set(&mut self, values: &[u64]) {
        self.reset();
        self.data.extend_from_slice(values);
    }

    pub fn data(&self) -> &[u64] {
        &self.data
    }

    pub fn copy_data(&self) -> Vec<u64> {
        self.data.clone()
    }

    /// Empty the buffer and rewind the cursors.
    pub fn reset(&mut self) {
        self.data.clear();
        self.read = 0;
        self.write = 0;
    }

    /// True while the read cursor has values left to examine.
    pub fn has_more(&self) -> bool {
        self.read < self.data.len()
    }

    pub fn current_value(&self) -> u64 {
        self.data[self.read]
    }

    /// Keep the current value and move on.
    pub fn retain_and_advance(&mut self) -> bool {
        self.data[self.write] = self.data[self.read];
        self.write += 1;
        self.read += 1;
        self.has_more()
    }

    /// Drop the current value and move on.
    pub fn reject_and_advance(&mut self) -> bool {
        self.read += 1;
        self.has_more()
    }

    /// Keep everything not yet examined.
    pub fn retain_all(&mut self) {
        while self.has_more() {
            self.retain_and_advance();
        }
    }

    /// Drop everything not yet examined.
    pub fn reject_all(&mut self) {
        self.read = self.data.len();
    }

    /// Truncate to the retained values and rewind the cursors.
    pub fn finalize_filtering(&mut self) {
        self.data.truncate(self.write);
        self.read = 0;
        self.write = 0;
    }
}
