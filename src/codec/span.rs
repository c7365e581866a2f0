//! Structural document spans (title, headings, anchors and so on).
//!
//! A span set is stored as one ascending sequence of interlaced boundaries
//! `start0, end0, start1, end1, ...`, each pair describing the half-open
//! range `[start, end)` of token positions.

use serde::{Deserialize, Serialize};

use crate::codec::sequence::{CodedSequence, VarintCodedSequence};
use crate::error::{LoupeError, Result};

/// Kind of structural region a span covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpanCode {
    Title,
    Heading,
    Anchor,
    Code,
    Nav,
    Body,
}

impl SpanCode {
    pub const ALL: [SpanCode; 6] = [
        SpanCode::Title,
        SpanCode::Heading,
        SpanCode::Anchor,
        SpanCode::Code,
        SpanCode::Nav,
        SpanCode::Body,
    ];

    /// Single-byte tag used in the journal and the spans file.
    pub fn code(self) -> u8 {
        match self {
            SpanCode::Title => b't',
            SpanCode::Heading => b'h',
            SpanCode::Anchor => b'a',
            SpanCode::Code => b'c',
            SpanCode::Nav => b'n',
            SpanCode::Body => b'b',
        }
    }

    pub fn from_code(code: u8) -> Option<SpanCode> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }
}

/// A set of half-open position ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentSpan {
    starts_ends: Vec<i32>,
}

impl DocumentSpan {
    /// Build from interlaced boundaries. An odd trailing start is dropped.
    pub fn new(mut starts_ends: Vec<i32>) -> Self {
        if starts_ends.len() % 2 == 1 {
            starts_ends.pop();
        }
        DocumentSpan { starts_ends }
    }

    pub fn from_sequence<S: CodedSequence>(sequence: &S) -> Self {
        Self::new(sequence.values())
    }

    pub fn pairs(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.starts_ends.chunks_exact(2).map(|c| (c[0], c[1]))
    }

    /// Number of ranges.
    pub fn size(&self) -> usize {
        self.starts_ends.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.starts_ends.is_empty()
    }

    /// Total number of positions covered.
    pub fn length(&self) -> i32 {
        self.pairs().map(|(s, e)| e - s).sum()
    }

    /// True if `position` lies in some `[start, end)`.
    pub fn contains_position(&self, position: i32) -> bool {
        for (start, end) in self.pairs() {
            if start > position {
                return false;
            }
            if position < end {
                return true;
            }
        }
        false
    }

    /// True if some `[p, p + len)` for `p` in `positions` fits inside a single range.
    ///
    /// `positions` must be ascending.
    pub fn contains_range(&self, positions: &[i32], len: i32) -> bool {
        let mut pairs = self.pairs().peekable();
        for &pos in positions {
            while let Some(&(_, end)) = pairs.peek() {
                if end >= pos + len {
                    break;
                }
                pairs.next();
            }
            match pairs.peek() {
                Some(&(start, end)) => {
                    if pos >= start && pos + len <= end {
                        return true;
                    }
                }
                None => return false,
            }
        }
        false
    }

    /// True if some `[p, p + len)` coincides exactly with a range.
    pub fn contains_range_exact(&self, positions: &[i32], len: i32) -> bool {
        self.pairs()
            .any(|(start, end)| end - start == len && positions.binary_search(&start).is_ok())
    }

    /// Number of `positions` that fall inside any range.
    pub fn count_intersections(&self, positions: &[i32]) -> usize {
        positions
            .iter()
            .filter(|&&p| self.contains_position(p))
            .count()
    }

    pub fn encode(&self) -> Result<VarintCodedSequence> {
        VarintCodedSequence::generate(&self.starts_ends)
    }
}

/// All spans of one document, keyed by [`SpanCode`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentSpans {
    spans: Vec<(SpanCode, DocumentSpan)>,
}

impl DocumentSpans {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, code: SpanCode, span: DocumentSpan) {
        self.spans.retain(|(c, _)| *c != code);
        self.spans.push((code, span));
    }

    /// Decode from `(code, blob)` pairs as stored on disk.
    pub fn decode(raw: &[(u8, Vec<u8>)]) -> Result<Self> {
        let mut spans = DocumentSpans::new();
        for (code, bytes) in raw {
            let code = SpanCode::from_code(*code)
                .ok_or_else(|| LoupeError::corruption(format!("unknown span code {code}")))?;
            let values = VarintCodedSequence::from_bytes(bytes.clone()).try_values()?;
            spans.insert(code, DocumentSpan::new(values));
        }
        Ok(spans)
    }

    /// The span for `code`, or an empty span.
    pub fn get(&self, code: SpanCode) -> DocumentSpan {
        self.spans
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, s)| s.clone())
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(SpanCode, DocumentSpan)> {
        self.spans.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}
