//! Compact binary encodings shared by the journal and the indices.

pub mod bits;
pub mod metadata;
pub mod sequence;
pub mod sequence_ops;
pub mod span;

pub use metadata::{DocumentMetadata, WordFlags};
pub use sequence::{CodedSequence, GammaCodedSequence, VarintCodedSequence};
pub use span::{DocumentSpan, DocumentSpans, SpanCode};
