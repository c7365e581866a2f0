//! Query execution: sources, filter steps, budgets and the executor.
//!
//! A search resolves its subqueries to term ids, turns each into one or more
//! [`IndexQuery`] values of differing [`QueryPriority`], and drains them into
//! a shared [`DocIdBuffer`] until the fetch size or the [`SearchBudget`] is
//! exhausted.

pub mod budget;
pub mod buffer;
pub mod execution;
pub mod filter;
pub mod index_query;
pub mod params;
pub mod source;
pub mod terms;

pub use budget::SearchBudget;
pub use buffer::DocIdBuffer;
pub use execution::{ExecutionStats, IndexQueryExecution, SearchResultItem, SearchResultSet};
pub use filter::{
    QueryFilterAnyOf, QueryFilterLetThrough, QueryFilterNoPass, QueryFilterPredicate,
    QueryFilterRangeReject, QueryFilterRangeRetain, QueryFilterStep,
};
pub use index_query::{IndexQuery, IndexQueryBuilder, QueryPriority};
pub use params::{ParamMatchingQueryFilter, QueryParams, QueryStrategy, SearchSet, SpecificationLimit};
pub use source::{EmptyEntrySource, EntrySource, VecEntrySource};
pub use terms::{SearchSubquery, SearchTerms};
