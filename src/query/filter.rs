//! Filter steps applied in place to a filled [`DocIdBuffer`].

use crate::query::buffer::DocIdBuffer;

/// One stage of a query's filter pipeline.
pub trait QueryFilterStep: Send {
    /// Narrow `buffer` to the ids this step accepts.
    fn apply(&mut self, buffer: &mut DocIdBuffer);

    /// Relative cost used to order steps; cheaper steps run first.
    fn cost(&self) -> f64;

    fn describe(&self) -> String;
}

/// Accepts everything.
#[derive(Debug, Default)]
pub struct QueryFilterLetThrough;

impl QueryFilterStep for QueryFilterLetThrough {
    fn apply(&mut self, _buffer: &mut DocIdBuffer) {}

    fn cost(&self) -> f64 {
        0.0
    }

    fn describe(&self) -> String {
        "[LetThrough]".to_string()
    }
}

/// Rejects everything.
#[derive(Debug, Default)]
pub struct QueryFilterNoPass;

impl QueryFilterStep for QueryFilterNoPass {
    fn apply(&mut self, buffer: &mut DocIdBuffer) {
        buffer.reset();
    }

    fn cost(&self) -> f64 {
        0.0
    }

    fn describe(&self) -> String {
        "[NoPass]".to_string()
    }
}

/// Keeps ids accepted by a predicate.
pub struct QueryFilterPredicate<F> {
    predicate: F,
    cost: f64,
    name: String,
}

impl<F> QueryFilterPredicate<F>
where
    F: FnMut(u64) -> bool + Send,
{
    pub fn new(name: impl Into<String>, cost: f64, predicate: F) -> Self {
        QueryFilterPredicate {
            predicate,
            cost,
            name: name.into(),
        }
    }
}

impl<F> QueryFilterStep for QueryFilterPredicate<F>
where
    F: FnMut(u64) -> bool + Send,
{
    fn apply(&mut self, buffer: &mut DocIdBuffer) {
        while buffer.has_more() {
            if (self.predicate)(buffer.current_value()) {
                buffer.retain_and_advance();
            } else {
                buffer.reject_and_advance();
            }
        }
        buffer.finalize_filtering();
    }

    fn cost(&self) -> f64 {
        self.cost
    }

    fn describe(&self) -> String {
        format!("[Predicate {}]", self.name)
    }
}

/// Lockstep walk of a buffer against sorted, non-overlapping inclusive ranges.
fn filter_ranges(buffer: &mut DocIdBuffer, ranges: &[(u64, u64)], retain_inside: bool) {
    let mut ri = 0;
    while buffer.has_more() {
        let value = buffer.current_value();
        while ri < ranges.len() && ranges[ri].1 < value {
            ri += 1;
        }
        let inside = ri < ranges.len() && ranges[ri].0 <= value;
        if inside == retain_inside {
            buffer.retain_and_advance();
        } else {
            buffer.reject_and_advance();
        }
    }
    buffer.finalize_filtering();
}

fn normalize_ranges(mut ranges: Vec<(u64, u64)>) -> Vec<(u64, u64)> {
    ranges.retain(|(lo, hi)| lo <= hi);
    ranges.sort_unstable();
    let mut merged: Vec<(u64, u64)> = Vec::with_capacity(ranges.len());
    for (lo, hi) in ranges {
        match merged.last_mut() {
            Some(last) if lo <= last.1.saturating_add(1) => last.1 = last.1.max(hi),
            _ => merged.push((lo, hi)),
        }
    }
    merged
}

/// Keeps ids that fall inside any of the given inclusive ranges.
#[derive(Debug)]
pub struct QueryFilterRangeRetain {
    ranges: Vec<(u64, u64)>,
}

impl QueryFilterRangeRetain {
    pub fn new(ranges: Vec<(u64, u64)>) -> Self {
        QueryFilterRangeRetain {
            ranges: normalize_ranges(ranges),
        }
    }
}

impl QueryFilterStep for QueryFilterRangeRetain {
    fn apply(&mut self, buffer: &mut DocIdBuffer) {
        filter_ranges(buffer, &self.ranges, true);
    }

    fn cost(&self) -> f64 {
        self.ranges.len() as f64
    }

    fn describe(&self) -> String {
        format!("[RangeRetain {} ranges]", self.ranges.len())
    }
}

/// Drops ids that fall inside any of the given inclusive ranges.
#[derive(Debug)]
pub struct QueryFilterRangeReject {
    ranges: Vec<(u64, u64)>,
}

impl QueryFilterRangeReject {
    pub fn new(ranges: Vec<(u64, u64)>) -> Self {
        QueryFilterRangeReject {
            ranges: normalize_ranges(ranges),
        }
    }
}

impl QueryFilterStep for QueryFilterRangeReject {
    fn apply(&mut self, buffer: &mut DocIdBuffer) {
        filter_ranges(buffer, &self.ranges, false);
    }

    fn cost(&self) -> f64 {
        self.ranges.len() as f64
    }

    fn describe(&self) -> String {
        format!("[RangeReject {} ranges]", self.ranges.len())
    }
}

/// Keeps an id if any of the inner steps would keep it.
///
/// Each step only sees the ids no earlier step has accepted.
pub struct QueryFilterAnyOf {
    steps: Vec<Box<dyn QueryFilterStep>>,
    scratch: DocIdBuffer,
}

impl QueryFilterAnyOf {
    pub fn new(steps: Vec<Box<dyn QueryFilterStep>>) -> Self {
        QueryFilterAnyOf {
            steps,
            scratch: DocIdBuffer::new(1),
        }
    }
}

impl QueryFilterStep for QueryFilterAnyOf {
    fn apply(&mut self, buffer: &mut DocIdBuffer) {
        if self.steps.is_empty() {
            buffer.reset();
            return;
        }

        let mut remaining = buffer.copy_data();
        let mut accepted: Vec<u64> = Vec::with_capacity(remaining.len());

        for step in self.steps.iter_mut() {
            if remaining.is_empty() {
                break;
            }
            self.scratch.set(&remaining);
            step.apply(&mut self.scratch);

            let kept = self.scratch.data();
            accepted.extend_from_slice(kept);

            // Both lists are ascending; drop the kept ids from `remaining`.
            let mut ki = 0;
            remaining.retain(|v| {
                while ki < kept.len() && kept[ki] < *v {
                    ki += 1;
                }
                !(ki < kept.len() && kept[ki] == *v)
            });
        }

        accepted.sort_unstable();
        buffer.set(&accepted);
    }

    fn cost(&self) -> f64 {
        self.steps.iter().map(|s| s.cost()).sum()
    }

    fn describe(&self) -> String {
        let inner: Vec<String> = self.steps.iter().map(|s| s.describe()).collect();
        format!("[AnyOf {}]", inner.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(step: &mut dyn QueryFilterStep, values: &[u64]) -> Vec<u64> {
        let mut buffer = DocIdBuffer::from_values(values);
        step.apply(&mut buffer);
        buffer.copy_data()
    }

    #[test]
    fn test_let_through_and_no_pass() {
        assert_eq!(apply(&mut QueryFilterLetThrough, &[1, 2]), vec![1, 2]);
        assert!(apply(&mut QueryFilterNoPass, &[1, 2]).is_empty());
    }

    #[test]
    fn test_predicate() {
        let mut step = QueryFilterPredicate::new("even", 1.0, |v| v % 2 == 0);
        assert_eq!(apply(&mut step, &[1, 2, 3, 4]), vec![2, 4]);
        assert_eq!(step.describe(), "[Predicate even]");
    }

    #[test]
    fn test_range_retain_and_reject() {
        let ranges = vec![(10, 20), (30, 30), (5, 6)];
        let values = [1, 5, 6, 7, 10, 15, 20, 21, 30, 31];

        let mut retain = QueryFilterRangeRetain::new(ranges.clone());
        assert_eq!(apply(&mut retain, &values), vec![5, 6, 10, 15, 20, 30]);

        let mut reject = QueryFilterRangeReject::new(ranges);
        assert_eq!(apply(&mut reject, &values), vec![1, 7, 21, 31]);
    }

    #[test]
    fn test_ranges_merge() {
        let merged = normalize_ranges(vec![(5, 9), (1, 3), (4, 4), (20, 10)]);
        assert_eq!(merged, vec![(1, 9)]);
    }

    #[test]
    fn test_any_of() {
        let mut step = QueryFilterAnyOf::new(vec![
            Box::new(QueryFilterPredicate::new("div2", 1.0, |v| v % 2 == 0)),
            Box::new(QueryFilterPredicate::new("div3", 1.0, |v| v % 3 == 0)),
        ]);
        let values: Vec<u64> = (1..=12).collect();
        assert_eq!(apply(&mut step, &values), vec![2, 3, 4, 6, 8, 9, 10, 12]);
        assert_eq!(step.cost(), 2.0);
    }

    #[test]
    fn test_any_of_empty_rejects() {
        let mut step = QueryFilterAnyOf::new(Vec::new());
        assert!(apply(&mut step, &[1, 2, 3]).is_empty());
    }
}
