//! Operations over several ascending position sequences.

/// True if every sequence shares at least one common value.
///
/// Zero or one sequence trivially intersects.
pub fn intersect_sequences<I>(mut sequences: Vec<I>) -> bool
where
    I: Iterator<Item = i32>,
{
    if sequences.len() <= 1 {
        return true;
    }

    let mut heads = Vec::with_capacity(sequences.len());
    for seq in sequences.iter_mut() {
        match seq.next() {
            Some(v) => heads.push(v),
            None => return false,
        }
    }

    loop {
        let max = heads.iter().copied().max().unwrap_or(i32::MIN);
        let mut all_equal = true;

        for (seq, head) in sequences.iter_mut().zip(heads.iter_mut()) {
            while *head < max {
                match seq.next() {
                    Some(v) => *head = v,
                    None => return false,
                }
            }
            if *head != max {
                all_equal = false;
            }
        }

        if all_equal {
            return true;
        }
    }
}

/// Values present in every list once `offsets[i]` is added to list `i`.
///
/// At most `limit` values are returned.
pub fn find_intersections(lists: &[&[i32]], offsets: &[i32], limit: usize) -> Vec<i32> {
    debug_assert_eq!(lists.len(), offsets.len());

    let mut out = Vec::new();
    if lists.is_empty() || lists.iter().any(|l| l.is_empty()) {
        return out;
    }

    let mut idx = vec![0usize; lists.len()];
    let value = |i: usize, idx: &[usize]| lists[i][idx[i]] + offsets[i];

    'outer: while out.len() < limit {
        let mut max = i32::MIN;
        for i in 0..lists.len() {
            max = max.max(value(i, &idx));
        }

        let mut all_equal = true;
        for i in 0..lists.len() {
            while value(i, &idx) < max {
                idx[i] += 1;
                if idx[i] >= lists[i].len() {
                    break 'outer;
                }
            }
            if value(i, &idx) != max {
                all_equal = false;
            }
        }

        if all_equal {
            out.push(max);
            for i in 0..lists.len() {
                idx[i] += 1;
                if idx[i] >= lists[i].len() {
                    break 'outer;
                }
            }
        }
    }

    out
}

/// Smallest window `max - min` that contains one value from every list.
///
/// Returns `i32::MAX` if any list is empty.
pub fn min_distance(lists: &[&[i32]], offsets: &[i32]) -> i32 {
    debug_assert_eq!(lists.len(), offsets.len());

    if lists.is_empty() || lists.iter().any(|l| l.is_empty()) {
        return i32::MAX;
    }

    let mut idx = vec![0usize; lists.len()];
    let mut best = i32::MAX;

    loop {
        let mut min = i32::MAX;
        let mut max = i32::MIN;
        let mut min_list = 0;

        for (i, list) in lists.iter().enumerate() {
            let v = list[idx[i]] + offsets[i];
            if v < min {
                min = v;
                min_list = i;
            }
            max = max.max(v);
        }

        best = best.min(max - min);

        idx[min_list] += 1;
        if idx[min_list] >= lists[min_list].len() {
            return best;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::sequence::{CodedSequence, GammaCodedSequence};

    fn gamma(values: &[i32]) -> GammaCodedSequence {
        GammaCodedSequence::generate(values).unwrap()
    }

    #[test]
    fn test_intersect_trivial() {
        assert!(intersect_sequences(Vec::<std::vec::IntoIter<i32>>::new()));
        assert!(intersect_sequences(vec![Vec::<i32>::new().into_iter()]));
        assert!(intersect_sequences(vec![vec![1].into_iter(), vec![1].into_iter()]));
        assert!(!intersect_sequences(vec![vec![1].into_iter(), vec![2].into_iter()]));
    }

    #[test]
    fn test_intersect_with_offset() {
        let a = gamma(&[1]);
        let b = gamma(&[3]);
        assert!(intersect_sequences(vec![a.offset_iter(0), b.offset_iter(-2)]));
    }

    #[test]
    fn test_intersect_deep() {
        let a = gamma(&[1, 3, 4, 7, 8, 9, 11]);
        let b = gamma(&[2, 5, 8, 14]);
        let c = gamma(&[1, 5, 8, 9]);
        assert!(intersect_sequences(vec![a.iter(), b.iter(), c.iter()]));

        let d = gamma(&[2, 5, 14]);
        assert!(!intersect_sequences(vec![a.iter(), d.iter()]));
    }

    #[test]
    fn test_intersect_empty_member() {
        let a = gamma(&[]);
        let b = gamma(&[1, 2, 3]);
        assert!(!intersect_sequences(vec![a.iter(), b.iter()]));
        assert!(!intersect_sequences(vec![b.iter(), a.iter()]));
    }

    #[test]
    fn test_find_intersections() {
        let a = [1, 3, 4, 7, 8, 9, 10, 11];
        let b = [2, 5, 8, 10, 14];
        let c = [1, 5, 8, 9, 10];
        assert_eq!(
            find_intersections(&[&a, &b, &c], &[0, 0, 0], usize::MAX),
            vec![8, 10]
        );
        assert_eq!(find_intersections(&[&a, &b, &c], &[0, 0, 0], 1), vec![8]);
    }

    #[test]
    fn test_find_intersections_with_offsets() {
        // "quick brown": brown must follow quick.
        let quick = [4, 20];
        let brown = [5, 9, 30];
        assert_eq!(
            find_intersections(&[&quick, &brown], &[0, -1], usize::MAX),
            vec![4]
        );
    }

    #[test]
    fn test_min_distance() {
        let a = [11, 80, 160];
        let b = [20, 50, 100];
        let c = [30, 60, 90];
        assert_eq!(min_distance(&[&a, &b, &c], &[0, 0, 0]), 19);
        assert_eq!(min_distance(&[&a, &[]], &[0, 0]), i32::MAX);
    }
}
