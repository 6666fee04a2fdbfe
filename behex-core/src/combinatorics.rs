//! Small combinatorics toolkit for design and template generation.
//!
//! Everything here is deterministic: the same input always yields the same
//! output in the same order. Randomness is applied afterwards by the caller.

use crate::error::{ExperimentError, Result};

/// Largest input accepted by [`subsets`]; 2^16 - 1 subsets at most.
pub const MAX_SUBSET_ITEMS: usize = 16;

/// All non-empty subsets of `items`, each keeping the input order.
///
/// Subsets are ordered as an include-first binary recursion would visit
/// them: `[a, b]` yields `[a, b]`, `[a]`, `[b]`.
pub fn subsets<T: Clone>(items: &[T]) -> Result<Vec<Vec<T>>> {
    if items.len() > MAX_SUBSET_ITEMS {
        return Err(ExperimentError::TooManyItems {
            len: items.len(),
            limit: MAX_SUBSET_ITEMS,
        });
    }
    let n = items.len();
    let total = 1usize << n;
    let mut out = Vec::with_capacity(total.saturating_sub(1));
    // Bit (n - 1 - i) clear means item i is included, so counting upwards
    // from zero reproduces include-first order.
    for mask in 0..total.saturating_sub(1) {
        let subset = items
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << (n - 1 - i)) == 0)
            .map(|(_, x)| x.clone())
            .collect();
        out.push(subset);
    }
    Ok(out)
}

/// Indices of `true` entries.
pub fn where_true(flags: &[bool]) -> Vec<usize> {
    flags
        .iter()
        .enumerate()
        .filter_map(|(i, &f)| f.then_some(i))
        .collect()
}

/// Each value repeated by its own count.
pub fn repeat_counts<T: Clone>(values: &[T], counts: &[usize]) -> Result<Vec<T>> {
    if values.len() != counts.len() {
        return Err(ExperimentError::config(format!(
            "{} values but {} repetition counts",
            values.len(),
            counts.len()
        )));
    }
    Ok(values
        .iter()
        .zip(counts)
        .flat_map(|(v, &n)| std::iter::repeat(v.clone()).take(n))
        .collect())
}

/// Every pairing of `a` with `b`, `a` varying slowest.
pub fn cross_product<A: Clone, B: Clone>(a: &[A], b: &[B]) -> Vec<(A, B)> {
    a.iter()
        .flat_map(|x| b.iter().map(move |y| (x.clone(), y.clone())))
        .collect()
}

/// Lower median: element `round(n / 2) - 1` of the sorted values.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let idx = ((sorted.len() as f64 / 2.0).round() as usize).saturating_sub(1);
    Some(sorted[idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subsets_are_include_first() {
        let s = subsets(&['a', 'b']).unwrap();
        assert_eq!(s, vec![vec!['a', 'b'], vec!['a'], vec!['b']]);
    }

    #[test]
    fn subset_count_excludes_empty_set() {
        let digits: Vec<usize> = (0..10).collect();
        assert_eq!(subsets(&digits).unwrap().len(), 1023);
        assert!(subsets::<u8>(&[]).unwrap().is_empty());
    }

    #[test]
    fn subsets_are_bounded() {
        let big: Vec<usize> = (0..17).collect();
        assert!(matches!(
            subsets(&big),
            Err(ExperimentError::TooManyItems { len: 17, .. })
        ));
    }

    #[test]
    fn helpers() {
        assert_eq!(where_true(&[false, true, true, false]), vec![1, 2]);
        assert_eq!(
            repeat_counts(&[0.5, 0.6], &[1, 2]).unwrap(),
            vec![0.5, 0.6, 0.6]
        );
        assert!(repeat_counts(&[1], &[1, 2]).is_err());
        assert_eq!(cross_product(&[1, 2], &['x']), vec![(1, 'x'), (2, 'x')]);
    }

    #[test]
    fn median_takes_lower_middle() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.0));
        assert_eq!(median(&[900.0, 10000.0]), Some(900.0));
    }
}
