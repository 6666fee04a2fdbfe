//! Random primitives used by every task.
//!
//! All functions take the generator explicitly so a seeded `StdRng`
//! reproduces a whole session.

use crate::error::{ExperimentError, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use std::f64::consts::PI;

/// Biased coin: 1 with probability `p`, else 0.
pub fn flip<R: Rng + ?Sized>(rng: &mut R, p: f64) -> u8 {
    if p <= 0.0 {
        return 0;
    }
    if p >= 1.0 {
        return 1;
    }
    u8::from(rng.random::<f64>() < p)
}

pub fn flip_fair<R: Rng + ?Sized>(rng: &mut R) -> u8 {
    flip(rng, 0.5)
}

/// Uniform draw from (0, 1].
fn open_unit<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    1.0 - rng.random::<f64>()
}

/// Normal variate via the Box-Muller transform.
pub fn normal<R: Rng + ?Sized>(rng: &mut R, mu: f64, sigma: f64) -> f64 {
    let u = open_unit(rng);
    let v = open_unit(rng);
    mu + sigma * (-2.0 * u.ln()).sqrt() * (2.0 * PI * v).cos()
}

/// Uniform integer in `lo..=hi`.
pub fn uniform_int<R: Rng + ?Sized>(rng: &mut R, lo: i64, hi: i64) -> i64 {
    rng.random_range(lo..=hi)
}

/// One element drawn uniformly, `None` for an empty slice.
pub fn sample<'a, T, R: Rng + ?Sized>(rng: &mut R, items: &'a [T]) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }
    Some(&items[rng.random_range(0..items.len())])
}

pub fn shuffle<T, R: Rng + ?Sized>(rng: &mut R, mut items: Vec<T>) -> Vec<T> {
    items.shuffle(rng);
    items
}

/// `n` distinct elements without replacement, in random order.
pub fn sample_size<T: Clone, R: Rng + ?Sized>(rng: &mut R, items: &[T], n: usize) -> Result<Vec<T>> {
    if n > items.len() {
        return Err(ExperimentError::SampleTooLarge {
            requested: n,
            available: items.len(),
        });
    }
    let mut pool = items.to_vec();
    let (head, _) = pool.partial_shuffle(rng, n);
    Ok(head.to_vec())
}

/// Random permutation of `0..n`.
pub fn random_permutation<R: Rng + ?Sized>(rng: &mut R, n: usize) -> Vec<usize> {
    shuffle(rng, (0..n).collect())
}

/// Round half up, the way participant-facing integers have always been shown.
pub fn js_round(x: f64) -> i64 {
    (x + 0.5).floor() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn flip_extremes_are_deterministic() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..1000 {
            assert_eq!(flip(&mut rng, 0.0), 0);
            assert_eq!(flip(&mut rng, 1.0), 1);
        }
    }

    #[test]
    fn fair_flip_is_balanced() {
        let mut rng = StdRng::seed_from_u64(7);
        let n = 10_000;
        let heads: u32 = (0..n).map(|_| u32::from(flip_fair(&mut rng))).sum();
        let p = f64::from(heads) / f64::from(n);
        assert!((0.45..=0.55).contains(&p), "proportion {p}");
    }

    #[test]
    fn normal_is_finite_and_centred() {
        let mut rng = StdRng::seed_from_u64(3);
        let n = 20_000;
        let xs: Vec<f64> = (0..n).map(|_| normal(&mut rng, 10.0, 2.0)).collect();
        assert!(xs.iter().all(|x| x.is_finite()));
        let mean = xs.iter().sum::<f64>() / n as f64;
        let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        assert!((mean - 10.0).abs() < 0.1, "mean {mean}");
        assert!((var.sqrt() - 2.0).abs() < 0.1, "sd {}", var.sqrt());
    }

    #[test]
    fn zero_sigma_returns_mean() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(normal(&mut rng, 42.0, 0.0), 42.0);
    }

    #[test]
    fn sample_size_draws_without_replacement() {
        let mut rng = StdRng::seed_from_u64(11);
        let pool: Vec<usize> = (0..50).collect();
        let mut drawn = sample_size(&mut rng, &pool, 30).unwrap();
        assert_eq!(drawn.len(), 30);
        drawn.sort_unstable();
        drawn.dedup();
        assert_eq!(drawn.len(), 30);
        assert!(sample_size(&mut rng, &pool, 51).is_err());
    }

    #[test]
    fn permutation_covers_every_index() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut p = random_permutation(&mut rng, 4);
        p.sort_unstable();
        assert_eq!(p, vec![0, 1, 2, 3]);
    }

    #[test]
    fn uniform_int_is_inclusive() {
        let mut rng = StdRng::seed_from_u64(9);
        let draws: Vec<i64> = (0..2000).map(|_| uniform_int(&mut rng, -5, 5)).collect();
        assert!(draws.contains(&-5));
        assert!(draws.contains(&5));
        assert!(draws.iter().all(|d| (-5..=5).contains(d)));
    }

    #[test]
    fn rounding_goes_half_up() {
        assert_eq!(js_round(2.5), 3);
        assert_eq!(js_round(-2.5), -2);
        assert_eq!(js_round(-2.6), -3);
        assert!(sample::<u8, _>(&mut StdRng::seed_from_u64(0), &[]).is_none());
    }
}
