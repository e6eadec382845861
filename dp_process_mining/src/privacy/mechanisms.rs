//! Differential privacy mechanisms used to release directly-follows statistics.
//!
//! All randomness is drawn from a caller-provided [`Rng`], so a single seeded generator makes a
//! whole sampling session reproducible.
use std::collections::BTreeMap;

use rand::Rng;

///
/// Laplace mechanism with a fixed sensitivity and budget
///
/// Adds noise drawn from `Lap(0, sensitivity / epsilon)` to a true value.
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaplaceMechanism {
    sensitivity: f64,
    epsilon: f64,
}

impl LaplaceMechanism {
    /// Create a Laplace mechanism
    ///
    /// Returns `None` if `epsilon` or `sensitivity` is not strictly positive and finite. In that
    /// case there is no meaningful amount of noise, and nothing must be released.
    pub fn new(sensitivity: f64, epsilon: f64) -> Option<Self> {
        if sensitivity > 0.0 && sensitivity.is_finite() && epsilon > 0.0 && epsilon.is_finite() {
            Some(Self {
                sensitivity,
                epsilon,
            })
        } else {
            None
        }
    }

    /// Scale `b = sensitivity / epsilon` of the noise distribution
    pub fn scale(&self) -> f64 {
        self.sensitivity / self.epsilon
    }

    /// Budget consumed by one release of this mechanism
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Draw a sample from `Lap(0, scale)` (inverse CDF)
    pub fn sample_noise<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        // u uniform in (-0.5, 0.5); -0.5 is excluded since ln(0) is unbounded
        let u = loop {
            let u: f64 = rng.random::<f64>() - 0.5;
            if u > -0.5 {
                break u;
            }
        };
        -self.scale() * u.signum() * (1.0 - 2.0 * u.abs()).ln()
    }

    /// Release `value` with fresh Laplace noise
    pub fn add_noise<R: Rng + ?Sized>(&self, value: f64, rng: &mut R) -> f64 {
        value + self.sample_noise(rng)
    }

    /// Release a count with fresh Laplace noise, truncated towards zero
    pub fn add_noise_to_count<R: Rng + ?Sized>(&self, count: u64, rng: &mut R) -> i64 {
        self.add_noise(count as f64, rng) as i64
    }
}

///
/// Report Noisy Max: keep the `n` keys with the highest (already noised) values
///
/// Ties are broken by key order. `n == 0` or an empty input yield an empty mapping;
/// `n >= values.len()` returns the full input.
///
pub fn report_noisy_max<K: Ord + Clone, V: Ord + Copy>(
    values: &BTreeMap<K, V>,
    n: usize,
) -> BTreeMap<K, V> {
    if values.is_empty() || n == 0 {
        return BTreeMap::new();
    }
    let mut ranked: Vec<(&K, &V)> = values.iter().collect();
    // stable: equal values keep key order
    ranked.sort_by(|(_, a), (_, b)| b.cmp(a));
    ranked
        .into_iter()
        .take(n)
        .map(|(k, v)| (k.clone(), *v))
        .collect()
}

///
/// Draw a subset size uniformly from `[lower, upper)`
///
/// Degenerate ranges (`upper <= lower + 1`) yield `lower`. Callers thereby never release a
/// subset cardinality that is a deterministic function of the data.
///
pub fn draw_subset_size<R: Rng + ?Sized>(rng: &mut R, lower: usize, upper: usize) -> usize {
    if upper <= lower + 1 {
        lower
    } else {
        rng.random_range(lower..upper)
    }
}

/// Margin by which the edge-subset size range is widened around the number of positive edges
pub const EDGE_SUBSET_MARGIN: i64 = 15;

///
/// Range `(lower, upper)` for the size of the released edge subset
///
/// Based only on already noised values: `positive_noised_edges` is the number of noised edge
/// counts above zero. The count is widened by [`EDGE_SUBSET_MARGIN`] in both directions, rounded
/// to multiples of 5, and clamped so that `num_activities <= lower <= upper < num_activities²`.
///
/// With a single activity there is only one possible edge and the range collapses to `(0, 0)`.
///
pub fn edge_subset_bounds(positive_noised_edges: usize, num_activities: usize) -> (usize, usize) {
    let round_to_5 = |x: i64| (5.0 * (x as f64 / 5.0).round_ties_even()) as i64;
    let count = positive_noised_edges as i64;
    let n = num_activities as i64;
    let max_upper = (n * n - 1).max(0);

    let lower = round_to_5(count - EDGE_SUBSET_MARGIN).max(n);
    let upper = round_to_5(count + EDGE_SUBSET_MARGIN).max(lower).min(max_upper);
    let lower = lower.min(upper);
    (lower as usize, upper as usize)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn laplace_rejects_invalid_budgets() {
        assert!(LaplaceMechanism::new(1.0, 0.0).is_none());
        assert!(LaplaceMechanism::new(1.0, -2.0).is_none());
        assert!(LaplaceMechanism::new(1.0, f64::NAN).is_none());
        assert!(LaplaceMechanism::new(0.0, 1.0).is_none());
        assert_eq!(LaplaceMechanism::new(1.0, 4.0).unwrap().scale(), 0.25);
    }

    #[test]
    fn laplace_variance_converges() {
        let mut rng = StdRng::seed_from_u64(42);
        for epsilon in [0.5, 1.0, 2.0] {
            let mech = LaplaceMechanism::new(1.0, epsilon).unwrap();
            let n = 40_000;
            let samples: Vec<f64> = (0..n).map(|_| mech.add_noise(10.0, &mut rng)).collect();
            let mean = samples.iter().sum::<f64>() / n as f64;
            let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
            let expected = 2.0 * (1.0 / epsilon).powi(2);
            assert!((mean - 10.0).abs() < 0.1 * expected.sqrt() + 0.05, "mean {mean}");
            assert!(
                (var - expected).abs() < 0.1 * expected,
                "variance {var} expected {expected}"
            );
        }
    }

    #[test]
    fn laplace_draws_are_independent_and_reproducible() {
        let mech = LaplaceMechanism::new(1.0, 1.0).unwrap();
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        let xs: Vec<f64> = (0..5).map(|_| mech.sample_noise(&mut a)).collect();
        let ys: Vec<f64> = (0..5).map(|_| mech.sample_noise(&mut b)).collect();
        assert_eq!(xs, ys);
        assert!(xs.windows(2).all(|w| w[0] != w[1]));
    }

    #[test]
    fn noised_counts_truncate_towards_zero() {
        let mech = LaplaceMechanism::new(1.0, 1e9).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..20 {
            assert_eq!(mech.add_noise_to_count(0, &mut rng), 0);
        }
    }

    #[test]
    fn report_noisy_max_selects_top_n() {
        let values: BTreeMap<&str, i64> =
            vec![("a", 3), ("b", 9), ("c", -1), ("d", 9), ("e", 4)].into_iter().collect();
        let top = report_noisy_max(&values, 3);
        assert_eq!(top.keys().copied().collect::<Vec<_>>(), vec!["b", "d", "e"]);
        let top = report_noisy_max(&values, 1);
        // tie between b and d is broken by key order
        assert_eq!(top.keys().copied().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn report_noisy_max_degenerate_cases() {
        let values: BTreeMap<u8, i64> = vec![(1, 3), (2, 5)].into_iter().collect();
        assert!(report_noisy_max(&values, 0).is_empty());
        assert!(report_noisy_max(&BTreeMap::<u8, i64>::new(), 4).is_empty());
        assert_eq!(report_noisy_max(&values, 2), values);
        assert_eq!(report_noisy_max(&values, 10), values);
    }

    #[test]
    fn subset_size_within_range() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let s = draw_subset_size(&mut rng, 2, 6);
            assert!((2..6).contains(&s));
        }
        assert_eq!(draw_subset_size(&mut rng, 4, 4), 4);
        assert_eq!(draw_subset_size(&mut rng, 4, 5), 4);
        assert_eq!(draw_subset_size(&mut rng, 7, 2), 7);
    }

    #[test]
    fn edge_bounds_examples() {
        // 40 positive edges over 10 activities: [25, 55]
        assert_eq!(edge_subset_bounds(40, 10), (25, 55));
        // few positive edges: lower is lifted to the activity count
        assert_eq!(edge_subset_bounds(3, 10), (10, 20));
        // many positive edges: upper is capped below n²
        assert_eq!(edge_subset_bounds(9, 3), (3, 8));
        assert_eq!(edge_subset_bounds(0, 1), (0, 0));
    }

    proptest! {
        #[test]
        fn edge_bounds_are_consistent(positive in 0usize..500, n in 2usize..30) {
            let positive = positive.min(n * n);
            let (lower, upper) = edge_subset_bounds(positive, n);
            prop_assert!(lower >= n);
            prop_assert!(upper < n * n);
            prop_assert!(lower <= upper);
            prop_assert!(lower % 5 == 0 || lower == n);
        }
    }
}
