//! Statistical primitives shared by every analysis.
//!
//! All functions are total: empty or degenerate input yields `0.0` or an
//! empty result instead of an error. Dispersion uses the population
//! convention (divide by `n`) throughout.

use serde::{Deserialize, Serialize};

/// Default multiplier for [`detect_anomalies_zscore`].
pub const DEFAULT_ZSCORE_K: f64 = 2.0;

/// Tukey fence multiplier used by [`iqr_fences`].
pub const IQR_FENCE: f64 = 1.5;

/// Nearest-rank percentile: index `ceil(p/100 * n) - 1` into the ascending
/// sort, clamped to `[0, n-1]`. No interpolation happens, so the result is
/// always one of the inputs and ties resolve to the lower rank.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sorted = sorted_copy(values);
    percentile_of_sorted(&sorted, p)
}

/// Same as [`percentile`] for input that is already sorted ascending.
pub fn percentile_of_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let n = sorted.len();
    let rank = (p / 100.0 * n as f64).ceil() as i64 - 1;
    let idx = rank.clamp(0, n as i64 - 1) as usize;
    sorted[idx]
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Lower and upper Tukey fences, `None` for empty input.
pub fn iqr_fences(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let sorted = sorted_copy(values);
    let q1 = percentile_of_sorted(&sorted, 25.0);
    let q3 = percentile_of_sorted(&sorted, 75.0);
    let iqr = q3 - q1;
    Some((q1 - IQR_FENCE * iqr, q3 + IQR_FENCE * iqr))
}

/// Indices of values outside the Tukey fences, in input order.
pub fn detect_outliers_iqr(values: &[f64]) -> Vec<usize> {
    let Some((lower, upper)) = iqr_fences(values) else {
        return Vec::new();
    };
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| **v < lower || **v > upper)
        .map(|(i, _)| i)
        .collect()
}

/// Indices of values with `|x - mean| > k * std_dev`, in input order.
pub fn detect_anomalies_zscore(values: &[f64], k: f64) -> Vec<usize> {
    let sd = std_dev(values);
    if sd == 0.0 || !sd.is_finite() {
        return Vec::new();
    }
    let m = mean(values);
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| (**v - m).abs() > k * sd)
        .map(|(i, _)| i)
        .collect()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Summary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
}

pub fn describe(values: &[f64]) -> Summary {
    if values.is_empty() {
        return Summary::default();
    }
    let sorted = sorted_copy(values);
    Summary {
        count: sorted.len(),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        mean: mean(values),
        std_dev: std_dev(values),
        p50: percentile_of_sorted(&sorted, 50.0),
        p90: percentile_of_sorted(&sorted, 90.0),
        p99: percentile_of_sorted(&sorted, 99.0),
    }
}

fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn percentile_uses_ceiling_index() {
        let values = [15.0, 20.0, 35.0, 40.0, 50.0];
        assert_eq!(percentile(&values, 5.0), 15.0);
        assert_eq!(percentile(&values, 30.0), 20.0);
        assert_eq!(percentile(&values, 40.0), 20.0);
        assert_eq!(percentile(&values, 50.0), 35.0);
        assert_eq!(percentile(&values, 100.0), 50.0);
        assert_eq!(percentile(&values, 0.0), 15.0);
    }

    #[test]
    fn percentile_does_not_require_sorted_input() {
        assert_eq!(percentile(&[9.0, 1.0, 5.0], 50.0), 5.0);
        assert_eq!(percentile(&[], 99.0), 0.0);
    }

    #[test]
    fn population_std_dev() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&values), 5.0);
        assert_eq!(variance(&values), 4.0);
        assert_eq!(std_dev(&values), 2.0);
        assert_eq!(std_dev(&[3.0]), 0.0);
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn iqr_flags_far_values() {
        let values = [10.0, 11.0, 12.0, 11.0, 10.0, 12.0, 11.0, 95.0];
        assert_eq!(detect_outliers_iqr(&values), vec![7]);
        assert!(detect_outliers_iqr(&[]).is_empty());
    }

    #[test]
    fn zscore_flags_far_values() {
        let mut values = vec![10.0; 20];
        values.push(100.0);
        assert_eq!(detect_anomalies_zscore(&values, DEFAULT_ZSCORE_K), vec![20]);
        assert!(detect_anomalies_zscore(&[5.0, 5.0, 5.0], DEFAULT_ZSCORE_K).is_empty());
    }

    #[test]
    fn describe_empty_is_zero() {
        assert_eq!(describe(&[]), Summary::default());
        let s = describe(&[3.0, 1.0, 2.0]);
        assert_eq!(s.count, 3);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 3.0);
        assert_eq!(s.p50, 2.0);
    }

    proptest! {
        #[test]
        fn percentiles_are_monotonic(values in prop::collection::vec(0.0f64..10_000.0, 1..200)) {
            let p50 = percentile(&values, 50.0);
            let p90 = percentile(&values, 90.0);
            let p99 = percentile(&values, 99.0);
            prop_assert!(p50 <= p90);
            prop_assert!(p90 <= p99);
        }

        #[test]
        fn percentile_is_an_input_value(values in prop::collection::vec(-1e6f64..1e6, 1..100), p in 0.0f64..=100.0) {
            let v = percentile(&values, p);
            prop_assert!(values.contains(&v));
        }
    }
}
