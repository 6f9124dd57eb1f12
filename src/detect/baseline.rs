//! Baseline estimation over one category sequence.
//!
//! The baseline is self-referential: it is computed over the full trimmed
//! window, including the latest value that is subsequently tested against it.
//! It is not a leave-one-out estimator, so a spike contributes to its own
//! bound.

use serde::{Deserialize, Serialize};

/// Mean and population standard deviation of a category sequence.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BaselineStats {
    pub mean: f64,
    pub std_dev: f64,
}

impl BaselineStats {
    /// Estimate the baseline over every value in `values`.
    ///
    /// An empty sequence yields `mean = 0, std_dev = 0`; callers treat that
    /// as the "no data" case rather than as a real baseline.
    pub fn estimate(values: &[i64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let n = values.len() as f64;
        let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
        let sum_sq_diff: f64 = values
            .iter()
            .map(|&v| (v as f64 - mean).powi(2))
            .sum();
        // Population variance: divisor is n, not n - 1.
        let variance = sum_sq_diff / n;

        Self {
            mean,
            std_dev: variance.sqrt(),
        }
    }
}
