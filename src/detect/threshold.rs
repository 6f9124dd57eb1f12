//! Bounds check of the latest value of one category against its baseline.

use serde::{Deserialize, Serialize};

use super::baseline::BaselineStats;
use super::policy::ThresholdPolicy;
use super::Category;

pub const REASON_NO_DATA: &str = "No data";
pub const REASON_NOISE: &str = "Small volume, treated as noise";
pub const REASON_NORMAL: &str = "Normal";

/// Outcome for one category of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub is_normal: bool,
    pub reason: String,
}

impl Verdict {
    fn normal(reason: &str) -> Self {
        Self {
            is_normal: true,
            reason: reason.to_string(),
        }
    }

    fn abnormal(reason: String) -> Self {
        Self {
            is_normal: false,
            reason,
        }
    }
}

/// Verdict plus the numbers that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    pub verdict: Verdict,
    pub latest: i64,
    pub baseline: BaselineStats,
    /// Absent when the empty-data or noise-floor rule decided the verdict.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub multiplier: f64,
    pub upper_limit: f64,
    pub lower_limit: f64,
}

/// Upper limit, always rounded toward positive infinity.
pub fn upper_bound(mean: f64, std_dev: f64, multiplier: f64) -> f64 {
    (mean + multiplier * std_dev).ceil()
}

/// Lower limit, unrounded.
pub fn lower_bound(mean: f64, std_dev: f64, multiplier: f64) -> f64 {
    mean - multiplier * std_dev
}

/// Two decimals with halves rounded away from zero, so `10.125` shows as
/// `10.13` where `{:.2}` alone would print `10.12`.
pub fn format_lower_bound(lower_limit: f64) -> String {
    format!("{:.2}", (lower_limit * 100.0).round() / 100.0)
}

/// Classify `latest` against the baseline of `values` for a known category.
pub fn classify(values: &[i64], latest: i64, category: Category, policy: &ThresholdPolicy) -> Verdict {
    assess(values, latest, category, policy).verdict
}

pub fn assess(values: &[i64], latest: i64, category: Category, policy: &ThresholdPolicy) -> Assessment {
    assess_with(values, latest, category.as_str(), policy, |mean| {
        policy.multiplier(category, mean)
    })
}

/// Assess a sequence under a free-text category label. Labels that are not
/// one of the known categories are checked with the fallback multiplier.
pub fn assess_labelled(values: &[i64], latest: i64, label: &str, policy: &ThresholdPolicy) -> Assessment {
    let shown = match label.parse::<Category>() {
        Ok(category) => category.as_str(),
        Err(_) => label.trim(),
    };
    assess_with(values, latest, shown, policy, |mean| {
        policy.multiplier_for_label(label, mean)
    })
}

fn assess_with(
    values: &[i64],
    latest: i64,
    label: &str,
    policy: &ThresholdPolicy,
    multiplier_for: impl FnOnce(f64) -> f64,
) -> Assessment {
    if values.is_empty() {
        return Assessment {
            verdict: Verdict::normal(REASON_NO_DATA),
            latest,
            baseline: BaselineStats::default(),
            bounds: None,
        };
    }

    let baseline = BaselineStats::estimate(values);
    let latest_f = latest as f64;

    if baseline.mean < policy.noise_floor && latest_f < policy.noise_floor {
        return Assessment {
            verdict: Verdict::normal(REASON_NOISE),
            latest,
            baseline,
            bounds: None,
        };
    }

    let multiplier = multiplier_for(baseline.mean);
    let upper_limit = upper_bound(baseline.mean, baseline.std_dev, multiplier);
    let lower_limit = lower_bound(baseline.mean, baseline.std_dev, multiplier);

    let verdict = if latest_f > upper_limit {
        Verdict::abnormal(format!(
            "Spike in {}: latest ({}) > upper bound ({})",
            label, latest, upper_limit
        ))
    } else if latest_f < lower_limit {
        Verdict::abnormal(format!(
            "Drop in {}: latest ({}) < lower bound ({})",
            label,
            latest,
            format_lower_bound(lower_limit)
        ))
    } else {
        Verdict::normal(REASON_NORMAL)
    };

    tracing::trace!(
        category = label,
        latest,
        mean = baseline.mean,
        std_dev = baseline.std_dev,
        multiplier,
        upper_limit,
        lower_limit,
        is_normal = verdict.is_normal,
        "category assessed"
    );

    Assessment {
        verdict,
        latest,
        baseline,
        bounds: Some(Bounds {
            multiplier,
            upper_limit,
            lower_limit,
        }),
    }
}
