//! Entity-level aggregation of category verdicts.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::align::AlignedSeries;
use super::policy::ThresholdPolicy;
use super::threshold::{self, Verdict};
use super::Category;
use crate::source::{ApiSeries, SeriesKey};

/// Reasons for the categories that are not normal. Normal categories are
/// absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryReasons {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed: Option<String>,
}

impl CategoryReasons {
    pub fn get(&self, category: Category) -> Option<&str> {
        match category {
            Category::Success => self.success.as_deref(),
            Category::Pending => self.pending.as_deref(),
            Category::Failed => self.failed.as_deref(),
        }
    }

    fn set(&mut self, category: Category, reason: String) {
        let slot = match category {
            Category::Success => &mut self.success,
            Category::Pending => &mut self.pending,
            Category::Failed => &mut self.failed,
        };
        *slot = Some(reason);
    }

    pub fn is_empty(&self) -> bool {
        self.success.is_none() && self.pending.is_none() && self.failed.is_none()
    }

    /// Abnormal categories in fixed success, pending, failed order.
    pub fn iter(&self) -> impl Iterator<Item = (Category, &str)> + '_ {
        Category::ALL
            .into_iter()
            .filter_map(move |c| self.get(c).map(|r| (c, r)))
    }
}

/// Combined verdict for one (merchant, payment method) entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityVerdict {
    #[serde(flatten)]
    pub key: SeriesKey,
    pub merchant_name: String,
    pub is_normal: bool,
    pub reasons: CategoryReasons,
}

/// Classify every category of an aligned series. All three categories are
/// always evaluated, even when an earlier one is already abnormal.
pub fn classify_categories(aligned: &AlignedSeries, policy: &ThresholdPolicy) -> [(Category, Verdict); 3] {
    Category::ALL.map(|category| {
        let values = aligned.sequence(category);
        let latest = aligned.latest(category).unwrap_or(0);
        (category, threshold::classify(values, latest, category, policy))
    })
}

/// Fold category verdicts into `(is_normal, reasons)`.
pub fn aggregate(verdicts: &[(Category, Verdict)]) -> (bool, CategoryReasons) {
    let mut reasons = CategoryReasons::default();
    let mut is_normal = true;
    for (category, verdict) in verdicts {
        is_normal &= verdict.is_normal;
        if !verdict.is_normal {
            reasons.set(*category, verdict.reason.clone());
        }
    }
    (is_normal, reasons)
}

pub fn evaluate_entity(series: &ApiSeries, policy: &ThresholdPolicy) -> EntityVerdict {
    let aligned = AlignedSeries::from_points(&series.data);
    let verdicts = classify_categories(&aligned, policy);
    let (is_normal, reasons) = aggregate(&verdicts);
    let key = series.key();

    if !is_normal {
        debug!(
            merchant = %key.merchant,
            payment_method = %key.payment_method,
            intervals = aligned.len(),
            "entity flagged abnormal"
        );
    }

    EntityVerdict {
        key,
        merchant_name: series.merchant_name.clone(),
        is_normal,
        reasons,
    }
}

/// Evaluate every series. Output is one verdict per input, in input order.
pub fn evaluate(series: &[ApiSeries], policy: &ThresholdPolicy) -> Vec<EntityVerdict> {
    series.iter().map(|s| evaluate_entity(s, policy)).collect()
}
