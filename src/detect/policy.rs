//! Threshold policy table.
//!
//! This is the only place domain knowledge enters the classifier. The two
//! monitoring views share every constant except the pending multiplier,
//! which is kept as two independent settings.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::Category;

/// Below this, both the mean and the latest value are treated as noise.
pub const NOISE_FLOOR: f64 = 3.0;
/// Success channels with a mean above this get the tighter multiplier.
pub const SUCCESS_VOLUME_THRESHOLD: f64 = 30.0;
pub const SUCCESS_MULTIPLIER_HIGH_VOLUME: f64 = 3.0;
pub const SUCCESS_MULTIPLIER_LOW_VOLUME: f64 = 3.2;
/// Pending multiplier for the 8-hour interval view.
pub const PENDING_MULTIPLIER_8H: f64 = 7.0;
/// Pending multiplier for the 48-hour hourly view.
pub const PENDING_MULTIPLIER_48H: f64 = 6.5;
pub const FAILED_MULTIPLIER: f64 = 2.0;
/// Applied to category labels outside the known three.
pub const FALLBACK_MULTIPLIER: f64 = 2.5;

/// Monitoring view a series was fetched for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MonitoringWindow {
    /// Last 8 hours at the backend's native interval.
    #[default]
    #[serde(rename = "interval8h")]
    Interval8h,
    /// Last 48 hours bucketed hourly, with 7-day averages for display.
    #[serde(rename = "hourly48h")]
    Hourly48h,
}

impl MonitoringWindow {
    pub const ALL: [MonitoringWindow; 2] = [MonitoringWindow::Interval8h, MonitoringWindow::Hourly48h];

    pub fn as_str(&self) -> &'static str {
        match self {
            MonitoringWindow::Interval8h => "interval8h",
            MonitoringWindow::Hourly48h => "hourly48h",
        }
    }

    /// Length of the query window ending at "now".
    pub fn span(&self) -> chrono::Duration {
        match self {
            MonitoringWindow::Interval8h => chrono::Duration::hours(8),
            MonitoringWindow::Hourly48h => chrono::Duration::hours(48),
        }
    }
}

impl std::fmt::Display for MonitoringWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MonitoringWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "interval8h" | "interval" | "8h" => Ok(MonitoringWindow::Interval8h),
            "hourly48h" | "hourly" | "48h" => Ok(MonitoringWindow::Hourly48h),
            other => Err(format!(
                "unknown monitoring window '{}', expected interval8h or hourly48h",
                other
            )),
        }
    }
}

/// Configurable policy table covering both monitoring views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyTable {
    pub noise_floor: f64,
    pub success_volume_threshold: f64,
    pub success_multiplier_high_volume: f64,
    pub success_multiplier_low_volume: f64,
    pub pending_multiplier_8h: f64,
    pub pending_multiplier_48h: f64,
    pub failed_multiplier: f64,
    pub fallback_multiplier: f64,
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self {
            noise_floor: NOISE_FLOOR,
            success_volume_threshold: SUCCESS_VOLUME_THRESHOLD,
            success_multiplier_high_volume: SUCCESS_MULTIPLIER_HIGH_VOLUME,
            success_multiplier_low_volume: SUCCESS_MULTIPLIER_LOW_VOLUME,
            pending_multiplier_8h: PENDING_MULTIPLIER_8H,
            pending_multiplier_48h: PENDING_MULTIPLIER_48H,
            failed_multiplier: FAILED_MULTIPLIER,
            fallback_multiplier: FALLBACK_MULTIPLIER,
        }
    }
}

impl PolicyTable {
    /// Resolve the policy used by one monitoring view.
    pub fn for_window(&self, window: MonitoringWindow) -> ThresholdPolicy {
        let pending_multiplier = match window {
            MonitoringWindow::Interval8h => self.pending_multiplier_8h,
            MonitoringWindow::Hourly48h => self.pending_multiplier_48h,
        };
        ThresholdPolicy {
            noise_floor: self.noise_floor,
            success_volume_threshold: self.success_volume_threshold,
            success_multiplier_high_volume: self.success_multiplier_high_volume,
            success_multiplier_low_volume: self.success_multiplier_low_volume,
            pending_multiplier,
            failed_multiplier: self.failed_multiplier,
            fallback_multiplier: self.fallback_multiplier,
        }
    }
}

/// Policy for a single evaluation, with the pending multiplier already
/// chosen for the view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPolicy {
    pub noise_floor: f64,
    pub success_volume_threshold: f64,
    pub success_multiplier_high_volume: f64,
    pub success_multiplier_low_volume: f64,
    pub pending_multiplier: f64,
    pub failed_multiplier: f64,
    pub fallback_multiplier: f64,
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        PolicyTable::default().for_window(MonitoringWindow::default())
    }
}

impl ThresholdPolicy {
    /// Standard-deviation multiplier for `category` given the baseline mean.
    pub fn multiplier(&self, category: Category, mean: f64) -> f64 {
        match category {
            Category::Success if mean > self.success_volume_threshold => {
                self.success_multiplier_high_volume
            }
            Category::Success => self.success_multiplier_low_volume,
            Category::Pending => self.pending_multiplier,
            Category::Failed => self.failed_multiplier,
        }
    }

    /// Like [`multiplier`](Self::multiplier), for a free-text label. Labels
    /// that do not name a known category get the fallback multiplier.
    pub fn multiplier_for_label(&self, label: &str, mean: f64) -> f64 {
        match label.parse::<Category>() {
            Ok(category) => self.multiplier(category, mean),
            Err(_) => self.fallback_multiplier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_multiplier_differs_per_window() {
        let table = PolicyTable::default();
        let p8 = table.for_window(MonitoringWindow::Interval8h);
        let p48 = table.for_window(MonitoringWindow::Hourly48h);
        assert_eq!(p8.multiplier(Category::Pending, 100.0), 7.0);
        assert_eq!(p48.multiplier(Category::Pending, 100.0), 6.5);

        // Everything else is shared.
        assert_eq!(p8.multiplier(Category::Failed, 5.0), p48.multiplier(Category::Failed, 5.0));
        assert_eq!(p8.noise_floor, p48.noise_floor);
    }

    #[test]
    fn test_success_multiplier_tightens_above_threshold() {
        let p = ThresholdPolicy::default();
        assert_eq!(p.multiplier(Category::Success, 30.0), 3.2);
        assert_eq!(p.multiplier(Category::Success, 30.5), 3.0);
        assert_eq!(p.multiplier(Category::Success, 4.0), 3.2);
    }

    #[test]
    fn test_failed_is_tightest() {
        let p = ThresholdPolicy::default();
        assert_eq!(p.multiplier(Category::Failed, 1000.0), 2.0);
    }

    #[test]
    fn test_unknown_label_uses_fallback() {
        let p = ThresholdPolicy::default();
        assert_eq!(p.multiplier_for_label("refunded", 50.0), 2.5);
        assert_eq!(p.multiplier_for_label("failed", 50.0), 2.0);
    }

    #[test]
    fn test_window_parse() {
        assert_eq!("8h".parse::<MonitoringWindow>().unwrap(), MonitoringWindow::Interval8h);
        assert_eq!("Hourly48h".parse::<MonitoringWindow>().unwrap(), MonitoringWindow::Hourly48h);
        assert!("weekly".parse::<MonitoringWindow>().is_err());
        assert_eq!(MonitoringWindow::Hourly48h.span(), chrono::Duration::hours(48));
    }

    #[test]
    fn test_partial_table_keeps_defaults() {
        let table: PolicyTable = toml::from_str("pending_multiplier_48h = 7.0").unwrap();
        assert_eq!(table.pending_multiplier_48h, 7.0);
        assert_eq!(table.pending_multiplier_8h, PENDING_MULTIPLIER_8H);
        assert_eq!(table.failed_multiplier, FAILED_MULTIPLIER);
    }
}
