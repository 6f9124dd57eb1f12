//! Transaction anomaly classification.
//!
//! The pipeline is pure and synchronous: align a raw series, estimate a
//! baseline per category, check the latest value against policy bounds and
//! fold the three category verdicts into one entity verdict.

pub mod align;
pub mod baseline;
pub mod engine;
pub mod policy;
pub mod threshold;

pub use self::engine::{evaluate, evaluate_entity, EntityVerdict};
pub use self::policy::{MonitoringWindow, PolicyTable, ThresholdPolicy};
pub use self::threshold::{classify, Verdict};

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Transaction outcome tracked per entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Success,
    Pending,
    Failed,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Success, Category::Pending, Category::Failed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Success => "success",
            Category::Pending => "pending",
            Category::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" => Ok(Category::Success),
            "pending" => Ok(Category::Pending),
            "failed" => Ok(Category::Failed),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown transaction category: {0}")]
pub struct UnknownCategory(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse_and_display() {
        for c in Category::ALL {
            assert_eq!(c.to_string().parse::<Category>().unwrap(), c);
        }
        assert_eq!("  FAILED ".parse::<Category>().unwrap(), Category::Failed);
        assert!("refunded".parse::<Category>().is_err());
    }

    #[test]
    fn test_category_serde_is_lowercase() {
        let json = serde_json::to_string(&Category::Pending).unwrap();
        assert_eq!(json, "\"pending\"");
    }
}
